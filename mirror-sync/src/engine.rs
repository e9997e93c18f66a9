//! The sync engine state machine.
//!
//! Sans-IO: the engine decides what to fetch and how to apply answers, and
//! a driver performs the fetches. Time is passed in explicitly so every
//! timer is testable.
//!
//! ```text
//!  enqueue ──► RequestQueue ──► next_request() ──► (driver fetches)
//!                  ▲                                     │
//!                  │ retry (front)                       ▼
//!                  └──────────────────────────────── complete()
//!                                                        │
//!                     pointer down? ──► buffered ◄───────┤
//!                                                        ▼
//!                          restore preview, apply, persist, queue children
//! ```
//!
//! At most one request is in flight. Responses are applied in dispatch
//! order, except that a drag response superseded by a newer queued drag
//! is discarded and responses arriving while the pointer is held are
//! replayed after release.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mirror_core::{
    activation_command, apply_response, compose, find_zone_at, min_touch_margin, touch_location,
    ApplyContext, ApplyOutcome, CachedDrawing, Composition, DeviceErrorKind, DrawingStore,
    PromptRequest, Response, TouchFilter, TouchMargin, VersionCache,
};
use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult, TransportError};
use crate::pointer::{Activation, Gesture, GestureOutcome, PointerEvent, PointerPhase, ZoneHit};
use crate::preview::PreviewBackups;
use crate::queue::{FetchRequest, RequestEntry, RequestKind, RequestQueue, TouchContext};

/// Lifecycle of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EngineState {
    /// Created, nothing queued yet.
    #[default]
    Idle,
    /// Syncing.
    Running,
    /// The main drawing failed. Nothing further is requested.
    Fatal {
        /// Drawing that failed.
        drawing: String,
        /// User-visible message.
        message: String,
    },
}

/// Something the host should act on.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Compose and repaint.
    Redraw,
    /// Show a text prompt.
    Prompt(PromptRequest),
    /// Replace the canvas with an error.
    Fatal {
        /// Drawing that failed.
        drawing: String,
        /// User-visible message.
        message: String,
    },
}

/// A request handed to the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    /// Identifies the request when its result comes back.
    pub id: u64,
    /// What to fetch.
    pub request: FetchRequest,
}

#[derive(Debug, Clone)]
struct Buffered {
    entry: RequestEntry,
    response: Response,
}

/// Drives the drawing store from device responses and pointer input.
#[derive(Debug)]
pub struct SyncEngine {
    config: SyncConfig,
    store: DrawingStore,
    cache: Arc<dyn VersionCache>,
    queue: RequestQueue,
    in_flight: Option<(u64, RequestEntry)>,
    next_id: u64,
    buffered: Vec<Buffered>,
    previews: PreviewBackups,
    gesture: Gesture,
    identifier: String,
    state: EngineState,
    ready_at: Option<Instant>,
    refresh_at: Option<Instant>,
    events: VecDeque<EngineEvent>,
}

impl SyncEngine {
    /// Create an engine persisting to `cache`.
    #[must_use]
    pub fn new(config: SyncConfig, cache: Arc<dyn VersionCache>) -> Self {
        let gesture = Gesture::new(config.long_press, config.click_delay);
        let identifier = config.identifier.clone();
        Self {
            config,
            store: DrawingStore::new(),
            cache,
            queue: RequestQueue::new(),
            in_flight: None,
            next_id: 1,
            buffered: Vec::new(),
            previews: PreviewBackups::new(),
            gesture,
            identifier,
            state: EngineState::Idle,
            ready_at: None,
            refresh_at: None,
            events: VecDeque::new(),
        }
    }

    /// Queue the startup menu request that asks the device for its main
    /// drawing.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Stopped`] in the fatal state.
    pub fn start(&mut self) -> SyncResult<()> {
        self.ensure_running()?;
        tracing::info!("Requesting main drawing from device");
        self.queue.enqueue(RequestEntry::main_menu());
        Ok(())
    }

    /// Skip the menu and open `name` as the main drawing.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Stopped`] in the fatal state.
    pub fn open_drawing(&mut self, name: &str) -> SyncResult<()> {
        self.ensure_running()?;
        tracing::info!("Opening main drawing {name}");
        self.store.set_main(name);
        self.cache.remember_main(name);
        let version = self.cache.version_of(name);
        self.queue
            .enqueue(RequestEntry::versioned(RequestKind::Main, name, version));
        Ok(())
    }

    /// Queue a request.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Stopped`] in the fatal state.
    pub fn enqueue(&mut self, entry: RequestEntry) -> SyncResult<()> {
        self.ensure_running()?;
        self.queue.enqueue(entry);
        Ok(())
    }

    fn ensure_running(&mut self) -> SyncResult<()> {
        match self.state {
            EngineState::Fatal { .. } => Err(SyncError::Stopped),
            EngineState::Idle => {
                self.state = EngineState::Running;
                Ok(())
            }
            EngineState::Running => Ok(()),
        }
    }

    /// Drawing store.
    #[must_use]
    pub const fn store(&self) -> &DrawingStore {
        &self.store
    }

    /// Pending requests.
    #[must_use]
    pub const fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    /// Request currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> Option<&RequestEntry> {
        self.in_flight.as_ref().map(|(_, entry)| entry)
    }

    /// True if dispatch `id` is still awaited.
    #[must_use]
    pub fn is_in_flight(&self, id: u64) -> bool {
        self.in_flight.as_ref().is_some_and(|(current, _)| *current == id)
    }

    /// Lifecycle state.
    #[must_use]
    pub const fn state(&self) -> &EngineState {
        &self.state
    }

    /// True once the main drawing has failed.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self.state, EngineState::Fatal { .. })
    }

    /// Identifier prefixed to touch commands.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Responses held back while the pointer is down.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffered.len()
    }

    /// Drawings currently showing a touch-action preview.
    #[must_use]
    pub const fn previews(&self) -> &PreviewBackups {
        &self.previews
    }

    /// Next refresh time, if armed.
    #[must_use]
    pub const fn refresh_at(&self) -> Option<Instant> {
        self.refresh_at
    }

    /// Events produced since the last call.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        self.events.drain(..).collect()
    }

    /// Compose the main drawing.
    pub fn composition(&mut self) -> Option<Composition> {
        let main = self.store.main_name()?.to_string();
        Some(compose(&mut self.store, &main))
    }

    /// Hand out the next request, if one may be sent at `now`.
    pub fn next_request(&mut self, now: Instant) -> Option<Dispatch> {
        if self.is_fatal() || self.in_flight.is_some() {
            return None;
        }
        if self.ready_at.is_some_and(|ready| ready > now) {
            return None;
        }
        let entry = self.queue.pop_front()?;
        let id = self.next_id;
        self.next_id += 1;
        tracing::debug!(
            "Dispatching {} for {:?} (retry {}/{})",
            entry.cmd,
            entry.drawing,
            entry.retry_count,
            self.config.max_retries
        );
        let request = entry.fetch_request();
        self.in_flight = Some((id, entry));
        Some(Dispatch { id, request })
    }

    /// Earliest time the engine wants to be woken.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.is_fatal() {
            return None;
        }
        let dispatch = if self.in_flight.is_none() && !self.queue.is_empty() {
            self.ready_at
        } else {
            None
        };
        [dispatch, self.refresh_at, self.gesture.next_deadline()]
            .into_iter()
            .flatten()
            .min()
    }

    /// True if a request could be dispatched right now.
    #[must_use]
    pub fn can_dispatch(&self, now: Instant) -> bool {
        !self.is_fatal()
            && self.in_flight.is_none()
            && !self.queue.is_empty()
            && !self.ready_at.is_some_and(|ready| ready > now)
    }

    /// Handle the result of dispatch `id`.
    pub fn complete(&mut self, id: u64, result: Result<Response, TransportError>, now: Instant) {
        let entry = match self.in_flight.take() {
            Some((current, entry)) if current == id => entry,
            other => {
                self.in_flight = other;
                tracing::debug!("Dropping result of cancelled request {id}");
                return;
            }
        };
        if self.is_fatal() {
            return;
        }
        match result {
            Ok(response) => self.on_response(entry, response, now),
            Err(e) => self.on_failure(entry, &e, now),
        }
    }

    fn on_response(&mut self, entry: RequestEntry, response: Response, now: Instant) {
        if let Response::Menu {
            drawing_name,
            identifier,
            version,
        } = &response
        {
            self.on_menu(&entry, drawing_name, identifier, version.as_deref());
            self.ready_at = Some(now);
            return;
        }

        if entry.kind == RequestKind::MainMenu {
            self.on_failed_menu(&response);
            return;
        }

        self.ready_at = Some(now + self.config.queue_delay);
        let drag = entry.drag_cmd().map(str::to_string);

        if let Some(cmd) = &drag {
            if self.queue.has_drag_for(cmd) {
                tracing::debug!("Discarding drag response for {cmd}: a newer drag is queued");
                return;
            }
        }

        if self.gesture.is_down() {
            if let Some(cmd) = &drag {
                self.buffered
                    .retain(|held| held.entry.drag_cmd() != Some(cmd.as_str()));
            }
            tracing::debug!("Pointer is down, holding response for {}", entry.drawing_name());
            self.buffered.push(Buffered { entry, response });
            return;
        }

        self.previews.restore(&mut self.store, entry.drawing_name());
        self.apply(&entry, &response, now);
        self.redraw_if_idle();
    }

    fn on_menu(&mut self, entry: &RequestEntry, drawing_name: &str, identifier: &str, version: Option<&str>) {
        let name = if drawing_name.trim().is_empty() {
            entry.drawing_name().to_string()
        } else {
            drawing_name.trim().to_string()
        };
        if name.is_empty() {
            self.enter_fatal("", "Device did not name a main drawing");
            return;
        }
        if !identifier.is_empty() {
            self.identifier = identifier.to_string();
        }
        if !self.store.contains(&name) {
            self.store.set_main(&name);
        }
        if self.store.is_main(&name) {
            self.cache.remember_main(&name);
        }

        let stored = self.cache.version_of(&name);
        let version = match (stored, version) {
            (Some(stored), Some(announced)) if stored == announced => Some(stored),
            _ => None,
        };
        tracing::info!(
            "Device menu names drawing {name} (identifier {}, cached version {})",
            self.identifier,
            version.as_deref().unwrap_or("none")
        );
        self.queue
            .enqueue(RequestEntry::fetch(RequestKind::Main, name, version));
    }

    fn on_failed_menu(&mut self, response: &Response) {
        let message = match response {
            Response::Error { message, .. } if !message.is_empty() => message.clone(),
            _ => "Device did not answer the startup request with a menu".to_string(),
        };
        self.enter_fatal("", message);
    }

    fn on_failure(&mut self, mut entry: RequestEntry, error: &TransportError, now: Instant) {
        entry.retry_count += 1;
        let name = entry.drawing_name().to_string();
        if entry.retry_count <= self.config.max_retries {
            tracing::warn!(
                "Request {} for {name} failed (attempt {}/{}), retrying in {}ms: {error}",
                entry.cmd,
                entry.retry_count,
                self.config.max_retries,
                self.config.retry_delay.as_millis()
            );
            self.queue.requeue_front(entry);
            self.ready_at = Some(now + self.config.retry_delay);
            return;
        }

        tracing::error!(
            "Giving up on {} for {name} after {} attempts ({}): {error}",
            entry.cmd,
            self.config.max_retries,
            if error.is_network() { "network" } else { "payload" }
        );
        let message = format!(
            "Failed to load drawing \"{name}\" after {} attempts",
            self.config.max_retries
        );
        self.fail_drawing(&name, message);
        self.ready_at = Some(now + self.config.queue_delay);
        self.redraw_if_idle();
    }

    fn apply(&mut self, entry: &RequestEntry, response: &Response, now: Instant) {
        let name = entry.drawing_name().to_string();
        match response {
            Response::Start(_) | Response::Update(_) => {
                let context = ApplyContext::new(&name)
                    .with_touch(entry.kind == RequestKind::Touch)
                    .with_cached(self.cache.data_of(&name));
                match apply_response(&mut self.store, response, &context) {
                    Ok(outcome) => self.after_apply(outcome, now),
                    Err(e) => {
                        tracing::warn!("Rejected response for {name}: {e}");
                        self.fail_drawing(&name, e.to_string());
                    }
                }
            }
            Response::Empty => {
                if entry.kind == RequestKind::InsertDrawing {
                    tracing::warn!("Device returned nothing for inserted drawing {name}");
                }
            }
            Response::Error {
                kind: DeviceErrorKind::DrawingNotFound,
                message,
            } => {
                tracing::warn!("Device does not know drawing {name}: {message}");
                self.cache.remove(&name);
                self.fail_drawing(&name, format!("Drawing \"{name}\" not found"));
            }
            Response::Error { message, .. } => {
                self.fail_drawing(&name, message.clone());
            }
            Response::Menu { .. } => {}
        }
    }

    fn after_apply(&mut self, outcome: ApplyOutcome, now: Instant) {
        let name = outcome.drawing;
        for removed in &outcome.removed {
            self.forget(removed);
        }
        if outcome.replaced_main {
            self.cache.remember_main(&name);
        }

        if let Some(data) = self.store.get_drawing_data(&name) {
            self.cache.set(&name, CachedDrawing::from_data(data.clone()));
            if self.store.is_main(&name) {
                self.refresh_at = (data.refresh > 0).then(|| now + Duration::from_millis(data.refresh));
            }
        }

        self.queue_children(outcome.fetch);
    }

    fn queue_children(&mut self, children: Vec<String>) {
        for child in children {
            let in_flight = self.in_flight().is_some_and(|e| e.drawing_name() == child);
            if in_flight || self.queue.contains_drawing(&child) {
                tracing::debug!("Inserted drawing {child} is already queued");
                continue;
            }
            self.queue
                .enqueue(RequestEntry::fetch(RequestKind::InsertDrawing, child, None));
        }
    }

    fn fail_drawing(&mut self, name: &str, message: impl Into<String>) {
        let message = message.into();
        let is_main = self.store.main_name().is_none() || self.store.is_main(name);
        if name.is_empty() || is_main {
            self.enter_fatal(name, message);
        } else {
            tracing::warn!("Dropping inserted drawing {name}: {message}");
            self.remove_drawing(name);
        }
    }

    fn enter_fatal(&mut self, drawing: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("Sync stopped: {message}");
        self.queue.clear();
        self.buffered.clear();
        self.refresh_at = None;
        self.ready_at = None;
        self.state = EngineState::Fatal {
            drawing: drawing.to_string(),
            message: message.clone(),
        };
        self.events.push_back(EngineEvent::Fatal {
            drawing: drawing.to_string(),
            message,
        });
    }

    fn redraw_if_idle(&mut self) {
        if self.queue.is_empty() && self.in_flight.is_none() {
            self.request_redraw();
        }
    }

    fn request_redraw(&mut self) {
        if self.events.back() != Some(&EngineEvent::Redraw) {
            self.events.push_back(EngineEvent::Redraw);
        }
    }

    /// Remove an inserted drawing and everything below it.
    ///
    /// Queued requests for the removed drawings are dropped, an in-flight
    /// one is cancelled and their cache entries are purged. Returns the
    /// removed names.
    pub fn remove_drawing(&mut self, name: &str) -> Vec<String> {
        let removed = self.store.remove_drawing(name);
        for drawing in &removed {
            self.forget(drawing);
            self.cache.remove(drawing);
        }
        if !removed.is_empty() {
            tracing::info!("Removed drawing {name} and {} descendant(s)", removed.len() - 1);
        }
        removed
    }

    fn forget(&mut self, drawing: &str) {
        let dropped = self.queue.remove_for(drawing);
        if dropped > 0 {
            tracing::debug!("Dropped {dropped} queued request(s) for {drawing}");
        }
        if self.in_flight().is_some_and(|e| e.drawing_name() == drawing) {
            tracing::debug!("Cancelling in-flight request for {drawing}");
            self.in_flight = None;
        }
        self.buffered.retain(|held| held.entry.drawing_name() != drawing);
        self.previews.discard(drawing);
    }

    /// Replace the queue with a refresh of every known drawing, main first.
    pub fn refresh_all(&mut self) {
        if self.is_fatal() {
            return;
        }
        self.queue.clear();
        let names = self.store.names().to_vec();
        tracing::debug!("Refreshing {} drawing(s)", names.len());
        for name in names {
            let version = self.cache.version_of(&name);
            self.queue.enqueue(RequestEntry::update(name, version));
        }
    }

    /// Fire due timers.
    pub fn tick(&mut self, now: Instant) {
        if self.is_fatal() {
            return;
        }
        if self.refresh_at.is_some_and(|at| at <= now) {
            self.refresh_at = None;
            self.refresh_all();
            let refresh = self
                .store
                .main_name()
                .and_then(|main| self.store.get_drawing_data(main))
                .map_or(0, |data| data.refresh);
            self.refresh_at = (refresh > 0).then(|| now + Duration::from_millis(refresh));
        }
        for activation in self.gesture.poll(now) {
            self.activate(&activation);
        }
    }

    /// Handle pointer input.
    pub fn pointer(&mut self, event: PointerEvent, now: Instant) {
        if self.is_fatal() {
            return;
        }
        let PointerEvent { phase, x, y } = event;
        let outcome = match phase {
            PointerPhase::Down => {
                let (hit, _) = self.hit_at(x, y);
                self.gesture.down(x, y, hit, now)
            }
            PointerPhase::Move => {
                if !self.gesture.is_down() {
                    return;
                }
                let (hit, _) = self.hit_at(x, y);
                self.gesture.moved(x, y, hit)
            }
            PointerPhase::Up => self.gesture.up(x, y),
            PointerPhase::Leave => self.gesture.leave(),
            PointerPhase::Click => {
                let (hit, zones_exist) = self.hit_at(x, y);
                self.gesture.click(x, y, hit, zones_exist, now)
            }
        };
        self.run_gesture(outcome, now);
    }

    fn run_gesture(&mut self, outcome: GestureOutcome, now: Instant) {
        for activation in &outcome.activations {
            self.activate(activation);
        }
        if outcome.restore {
            self.restore_previews();
        }
        if outcome.drain {
            self.drain_buffered(now);
        }
        if outcome.refresh_all {
            tracing::debug!("Click with no zones defined, refreshing everything");
            self.refresh_all();
        }
    }

    /// Zone under (`x`, `y`) and whether any zone exists.
    fn hit_at(&mut self, x: f32, y: f32) -> (Option<ZoneHit>, bool) {
        let margin = self.touch_margin();
        let Some(composition) = self.composition() else {
            return (None, false);
        };
        let hit = find_zone_at(&composition, x, y, margin).and_then(|entry| {
            entry
                .item
                .as_touch_zone()
                .map(|zone| ZoneHit::new(zone.cmd.clone(), zone.filter))
        });
        (hit, !composition.touch_zones.is_empty())
    }

    /// Minimum touch margin, in main drawing units, for the configured
    /// viewport.
    #[must_use]
    pub fn touch_margin(&self) -> TouchMargin {
        let Some(data) = self
            .store
            .main_name()
            .and_then(|main| self.store.get_drawing_data(main))
        else {
            return TouchMargin::default();
        };
        let (width, _) = data.logical_size();
        let (view_w, view_h) = self.config.viewport;
        min_touch_margin(view_w, view_h, view_w / width)
    }

    fn activate(&mut self, activation: &Activation) {
        let Some(composition) = self.composition() else {
            return;
        };
        let Some(entry) = composition.touch_zones.get(&activation.cmd) else {
            tracing::debug!("Zone {} vanished before activation", activation.cmd);
            return;
        };
        let enabled = matches!(
            entry.item.as_touch_zone(),
            Some(zone) if !zone.cmd.is_empty() && !zone.filter.is_disabled()
        );
        if !enabled {
            return;
        }
        let (col, row) = touch_location(&entry.item, activation.x, activation.y);
        let drawing = entry.drawing.clone();
        tracing::debug!(
            "Zone {} in {drawing} activated ({:?}) at {col},{row}",
            activation.cmd,
            activation.touch_type
        );

        if let Some(d) = self.store.get(&drawing) {
            if let Some(input) = d.text_prompt(&activation.cmd) {
                let request = PromptRequest::new(d, input, col, row, activation.touch_type);
                self.events.push_back(EngineEvent::Prompt(request));
                return;
            }
        }

        if let Some(children) = self
            .previews
            .run(&mut self.store, &drawing, &activation.cmd, col, row)
        {
            self.queue_children(children);
            self.request_redraw();
        }
        if activation.send {
            self.send_touch(&drawing, &activation.cmd, col, row, activation.touch_type, None);
        }
    }

    fn send_touch(&mut self, drawing: &str, cmd: &str, col: u32, row: u32, touch_type: TouchFilter, text: Option<&str>) {
        let command = activation_command(&self.identifier, cmd, col, row, touch_type, text);
        let version = self.cache.version_of(drawing);
        let context = TouchContext {
            cmd: cmd.to_string(),
            filter: touch_type,
        };
        self.queue
            .enqueue(RequestEntry::touch(drawing, command, version, context));
    }

    fn restore_previews(&mut self) {
        if !self.previews.restore_all(&mut self.store).is_empty() {
            self.request_redraw();
        }
    }

    /// Apply held responses in arrival order.
    fn drain_buffered(&mut self, now: Instant) {
        let held = std::mem::take(&mut self.buffered);
        if held.is_empty() {
            return;
        }
        tracing::debug!("Applying {} held response(s) after release", held.len());
        for Buffered { entry, response } in held {
            self.previews.restore(&mut self.store, entry.drawing_name());
            self.apply(&entry, &response, now);
            if self.is_fatal() {
                return;
            }
        }
        self.request_redraw();
    }

    /// Send the text entered for `request`, then preview the zone's
    /// touch actions. Dropping a request instead sends nothing.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Stopped`] in the fatal state.
    pub fn submit_prompt(&mut self, request: &PromptRequest, text: &str) -> SyncResult<()> {
        self.ensure_running()?;
        self.send_touch(
            &request.drawing,
            &request.cmd,
            request.col,
            request.row,
            request.touch_type,
            Some(text),
        );
        if let Some(children) = self
            .previews
            .run(&mut self.store, &request.drawing, &request.cmd, request.col, request.row)
        {
            self.queue_children(children);
            self.request_redraw();
        }
        Ok(())
    }

    /// Main drawings synced before, for recovery after a cold start.
    #[must_use]
    pub fn known_main_drawings(&self) -> Vec<String> {
        self.cache.known_main_drawings()
    }
}
