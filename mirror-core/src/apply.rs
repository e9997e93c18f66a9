//! Applying decoded `start` and `update` responses to the store.
//!
//! Items are processed in document order against a working transform that
//! `push_zero` and `pop_zero` move. Control items are consumed here and
//! never stored.

use crate::document::{normalize_version, DrawingData, DrawingDocument, DrawingPatch, Response};
use crate::error::{MirrorError, MirrorResult};
use crate::item::{normalize_degrees, Item, ItemKind, TouchFilter, Transform};
use crate::store::DrawingStore;

/// Where a response came from.
#[derive(Debug, Clone, Default)]
pub struct ApplyContext {
    /// Drawing the request was made for. Used when the document has no name.
    pub drawing: String,
    /// The request was triggered by a touch.
    pub touch: bool,
    /// Last full document from the version cache, used when an update
    /// arrives for a drawing with no stored data.
    pub cached: Option<DrawingData>,
}

impl ApplyContext {
    /// Context for a plain fetch of `drawing`.
    #[must_use]
    pub fn new(drawing: impl Into<String>) -> Self {
        Self {
            drawing: drawing.into(),
            ..Self::default()
        }
    }

    /// Mark the response as answering a touch request.
    #[must_use]
    pub fn with_touch(mut self, touch: bool) -> Self {
        self.touch = touch;
        self
    }

    /// Provide the cached full document.
    #[must_use]
    pub fn with_cached(mut self, cached: Option<DrawingData>) -> Self {
        self.cached = cached;
        self
    }
}

/// What applying a response changed beyond the drawing itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Drawing the response was applied to.
    pub drawing: String,
    /// Child drawings that need fetching, in discovery order.
    pub fetch: Vec<String>,
    /// Drawings removed because a `start` replaced their parent.
    pub removed: Vec<String>,
    /// The store was reset to a new main drawing.
    pub replaced_main: bool,
}

/// Apply a `start` or `update` response.
///
/// # Errors
///
/// Returns [`MirrorError::MalformedResponse`] for responses that are neither
/// `start` nor `update`, and for an `update` of a drawing that has no stored
/// or cached data.
pub fn apply_response(
    store: &mut DrawingStore,
    response: &Response,
    context: &ApplyContext,
) -> MirrorResult<ApplyOutcome> {
    match response {
        Response::Start(doc) => Ok(apply_start(store, resolve_name(doc, context), doc, context)),
        Response::Update(doc) => apply_update(store, resolve_name(doc, context), doc, context),
        other => Err(MirrorError::malformed(
            &context.drawing,
            format!("expected start or update, got {}", response_kind(other)),
        )),
    }
}

fn resolve_name<'a>(doc: &'a DrawingDocument, context: &'a ApplyContext) -> &'a str {
    if doc.name.trim().is_empty() {
        &context.drawing
    } else {
        &doc.name
    }
}

const fn response_kind(response: &Response) -> &'static str {
    match response {
        Response::Menu { .. } => "menu",
        Response::Start(_) => "start",
        Response::Update(_) => "update",
        Response::Empty => "empty",
        Response::Error { .. } => "error",
    }
}

fn apply_start(
    store: &mut DrawingStore,
    name: &str,
    doc: &DrawingDocument,
    context: &ApplyContext,
) -> ApplyOutcome {
    let mut outcome = ApplyOutcome {
        drawing: name.to_string(),
        ..ApplyOutcome::default()
    };

    if context.touch && !store.contains(name) {
        tracing::info!("Touch response switched main drawing to {name}");
        outcome.removed = store
            .names()
            .iter()
            .filter(|n| n.as_str() != name)
            .cloned()
            .collect();
        store.reset(name);
        outcome.replaced_main = true;
    } else {
        outcome.removed = store.remove_children(name);
    }

    store.clear_items(name);
    store.set_full_data(name, DrawingData::from_document(name, doc));
    let transform = apply_items(store, name, &doc.items, Transform::IDENTITY);
    store.set_saved_transform(name, transform);
    outcome.fetch = children_to_fetch(store, name);
    tracing::debug!(
        "Applied start for {name}: {} items, {} children to fetch",
        doc.items.len(),
        outcome.fetch.len()
    );
    outcome
}

fn apply_update(
    store: &mut DrawingStore,
    name: &str,
    doc: &DrawingDocument,
    context: &ApplyContext,
) -> MirrorResult<ApplyOutcome> {
    let mut outcome = ApplyOutcome {
        drawing: name.to_string(),
        ..ApplyOutcome::default()
    };

    if store.get_drawing_data(name).is_none() {
        let Some(cached) = &context.cached else {
            return Err(MirrorError::malformed(
                name,
                "update received before any start and nothing is cached",
            ));
        };
        tracing::info!("Rebuilding {name} from cached document before update");
        let base = DrawingDocument {
            name: name.to_string(),
            width: Some(i64::from(cached.width)),
            height: Some(i64::from(cached.height)),
            color: Some(i64::from(cached.color)),
            refresh: Some(cached.refresh),
            version: Some(cached.version.clone()),
            items: cached.items.clone(),
        };
        outcome.removed = apply_start(store, name, &base, &ApplyContext::new(name)).removed;
    }

    let patch = DrawingPatch {
        refresh: doc.refresh,
        version: doc.version.as_deref().map(|v| normalize_version(Some(v))),
        ..DrawingPatch::default()
    };
    store.apply_partial(name, &patch);

    let start = store.saved_transform(name);
    let transform = apply_items(store, name, &doc.items, start);
    store.set_saved_transform(name, transform);
    outcome.fetch = children_to_fetch(store, name);
    tracing::debug!("Applied update for {name}: {} items", doc.items.len());
    Ok(outcome)
}

/// Apply `items` to `name` as an update would, from its saved transform.
///
/// Used by the touch-action preview. Returns the children that need
/// fetching.
pub fn apply_update_items(store: &mut DrawingStore, name: &str, items: &[Item]) -> Vec<String> {
    let start = store.saved_transform(name);
    let transform = apply_items(store, name, items, start);
    store.set_saved_transform(name, transform);
    children_to_fetch(store, name)
}

fn apply_items(store: &mut DrawingStore, name: &str, items: &[Item], start: Transform) -> Transform {
    let main = store.main_name().map(str::to_string);
    let mut current = start;
    let mut stack: Vec<Transform> = Vec::new();

    for source in items {
        let mut item = source.clone();
        item.transform = Some(current);

        match &mut item.kind {
            ItemKind::PushZero { x, y, scale } => {
                stack.push(current);
                current = current.push_zero(*x, *y, *scale);
            }
            ItemKind::PopZero => {
                current = stack.pop().unwrap_or(Transform::IDENTITY);
            }
            ItemKind::Hide { cmd } | ItemKind::Unhide { cmd } => {
                let cmd = cmd.clone();
                let visible = matches!(item.kind, ItemKind::Unhide { .. });
                set_visibility(store, name, item.valid_index(), cmd.as_deref(), visible);
            }
            ItemKind::Erase { cmd } => {
                let cmd = cmd.clone();
                erase(store, name, item.valid_index(), cmd.as_deref());
            }
            ItemKind::InsertDrawing(insert) => {
                let target = insert.drawing_name.clone();
                if target == name || main.as_deref() == Some(target.as_str()) {
                    tracing::warn!("Drawing {name} cannot insert {target}: it would form a cycle");
                    continue;
                }
                item.index = None;
                store.add_item(name, item);
            }
            ItemKind::TouchZone(zone) => {
                if zone.cmd.trim().is_empty() {
                    tracing::warn!("Skipping touch zone with empty cmd in {name}");
                    continue;
                }
                let has_prompt = store
                    .get(name)
                    .and_then(|d| d.text_prompt(&zone.cmd))
                    .is_some();
                if has_prompt && !zone.filter.is_touch() && !zone.filter.is_disabled() {
                    zone.filter = TouchFilter::TOUCH;
                }
                store.upsert_touch_zone(name, item);
            }
            ItemKind::TouchAction { cmd, actions } => {
                let cmd = cmd.clone();
                store.append_touch_action(name, &cmd, actions);
            }
            ItemKind::TouchActionInput(input) => {
                let input = input.clone();
                store.set_text_prompt(name, input);
            }
            ItemKind::IndexMarker => {
                if item.valid_index().is_none() {
                    tracing::warn!("Ignoring index marker without a valid idx in {name}");
                    continue;
                }
                store.add_item(name, item);
            }
            ItemKind::Arc { start, angle, .. } => {
                *start = normalize_degrees(*start);
                *angle = normalize_degrees(*angle);
                store.add_item(name, item);
            }
            _ => store.add_item(name, item),
        }
    }

    current
}

fn set_visibility(store: &mut DrawingStore, name: &str, idx: Option<u32>, cmd: Option<&str>, visible: bool) {
    match (idx, cmd.filter(|c| !c.trim().is_empty())) {
        (Some(idx), _) => {
            store.set_indexed_visible(name, idx, visible);
        }
        (None, Some(cmd)) => {
            if !store.set_zone_visible(name, cmd, visible) {
                tracing::warn!("No touch zone {cmd} in {name} to show or hide");
            }
        }
        (None, None) => tracing::warn!("Hide/unhide in {name} needs an idx or a cmd"),
    }
}

fn erase(store: &mut DrawingStore, name: &str, idx: Option<u32>, cmd: Option<&str>) {
    match (idx, cmd.filter(|c| !c.trim().is_empty())) {
        (Some(idx), _) => {
            store.erase_indexed(name, idx);
        }
        (None, Some(cmd)) => {
            if !store.erase_by_cmd(name, cmd) {
                tracing::warn!("Erase: nothing registered for cmd {cmd} in {name}");
            }
        }
        (None, None) => tracing::warn!("Erase in {name} needs an idx or a cmd"),
    }
}

/// Register new InsertDrawing targets and report the ones without data.
fn children_to_fetch(store: &mut DrawingStore, name: &str) -> Vec<String> {
    let targets = store
        .get(name)
        .map(crate::drawing::Drawing::inserted_drawings)
        .unwrap_or_default();
    let mut fetch = Vec::new();
    for target in targets {
        if store.contains(&target) {
            if store.get_drawing_data(&target).is_none() {
                fetch.push(target);
            }
        } else {
            tracing::debug!("Discovered child drawing {target} in {name}");
            store.set_parent(&target, name);
            fetch.push(target);
        }
    }
    fetch
}
