//! Pointer gesture tracking.
//!
//! Turns down/move/up/leave/click input into zone activations according to
//! each zone's filter. Hit testing is done by the caller, which passes the
//! zone under the pointer as a [`ZoneHit`].

use std::collections::HashSet;
use std::time::{Duration, Instant};

use mirror_core::TouchFilter;
use serde::{Deserialize, Serialize};

/// Pointer input phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerPhase {
    /// Contact started.
    Down,
    /// Pointer moved while in contact.
    Move,
    /// Contact ended.
    Up,
    /// Pointer left the canvas.
    Leave,
    /// Down and up without a drag.
    Click,
}

/// One pointer event in logical drawing coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    /// Phase.
    pub phase: PointerPhase,
    /// Logical x.
    pub x: f32,
    /// Logical y.
    pub y: f32,
}

impl PointerEvent {
    /// Create an event.
    #[must_use]
    pub const fn new(phase: PointerPhase, x: f32, y: f32) -> Self {
        Self { phase, x, y }
    }
}

/// Zone under the pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneHit {
    /// Zone command.
    pub cmd: String,
    /// Zone filter.
    pub filter: TouchFilter,
}

impl ZoneHit {
    /// Create a hit.
    #[must_use]
    pub fn new(cmd: impl Into<String>, filter: TouchFilter) -> Self {
        Self {
            cmd: cmd.into(),
            filter,
        }
    }
}

/// A zone activation to carry out.
#[derive(Debug, Clone, PartialEq)]
pub struct Activation {
    /// Zone command.
    pub cmd: String,
    /// Phase reported to the device.
    pub touch_type: TouchFilter,
    /// Logical x of the activation.
    pub x: f32,
    /// Logical y of the activation.
    pub y: f32,
    /// Send a request, or only preview.
    pub send: bool,
}

impl Activation {
    fn new(hit: &ZoneHit, touch_type: TouchFilter, x: f32, y: f32, send: bool) -> Self {
        Self {
            cmd: hit.cmd.clone(),
            touch_type,
            x,
            y,
            send,
        }
    }
}

/// What a gesture step asks the engine to do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GestureOutcome {
    /// Activations, in order.
    pub activations: Vec<Activation>,
    /// Drop every touch-action preview.
    pub restore: bool,
    /// Apply responses held while the pointer was down.
    pub drain: bool,
    /// Queue a refresh of every drawing.
    pub refresh_all: bool,
}

impl GestureOutcome {
    fn activations(activations: Vec<Activation>) -> Self {
        Self {
            activations,
            ..Self::default()
        }
    }

    fn settle() -> Self {
        Self {
            restore: true,
            drain: true,
            ..Self::default()
        }
    }
}

/// State of the current gesture.
#[derive(Debug, Clone)]
pub struct Gesture {
    long_press_after: Duration,
    click_delay: Duration,
    down: bool,
    start: (f32, f32),
    last: (f32, f32),
    started_at: Option<Instant>,
    dragged: bool,
    target: Option<ZoneHit>,
    entered: HashSet<String>,
    long_press: Option<(Instant, ZoneHit)>,
    pending_click: Option<(Instant, Activation)>,
}

impl Default for Gesture {
    fn default() -> Self {
        Self::new(Duration::from_millis(700), Duration::from_millis(100))
    }
}

impl Gesture {
    /// Create an idle gesture. A hold of `long_press` makes a long press;
    /// a click is sent `click_delay` after its preview.
    #[must_use]
    pub fn new(long_press: Duration, click_delay: Duration) -> Self {
        Self {
            long_press_after: long_press,
            click_delay,
            down: false,
            start: (0.0, 0.0),
            last: (0.0, 0.0),
            started_at: None,
            dragged: false,
            target: None,
            entered: HashSet::new(),
            long_press: None,
            pending_click: None,
        }
    }

    /// True while the pointer is held down.
    #[must_use]
    pub const fn is_down(&self) -> bool {
        self.down
    }

    /// Zone the gesture is over.
    #[must_use]
    pub fn target(&self) -> Option<&ZoneHit> {
        self.target.as_ref()
    }

    /// Earliest pending timer.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        let press = self.long_press.as_ref().map(|(at, _)| *at);
        let click = self.pending_click.as_ref().map(|(at, _)| *at);
        match (press, click) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Contact started at (`x`, `y`) over `hit`.
    pub fn down(&mut self, x: f32, y: f32, hit: Option<ZoneHit>, now: Instant) -> GestureOutcome {
        self.down = true;
        self.start = (x, y);
        self.last = (x, y);
        self.started_at = Some(now);
        self.dragged = false;
        self.entered.clear();
        self.long_press = None;
        self.target = hit.clone();

        let Some(hit) = hit else {
            return GestureOutcome::default();
        };

        let mut activations = Vec::new();
        if hit.filter.is_touch() {
            activations.push(Activation::new(&hit, TouchFilter::TOUCH, x, y, true));
        }
        if hit.filter.contains(TouchFilter::DOWN) {
            activations.push(Activation::new(&hit, TouchFilter::DOWN, x, y, true));
        }
        if hit.filter.contains(TouchFilter::DOWN_UP) {
            activations.push(Activation::new(&hit, TouchFilter::DOWN, x, y, false));
        }
        if hit.filter.contains(TouchFilter::PRESS) {
            self.long_press = Some((now + self.long_press_after, hit));
        }
        GestureOutcome::activations(activations)
    }

    /// Pointer moved to (`x`, `y`) over `hit`.
    pub fn moved(&mut self, x: f32, y: f32, hit: Option<ZoneHit>) -> GestureOutcome {
        if !self.down {
            return GestureOutcome::default();
        }
        self.last = (x, y);
        let (dx, dy) = (x - self.start.0, y - self.start.1);
        if dx.hypot(dy) <= 0.0 {
            return GestureOutcome::default();
        }
        self.dragged = true;

        let mut activations = Vec::new();
        let previous = self.target.clone();
        let changed = previous.as_ref().map(|z| &z.cmd) != hit.as_ref().map(|z| &z.cmd);
        if changed {
            if let Some(prev) = previous.as_ref().filter(|z| z.filter.contains(TouchFilter::EXIT)) {
                activations.push(Activation::new(prev, TouchFilter::EXIT, x, y, false));
            }
            if let Some(current) = hit.as_ref().filter(|z| z.filter.contains(TouchFilter::ENTRY)) {
                if self.entered.insert(current.cmd.clone()) {
                    activations.push(Activation::new(current, TouchFilter::ENTRY, x, y, false));
                }
            }
            self.target = hit.clone();
        }

        if let Some(current) = &hit {
            if current.filter.contains(TouchFilter::DRAG) {
                activations.push(Activation::new(current, TouchFilter::DRAG, x, y, true));
            }
            if current.filter.contains(TouchFilter::DOWN_UP) {
                activations.push(Activation::new(current, TouchFilter::DRAG, x, y, false));
            }
            return GestureOutcome::activations(activations);
        }

        if previous.is_some() {
            tracing::debug!("Pointer left every zone, ending gesture");
            self.reset();
            return GestureOutcome {
                activations,
                restore: true,
                drain: true,
                refresh_all: false,
            };
        }
        GestureOutcome::activations(activations)
    }

    /// Contact ended at (`x`, `y`).
    pub fn up(&mut self, x: f32, y: f32) -> GestureOutcome {
        if !self.down {
            return GestureOutcome::default();
        }
        self.long_press = None;

        let mut outcome = GestureOutcome::settle();
        if let Some(target) = &self.target {
            if target.filter.contains(TouchFilter::UP) {
                outcome
                    .activations
                    .push(Activation::new(target, TouchFilter::UP, x, y, true));
            }
            if target.filter.contains(TouchFilter::DOWN_UP) {
                outcome
                    .activations
                    .push(Activation::new(target, TouchFilter::DOWN_UP, x, y, true));
            }
            // A click zone keeps its preview until the click is sent.
            if target.filter.contains(TouchFilter::CLICK) {
                outcome.restore = false;
            }
        }
        self.reset();
        outcome
    }

    /// Pointer left the canvas.
    pub fn leave(&mut self) -> GestureOutcome {
        if !self.down {
            return GestureOutcome::default();
        }
        self.reset();
        GestureOutcome::settle()
    }

    /// Click at (`x`, `y`) over `hit`. `zones_exist` is false when the
    /// composition has no zones at all.
    pub fn click(&mut self, x: f32, y: f32, hit: Option<ZoneHit>, zones_exist: bool, now: Instant) -> GestureOutcome {
        let held = self
            .started_at
            .map_or(Duration::ZERO, |started| now.saturating_duration_since(started));
        if held >= self.long_press_after {
            tracing::debug!("Ignoring click after a {}ms hold", held.as_millis());
            self.dragged = false;
            return GestureOutcome::default();
        }

        let mut outcome = GestureOutcome::settle();
        if !self.dragged {
            match &hit {
                Some(zone) if zone.filter.contains(TouchFilter::CLICK) => {
                    let send = Activation::new(zone, TouchFilter::CLICK, self.last.0, self.last.1, true);
                    self.pending_click = Some((now + self.click_delay, send));
                    return GestureOutcome {
                        activations: vec![Activation::new(zone, TouchFilter::CLICK, x, y, false)],
                        drain: true,
                        ..GestureOutcome::default()
                    };
                }
                Some(_) => {}
                None if !zones_exist => outcome.refresh_all = true,
                None => tracing::debug!("Click outside every zone ignored"),
            }
        }
        self.dragged = false;
        outcome
    }

    /// Fire due timers.
    pub fn poll(&mut self, now: Instant) -> Vec<Activation> {
        let mut activations = Vec::new();
        if self.long_press.as_ref().is_some_and(|(at, _)| *at <= now) {
            if let Some((_, zone)) = self.long_press.take() {
                if self.down && self.target.as_ref().map(|t| &t.cmd) == Some(&zone.cmd) {
                    activations.push(Activation::new(&zone, TouchFilter::PRESS, self.last.0, self.last.1, true));
                }
            }
        }
        if self.pending_click.as_ref().is_some_and(|(at, _)| *at <= now) {
            if let Some((_, click)) = self.pending_click.take() {
                activations.push(click);
            }
        }
        activations
    }

    fn reset(&mut self) {
        self.down = false;
        self.target = None;
        self.entered.clear();
        self.long_press = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRESS: Duration = Duration::from_millis(700);
    const CLICK: Duration = Duration::from_millis(100);

    fn hit(cmd: &str, filter: TouchFilter) -> Option<ZoneHit> {
        Some(ZoneHit::new(cmd, filter))
    }

    fn phases(outcome: &GestureOutcome) -> Vec<(u16, bool)> {
        outcome
            .activations
            .iter()
            .map(|a| (a.touch_type.bits(), a.send))
            .collect()
    }

    #[test]
    fn test_touch_sends_on_down() {
        let mut gesture = Gesture::new(PRESS, CLICK);
        let outcome = gesture.down(1.0, 1.0, hit("b", TouchFilter::TOUCH), Instant::now());
        assert_eq!(phases(&outcome), vec![(0, true)]);
        assert!(gesture.is_down());
    }

    #[test]
    fn test_down_up_previews_then_sends_on_up() {
        let mut gesture = Gesture::new(PRESS, CLICK);
        let now = Instant::now();
        let down = gesture.down(1.0, 1.0, hit("b", TouchFilter::DOWN_UP), now);
        assert_eq!(phases(&down), vec![(1, false)]);

        let up = gesture.up(1.0, 1.0);
        assert_eq!(phases(&up), vec![(256, true)]);
        assert!(up.restore && up.drain);
        assert!(!gesture.is_down());
    }

    #[test]
    fn test_drag_and_entry_once() {
        let mut gesture = Gesture::new(PRESS, CLICK);
        let filter = TouchFilter::DRAG | TouchFilter::ENTRY;
        gesture.down(0.0, 0.0, None, Instant::now());

        let first = gesture.moved(1.0, 0.0, hit("s", filter));
        assert_eq!(phases(&first), vec![(32, false), (2, true)]);

        let second = gesture.moved(2.0, 0.0, hit("s", filter));
        assert_eq!(phases(&second), vec![(2, true)]);
    }

    #[test]
    fn test_leaving_every_zone_settles() {
        let mut gesture = Gesture::new(PRESS, CLICK);
        gesture.down(0.0, 0.0, hit("s", TouchFilter::DRAG), Instant::now());
        let outcome = gesture.moved(50.0, 50.0, None);
        assert!(outcome.restore && outcome.drain);
        assert!(!gesture.is_down());
    }

    #[test]
    fn test_exit_only_previews() {
        let mut gesture = Gesture::new(PRESS, CLICK);
        gesture.down(0.0, 0.0, hit("a", TouchFilter::EXIT), Instant::now());
        let outcome = gesture.moved(5.0, 0.0, hit("b", TouchFilter::DOWN));
        assert_eq!(phases(&outcome), vec![(64, false)]);
    }

    #[test]
    fn test_long_press_fires_once_while_held() {
        let mut gesture = Gesture::new(PRESS, CLICK);
        let now = Instant::now();
        gesture.down(0.0, 0.0, hit("p", TouchFilter::PRESS), now);
        assert!(gesture.poll(now + Duration::from_millis(100)).is_empty());
        assert_eq!(gesture.next_deadline(), Some(now + PRESS));

        let fired = gesture.poll(now + PRESS);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].touch_type, TouchFilter::PRESS);
        assert!(gesture.poll(now + PRESS * 2).is_empty());
    }

    #[test]
    fn test_up_cancels_long_press() {
        let mut gesture = Gesture::new(PRESS, CLICK);
        let now = Instant::now();
        gesture.down(0.0, 0.0, hit("p", TouchFilter::PRESS), now);
        gesture.up(0.0, 0.0);
        assert!(gesture.poll(now + PRESS).is_empty());
    }

    #[test]
    fn test_click_previews_then_sends_after_delay() {
        let mut gesture = Gesture::new(PRESS, CLICK);
        let now = Instant::now();
        let zone = hit("c", TouchFilter::CLICK);
        gesture.down(2.0, 3.0, zone.clone(), now);
        let up = gesture.up(2.0, 3.0);
        assert!(!up.restore);
        assert!(up.drain, "release always applies held responses");

        let click = gesture.click(2.0, 3.0, zone, true, now);
        assert_eq!(phases(&click), vec![(8, false)]);
        assert!(gesture.poll(now).is_empty());

        let sent = gesture.poll(now + CLICK);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].send);
        assert!((sent[0].x - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_long_hold_click_is_ignored() {
        let mut gesture = Gesture::new(PRESS, CLICK);
        let now = Instant::now();
        gesture.down(0.0, 0.0, hit("c", TouchFilter::CLICK), now);
        gesture.up(0.0, 0.0);
        let click = gesture.click(0.0, 0.0, hit("c", TouchFilter::CLICK), true, now + PRESS);
        assert_eq!(click, GestureOutcome::default());
    }

    #[test]
    fn test_click_without_any_zones_refreshes() {
        let mut gesture = Gesture::new(PRESS, CLICK);
        let now = Instant::now();
        gesture.down(0.0, 0.0, None, now);
        gesture.up(0.0, 0.0);
        let outcome = gesture.click(0.0, 0.0, None, false, now);
        assert!(outcome.refresh_all);

        gesture.down(0.0, 0.0, None, now);
        gesture.up(0.0, 0.0);
        let outcome = gesture.click(0.0, 0.0, None, true, now);
        assert!(!outcome.refresh_all);
    }

    #[test]
    fn test_leave_when_idle_does_nothing() {
        let mut gesture = Gesture::new(PRESS, CLICK);
        assert_eq!(gesture.leave(), GestureOutcome::default());
    }
}
