//! Request queue with drag coalescing.
//!
//! A FIFO of pending fetches. Retries go back to the front so responses
//! keep their dispatch order. Enqueuing a drag drops any older drag for the
//! same command, which bounds traffic during continuous movement.

use std::collections::VecDeque;

use mirror_core::TouchFilter;
use serde::{Deserialize, Serialize};

/// Startup request asking the device for its main drawing.
pub const MAIN_MENU_CMD: &str = "{.}";

/// Why a request was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Startup menu request.
    MainMenu,
    /// First fetch of the main drawing.
    Main,
    /// Periodic or click-triggered refresh.
    Update,
    /// Touch zone activation.
    Touch,
    /// Fetch of a drawing discovered through an insert.
    InsertDrawing,
}

/// Zone that triggered a touch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchContext {
    /// Zone command.
    pub cmd: String,
    /// Pointer phase that was sent.
    pub filter: TouchFilter,
}

impl TouchContext {
    /// True for a drag of `cmd`.
    #[must_use]
    pub fn is_drag_of(&self, cmd: &str) -> bool {
        self.filter == TouchFilter::DRAG && self.cmd == cmd
    }
}

/// What a transport needs to issue a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Opaque command string.
    pub cmd: String,
    /// Cached version token, sent so the device may answer "unchanged".
    pub version: Option<String>,
}

/// One pending fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEntry {
    /// Target drawing. `None` only for the startup menu request.
    pub drawing: Option<String>,
    /// Command string.
    pub cmd: String,
    /// Version token to send.
    pub version: Option<String>,
    /// Failed attempts so far.
    pub retry_count: u32,
    /// Zone context for touch requests.
    pub touch: Option<TouchContext>,
    /// Request kind.
    pub kind: RequestKind,
}

impl RequestEntry {
    /// The startup menu request.
    #[must_use]
    pub fn main_menu() -> Self {
        Self {
            drawing: None,
            cmd: MAIN_MENU_CMD.to_string(),
            version: None,
            retry_count: 0,
            touch: None,
            kind: RequestKind::MainMenu,
        }
    }

    /// A plain `{name}` fetch, optionally versioned.
    #[must_use]
    pub fn fetch(kind: RequestKind, drawing: impl Into<String>, version: Option<String>) -> Self {
        let drawing = drawing.into();
        Self {
            cmd: format!("{{{drawing}}}"),
            drawing: Some(drawing),
            version,
            retry_count: 0,
            touch: None,
            kind,
        }
    }

    /// A refresh of `drawing`. With a cached version the command becomes
    /// `{version:name}` so the device can send only what changed.
    #[must_use]
    pub fn update(drawing: impl Into<String>, version: Option<String>) -> Self {
        Self::versioned(RequestKind::Update, drawing, version)
    }

    /// A `{version:name}` fetch of the given kind, or `{name}` without a
    /// version.
    #[must_use]
    pub fn versioned(kind: RequestKind, drawing: impl Into<String>, version: Option<String>) -> Self {
        let drawing = drawing.into();
        let cmd = match &version {
            Some(version) => format!("{{{version}:{drawing}}}"),
            None => format!("{{{drawing}}}"),
        };
        Self {
            drawing: Some(drawing),
            cmd,
            version,
            retry_count: 0,
            touch: None,
            kind,
        }
    }

    /// A touch activation sending `cmd` for the zone in `context`.
    #[must_use]
    pub fn touch(
        drawing: impl Into<String>,
        cmd: impl Into<String>,
        version: Option<String>,
        context: TouchContext,
    ) -> Self {
        Self {
            drawing: Some(drawing.into()),
            cmd: cmd.into(),
            version,
            retry_count: 0,
            touch: Some(context),
            kind: RequestKind::Touch,
        }
    }

    /// Target drawing name, "" for the menu request.
    #[must_use]
    pub fn drawing_name(&self) -> &str {
        self.drawing.as_deref().unwrap_or_default()
    }

    /// Zone command if this is a drag.
    #[must_use]
    pub fn drag_cmd(&self) -> Option<&str> {
        self.touch
            .as_ref()
            .filter(|touch| touch.filter == TouchFilter::DRAG)
            .map(|touch| touch.cmd.as_str())
    }

    /// Transport view of this entry.
    #[must_use]
    pub fn fetch_request(&self) -> FetchRequest {
        FetchRequest {
            cmd: self.cmd.clone(),
            version: self.version.clone(),
        }
    }
}

/// FIFO of pending requests.
#[derive(Debug, Clone, Default)]
pub struct RequestQueue {
    entries: VecDeque<RequestEntry>,
}

impl RequestQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `entry` to the tail. A drag first removes every queued drag for
    /// the same command. Returns how many entries were coalesced away.
    pub fn enqueue(&mut self, entry: RequestEntry) -> usize {
        let mut removed = 0;
        if let Some(cmd) = entry.drag_cmd() {
            let before = self.entries.len();
            self.entries
                .retain(|queued| !queued.touch.as_ref().is_some_and(|t| t.is_drag_of(cmd)));
            removed = before - self.entries.len();
            if removed > 0 {
                tracing::debug!("Coalesced {removed} queued drag request(s) for {cmd}");
            }
        }
        tracing::debug!("Queued {:?} request {} for {:?}", entry.kind, entry.cmd, entry.drawing);
        self.entries.push_back(entry);
        removed
    }

    /// Put a request back at the head for a retry.
    pub fn requeue_front(&mut self, entry: RequestEntry) {
        self.entries.push_front(entry);
    }

    /// Take the head.
    pub fn pop_front(&mut self) -> Option<RequestEntry> {
        self.entries.pop_front()
    }

    /// Head without removing it.
    #[must_use]
    pub fn front(&self) -> Option<&RequestEntry> {
        self.entries.front()
    }

    /// Drop every request for `drawing`. Returns how many were removed.
    pub fn remove_for(&mut self, drawing: &str) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|entry| entry.drawing.as_deref() != Some(drawing));
        before - self.entries.len()
    }

    /// True if any request targets `drawing`.
    #[must_use]
    pub fn contains_drawing(&self, drawing: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.drawing.as_deref() == Some(drawing))
    }

    /// True if a drag for `cmd` is waiting. A response to an older drag of
    /// the same command is stale.
    #[must_use]
    pub fn has_drag_for(&self, cmd: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.touch.as_ref().is_some_and(|t| t.is_drag_of(cmd)))
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of pending requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pending requests, head first.
    pub fn iter(&self) -> impl Iterator<Item = &RequestEntry> {
        self.entries.iter()
    }
}
