//! # Mirror Core
//!
//! Drawing store, composition and hit testing for mirrored remote drawings.
//! Pure data and algorithms; the sync engine lives in `mirror-sync`.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 mirror-core                 │
//! ├─────────────────────────────────────────────┤
//! │  Drawing Store   │  Apply Pipeline          │
//! │  - Drawings      │  - start / update        │
//! │  - Items, zones  │  - push/pop, hide, erase │
//! │  - Tree edges    │  - child discovery       │
//! ├─────────────────────────────────────────────┤
//! │  Composition     │  Hit Testing             │
//! │  - Nested scale  │  - Zone bounds, margin   │
//! │  - Merged zones  │  - Precedence rules      │
//! ├─────────────────────────────────────────────┤
//! │  Touch helpers   │  Version Cache           │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod apply;
pub mod cache;
pub mod compose;
pub mod document;
pub mod drawing;
pub mod error;
pub mod hit;
pub mod item;
pub mod store;
pub mod text;
pub mod touch;

pub use apply::{apply_response, apply_update_items, ApplyContext, ApplyOutcome};
pub use cache::{CachedDrawing, DirCache, MemoryCache, VersionCache, MAIN_DRAWING_PREFIX};
pub use compose::{compose, Composition, ZoneEntry};
pub use document::{DeviceErrorKind, DrawingData, DrawingDocument, DrawingPatch, Response};
pub use drawing::{Drawing, DrawingState};
pub use error::{MirrorError, MirrorResult};
pub use hit::{find_zone_at, min_touch_margin, touch_location, TouchMargin, ZoneBounds};
pub use item::{
    Align, ClipRegion, InsertDrawing, Item, ItemKind, TouchActionInput, TouchFilter, TouchZone,
    Transform,
};
pub use store::{DrawingStore, ItemSnapshot};
pub use text::format_decimals;
pub use touch::{activation_command, substitute_sentinels, PromptRequest, TOUCHED_COL, TOUCHED_ROW};

/// Mirror core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
