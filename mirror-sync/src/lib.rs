//! # Mirror Sync
//!
//! Keeps a local mirror of a device's drawings current. Requests go
//! through a single ordered queue with retries, drags are coalesced and
//! touch actions are previewed before the device answers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  Command   ┌──────────────────────┐  FetchRequest  ┌───────────┐
//! │    Host      │ ─────────► │ Driver               │ ─────────────► │ Transport │
//! │ (input, UI)  │ ◄───────── │  └─ SyncEngine       │ ◄───────────── │  (HTTP)   │
//! └──────────────┘ DriverEvent│      ├─ RequestQueue │    Response    └───────────┘
//!                             │      ├─ Gesture      │
//!                             │      └─ Previews     │
//!                             └──────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod pointer;
pub mod preview;
pub mod queue;
pub mod transport;

pub use config::{SyncConfig, MAX_RETRIES};
pub use driver::{Command, Driver, DriverEvent, DriverHandle};
pub use engine::{Dispatch, EngineEvent, EngineState, SyncEngine};
pub use error::{SyncError, SyncResult, TransportError};
pub use pointer::{Activation, Gesture, GestureOutcome, PointerEvent, PointerPhase, ZoneHit};
pub use preview::PreviewBackups;
pub use queue::{FetchRequest, RequestEntry, RequestKind, RequestQueue, TouchContext, MAIN_MENU_CMD};
pub use transport::{HttpTransport, Transport, ENDPOINT_PATH};

/// Mirror sync version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
