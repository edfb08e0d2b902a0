//! Session controller
//!
//! This module provides the `SessionController` that manages:
//! - Connecting to the room and placing the agent in it
//! - Deriving the user-facing state from room events
//! - Audio playback elements and the local camera track
//! - The merged conversation log
//! - Debounce, join watchdog and duration timers

mod config;
mod controller;
mod snapshot;
mod state;

pub use config::{is_local_host, ResolvedEndpoints, SessionConfig};
pub use controller::{SessionController, JOIN_TIMEOUT_MESSAGE};
pub use snapshot::SessionSnapshot;
pub use state::{reduce, SessionState, StateEvent};
