//! Boundary to the pre-built real-time client
//!
//! The controller never talks to a transport directly. A `RoomProvider`
//! opens connections; a `RoomConnection` exposes the media and chat
//! capabilities of one joined room plus its ordered event stream.

pub mod events;
pub mod provider;

pub use events::{ChatEvent, ConnectionState, RoomEvent, TrackInfo, TrackKind, TranscriptionSegment};
pub use provider::{RoomConnection, RoomProvider, Subscription};
