pub mod config;
pub mod error;
pub mod identity;
pub mod media;
pub mod room;
pub mod session;
pub mod timers;
pub mod token;
pub mod transcript;

pub use config::Config;
pub use error::{ConfigError, MediaError, RoomError, SessionError, TokenError};
pub use identity::{FileStore, KeyValueStore, MemoryStore};
pub use media::{LocalVideoTrack, MediaResources, PlaybackElement, PlaybackSettings};
pub use room::{
    ChatEvent, ConnectionState, RoomConnection, RoomEvent, RoomProvider, Subscription, TrackInfo,
    TrackKind, TranscriptionSegment,
};
pub use session::{SessionConfig, SessionController, SessionSnapshot, SessionState};
pub use timers::{Scheduler, TimerName};
pub use token::{TokenClient, TokenService};
pub use transcript::{ChatMessage, MessageSource, Role, TranscriptAggregator};
