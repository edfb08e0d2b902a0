//! Media resources owned by a session
//!
//! Audio playback elements (one per remote audio track) and the local
//! camera track are acquired and released only through `MediaResources`.

mod resources;

pub use resources::{AudioAttach, LocalVideoTrack, MediaResources, PlaybackElement, PlaybackSettings};
