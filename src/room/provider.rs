use super::events::{RoomEvent, TrackInfo};
use crate::error::{MediaError, RoomError};
use crate::media::{LocalVideoTrack, PlaybackElement};
use tokio::sync::mpsc;

/// Opens room connections
///
/// Implementations wrap a real-time client SDK; tests use an in-memory fake.
#[async_trait::async_trait]
pub trait RoomProvider: Send + Sync {
    /// Join the room at `url` with `token`
    async fn connect(&self, url: &str, token: &str) -> Result<Box<dyn RoomConnection>, RoomError>;
}

/// One joined room
#[async_trait::async_trait]
pub trait RoomConnection: Send + Sync {
    /// Identity of the local participant
    fn local_identity(&self) -> String;

    /// Identities of the remote participants currently in the room
    fn remote_participants(&self) -> Vec<String>;

    /// Register for room events
    ///
    /// Events are delivered in provider order. Dropping the returned
    /// subscription unregisters it.
    fn subscribe(&self) -> Subscription;

    /// Create a playback element for a subscribed remote audio track
    fn attach_audio(&self, track: &TrackInfo) -> Result<Box<dyn PlaybackElement>, MediaError>;

    async fn set_microphone_enabled(&self, enabled: bool) -> Result<(), MediaError>;

    /// Publish the local camera
    async fn publish_camera(&self) -> Result<Box<dyn LocalVideoTrack>, MediaError>;

    async fn unpublish_camera(&self) -> Result<(), MediaError>;

    /// Send a chat message; returns the id the provider assigned to it
    async fn send_chat(&self, text: &str) -> Result<String, RoomError>;

    /// Leave the room
    async fn disconnect(&self);
}

/// Capability handle for one event registration
///
/// The release hook runs exactly once, on `release()` or on drop.
pub struct Subscription {
    events: mpsc::UnboundedReceiver<RoomEvent>,
    on_release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        events: mpsc::UnboundedReceiver<RoomEvent>,
        on_release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            events,
            on_release: Some(Box::new(on_release)),
        }
    }

    /// Next event, or `None` once the provider closed the stream
    pub async fn recv(&mut self) -> Option<RoomEvent> {
        self.events.recv().await
    }

    pub fn release(mut self) {
        self.run_release();
    }

    fn run_release(&mut self) {
        self.events.close();
        if let Some(hook) = self.on_release.take() {
            hook();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_release();
    }
}
