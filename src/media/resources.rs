use crate::error::MediaError;
use crate::room::{RoomConnection, TrackInfo};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// How playback elements are configured when created
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSettings {
    pub autoplay: bool,
    pub muted: bool,
    /// 0.0 to 1.0
    pub volume: f32,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            autoplay: true,
            muted: false,
            volume: 1.0,
        }
    }
}

/// Host-side element playing one remote audio track
#[async_trait::async_trait]
pub trait PlaybackElement: Send + Sync {
    fn configure(&mut self, settings: &PlaybackSettings);

    /// Start playback; `MediaError::AutoplayBlocked` when the host requires a user gesture
    async fn play(&mut self) -> Result<(), MediaError>;

    fn pause(&mut self);

    /// Detach from the track and remove from the host
    fn remove(&mut self);
}

/// Published local camera track
pub trait LocalVideoTrack: Send + Sync {
    fn detach(&mut self);
    fn stop(&mut self);
}

/// Outcome of an audio track subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioAttach {
    /// A new element was created and is playing
    Playing,
    /// An element already existed for this track
    AlreadyAttached,
}

/// Owner of every playback element and the local video track
#[derive(Default)]
pub struct MediaResources {
    /// Track sid → playback element
    playback: HashMap<String, Box<dyn PlaybackElement>>,

    /// Camera track while published
    video: Option<Box<dyn LocalVideoTrack>>,

    camera_on: bool,

    settings: PlaybackSettings,
}

impl MediaResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and start the playback element for a remote audio track
    ///
    /// The element is kept even when autoplay is blocked so a later retry
    /// can start it.
    pub async fn attach_audio(
        &mut self,
        connection: &dyn RoomConnection,
        track: &TrackInfo,
    ) -> Result<AudioAttach, MediaError> {
        if self.playback.contains_key(&track.sid) {
            debug!("Audio track {} already attached", track.sid);
            return Ok(AudioAttach::AlreadyAttached);
        }

        let mut element = connection.attach_audio(track)?;
        element.configure(&self.settings);
        let result = element.play().await;
        self.playback.insert(track.sid.clone(), element);

        info!(
            "Attached audio track {} from {} ({} elements)",
            track.sid,
            track.participant_identity,
            self.playback.len()
        );

        result.map(|_| AudioAttach::Playing)
    }

    /// Pause and remove the element for `sid`; unknown tracks are ignored
    pub fn detach_audio(&mut self, sid: &str) -> bool {
        match self.playback.remove(sid) {
            Some(mut element) => {
                element.pause();
                element.remove();
                info!("Detached audio track {}", sid);
                true
            }
            None => false,
        }
    }

    /// Retry playback on every element, e.g. after a user gesture
    pub async fn retry_playback(&mut self) -> Result<(), MediaError> {
        let mut last_error = None;
        for (sid, element) in self.playback.iter_mut() {
            if let Err(e) = element.play().await {
                warn!("Playback retry failed for {}: {}", sid, e);
                last_error = Some(e);
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Remove every playback element; returns how many were released
    pub fn release_audio(&mut self) -> usize {
        let count = self.playback.len();
        for (sid, mut element) in self.playback.drain() {
            element.pause();
            element.remove();
            debug!("Released audio track {}", sid);
        }
        count
    }

    /// Take ownership of a freshly published camera track
    pub fn set_video(&mut self, track: Box<dyn LocalVideoTrack>) {
        self.release_video();
        self.video = Some(track);
        self.camera_on = true;
    }

    /// Detach and stop the camera track; the camera is off afterwards
    pub fn release_video(&mut self) {
        if let Some(mut track) = self.video.take() {
            track.detach();
            track.stop();
            info!("Released local video track");
        }
        self.camera_on = false;
    }

    pub fn camera_on(&self) -> bool {
        self.camera_on
    }

    pub fn audio_count(&self) -> usize {
        self.playback.len()
    }
}
