// Test doubles for the room provider, media host and token service
//
// The fakes record every call in a shared `FakeRoomState` so tests can
// assert which resources are live after each operation.

#![allow(dead_code)]

use pulse_session::error::{MediaError, RoomError, TokenError};
use pulse_session::media::{LocalVideoTrack, PlaybackElement, PlaybackSettings};
use pulse_session::room::{RoomConnection, RoomEvent, RoomProvider, Subscription, TrackInfo};
use pulse_session::session::{SessionConfig, SessionController};
use pulse_session::token::{DispatchResponse, SessionMetadata, TokenResponse, TokenService};
use pulse_session::{MemoryStore, TrackKind};
use reqwest::Url;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const LOCAL_IDENTITY: &str = "web-local01";
pub const AGENT_IDENTITY: &str = "agent-pulse";

#[derive(Default)]
pub struct FakeRoomState {
    pub connect_calls: usize,
    pub connect_error: Option<RoomError>,
    pub connected_urls: Vec<(String, String)>,
    pub active_connections: usize,
    pub max_active_connections: usize,
    pub disconnect_calls: usize,

    pub event_tx: Option<mpsc::UnboundedSender<RoomEvent>>,
    pub active_subscriptions: usize,

    pub remote_participants: Vec<String>,

    pub microphone_calls: Vec<bool>,
    pub microphone_error: Option<MediaError>,

    pub camera_error: Option<MediaError>,
    pub published_cameras: usize,
    pub live_video_tracks: usize,
    pub stopped_video_tracks: usize,

    pub autoplay_blocked: bool,
    pub created_elements: usize,
    pub live_elements: usize,
    pub removed_elements: Vec<String>,
    pub playback_settings: Vec<PlaybackSettings>,

    pub sent_messages: Vec<String>,
    pub send_error: Option<RoomError>,
}

pub type Shared = Arc<Mutex<FakeRoomState>>;

pub struct FakeProvider {
    pub state: Shared,
}

#[async_trait::async_trait]
impl RoomProvider for FakeProvider {
    async fn connect(&self, url: &str, token: &str) -> Result<Box<dyn RoomConnection>, RoomError> {
        let mut state = self.state.lock().unwrap();
        state.connect_calls += 1;
        if let Some(err) = state.connect_error.clone() {
            return Err(err);
        }
        state.connected_urls.push((url.to_string(), token.to_string()));
        state.active_connections += 1;
        state.max_active_connections = state.max_active_connections.max(state.active_connections);

        Ok(Box::new(FakeConnection {
            state: Arc::clone(&self.state),
        }))
    }
}

pub struct FakeConnection {
    state: Shared,
}

#[async_trait::async_trait]
impl RoomConnection for FakeConnection {
    fn local_identity(&self) -> String {
        LOCAL_IDENTITY.to_string()
    }

    fn remote_participants(&self) -> Vec<String> {
        self.state.lock().unwrap().remote_participants.clone()
    }

    fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut state = self.state.lock().unwrap();
            state.event_tx = Some(tx);
            state.active_subscriptions += 1;
        }

        let state = Arc::clone(&self.state);
        Subscription::new(rx, move || {
            let mut state = state.lock().unwrap();
            state.active_subscriptions -= 1;
            state.event_tx = None;
        })
    }

    fn attach_audio(&self, track: &TrackInfo) -> Result<Box<dyn PlaybackElement>, MediaError> {
        let mut state = self.state.lock().unwrap();
        state.created_elements += 1;
        state.live_elements += 1;
        Ok(Box::new(FakePlayback {
            sid: track.sid.clone(),
            state: Arc::clone(&self.state),
            removed: false,
        }))
    }

    async fn set_microphone_enabled(&self, enabled: bool) -> Result<(), MediaError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.microphone_error.clone() {
            return Err(err);
        }
        state.microphone_calls.push(enabled);
        Ok(())
    }

    async fn publish_camera(&self) -> Result<Box<dyn LocalVideoTrack>, MediaError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.camera_error.clone() {
            return Err(err);
        }
        state.published_cameras += 1;
        state.live_video_tracks += 1;
        Ok(Box::new(FakeVideo {
            state: Arc::clone(&self.state),
            stopped: false,
        }))
    }

    async fn unpublish_camera(&self) -> Result<(), MediaError> {
        Ok(())
    }

    async fn send_chat(&self, text: &str) -> Result<String, RoomError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.send_error.clone() {
            return Err(err);
        }
        state.sent_messages.push(text.to_string());
        Ok(format!("msg-{}", state.sent_messages.len()))
    }

    async fn disconnect(&self) {
        let mut state = self.state.lock().unwrap();
        state.disconnect_calls += 1;
        state.active_connections = state.active_connections.saturating_sub(1);
    }
}

pub struct FakePlayback {
    sid: String,
    state: Shared,
    removed: bool,
}

#[async_trait::async_trait]
impl PlaybackElement for FakePlayback {
    fn configure(&mut self, settings: &PlaybackSettings) {
        self.state.lock().unwrap().playback_settings.push(settings.clone());
    }

    async fn play(&mut self) -> Result<(), MediaError> {
        if self.state.lock().unwrap().autoplay_blocked {
            return Err(MediaError::AutoplayBlocked);
        }
        Ok(())
    }

    fn pause(&mut self) {}

    fn remove(&mut self) {
        if !self.removed {
            self.removed = true;
            let mut state = self.state.lock().unwrap();
            state.live_elements -= 1;
            state.removed_elements.push(self.sid.clone());
        }
    }
}

pub struct FakeVideo {
    state: Shared,
    stopped: bool,
}

impl LocalVideoTrack for FakeVideo {
    fn detach(&mut self) {}

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            let mut state = self.state.lock().unwrap();
            state.live_video_tracks -= 1;
            state.stopped_video_tracks += 1;
        }
    }
}

#[derive(Default)]
pub struct FakeTokenState {
    pub token_calls: Vec<(String, Option<String>, Option<SessionMetadata>)>,
    pub dispatch_calls: Vec<(String, Option<String>, bool)>,
    pub token_status: Option<u16>,
    pub dispatch_status: Option<u16>,
    pub returned_url: Option<String>,
}

pub struct FakeTokens {
    pub state: Arc<Mutex<FakeTokenState>>,
}

#[async_trait::async_trait]
impl TokenService for FakeTokens {
    async fn request_token(
        &self,
        endpoint: &Url,
        identity: &str,
        room: Option<&str>,
        metadata: Option<&SessionMetadata>,
    ) -> Result<TokenResponse, TokenError> {
        let mut state = self.state.lock().unwrap();
        state.token_calls.push((
            identity.to_string(),
            room.map(str::to_string),
            metadata.cloned(),
        ));
        if let Some(status) = state.token_status {
            return Err(TokenError::Status {
                endpoint: endpoint.to_string(),
                status,
                body: "error".to_string(),
            });
        }
        Ok(TokenResponse {
            token: "t1".to_string(),
            url: state.returned_url.clone(),
            room: None,
            identity: Some(identity.to_string()),
        })
    }

    async fn request_dispatch(
        &self,
        endpoint: &Url,
        room: Option<&str>,
        _metadata: Option<&SessionMetadata>,
        force_new: bool,
    ) -> Result<DispatchResponse, TokenError> {
        let mut state = self.state.lock().unwrap();
        state
            .dispatch_calls
            .push((endpoint.to_string(), room.map(str::to_string), force_new));
        if let Some(status) = state.dispatch_status {
            return Err(TokenError::Status {
                endpoint: endpoint.to_string(),
                status,
                body: "quota exceeded".to_string(),
            });
        }
        Ok(DispatchResponse {
            room: room.unwrap_or("pulse-room").to_string(),
            dispatch_id: "AD_test".to_string(),
            created: true,
        })
    }
}

pub struct Harness {
    pub controller: SessionController,
    pub room: Shared,
    pub tokens: Arc<Mutex<FakeTokenState>>,
}

impl Harness {
    /// Push a room event to the controller's subscription
    pub fn emit(&self, event: RoomEvent) {
        let state = self.room.lock().unwrap();
        state
            .event_tx
            .as_ref()
            .expect("no active subscription")
            .send(event)
            .expect("subscription closed");
    }

    /// Emit an event and process it
    pub async fn deliver(&mut self, event: RoomEvent) {
        self.emit(event);
        assert!(self.controller.step().await);
    }

    pub fn room(&self) -> std::sync::MutexGuard<'_, FakeRoomState> {
        self.room.lock().unwrap()
    }
}

pub fn test_config() -> SessionConfig {
    SessionConfig {
        server_url: Some("wss://rtc.example.com".to_string()),
        token_endpoint: Some("https://pulse.example.com/api/livekit/token".to_string()),
        ..SessionConfig::default()
    }
}

pub fn harness() -> Harness {
    harness_with(test_config())
}

pub fn harness_with(config: SessionConfig) -> Harness {
    let room: Shared = Arc::new(Mutex::new(FakeRoomState::default()));
    let tokens = Arc::new(Mutex::new(FakeTokenState::default()));

    let controller = SessionController::new(
        config,
        Arc::new(FakeProvider {
            state: Arc::clone(&room),
        }),
        Arc::new(FakeTokens {
            state: Arc::clone(&tokens),
        }),
        Arc::new(MemoryStore::new()),
    );

    Harness {
        controller,
        room,
        tokens,
    }
}

/// Process inputs until `duration` of (possibly paused) time has passed
pub async fn run_for(controller: &mut SessionController, duration: Duration) {
    let _ = tokio::time::timeout(duration, async {
        while controller.step().await {}
        std::future::pending::<()>().await
    })
    .await;
}

pub fn audio_track(sid: &str, participant: &str) -> TrackInfo {
    TrackInfo {
        sid: sid.to_string(),
        kind: TrackKind::Audio,
        participant_identity: participant.to_string(),
    }
}

/// Serve `router` on an ephemeral local port
pub async fn spawn_server(router: axum::Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    addr
}
