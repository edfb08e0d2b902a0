use super::config::{ResolvedEndpoints, SessionConfig};
use super::snapshot::SessionSnapshot;
use super::state::{reduce, SessionState, StateEvent};
use crate::error::{MediaError, SessionError};
use crate::identity::{self, KeyValueStore};
use crate::media::MediaResources;
use crate::room::{
    ConnectionState, RoomConnection, RoomEvent, RoomProvider, Subscription, TrackInfo, TrackKind,
};
use crate::timers::{Scheduler, TimerFired, TimerName};
use crate::token::{dispatch_endpoint, SessionMetadata, TokenService};
use crate::transcript::{Role, TranscriptAggregator, TranscriptUpdate};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Shown when the agent never joins after connecting
pub const JOIN_TIMEOUT_MESSAGE: &str =
    "The assistant did not join the room. Check that the agent worker is running, then disconnect and connect again.";

/// The room joined by one successful `connect`
///
/// Created at connect, dropped by teardown.
struct LiveRoom {
    connection: Arc<dyn RoomConnection>,

    /// Event registration; releasing it unregisters every handler
    subscription: Option<Subscription>,

    local_identity: String,

    /// Matches timer firings to this connection
    epoch: u64,
}

enum Input {
    Room(Option<RoomEvent>),
    Timer(Option<TimerFired>),
}

/// Orchestrates one conversation with the remote agent
///
/// All operations take `&mut self`, so user actions, room events and timer
/// firings are applied one at a time, in order.
pub struct SessionController {
    config: SessionConfig,
    provider: Arc<dyn RoomProvider>,
    tokens: Arc<dyn TokenService>,
    store: Arc<dyn KeyValueStore>,

    live: Option<LiveRoom>,
    epoch: u64,

    state: SessionState,
    session_id: Option<String>,
    started_at: Option<DateTime<Utc>>,
    started_instant: Option<Instant>,
    duration_seconds: u64,
    muted: bool,
    assistant_connected: bool,
    error_message: Option<String>,

    media: MediaResources,
    transcript: TranscriptAggregator,
    scheduler: Scheduler,

    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        provider: Arc<dyn RoomProvider>,
        tokens: Arc<dyn TokenService>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::default());

        Self {
            config,
            provider,
            tokens,
            store,
            live: None,
            epoch: 0,
            state: SessionState::Idle,
            session_id: None,
            started_at: None,
            started_instant: None,
            duration_seconds: 0,
            muted: true,
            assistant_connected: false,
            error_message: None,
            media: MediaResources::new(),
            transcript: TranscriptAggregator::new(),
            scheduler: Scheduler::new(),
            snapshot_tx,
        }
    }

    // ------------------------------------------------------------------
    // Public control surface
    // ------------------------------------------------------------------

    /// Join the room and bring the agent in
    ///
    /// A second call while a room is joined is ignored. Any failure tears
    /// down everything acquired so far and leaves the session in `Error`.
    pub async fn connect(&mut self) -> Result<(), SessionError> {
        if self.live.is_some() {
            info!("Connect ignored: a room connection is already active");
            return Ok(());
        }

        self.session_id = Some(identity::new_session_id());
        self.started_at = Some(Utc::now());
        self.started_instant = Some(Instant::now());
        self.duration_seconds = 0;
        self.error_message = None;

        info!(
            "Connecting session {}",
            self.session_id.as_deref().unwrap_or_default()
        );

        let endpoints = match self.config.validate() {
            Ok(endpoints) => endpoints,
            Err(e) => return Err(self.fail(e.into()).await),
        };

        self.transcript.clear_messages();
        self.transition(StateEvent::ConnectRequested);
        self.publish();

        match self.establish(endpoints).await {
            Ok(()) => {
                info!("Session connected (state={:?})", self.state);
                self.publish();
                Ok(())
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    /// Leave the room and release everything; safe to call at any time
    pub async fn disconnect(&mut self) {
        if self.live.is_some() {
            info!("Disconnecting session");
        }

        self.teardown().await;

        self.muted = true;
        self.error_message = None;
        self.session_id = None;
        self.started_at = None;
        self.started_instant = None;
        self.duration_seconds = 0;
        self.transition(StateEvent::Reset);
        self.publish();
    }

    /// Mute or unmute the microphone
    pub async fn toggle_mute(&mut self) {
        let Some(connection) = self.connection() else {
            debug!("Mute toggle ignored: not connected");
            return;
        };

        let muted = !self.muted;
        match connection.set_microphone_enabled(!muted).await {
            Ok(()) => {
                info!("Microphone {}", if muted { "muted" } else { "unmuted" });
                self.muted = muted;
                self.transition(StateEvent::MuteChanged { muted });
            }
            Err(e) => self.surface_failure(e.into()),
        }

        self.publish();
    }

    /// Publish or stop the local camera
    pub async fn toggle_camera(&mut self) {
        let Some(connection) = self.connection() else {
            debug!("Camera toggle ignored: not connected");
            return;
        };

        if self.media.camera_on() {
            let result = connection.unpublish_camera().await;
            self.media.release_video();
            match result {
                Ok(()) => info!("Camera disabled"),
                Err(e) => self.surface_failure(e.into()),
            }
        } else {
            match connection.publish_camera().await {
                Ok(track) => {
                    self.media.set_video(track);
                    info!("Camera enabled");
                }
                Err(e) => self.surface_failure(e.into()),
            }
        }

        self.publish();
    }

    /// Send a chat message to the agent
    pub async fn send_message(&mut self, text: &str) -> Result<(), SessionError> {
        let Some(connection) = self.connection() else {
            return Err(SessionError::NotConnected);
        };

        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let previous = self.state;
        self.transition(StateEvent::ReplyPending);
        self.publish();

        match connection.send_chat(text).await {
            Ok(provider_id) => {
                self.transcript.add_sent(&provider_id, text);
                self.publish();
                Ok(())
            }
            Err(e) => {
                warn!("Failed to send chat message: {}", e);
                self.transition(StateEvent::SendFailed { previous });
                let err = SessionError::from(e);
                self.error_message = Some(err.user_message());
                self.publish();
                Err(err)
            }
        }
    }

    /// Retry audio playback after the host blocked autoplay
    pub async fn retry_audio_playback(&mut self) {
        match self.media.retry_playback().await {
            Ok(()) => {
                let blocked = MediaError::AutoplayBlocked.user_message();
                if self.error_message.as_deref() == Some(blocked.as_str()) {
                    self.error_message = None;
                }
            }
            Err(e) => self.error_message = Some(e.user_message()),
        }
        self.publish();
    }

    /// Process one room event or timer firing
    ///
    /// Suspends until an input is available. Returns `false` when nothing
    /// can arrive anymore (no room and no pending timer).
    pub async fn step(&mut self) -> bool {
        let listening = self
            .live
            .as_ref()
            .map(|live| live.subscription.is_some())
            .unwrap_or(false);

        if !listening && self.scheduler.is_idle() {
            return false;
        }

        let input = {
            let scheduler = &mut self.scheduler;
            match self.live.as_mut().and_then(|live| live.subscription.as_mut()) {
                // Room events take precedence over timers that became due
                Some(subscription) => tokio::select! {
                    biased;
                    event = subscription.recv() => Input::Room(event),
                    fired = scheduler.recv() => Input::Timer(fired),
                },
                None => Input::Timer(scheduler.recv().await),
            }
        };

        match input {
            Input::Room(Some(event)) => self.handle_event(event).await,
            Input::Room(None) => {
                warn!("Room event stream closed by provider");
                self.handle_disconnected(Some("event stream closed".to_string()))
                    .await;
            }
            Input::Timer(Some(fired)) => self.handle_timer(fired),
            Input::Timer(None) => {}
        }

        self.publish();
        true
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            started_at: self.started_at,
            duration_seconds: self.duration_seconds,
            state: self.state,
            muted: self.muted,
            camera_on: self.media.camera_on(),
            assistant_connected: self.assistant_connected,
            live_caption: self.transcript.live_caption().map(str::to_string),
            error_message: self.error_message.clone(),
            messages: self.transcript.messages().to_vec(),
        }
    }

    /// Receive every snapshot the controller publishes
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.live.is_some()
    }

    pub fn is_timer_armed(&self, name: TimerName) -> bool {
        self.scheduler.is_armed(name)
    }

    pub fn ticker_running(&self) -> bool {
        self.scheduler.ticker_running()
    }

    pub fn audio_element_count(&self) -> usize {
        self.media.audio_count()
    }

    // ------------------------------------------------------------------
    // Connect / teardown
    // ------------------------------------------------------------------

    async fn establish(&mut self, endpoints: ResolvedEndpoints) -> Result<(), SessionError> {
        let participant = identity::participant_identity(self.store.as_ref());
        let metadata = SessionMetadata {
            user_id: participant.clone(),
            session_id: self.session_id.clone().unwrap_or_default(),
        };

        let token = self
            .tokens
            .request_token(
                &endpoints.token_endpoint,
                &participant,
                Some(self.config.default_room.as_str()),
                Some(&metadata),
            )
            .await?;

        let url = token
            .url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| endpoints.server_url.clone());
        let room_name = token
            .room
            .clone()
            .filter(|room| !room.trim().is_empty())
            .unwrap_or_else(|| self.config.default_room.clone());

        info!("Joining room {} at {} as {}", room_name, url, participant);

        let connection: Arc<dyn RoomConnection> =
            Arc::from(self.provider.connect(&url, &token.token).await?);

        self.epoch += 1;
        let subscription = connection.subscribe();
        self.live = Some(LiveRoom {
            connection: Arc::clone(&connection),
            subscription: Some(subscription),
            local_identity: connection.local_identity(),
            epoch: self.epoch,
        });
        self.transition(StateEvent::ProviderConnected);

        if !connection.remote_participants().is_empty() {
            self.mark_assistant_joined();
        }

        let dispatch_url = dispatch_endpoint(&endpoints.token_endpoint);
        match self
            .tokens
            .request_dispatch(&dispatch_url, Some(room_name.as_str()), Some(&metadata), false)
            .await
        {
            Ok(dispatch) => info!(
                "Agent dispatch {} for room {} (created={})",
                dispatch.dispatch_id, dispatch.room, dispatch.created
            ),
            Err(e) => {
                warn!("Agent dispatch failed, continuing without it: {}", e);
                self.append_warning(format!("Agent dispatch failed: {}", e));
            }
        }

        connection.set_microphone_enabled(true).await?;
        self.muted = false;
        self.transition(StateEvent::MicrophoneEnabled);

        if !self.assistant_connected {
            self.scheduler.arm(
                TimerName::JoinWatchdog,
                self.config.join_watchdog_delay,
                self.epoch,
            );
        }

        Ok(())
    }

    /// Release everything acquired by `connect`
    ///
    /// Order: timers, listeners, playback elements, video track, dedup state,
    /// assistant presence, then the room itself. No step can prevent the
    /// following ones from running.
    async fn teardown(&mut self) {
        self.scheduler.cancel_all();

        let mut live = self.live.take();
        if let Some(subscription) = live.as_mut().and_then(|l| l.subscription.take()) {
            subscription.release();
        }

        let released = self.media.release_audio();
        if released > 0 {
            debug!("Released {} audio elements", released);
        }
        self.media.release_video();
        self.transcript.clear_processed();
        self.assistant_connected = false;

        if let Some(live) = live {
            live.connection.disconnect().await;
            info!("Room connection closed (epoch {})", live.epoch);
        }
    }

    /// Fatal path: teardown, then surface the error
    async fn fail(&mut self, err: SessionError) -> SessionError {
        error!("Session failed: {}", err);
        self.teardown().await;
        self.muted = true;
        self.surface_failure_message(err.user_message());
        self.publish();
        err
    }

    /// Non-fatal provider call failure: the room stays up
    fn surface_failure(&mut self, err: SessionError) {
        warn!("Session operation failed: {}", err);
        self.surface_failure_message(err.user_message());
    }

    fn surface_failure_message(&mut self, message: String) {
        self.error_message = Some(message);
        self.transition(StateEvent::Failed);
    }

    async fn handle_disconnected(&mut self, reason: Option<String>) {
        info!("Room disconnected (reason={:?})", reason);
        self.teardown().await;
        self.muted = true;
        if let Some(reason) = reason {
            self.error_message = Some(format!("Disconnected: {}", reason));
        }
        self.transition(StateEvent::ProviderDisconnected);
    }

    // ------------------------------------------------------------------
    // Room events
    // ------------------------------------------------------------------

    async fn handle_event(&mut self, event: RoomEvent) {
        match event {
            RoomEvent::ConnectionStateChanged(connection_state) => match connection_state {
                ConnectionState::Connecting | ConnectionState::Reconnecting => {
                    self.transition(StateEvent::ProviderConnecting);
                }
                ConnectionState::Connected => {
                    self.transition(StateEvent::ProviderConnected);
                    if !self.muted {
                        self.transition(StateEvent::MicrophoneEnabled);
                    }
                }
                ConnectionState::Disconnected => self.handle_disconnected(None).await,
            },
            RoomEvent::Disconnected { reason } => self.handle_disconnected(reason).await,
            RoomEvent::ParticipantConnected { identity } => {
                if !self.is_local(&identity) {
                    info!("Participant joined: {}", identity);
                    self.mark_assistant_joined();
                }
            }
            RoomEvent::ParticipantDisconnected { identity } => {
                if !self.is_local(&identity) {
                    info!("Participant left: {}", identity);
                    let remaining = self
                        .connection()
                        .map(|c| c.remote_participants().len())
                        .unwrap_or(0);
                    if remaining == 0 {
                        self.assistant_connected = false;
                    }
                }
            }
            RoomEvent::TrackSubscribed(track) => self.handle_track_subscribed(track).await,
            RoomEvent::TrackUnsubscribed(track) => {
                if track.kind == TrackKind::Audio {
                    self.media.detach_audio(&track.sid);
                }
            }
            RoomEvent::ActiveSpeakersChanged { identities } => {
                if identities.iter().any(|id| !self.is_local(id)) {
                    self.assistant_speaking(StateEvent::RemoteSpeaking);
                } else if !identities.is_empty() {
                    self.transition(StateEvent::LocalSpeaking);
                }
            }
            RoomEvent::TranscriptionReceived {
                participant_identity,
                segments,
            } => {
                let role = match participant_identity {
                    Some(ref id) if self.is_local(id) => Role::User,
                    _ => Role::Assistant,
                };

                for update in self.transcript.apply_transcription(role, &segments) {
                    match update {
                        TranscriptUpdate::Caption(Role::User) => {
                            self.transition(StateEvent::UserCaption)
                        }
                        TranscriptUpdate::Appended(Role::User) => {
                            self.transition(StateEvent::ReplyPending)
                        }
                        TranscriptUpdate::Caption(Role::Assistant)
                        | TranscriptUpdate::Appended(Role::Assistant) => {
                            self.assistant_speaking(StateEvent::AssistantCaption)
                        }
                    }
                }
            }
            RoomEvent::ChatMessage(chat) => {
                let role = match chat.sender_identity {
                    Some(ref id) if self.is_local(id) => Role::User,
                    _ => Role::Assistant,
                };
                if self.transcript.add_chat(&chat, role) {
                    debug!("Chat message {} from {:?}", chat.id, role);
                }
            }
        }
    }

    async fn handle_track_subscribed(&mut self, track: TrackInfo) {
        if self.is_local(&track.participant_identity) {
            return;
        }

        self.mark_assistant_joined();

        if track.kind != TrackKind::Audio {
            return;
        }

        let Some(connection) = self.connection() else {
            return;
        };

        match self.media.attach_audio(connection.as_ref(), &track).await {
            Ok(_) => {}
            Err(MediaError::AutoplayBlocked) => {
                warn!("Autoplay blocked for track {}", track.sid);
                self.error_message = Some(MediaError::AutoplayBlocked.user_message());
            }
            Err(e) => {
                warn!("Failed to attach audio track {}: {}", track.sid, e);
                self.error_message = Some(e.user_message());
            }
        }
    }

    /// Apply an assistant-attributed event and re-arm the speaking debounce
    fn assistant_speaking(&mut self, event: StateEvent) {
        self.transition(event);
        if self.state == SessionState::Speaking {
            self.scheduler.arm(
                TimerName::SpeakingReturn,
                self.config.speaking_return_delay,
                self.epoch,
            );
        }
    }

    fn mark_assistant_joined(&mut self) {
        if !self.assistant_connected {
            info!("Assistant joined the room");
        }
        self.assistant_connected = true;
        self.scheduler.cancel(TimerName::JoinWatchdog);

        if self.error_message.as_deref() == Some(JOIN_TIMEOUT_MESSAGE) {
            self.error_message = None;
        }
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    fn handle_timer(&mut self, fired: TimerFired) {
        if !self.scheduler.accept(&fired) {
            debug!("Discarding stale timer firing {:?}", fired);
            return;
        }

        match fired {
            TimerFired::Timer { name, epoch, .. } => {
                if !self.is_current_epoch(epoch) {
                    debug!("Discarding {:?} from a previous connection", name);
                    return;
                }

                match name {
                    TimerName::SpeakingReturn => {
                        self.transition(StateEvent::SpeakingReturned { muted: self.muted });
                    }
                    TimerName::JoinWatchdog => {
                        let remote = self
                            .connection()
                            .map(|c| c.remote_participants().len())
                            .unwrap_or(0);
                        if !self.assistant_connected && remote == 0 {
                            warn!("Assistant did not join within {:?}", self.config.join_watchdog_delay);
                            self.error_message = Some(JOIN_TIMEOUT_MESSAGE.to_string());
                            self.transition(StateEvent::JoinTimedOut);
                        }
                    }
                }
            }
            TimerFired::Tick { epoch } => {
                if self.is_current_epoch(epoch) {
                    if let Some(started) = self.started_instant {
                        self.duration_seconds = started.elapsed().as_secs();
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn transition(&mut self, event: StateEvent) {
        let next = reduce(self.state, event);
        if next != self.state {
            debug!("State {:?} -> {:?} on {:?}", self.state, next, event);
            self.state = next;
        }
        self.sync_ticker();
    }

    /// Run the duration ticker exactly while the session is timed
    fn sync_ticker(&mut self) {
        if self.state.is_timed() && self.live.is_some() {
            self.scheduler
                .start_ticker(self.config.tick_interval, self.epoch);
        } else {
            self.scheduler.stop_ticker();
        }
    }

    fn append_warning(&mut self, warning: String) {
        self.error_message = Some(match self.error_message.take() {
            Some(existing) => format!("{} | {}", existing, warning),
            None => warning,
        });
    }

    fn connection(&self) -> Option<Arc<dyn RoomConnection>> {
        self.live.as_ref().map(|live| Arc::clone(&live.connection))
    }

    fn is_local(&self, identity: &str) -> bool {
        self.live
            .as_ref()
            .map(|live| live.local_identity == identity)
            .unwrap_or(false)
    }

    fn is_current_epoch(&self, epoch: u64) -> bool {
        self.live
            .as_ref()
            .map(|live| live.epoch == epoch)
            .unwrap_or(false)
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.scheduler.cancel_all();
        self.media.release_audio();
        self.media.release_video();

        if let Some(mut live) = self.live.take() {
            if let Some(subscription) = live.subscription.take() {
                subscription.release();
            }
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                let connection = live.connection;
                runtime.spawn(async move {
                    connection.disconnect().await;
                });
            }
        }
    }
}
