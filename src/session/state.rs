use serde::{Deserialize, Serialize};

/// User-facing state of a conversation session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Listening,
    Thinking,
    Speaking,
    Error,
}

impl SessionState {
    /// Whether a room is joined and the conversation is live
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::Connected
                | SessionState::Listening
                | SessionState::Thinking
                | SessionState::Speaking
        )
    }

    /// Whether the duration ticker should run
    pub fn is_timed(self) -> bool {
        !matches!(
            self,
            SessionState::Idle | SessionState::Error | SessionState::Connecting
        )
    }
}

/// Facts that drive state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    ConnectRequested,
    ProviderConnecting,
    ProviderConnected,
    ProviderDisconnected,
    MicrophoneEnabled,
    RemoteSpeaking,
    LocalSpeaking,
    /// Speaking-return debounce elapsed
    SpeakingReturned { muted: bool },
    MuteChanged { muted: bool },
    /// Local chat message or final user transcription; a reply is pending
    ReplyPending,
    /// Chat send failed; undoes the `ReplyPending` it followed
    SendFailed { previous: SessionState },
    /// Assistant caption or final assistant transcription
    AssistantCaption,
    /// Interim caption of the local participant
    UserCaption,
    /// Join watchdog fired on a healthy connection
    JoinTimedOut,
    Failed,
    /// Local disconnect; everything was torn down
    Reset,
}

/// Pure transition function of the session state machine
pub fn reduce(state: SessionState, event: StateEvent) -> SessionState {
    use SessionState::*;

    match event {
        StateEvent::ConnectRequested => match state {
            Idle | Error => Connecting,
            other => other,
        },
        StateEvent::ProviderConnecting => match state {
            Idle | Error => state,
            _ => Connecting,
        },
        StateEvent::ProviderConnected => match state {
            Connecting => Connected,
            other => other,
        },
        StateEvent::ProviderDisconnected => match state {
            Error => Error,
            _ => Idle,
        },
        StateEvent::MicrophoneEnabled => match state {
            Connected => Listening,
            other => other,
        },
        StateEvent::RemoteSpeaking | StateEvent::AssistantCaption => {
            if state.is_active() {
                Speaking
            } else {
                state
            }
        }
        StateEvent::LocalSpeaking | StateEvent::UserCaption => match state {
            Connected | Listening | Speaking => Listening,
            other => other,
        },
        StateEvent::SpeakingReturned { muted } => match state {
            Speaking if muted => Connected,
            Speaking => Listening,
            other => other,
        },
        StateEvent::MuteChanged { muted } => {
            if muted {
                Connected
            } else {
                Listening
            }
        }
        StateEvent::SendFailed { previous } => match state {
            Thinking => previous,
            other => other,
        },
        StateEvent::ReplyPending => {
            if state.is_active() {
                Thinking
            } else {
                state
            }
        }
        StateEvent::JoinTimedOut => {
            if state.is_active() {
                Connected
            } else {
                state
            }
        }
        StateEvent::Failed => Error,
        StateEvent::Reset => Idle,
    }
}
