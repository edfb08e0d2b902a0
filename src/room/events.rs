use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connection lifecycle as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Audio,
    Video,
}

/// A remote track the local participant subscribed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Track identifier assigned by the provider
    pub sid: String,
    pub kind: TrackKind,
    /// Identity of the participant publishing the track
    pub participant_identity: String,
}

/// A unit of speech-to-text output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionSegment {
    pub id: String,
    pub text: String,
    /// Interim segments are `false`
    #[serde(rename = "final")]
    pub is_final: bool,
}

/// A chat message delivered over the room's data channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    /// Message id assigned by the provider
    pub id: String,
    pub message: String,
    /// Sender identity, when the provider knows it
    pub sender_identity: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Everything the room reports to the session controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    ConnectionStateChanged(ConnectionState),
    Disconnected {
        reason: Option<String>,
    },
    ParticipantConnected {
        identity: String,
    },
    ParticipantDisconnected {
        identity: String,
    },
    TrackSubscribed(TrackInfo),
    TrackUnsubscribed(TrackInfo),
    ActiveSpeakersChanged {
        identities: Vec<String>,
    },
    TranscriptionReceived {
        participant_identity: Option<String>,
        segments: Vec<TranscriptionSegment>,
    },
    ChatMessage(ChatEvent),
}
