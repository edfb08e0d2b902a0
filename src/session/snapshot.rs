use super::state::SessionState;
use crate::transcript::ChatMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything a user interface needs to render a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Identifier of the current (or last attempted) session
    pub session_id: Option<String>,

    /// When the current session was started
    pub started_at: Option<DateTime<Utc>>,

    /// Elapsed seconds, refreshed by the duration ticker
    pub duration_seconds: u64,

    pub state: SessionState,

    /// Whether the microphone is muted
    pub muted: bool,

    pub camera_on: bool,

    /// Whether a remote participant (the agent) is in the room
    pub assistant_connected: bool,

    /// Interim caption, already prefixed with the speaker
    pub live_caption: Option<String>,

    /// Last error or warning shown to the user
    pub error_message: Option<String>,

    /// Conversation log, in insertion order
    pub messages: Vec<ChatMessage>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            session_id: None,
            started_at: None,
            duration_seconds: 0,
            state: SessionState::Idle,
            muted: true,
            camera_on: false,
            assistant_connected: false,
            live_caption: None,
            error_message: None,
            messages: Vec::new(),
        }
    }
}
