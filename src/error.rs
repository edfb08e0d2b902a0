// Error taxonomy for the session controller
//
// Every failure the controller can surface is classified here so callers
// can tell fatal setup failures (configuration, token, permission) apart
// from the soft ones (dispatch, autoplay, join watchdog).

use thiserror::Error;

/// Configuration problems detected before any network call
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration value: {0}")]
    Missing(&'static str),

    #[error("Invalid URL for {field}: {value}")]
    InvalidUrl { field: &'static str, value: String },

    #[error(
        "Token endpoint {endpoint} points to a local-only host while the app is served from {origin}; \
         configure a publicly reachable token endpoint"
    )]
    LocalEndpointOnRemoteOrigin { endpoint: String, origin: String },

    #[error("Failed to load configuration: {0}")]
    Load(String),
}

/// Failures talking to the token/dispatch service
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token service unreachable at {endpoint}: {source}. Is the token server running and reachable from this host?")]
    Unreachable {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Token service at {endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Token service at {endpoint} returned an invalid response: {reason}")]
    InvalidResponse { endpoint: String, reason: String },
}

/// Failures reported by the media capabilities of the host
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("Permission denied for {0}")]
    PermissionDenied(&'static str),

    #[error("Audio playback was blocked by the host")]
    AutoplayBlocked,

    #[error("Media device failure: {0}")]
    Device(String),
}

impl MediaError {
    /// Message shown to the user for this failure
    pub fn user_message(&self) -> String {
        match self {
            MediaError::PermissionDenied(device) => format!(
                "Permission denied for {}. Allow access in the system settings and try again.",
                device
            ),
            MediaError::AutoplayBlocked => {
                "Audio blocked by the host - click to retry playback.".to_string()
            }
            MediaError::Device(reason) => format!("Media device failure: {}", reason),
        }
    }
}

/// Failures of the real-time room provider
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("Room connection failed: {0}")]
    Connect(String),

    #[error("Failed to send chat message: {0}")]
    Send(String),

    #[error("Room operation failed: {0}")]
    Operation(String),
}

/// Errors returned by the session controller's public operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error("No active room connection")]
    NotConnected,
}

impl SessionError {
    /// Human-readable message stored in the session snapshot
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Media(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}
