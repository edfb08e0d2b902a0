use serde::{Deserialize, Serialize};

/// Metadata attached to token and dispatch requests
///
/// The agent resolves the returning user from `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub user_id: String,
    pub session_id: String,
}

/// Body of `POST <token_endpoint>`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRequest {
    pub identity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SessionMetadata>,
}

/// Token issued for joining a room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub identity: Option<String>,
}

/// Body of `POST <dispatch_endpoint>`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SessionMetadata>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub force_new: bool,
}

/// Result of placing the agent into a room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub room: String,
    pub dispatch_id: String,
    pub created: bool,
}
