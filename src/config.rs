use crate::error::ConfigError;
use crate::session::SessionConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ROOM: &str = "pulse-room";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub room: RoomConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "pulse-session".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomConfig {
    /// Real-time service URL (wss://...)
    pub server_url: Option<String>,
    /// Token issuing endpoint (https://.../api/livekit/token)
    pub token_endpoint: Option<String>,
    /// Room joined when the token service does not assign one
    pub default_room: Option<String>,
    /// Origin the client is served from, used by the local-endpoint guard
    pub app_origin: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityConfig {
    /// Where the participant identity is persisted
    pub store_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

impl Config {
    /// Load configuration from an optional file plus `PULSE__*` environment variables
    ///
    /// e.g. `PULSE__ROOM__TOKEN_ENDPOINT=https://host/api/livekit/token`
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("PULSE").separator("__"))
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Settings consumed by the session controller
    ///
    /// Required values are validated at connect time, not here, so a missing
    /// endpoint surfaces as a session error instead of a startup crash.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            server_url: non_empty(&self.room.server_url),
            token_endpoint: non_empty(&self.room.token_endpoint),
            default_room: non_empty(&self.room.default_room)
                .unwrap_or_else(|| DEFAULT_ROOM.to_string()),
            app_origin: non_empty(&self.room.app_origin),
            ..SessionConfig::default()
        }
    }

    pub fn identity_store_path(&self) -> PathBuf {
        self.identity.store_path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("pulse-session")
                .join("identity.json")
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
