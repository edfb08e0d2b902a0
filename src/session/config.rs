use crate::config::DEFAULT_ROOM;
use crate::error::ConfigError;
use reqwest::Url;
use std::net::IpAddr;
use std::time::Duration;

/// Configuration for a conversation session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Real-time service URL, used when the token service does not return one
    pub server_url: Option<String>,

    /// Token issuing endpoint; the dispatch endpoint is derived from it
    pub token_endpoint: Option<String>,

    /// Room joined when the token service does not assign one
    pub default_room: String,

    /// Origin the client is served from (e.g. "https://pulse.example.com")
    pub app_origin: Option<String>,

    /// Delay before returning to listening after the assistant stops speaking
    /// Default: 1.4 seconds
    pub speaking_return_delay: Duration,

    /// How long to wait for the agent to join after connecting
    /// Default: 7 seconds
    pub join_watchdog_delay: Duration,

    /// Period of the session duration ticker
    pub tick_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            token_endpoint: None,
            default_room: DEFAULT_ROOM.to_string(),
            app_origin: None,
            speaking_return_delay: Duration::from_millis(1400),
            join_watchdog_delay: Duration::from_secs(7),
            tick_interval: Duration::from_secs(1),
        }
    }
}

/// Endpoints that passed validation
#[derive(Debug, Clone)]
pub struct ResolvedEndpoints {
    pub server_url: String,
    pub token_endpoint: Url,
}

impl SessionConfig {
    /// Check required values and the local-endpoint guard
    pub fn validate(&self) -> Result<ResolvedEndpoints, ConfigError> {
        let server_url = self
            .server_url
            .clone()
            .ok_or(ConfigError::Missing("room.server_url"))?;

        let raw_endpoint = self
            .token_endpoint
            .as_deref()
            .ok_or(ConfigError::Missing("room.token_endpoint"))?;

        let token_endpoint = Url::parse(raw_endpoint).map_err(|_| ConfigError::InvalidUrl {
            field: "room.token_endpoint",
            value: raw_endpoint.to_string(),
        })?;

        if let Some(origin) = &self.app_origin {
            let endpoint_local = token_endpoint.host_str().map(is_local_host).unwrap_or(false);
            let origin_host = origin_host(origin);
            let origin_local = origin_host.as_deref().map(is_local_host).unwrap_or(true);

            if endpoint_local && !origin_local {
                return Err(ConfigError::LocalEndpointOnRemoteOrigin {
                    endpoint: token_endpoint.to_string(),
                    origin: origin.clone(),
                });
            }
        }

        Ok(ResolvedEndpoints {
            server_url,
            token_endpoint,
        })
    }
}

fn origin_host(origin: &str) -> Option<String> {
    Url::parse(origin)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .or_else(|| {
            Url::parse(&format!("http://{}", origin))
                .ok()
                .and_then(|url| url.host_str().map(str::to_string))
        })
}

/// Whether a host is only reachable from the machine itself
pub fn is_local_host(host: &str) -> bool {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.eq_ignore_ascii_case("localhost") || host.to_ascii_lowercase().ends_with(".localhost") {
        return true;
    }

    match host.parse::<IpAddr>() {
        Ok(ip) => ip.is_loopback() || ip.is_unspecified(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str, origin: Option<&str>) -> SessionConfig {
        SessionConfig {
            server_url: Some("wss://rtc.example.com".to_string()),
            token_endpoint: Some(endpoint.to_string()),
            app_origin: origin.map(str::to_string),
            ..SessionConfig::default()
        }
    }

    #[test]
    fn test_local_hosts() {
        assert!(is_local_host("localhost"));
        assert!(is_local_host("127.0.0.1"));
        assert!(is_local_host("[::1]"));
        assert!(is_local_host("0.0.0.0"));
        assert!(is_local_host("app.localhost"));
        assert!(!is_local_host("pulse.example.com"));
        assert!(!is_local_host("10.0.0.4"));
    }

    #[test]
    fn test_missing_values() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.validate().unwrap_err(), ConfigError::Missing("room.server_url"));

        let cfg = SessionConfig {
            server_url: Some("wss://rtc.example.com".to_string()),
            ..SessionConfig::default()
        };
        assert_eq!(cfg.validate().unwrap_err(), ConfigError::Missing("room.token_endpoint"));
    }

    #[test]
    fn test_local_endpoint_on_remote_origin_is_refused() {
        let cfg = config("http://localhost:8787/api/livekit/token", Some("https://pulse.example.com"));
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::LocalEndpointOnRemoteOrigin { .. })
        ));
    }

    #[test]
    fn test_local_endpoint_on_local_origin_is_allowed() {
        let cfg = config("http://127.0.0.1:8787/api/livekit/token", Some("localhost:5173"));
        assert!(cfg.validate().is_ok());

        let cfg = config("http://127.0.0.1:8787/api/livekit/token", None);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_invalid_endpoint() {
        let cfg = config("not a url", None);
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidUrl { .. })));
    }
}
