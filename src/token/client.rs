use super::messages::{
    DispatchRequest, DispatchResponse, SessionMetadata, TokenRequest, TokenResponse,
};
use crate::error::TokenError;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

/// Issues room credentials and places the agent into rooms
#[async_trait::async_trait]
pub trait TokenService: Send + Sync {
    /// Request a room token; failures block the connection
    async fn request_token(
        &self,
        endpoint: &Url,
        identity: &str,
        room: Option<&str>,
        metadata: Option<&SessionMetadata>,
    ) -> Result<TokenResponse, TokenError>;

    /// Ask the service to dispatch the agent into `room`
    async fn request_dispatch(
        &self,
        endpoint: &Url,
        room: Option<&str>,
        metadata: Option<&SessionMetadata>,
        force_new: bool,
    ) -> Result<DispatchResponse, TokenError>;
}

/// JSON-over-HTTP token service client
pub struct TokenClient {
    http: reqwest::Client,
}

impl TokenClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    async fn post_json<B, R>(&self, endpoint: &Url, body: &B) -> Result<R, TokenError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(endpoint.clone())
            .json(body)
            .send()
            .await
            .map_err(|source| TokenError::Unreachable {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Token service {} returned HTTP {}", endpoint, status.as_u16());
            return Err(TokenError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| TokenError::InvalidResponse {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait::async_trait]
impl TokenService for TokenClient {
    async fn request_token(
        &self,
        endpoint: &Url,
        identity: &str,
        room: Option<&str>,
        metadata: Option<&SessionMetadata>,
    ) -> Result<TokenResponse, TokenError> {
        info!("Requesting token from {} for {}", endpoint, identity);

        let request = TokenRequest {
            identity: identity.to_string(),
            room: room.map(str::to_string),
            metadata: metadata.cloned(),
        };

        let response: TokenResponse = self.post_json(endpoint, &request).await?;

        if response.token.trim().is_empty() {
            return Err(TokenError::InvalidResponse {
                endpoint: endpoint.to_string(),
                reason: "empty token".to_string(),
            });
        }

        Ok(response)
    }

    async fn request_dispatch(
        &self,
        endpoint: &Url,
        room: Option<&str>,
        metadata: Option<&SessionMetadata>,
        force_new: bool,
    ) -> Result<DispatchResponse, TokenError> {
        info!(
            "Requesting agent dispatch at {} (room={:?}, force_new={})",
            endpoint, room, force_new
        );

        let request = DispatchRequest {
            room: room.map(str::to_string),
            metadata: metadata.cloned(),
            force_new,
        };

        self.post_json(endpoint, &request).await
    }
}

/// Derive the dispatch endpoint from the token endpoint
///
/// A trailing `/token` segment becomes `/dispatch`; otherwise `/dispatch` is
/// appended. Query and fragment are dropped.
pub fn dispatch_endpoint(token_endpoint: &Url) -> Url {
    let mut url = token_endpoint.clone();
    url.set_query(None);
    url.set_fragment(None);

    let path = url.path().trim_end_matches('/');
    let new_path = match path.strip_suffix("/token") {
        Some(prefix) => format!("{}/dispatch", prefix),
        None => format!("{}/dispatch", path),
    };
    url.set_path(&new_path);
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derive(raw: &str) -> String {
        dispatch_endpoint(&Url::parse(raw).unwrap()).to_string()
    }

    #[test]
    fn test_dispatch_endpoint_replaces_token_segment() {
        assert_eq!(
            derive("https://pulse.example.com/api/livekit/token"),
            "https://pulse.example.com/api/livekit/dispatch"
        );
        assert_eq!(
            derive("https://pulse.example.com/api/livekit/token/"),
            "https://pulse.example.com/api/livekit/dispatch"
        );
    }

    #[test]
    fn test_dispatch_endpoint_appends_when_no_token_segment() {
        assert_eq!(
            derive("https://pulse.example.com/api/session"),
            "https://pulse.example.com/api/session/dispatch"
        );
        assert_eq!(derive("http://localhost:8787"), "http://localhost:8787/dispatch");
    }

    #[test]
    fn test_dispatch_endpoint_only_matches_whole_segment() {
        assert_eq!(
            derive("https://pulse.example.com/api/mytoken"),
            "https://pulse.example.com/api/mytoken/dispatch"
        );
    }
}
