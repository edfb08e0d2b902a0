// Integration tests for the token service client
//
// A local axum server stands in for the token service so the client is
// exercised over real HTTP.

mod common;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use common::spawn_server;
use pulse_session::token::{
    dispatch_endpoint, DispatchRequest, DispatchResponse, SessionMetadata, TokenClient,
    TokenRequest, TokenResponse, TokenService,
};
use pulse_session::TokenError;
use reqwest::Url;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Seen = Arc<Mutex<Vec<serde_json::Value>>>;

async fn issue_token(
    State(seen): State<Seen>,
    Json(request): Json<TokenRequest>,
) -> Json<TokenResponse> {
    seen.lock().unwrap().push(serde_json::to_value(&request).unwrap());
    Json(TokenResponse {
        token: format!("token-for-{}", request.identity),
        url: Some("wss://rtc.example.com".to_string()),
        room: request.room.clone(),
        identity: Some(request.identity),
    })
}

async fn dispatch_agent(
    State(seen): State<Seen>,
    Json(request): Json<DispatchRequest>,
) -> Json<DispatchResponse> {
    seen.lock().unwrap().push(serde_json::to_value(&request).unwrap());
    Json(DispatchResponse {
        room: request.room.unwrap_or_else(|| "pulse-room".to_string()),
        dispatch_id: "AD_123".to_string(),
        created: request.force_new,
    })
}

async fn token_server() -> (Url, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new()
        .route("/api/livekit/token", post(issue_token))
        .route("/api/livekit/dispatch", post(dispatch_agent))
        .with_state(Arc::clone(&seen));

    let addr = spawn_server(router).await;
    let endpoint = Url::parse(&format!("http://{}/api/livekit/token", addr)).unwrap();
    (endpoint, seen)
}

fn metadata() -> SessionMetadata {
    SessionMetadata {
        user_id: "web-1a2b3c4d".to_string(),
        session_id: "6f1c0a8e-0000-4000-8000-000000000001".to_string(),
    }
}

#[tokio::test]
async fn test_request_token_posts_identity_room_and_metadata() -> Result<()> {
    let (endpoint, seen) = token_server().await;
    let client = TokenClient::new(Duration::from_secs(5))?;

    let response = client
        .request_token(&endpoint, "web-1a2b3c4d", Some("pulse-room"), Some(&metadata()))
        .await?;

    assert_eq!(response.token, "token-for-web-1a2b3c4d");
    assert_eq!(response.url.as_deref(), Some("wss://rtc.example.com"));
    assert_eq!(response.room.as_deref(), Some("pulse-room"));

    let body = seen.lock().unwrap()[0].clone();
    assert_eq!(body["identity"], "web-1a2b3c4d");
    assert_eq!(body["room"], "pulse-room");
    assert_eq!(body["metadata"]["user_id"], "web-1a2b3c4d");
    assert_eq!(
        body["metadata"]["session_id"],
        "6f1c0a8e-0000-4000-8000-000000000001"
    );

    Ok(())
}

#[tokio::test]
async fn test_request_token_omits_absent_fields() -> Result<()> {
    let (endpoint, seen) = token_server().await;
    let client = TokenClient::new(Duration::from_secs(5))?;

    client.request_token(&endpoint, "web-1a2b3c4d", None, None).await?;

    let body = seen.lock().unwrap()[0].clone();
    let object = body.as_object().unwrap();
    assert!(!object.contains_key("room"));
    assert!(!object.contains_key("metadata"));
    Ok(())
}

#[tokio::test]
async fn test_dispatch_sends_force_new_only_when_set() -> Result<()> {
    let (endpoint, seen) = token_server().await;
    let client = TokenClient::new(Duration::from_secs(5))?;
    let dispatch = dispatch_endpoint(&endpoint);

    let first = client
        .request_dispatch(&dispatch, Some("pulse-room"), Some(&metadata()), false)
        .await?;
    let second = client
        .request_dispatch(&dispatch, Some("pulse-room"), None, true)
        .await?;

    assert_eq!(first.dispatch_id, "AD_123");
    assert!(!first.created);
    assert!(second.created);

    let bodies = seen.lock().unwrap().clone();
    assert!(bodies[0].get("force_new").is_none());
    assert_eq!(bodies[0]["room"], "pulse-room");
    assert_eq!(bodies[1]["force_new"], true);
    Ok(())
}

#[tokio::test]
async fn test_error_status_carries_body() -> Result<()> {
    let router = Router::new().route(
        "/api/livekit/token",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "LIVEKIT_API_KEY not set") }),
    );
    let addr = spawn_server(router).await;
    let endpoint = Url::parse(&format!("http://{}/api/livekit/token", addr))?;
    let client = TokenClient::new(Duration::from_secs(5))?;

    let err = client
        .request_token(&endpoint, "web-1a2b3c4d", None, None)
        .await
        .unwrap_err();

    match &err {
        TokenError::Status { status, body, .. } => {
            assert_eq!(*status, 500);
            assert_eq!(body, "LIVEKIT_API_KEY not set");
        }
        other => panic!("expected status error, got {:?}", other),
    }
    assert!(err.to_string().contains("HTTP 500"));
    Ok(())
}

#[tokio::test]
async fn test_empty_token_is_invalid() -> Result<()> {
    let router = Router::new().route(
        "/api/livekit/token",
        post(|| async { Json(serde_json::json!({ "token": "" })) }),
    );
    let addr = spawn_server(router).await;
    let endpoint = Url::parse(&format!("http://{}/api/livekit/token", addr))?;
    let client = TokenClient::new(Duration::from_secs(5))?;

    let err = client
        .request_token(&endpoint, "web-1a2b3c4d", None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, TokenError::InvalidResponse { .. }));
    Ok(())
}

#[tokio::test]
async fn test_malformed_body_is_invalid() -> Result<()> {
    let router = Router::new().route(
        "/api/livekit/token",
        post(|| async { "not json" }),
    );
    let addr = spawn_server(router).await;
    let endpoint = Url::parse(&format!("http://{}/api/livekit/token", addr))?;
    let client = TokenClient::new(Duration::from_secs(5))?;

    let err = client
        .request_token(&endpoint, "web-1a2b3c4d", None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, TokenError::InvalidResponse { .. }));
    Ok(())
}

#[tokio::test]
async fn test_unreachable_service_mentions_endpoint() -> Result<()> {
    // Bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let endpoint = Url::parse(&format!("http://{}/api/livekit/token", addr))?;
    let client = TokenClient::new(Duration::from_secs(2))?;

    let err = client
        .request_token(&endpoint, "web-1a2b3c4d", None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, TokenError::Unreachable { .. }));
    let message = err.to_string();
    assert!(message.contains(endpoint.as_str()), "message was: {}", message);
    assert!(message.contains("Is the token server running"));
    Ok(())
}
