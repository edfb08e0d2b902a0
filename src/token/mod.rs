pub mod client;
pub mod messages;

pub use client::{dispatch_endpoint, TokenClient, TokenService};
pub use messages::{DispatchRequest, DispatchResponse, SessionMetadata, TokenRequest, TokenResponse};
