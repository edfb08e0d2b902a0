use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pulse_session::identity::{self, FileStore};
use pulse_session::token::{dispatch_endpoint, SessionMetadata, TokenClient, TokenService};
use pulse_session::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pulse-session", version, about = "Session tooling for the PULSE voice agent")]
struct Cli {
    /// Configuration file (without extension); PULSE__* variables override it
    #[arg(short, long, default_value = "config/pulse-session")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate configuration and the local-endpoint guard
    Check,
    /// Print the persisted participant identity, creating it if needed
    Identity,
    /// Request a room token
    Token {
        #[arg(long)]
        room: Option<String>,
    },
    /// Ask the token service to dispatch the agent into a room
    Dispatch {
        #[arg(long)]
        room: Option<String>,
        /// Replace any existing dispatch
        #[arg(long)]
        force_new: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(Some(cli.config.as_str())).context("Failed to load configuration")?;
    let session_config = cfg.session_config();

    info!("Loaded config: {}", cfg.service.name);

    match cli.command {
        Command::Check => {
            let endpoints = session_config.validate()?;
            info!("Real-time server: {}", endpoints.server_url);
            info!("Token endpoint: {}", endpoints.token_endpoint);
            info!("Dispatch endpoint: {}", dispatch_endpoint(&endpoints.token_endpoint));
            info!("Default room: {}", session_config.default_room);
            println!("configuration ok");
        }
        Command::Identity => {
            let store = FileStore::new(cfg.identity_store_path());
            println!("{}", identity::participant_identity(&store));
        }
        Command::Token { room } => {
            let endpoints = session_config.validate()?;
            let store = FileStore::new(cfg.identity_store_path());
            let participant = identity::participant_identity(&store);
            let metadata = SessionMetadata {
                user_id: participant.clone(),
                session_id: identity::new_session_id(),
            };
            let room = room.unwrap_or_else(|| session_config.default_room.clone());

            let client = TokenClient::new(cfg.http_timeout())?;
            let response = client
                .request_token(&endpoints.token_endpoint, &participant, Some(room.as_str()), Some(&metadata))
                .await?;

            let preview: String = response.token.chars().take(16).collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "identity": response.identity.as_deref().unwrap_or(&participant),
                    "room": response.room.as_deref().unwrap_or(&room),
                    "url": response.url.as_deref().unwrap_or(&endpoints.server_url),
                    "token": format!("{}...", preview),
                }))?
            );
        }
        Command::Dispatch { room, force_new } => {
            let endpoints = session_config.validate()?;
            let store = FileStore::new(cfg.identity_store_path());
            let metadata = SessionMetadata {
                user_id: identity::participant_identity(&store),
                session_id: identity::new_session_id(),
            };
            let room = room.unwrap_or_else(|| session_config.default_room.clone());

            let client = TokenClient::new(cfg.http_timeout())?;
            let response = client
                .request_dispatch(
                    &dispatch_endpoint(&endpoints.token_endpoint),
                    Some(room.as_str()),
                    Some(&metadata),
                    force_new,
                )
                .await?;

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
