//! Participant and session identity
//!
//! The participant identity is generated once per store and reused across
//! sessions so the remote agent can recognize a returning user. Session ids
//! are regenerated on every connect attempt.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{info, warn};

/// Key under which the participant identity is stored
pub const IDENTITY_KEY: &str = "pulse.participant_identity";

/// Prefix marking identities created by this client
pub const IDENTITY_PREFIX: &str = "web-";

/// Minimal key-value store the identity is persisted in
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// JSON object on disk, one entry per key
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_all(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read identity store: {:?}", self.path))?;

        if raw.trim().is_empty() {
            return Ok(Map::new());
        }

        let value: Value = serde_json::from_str(&raw)
            .with_context(|| format!("Identity store is not valid JSON: {:?}", self.path))?;

        match value {
            Value::Object(map) => Ok(map),
            _ => anyhow::bail!("Identity store is not a JSON object: {:?}", self.path),
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.read_all()?;
        Ok(entries.get(key).and_then(Value::as_str).map(str::to_string))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.read_all().unwrap_or_default();
        entries.insert(key.to_string(), Value::String(value.to_string()));

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create store directory: {:?}", parent))?;
        }

        let json = serde_json::to_string_pretty(&Value::Object(entries))?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write identity store: {:?}", self.path))?;

        Ok(())
    }
}

/// In-memory store, for tests and ephemeral clients
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory store lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Return the persisted participant identity, creating it on first use
///
/// Store failures never block a session: the identity degrades to an
/// ephemeral one and a warning is logged.
pub fn participant_identity(store: &dyn KeyValueStore) -> String {
    match store.get(IDENTITY_KEY) {
        Ok(Some(existing)) if !existing.trim().is_empty() => return existing,
        Ok(_) => {}
        Err(e) => warn!("Failed to read participant identity: {:#}", e),
    }

    let identity = generate_identity();
    match store.set(IDENTITY_KEY, &identity) {
        Ok(()) => info!("Created participant identity {}", identity),
        Err(e) => warn!("Failed to persist participant identity {}: {:#}", identity, e),
    }

    identity
}

/// Short random identity, e.g. "web-1a2b3c4d"
pub fn generate_identity() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}", IDENTITY_PREFIX, &hex[..8])
}

/// Fresh identifier for one connect attempt
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
