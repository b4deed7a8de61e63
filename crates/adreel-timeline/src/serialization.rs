//! Session serialization with versioning and migration.
//!
//! Uses JSON with a schema version field for forward-compatible persistence.

use adreel_core::{AdReelError, Result};
use serde::{Deserialize, Serialize};

use crate::session::EditingSession;

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Versioned session file wrapper.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionFile {
    /// Schema version for migration.
    pub version: u32,
    /// The session data.
    pub session: EditingSession,
    /// Application version that wrote this file.
    pub app_version: String,
}

impl SessionFile {
    pub fn new(session: EditingSession) -> Self {
        Self {
            version: CURRENT_VERSION,
            session,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| AdReelError::Serialization(format!("Failed to serialize session: {}", e)))
    }

    /// Deserialize from JSON bytes, applying migrations if needed.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| AdReelError::Serialization(format!("Invalid JSON: {}", e)))?;

        let version = raw.get("version").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
        // A bare v0 session also carries a numeric `version` (its edit
        // counter), so only the wrapper shape counts as versioned.
        let version = if raw.get("session").is_some() { version } else { 0 };

        if version > CURRENT_VERSION {
            return Err(AdReelError::Serialization(format!(
                "Session file version {} is newer than supported version {}",
                version, CURRENT_VERSION
            )));
        }

        let migrated = migrate(raw, version)?;
        let file: Self = serde_json::from_value(migrated)
            .map_err(|e| AdReelError::Serialization(format!("Failed to parse session: {}", e)))?;
        for clip in file.session.clips() {
            clip.validate()?;
        }
        Ok(file)
    }

    /// Load a session file from disk.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_json(&data)
    }

    /// Write atomically so readers never see a half-written record.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        adreel_core::fs::write_atomic(path, &self.to_json()?)
    }
}

/// Apply sequential migrations from `from_version` to CURRENT_VERSION.
fn migrate(mut data: serde_json::Value, from_version: u32) -> Result<serde_json::Value> {
    let mut version = from_version;

    while version < CURRENT_VERSION {
        match version {
            0 => {
                // v0 → v1: the whole value is the session
                data = serde_json::json!({
                    "version": 1,
                    "session": data,
                    "app_version": "0.1.0",
                });
                version = 1;
            }
            _ => {
                return Err(AdReelError::Serialization(format!(
                    "No migration path from version {}",
                    version
                )));
            }
        }
    }

    Ok(data)
}
