//! Session persistence.
//!
//! Records are keyed by generation id. `save` is a compare-and-swap on the
//! session version so two writers can never silently overwrite each other.
//! The JSON store holds a per-generation OS file lock across the check and
//! the write, so this also holds between processes.
//!
//! Layout of the JSON store:
//! ```text
//! root/
//!   sessions/
//!     {encoded-generation-id}.json
//!     {encoded-generation-id}.lock
//! ```

use adreel_core::fs::{encode_file_stem, with_file_lock};
use adreel_core::{AdReelError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::serialization::SessionFile;
use crate::session::EditingSession;

/// Durable storage for editing sessions.
pub trait SessionStore: Send + Sync {
    /// Load the session for a generation, if one exists.
    fn load(&self, generation_id: &str) -> Result<Option<EditingSession>>;

    /// Persist `session`.
    ///
    /// `expected_version` is the version of the stored record the caller
    /// read before mutating, or `None` when creating a new record. A
    /// mismatch fails with `StaleWriteConflict`.
    fn save(&self, session: &EditingSession, expected_version: Option<u64>) -> Result<()>;
}

fn check_stored(
    generation_id: &str,
    stored: Option<u64>,
    expected: Option<u64>,
) -> Result<()> {
    match (stored, expected) {
        (None, None) => Ok(()),
        (Some(actual), Some(expected)) if actual == expected => Ok(()),
        (Some(actual), expected) => Err(AdReelError::StaleWriteConflict {
            expected: expected.unwrap_or(0),
            actual,
        }),
        (None, Some(_)) => Err(AdReelError::NotFound(format!(
            "no session stored for generation {generation_id}"
        ))),
    }
}

/// In-process store, used by tests and single-shot runs.
#[derive(Default)]
pub struct MemorySessionStore {
    records: Mutex<HashMap<String, EditingSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, generation_id: &str) -> Result<Option<EditingSession>> {
        Ok(self.records.lock().get(generation_id).cloned())
    }

    fn save(&self, session: &EditingSession, expected_version: Option<u64>) -> Result<()> {
        let mut records = self.records.lock();
        let stored = records.get(session.generation_id()).map(|s| s.version());
        check_stored(session.generation_id(), stored, expected_version)?;
        records.insert(session.generation_id().to_string(), session.clone());
        Ok(())
    }
}

/// One JSON file per generation under `root/sessions/`.
pub struct JsonSessionStore {
    dir: PathBuf,
}

impl JsonSessionStore {
    pub fn new(root: &Path) -> Self {
        Self {
            dir: root.join("sessions"),
        }
    }

    fn path_for(&self, generation_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", encode_file_stem(generation_id)))
    }

    fn lock_path_for(&self, generation_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.lock", encode_file_stem(generation_id)))
    }
}

impl SessionStore for JsonSessionStore {
    fn load(&self, generation_id: &str) -> Result<Option<EditingSession>> {
        let path = self.path_for(generation_id);
        if !path.exists() {
            return Ok(None);
        }
        let file = SessionFile::load_from_file(&path)?;
        if file.session.generation_id() != generation_id {
            return Err(AdReelError::Serialization(format!(
                "{} holds generation {}, expected {generation_id}",
                path.display(),
                file.session.generation_id()
            )));
        }
        Ok(Some(file.session))
    }

    fn save(&self, session: &EditingSession, expected_version: Option<u64>) -> Result<()> {
        let generation_id = session.generation_id();
        with_file_lock(&self.lock_path_for(generation_id), || {
            let stored = self.load(generation_id)?.map(|s| s.version());
            check_stored(generation_id, stored, expected_version)?;
            let path = self.path_for(generation_id);
            SessionFile::new(session.clone()).save_to_file(&path)?;
            debug!(path = %path.display(), version = session.version(), "Persisted session");
            Ok(())
        })
    }
}
