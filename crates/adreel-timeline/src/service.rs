//! Request-facing session operations.
//!
//! Each call loads the stored session, applies one operation against the
//! caller's version token and writes it back with a compare-and-swap, so a
//! mutation based on a stale read never lands.

use adreel_core::{AdReelError, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::clip::Clip;
use crate::config::TimelineConfig;
use crate::edit::{EditCommand, EditOutcome};
use crate::session::EditingSession;
use crate::store::SessionStore;

/// Session operations over a [`SessionStore`].
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    config: TimelineConfig,
}

impl SessionService {
    pub fn new(store: Arc<dyn SessionStore>, config: TimelineConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    /// Load a session, failing if none exists.
    pub fn load(&self, generation_id: &str) -> Result<EditingSession> {
        self.store.load(generation_id)?.ok_or_else(|| {
            AdReelError::NotFound(format!("no editing session for generation {generation_id}"))
        })
    }

    /// Return the stored session, creating it from `scenes` on first access.
    pub fn open_or_create(&self, generation_id: &str, scenes: Vec<Clip>) -> Result<EditingSession> {
        if let Some(existing) = self.store.load(generation_id)? {
            return Ok(existing);
        }
        let session = EditingSession::new(generation_id, scenes)?;
        match self.store.save(&session, None) {
            Ok(()) => {
                info!(generation = generation_id, clips = session.clips().len(), "Created editing session");
                Ok(session)
            }
            // Another request created it between our load and save.
            Err(AdReelError::StaleWriteConflict { .. }) => self.load(generation_id),
            Err(e) => Err(e),
        }
    }

    /// Apply one edit and persist the result.
    pub fn apply(
        &self,
        generation_id: &str,
        command: &EditCommand,
        expected_version: u64,
    ) -> Result<(EditingSession, EditOutcome)> {
        let mut session = self.load(generation_id)?;
        let stored_version = session.version();
        let outcome = command.apply(&mut session, expected_version, &self.config)?;
        self.store.save(&session, Some(stored_version))?;
        Ok((session, outcome))
    }

    /// Save the session, optionally replacing its clip list with a caller
    /// snapshot.
    ///
    /// The snapshot is either a JSON array of clips or an object with a
    /// `clips` array. Every entry must parse and validate as a clip.
    pub fn save(
        &self,
        generation_id: &str,
        expected_version: u64,
        snapshot: Option<serde_json::Value>,
    ) -> Result<EditingSession> {
        let clips = snapshot.map(parse_snapshot).transpose()?;
        let mut session = self.load(generation_id)?;
        let stored_version = session.version();
        session.save(expected_version, clips)?;
        self.store.save(&session, Some(stored_version))?;
        info!(generation = generation_id, version = session.version(), "Saved editing session");
        Ok(session)
    }

    /// Move a saved session to `exported`.
    pub fn mark_exported(&self, generation_id: &str, expected_version: u64) -> Result<EditingSession> {
        let mut session = self.load(generation_id)?;
        let stored_version = session.version();
        session.mark_exported(expected_version)?;
        self.store.save(&session, Some(stored_version))?;
        Ok(session)
    }
}

fn parse_snapshot(value: serde_json::Value) -> Result<Vec<Clip>> {
    let entries = match value {
        serde_json::Value::Array(entries) => entries,
        serde_json::Value::Object(mut map) => match map.remove("clips") {
            Some(serde_json::Value::Array(entries)) => entries,
            _ => {
                return Err(AdReelError::InvalidEditingState(
                    "editing state must contain a `clips` array".into(),
                ))
            }
        },
        _ => {
            return Err(AdReelError::InvalidEditingState(
                "editing state must be a list of clips".into(),
            ))
        }
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            serde_json::from_value::<Clip>(entry).map_err(|e| {
                warn!(entry = i, error = %e, "Rejected editing state entry");
                AdReelError::InvalidEditingState(format!("entry {i}: {e}"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStatus;
    use crate::store::MemorySessionStore;

    fn service() -> SessionService {
        SessionService::new(Arc::new(MemorySessionStore::new()), TimelineConfig::default())
    }

    fn scenes() -> Vec<Clip> {
        vec![
            Clip::from_seconds(1, "s1.mp4", 0.0, 5.0),
            Clip::from_seconds(2, "s2.mp4", 5.0, 10.0),
        ]
    }

    #[test]
    fn test_open_or_create_is_idempotent() {
        let svc = service();
        let first = svc.open_or_create("g", scenes()).unwrap();
        let second = svc.open_or_create("g", Vec::new()).unwrap();
        assert_eq!(first.id(), second.id());
        assert_eq!(second.clips().len(), 2);
    }

    #[test]
    fn test_concurrent_writers_one_wins() {
        let svc = service();
        let s = svc.open_or_create("g", scenes()).unwrap();
        let id = s.clips()[0].id;
        let trim = EditCommand::Trim {
            clip_id: id,
            trim_start: 1.0,
            trim_end: 4.0,
        };
        svc.apply("g", &trim, 1).unwrap();
        // Second request still holds version 1.
        let err = svc.apply("g", &trim, 1).unwrap_err();
        assert!(matches!(err, AdReelError::StaleWriteConflict { .. }));
        assert_eq!(svc.load("g").unwrap().version(), 2);
    }

    #[test]
    fn test_save_with_snapshot() {
        let svc = service();
        svc.open_or_create("g", scenes()).unwrap();
        let snapshot = serde_json::json!({
            "clips": [
                {"scene_number": 1, "start_time": 0.0, "end_time": 3.0,
                 "media": [{"path": "s1.mp4", "origin": 0.0}]}
            ]
        });
        let saved = svc.save("g", 1, Some(snapshot)).unwrap();
        assert_eq!(saved.status(), SessionStatus::Saved);
        assert_eq!(saved.clips().len(), 1);

        let exported = svc.mark_exported("g", 2).unwrap();
        assert_eq!(exported.status(), SessionStatus::Exported);
    }

    #[test]
    fn test_save_rejects_malformed_entry() {
        let svc = service();
        svc.open_or_create("g", scenes()).unwrap();
        let snapshot = serde_json::json!([{"scene_number": "one"}]);
        let err = svc.save("g", 1, Some(snapshot)).unwrap_err();
        assert!(matches!(err, AdReelError::InvalidEditingState(_)));
        assert!(err.to_string().contains("entry 0"));
        assert_eq!(svc.load("g").unwrap().status(), SessionStatus::Active);
    }

    #[test]
    fn test_missing_session() {
        let err = service().load("nope").unwrap_err();
        assert!(matches!(err, AdReelError::NotFound(_)));
    }
}
