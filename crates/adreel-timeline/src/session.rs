//! Editing sessions: one user's working copy of a generation's timeline.

use adreel_core::{AdReelError, RationalTime, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::clip::Clip;

/// Lifecycle of an editing session: `active → saved → exported`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Active,
    Saved,
    Exported,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Saved => "saved",
            Self::Exported => "exported",
        }
    }
}

/// An editing session over a generation's clip list.
///
/// Fields are private: every change goes through the edit operations,
/// which check the caller's `expected_version` and bump `version` on
/// success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditingSession {
    id: Uuid,
    generation_id: String,
    clips: Vec<Clip>,
    /// Auto-generated clip list the session started from.
    original_clips: Vec<Clip>,
    version: u64,
    status: SessionStatus,
}

impl EditingSession {
    /// First version number of a fresh session.
    pub const INITIAL_VERSION: u64 = 1;

    /// Create a session from the auto-generated clip list.
    pub fn new(generation_id: impl Into<String>, clips: Vec<Clip>) -> Result<Self> {
        for clip in &clips {
            clip.validate()?;
        }
        Ok(Self {
            id: Uuid::new_v4(),
            generation_id: generation_id.into(),
            original_clips: clips.clone(),
            clips,
            version: Self::INITIAL_VERSION,
            status: SessionStatus::Active,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn generation_id(&self) -> &str {
        &self.generation_id
    }

    /// Clips in timeline order.
    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    /// The clip list the session was created with.
    pub fn original_clips(&self) -> &[Clip] {
        &self.original_clips
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Find a clip by id.
    pub fn clip(&self, id: Uuid) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id)
    }

    /// Position of a clip in the timeline.
    pub fn clip_index(&self, id: Uuid) -> Option<usize> {
        self.clips.iter().position(|c| c.id == id)
    }

    /// Sum of rendered clip durations.
    pub fn total_duration(&self) -> RationalTime {
        self.clips.iter().map(Clip::duration).sum()
    }

    /// Whether at least one edit separates the clip list from the original.
    pub fn has_edits(&self) -> bool {
        self.clips != self.original_clips
    }

    /// Reject the write if another mutation advanced the version first.
    pub fn check_version(&self, expected: u64) -> Result<()> {
        if expected != self.version {
            return Err(AdReelError::StaleWriteConflict {
                expected,
                actual: self.version,
            });
        }
        Ok(())
    }

    /// Replace the clip list with a caller snapshot (or keep the in-memory
    /// list when `snapshot` is `None`) and move to `saved`.
    pub fn save(&mut self, expected_version: u64, snapshot: Option<Vec<Clip>>) -> Result<()> {
        self.check_version(expected_version)?;
        if let Some(clips) = snapshot {
            for (i, clip) in clips.iter().enumerate() {
                clip.validate().map_err(|e| {
                    AdReelError::InvalidEditingState(format!("entry {i}: {e}"))
                })?;
            }
            let mut seen = std::collections::HashSet::new();
            if let Some(dup) = clips.iter().find(|c| !seen.insert(c.id)) {
                return Err(AdReelError::InvalidEditingState(format!(
                    "clip id {} appears more than once",
                    dup.id
                )));
            }
            self.clips = clips;
        }
        self.status = SessionStatus::Saved;
        self.bump_version();
        Ok(())
    }

    /// Move a saved, edited session to `exported`.
    pub fn mark_exported(&mut self, expected_version: u64) -> Result<()> {
        self.check_version(expected_version)?;
        if self.status != SessionStatus::Saved {
            return Err(AdReelError::InvalidEditingState(format!(
                "session must be saved before export (status is {})",
                self.status.as_str()
            )));
        }
        if !self.has_edits() {
            return Err(AdReelError::InvalidEditingState(
                "session has no edits to export".into(),
            ));
        }
        self.status = SessionStatus::Exported;
        self.bump_version();
        Ok(())
    }

    /// Mutable clip list for the edit operations.
    pub(crate) fn clips_mut(&mut self) -> &mut Vec<Clip> {
        &mut self.clips
    }

    /// Record a successful mutation. Edits after a save or export put the
    /// session back into `active`.
    pub(crate) fn commit_edit(&mut self) {
        self.status = SessionStatus::Active;
        self.bump_version();
    }

    fn bump_version(&mut self) {
        self.version += 1;
        debug!(session = %self.id, version = self.version, "Session version bumped");
    }
}
