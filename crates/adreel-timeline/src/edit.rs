//! Edit operations on an editing session.
//!
//! Every mutation is an `EditCommand` applied against the version the
//! caller last read. A command whose `expected_version` no longer matches
//! is rejected with `StaleWriteConflict` and leaves the session untouched.

use adreel_core::{AdReelError, RationalTime, Result, TimeRange};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, info};
use uuid::Uuid;

use crate::clip::{Clip, MediaSource};
use crate::config::TimelineConfig;
use crate::session::EditingSession;

/// A timeline mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditCommand {
    /// Set the rendered sub-range of one clip.
    Trim {
        clip_id: Uuid,
        trim_start: f64,
        trim_end: f64,
    },
    /// Divide one clip into two contiguous clips at `split_time`.
    Split { clip_id: Uuid, split_time: f64 },
    /// Combine adjacent clips into one.
    Merge { clip_ids: Vec<Uuid> },
}

/// Clip state produced by a successful edit.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    Trimmed { clip: Clip },
    Split { left: Clip, right: Clip },
    Merged { clip: Clip },
}

impl EditOutcome {
    /// Clips created or changed by the edit.
    pub fn clips(&self) -> Vec<&Clip> {
        match self {
            Self::Trimmed { clip } | Self::Merged { clip } => vec![clip],
            Self::Split { left, right } => vec![left, right],
        }
    }
}

impl EditCommand {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Trim { .. } => "trim",
            Self::Split { .. } => "split",
            Self::Merge { .. } => "merge",
        }
    }

    /// Apply this command to `session`, which must still be at
    /// `expected_version`. On success the version is bumped exactly once.
    pub fn apply(
        &self,
        session: &mut EditingSession,
        expected_version: u64,
        config: &TimelineConfig,
    ) -> Result<EditOutcome> {
        session.check_version(expected_version)?;
        let outcome = match self {
            Self::Trim {
                clip_id,
                trim_start,
                trim_end,
            } => trim(session, *clip_id, *trim_start, *trim_end)?,
            Self::Split {
                clip_id,
                split_time,
            } => split(session, *clip_id, *split_time)?,
            Self::Merge { clip_ids } => merge(session, clip_ids, config)?,
        };
        session.commit_edit();
        info!(
            session = %session.id(),
            op = self.name(),
            version = session.version(),
            clips = session.clips().len(),
            "Applied edit"
        );
        Ok(outcome)
    }
}

fn finite_time(value: f64, what: &str, err: fn(String) -> AdReelError) -> Result<RationalTime> {
    RationalTime::try_from_seconds_f64(value)
        .ok_or_else(|| err(format!("{what} must be a finite number of seconds")))
}

fn trim(session: &mut EditingSession, clip_id: Uuid, start: f64, end: f64) -> Result<EditOutcome> {
    let ts = finite_time(start, "trim_start", AdReelError::InvalidTrimPoints)?;
    let te = finite_time(end, "trim_end", AdReelError::InvalidTrimPoints)?;
    let clip = session
        .clips_mut()
        .iter_mut()
        .find(|c| c.id == clip_id)
        .ok_or_else(|| AdReelError::InvalidTrimPoints(format!("clip {clip_id} not found")))?;

    if ts >= te {
        return Err(AdReelError::InvalidTrimPoints(format!(
            "trim_start {ts} must be before trim_end {te}"
        )));
    }
    if ts < clip.start_time {
        return Err(AdReelError::InvalidTrimPoints(format!(
            "trim_start {ts} is before clip start {}",
            clip.start_time
        )));
    }
    if te > clip.end_time {
        return Err(AdReelError::InvalidTrimPoints(format!(
            "trim_end {te} exceeds clip end {}",
            clip.end_time
        )));
    }

    clip.trim_start = Some(ts);
    clip.trim_end = Some(te);
    debug!(clip = %clip_id, %ts, %te, "Trimmed clip");
    Ok(EditOutcome::Trimmed { clip: clip.clone() })
}

fn split(session: &mut EditingSession, clip_id: Uuid, at: f64) -> Result<EditOutcome> {
    let t = finite_time(at, "split_time", AdReelError::InvalidSplitPoint)?;
    let index = session
        .clip_index(clip_id)
        .ok_or_else(|| AdReelError::InvalidSplitPoint(format!("clip {clip_id} not found")))?;
    let parent = session.clips()[index].clone();

    let active = parent.active_range();
    if t == active.start || t == active.end() {
        return Err(AdReelError::InvalidSplitPoint(format!(
            "split_time {t} cannot be at clip start/end"
        )));
    }
    if !active.contains_strictly(t) {
        return Err(AdReelError::InvalidSplitPoint(format!(
            "split_time {t} is outside clip range {active}"
        )));
    }

    let mut split_points = parent.split_points.clone();
    split_points.push(t.to_seconds_f64());

    let left_range = TimeRange::from_start_end(parent.start_time, t);
    let right_range = TimeRange::from_start_end(t, parent.end_time);

    let left = Clip {
        id: Uuid::new_v4(),
        scene_number: parent.scene_number,
        start_time: parent.start_time,
        end_time: t,
        trim_start: parent.trim_start,
        trim_end: None,
        media: parent.sources_overlapping(left_range),
        split_points: split_points.clone(),
        split_from: Some(parent.id),
        merged_with: parent.merged_with.clone(),
    };
    let right = Clip {
        id: Uuid::new_v4(),
        scene_number: parent.scene_number,
        start_time: t,
        end_time: parent.end_time,
        trim_start: None,
        trim_end: parent.trim_end,
        media: parent.sources_overlapping(right_range),
        split_points,
        split_from: Some(parent.id),
        merged_with: parent.merged_with.clone(),
    };

    let clips = session.clips_mut();
    clips.splice(index..=index, [left.clone(), right.clone()]);
    debug!(clip = %clip_id, %t, left = %left.id, right = %right.id, "Split clip");
    Ok(EditOutcome::Split { left, right })
}

fn merge(
    session: &mut EditingSession,
    clip_ids: &[Uuid],
    config: &TimelineConfig,
) -> Result<EditOutcome> {
    if clip_ids.len() < 2 {
        return Err(AdReelError::InvalidMergeRequest(
            "at least two clips are required".into(),
        ));
    }
    let mut indexed: Vec<(usize, Clip)> = Vec::with_capacity(clip_ids.len());
    for (n, id) in clip_ids.iter().enumerate() {
        if clip_ids[..n].contains(id) {
            return Err(AdReelError::InvalidMergeRequest(format!(
                "clip {id} is listed more than once"
            )));
        }
        let index = session
            .clip_index(*id)
            .ok_or_else(|| AdReelError::InvalidMergeRequest(format!("clip {id} not found")))?;
        indexed.push((index, session.clips()[index].clone()));
    }
    indexed.sort_by_key(|(_, c)| c.active_start());

    let epsilon = config.adjacency_epsilon();
    for pair in indexed.windows(2) {
        let (a, b) = (&pair[0].1, &pair[1].1);
        if !a.active_end().approx_eq(b.active_start(), epsilon) {
            return Err(AdReelError::InvalidMergeRequest(format!(
                "clips are not adjacent: {} ends at {} but {} starts at {}",
                a.id,
                a.active_end(),
                b.id,
                b.active_start()
            )));
        }
    }

    let (first, last) = (&indexed[0].1, &indexed[indexed.len() - 1].1);
    let trimmed = first.is_trimmed() || last.is_trimmed();

    let mut media: SmallVec<[MediaSource; 2]> = SmallVec::new();
    let mut merged_with = Vec::new();
    let mut split_points: Vec<f64> = Vec::new();
    for (_, clip) in &indexed {
        for src in &clip.media {
            if media.last() != Some(src) {
                media.push(src.clone());
            }
        }
        merged_with.push(clip.id);
        for absorbed in &clip.merged_with {
            if !merged_with.contains(absorbed) {
                merged_with.push(*absorbed);
            }
        }
        for p in &clip.split_points {
            if !split_points.contains(p) {
                split_points.push(*p);
            }
        }
    }
    media.sort_by_key(|m| m.origin);
    media.dedup();

    let merged = Clip {
        id: Uuid::new_v4(),
        scene_number: first.scene_number,
        start_time: first.start_time,
        end_time: last.end_time,
        trim_start: trimmed.then(|| first.active_start()),
        trim_end: trimmed.then(|| last.active_end()),
        media,
        split_points,
        split_from: None,
        merged_with,
    };
    merged.validate().map_err(|e| AdReelError::InvalidMergeRequest(e.to_string()))?;

    let insert_at = indexed.iter().map(|(i, _)| *i).min().unwrap_or(0);
    let clips = session.clips_mut();
    clips.retain(|c| !clip_ids.contains(&c.id));
    let insert_at = insert_at.min(clips.len());
    clips.insert(insert_at, merged.clone());
    debug!(merged = %merged.id, inputs = clip_ids.len(), "Merged clips");
    Ok(EditOutcome::Merged { clip: merged })
}
