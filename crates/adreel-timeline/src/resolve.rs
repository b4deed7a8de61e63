//! Resolve a session's clip list into media intervals for rendering.

use adreel_core::{AdReelError, RationalTime, Result, TimeRange};
use serde::Serialize;
use uuid::Uuid;

use crate::clip::Clip;
use crate::session::EditingSession;

/// One contiguous read from one media file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaInterval {
    /// Clip this interval belongs to
    pub clip_id: Uuid,
    /// Position of that clip in the timeline
    pub clip_index: usize,
    pub scene_number: u32,
    /// Media file to read
    pub path: String,
    /// Start inside the file
    #[serde(with = "adreel_core::time::seconds")]
    pub in_point: RationalTime,
    /// End inside the file (exclusive)
    #[serde(with = "adreel_core::time::seconds")]
    pub out_point: RationalTime,
}

impl MediaInterval {
    pub fn duration(&self) -> RationalTime {
        self.out_point - self.in_point
    }

    /// The interval as a range inside its media file.
    pub fn range(&self) -> TimeRange {
        TimeRange::from_start_end(self.in_point, self.out_point)
    }
}

/// Intervals for every clip of the session, in timeline order.
pub fn resolve_intervals(session: &EditingSession) -> Result<Vec<MediaInterval>> {
    let mut out = Vec::new();
    for (index, clip) in session.clips().iter().enumerate() {
        out.extend(resolve_clip(index, clip)?);
    }
    Ok(out)
}

fn resolve_clip(index: usize, clip: &Clip) -> Result<Vec<MediaInterval>> {
    let active = clip.active_range();
    let mut out = Vec::new();
    let mut covered = active.start;

    for (i, src) in clip.media.iter().enumerate() {
        let cover_end = clip
            .media
            .get(i + 1)
            .map(|next| next.origin)
            .unwrap_or(clip.end_time);
        let cover = TimeRange::from_start_end(src.origin, cover_end);
        let Some(part) = cover.intersection(active) else {
            continue;
        };
        if part.start > covered {
            break;
        }
        out.push(MediaInterval {
            clip_id: clip.id,
            clip_index: index,
            scene_number: clip.scene_number,
            path: src.path.clone(),
            in_point: part.start - src.origin,
            out_point: part.end() - src.origin,
        });
        covered = part.end();
    }

    if covered < active.end() {
        return Err(AdReelError::InvalidEditingState(format!(
            "clip {} has no media covering {}",
            clip.id,
            TimeRange::from_start_end(covered, active.end())
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::MediaSource;
    use crate::config::TimelineConfig;
    use crate::edit::EditCommand;

    fn secs(s: f64) -> RationalTime {
        RationalTime::from_seconds_f64(s)
    }

    #[test]
    fn test_untouched_clips_map_to_whole_files() {
        let session = EditingSession::new(
            "g",
            vec![
                Clip::from_seconds(1, "s1.mp4", 0.0, 5.0),
                Clip::from_seconds(2, "s2.mp4", 5.0, 9.0),
            ],
        )
        .unwrap();
        let intervals = resolve_intervals(&session).unwrap();
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[1].path, "s2.mp4");
        assert_eq!(intervals[1].in_point, RationalTime::ZERO);
        assert_eq!(intervals[1].out_point, secs(4.0));
    }

    #[test]
    fn test_trim_maps_to_local_offsets() {
        let mut session =
            EditingSession::new("g", vec![Clip::from_seconds(2, "s2.mp4", 5.0, 10.0)]).unwrap();
        let id = session.clips()[0].id;
        EditCommand::Trim {
            clip_id: id,
            trim_start: 6.0,
            trim_end: 8.5,
        }
        .apply(&mut session, 1, &TimelineConfig::default())
        .unwrap();
        let intervals = resolve_intervals(&session).unwrap();
        assert_eq!(intervals[0].in_point, secs(1.0));
        assert_eq!(intervals[0].out_point, secs(3.5));
    }

    #[test]
    fn test_merged_clip_spans_two_files() {
        let mut session = EditingSession::new(
            "g",
            vec![
                Clip::from_seconds(1, "s1.mp4", 0.0, 5.0),
                Clip::from_seconds(2, "s2.mp4", 5.0, 10.0),
            ],
        )
        .unwrap();
        let ids = session.clips().iter().map(|c| c.id).collect();
        EditCommand::Merge { clip_ids: ids }
            .apply(&mut session, 1, &TimelineConfig::default())
            .unwrap();
        let intervals = resolve_intervals(&session).unwrap();
        assert_eq!(intervals.len(), 2);
        assert!(intervals.iter().all(|iv| iv.clip_index == 0));
        let total: RationalTime = intervals.iter().map(MediaInterval::duration).sum();
        assert_eq!(total, secs(10.0));
    }

    #[test]
    fn test_missing_media_is_invalid_state() {
        let mut clip = Clip::from_seconds(1, "s1.mp4", 0.0, 5.0);
        clip.media.clear();
        clip.media.push(MediaSource::new("late.mp4", secs(2.0)));
        let session = EditingSession::new("g", vec![clip]).unwrap();
        let err = resolve_intervals(&session).unwrap_err();
        assert!(matches!(err, AdReelError::InvalidEditingState(_)));
    }
}
