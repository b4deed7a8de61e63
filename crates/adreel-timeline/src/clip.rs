//! Clip types for the timeline.

use adreel_core::time::{option_seconds, seconds};
use adreel_core::{AdReelError, RationalTime, Result, TimeRange};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

/// Reference to a rendered media file.
///
/// `origin` is the position on the original timeline where the file's
/// first frame sits, so a timeline time `t` maps to `t - origin` inside the
/// file. A source covers the timeline from its origin up to the next
/// source's origin (or the clip end).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSource {
    /// Path to the media file
    pub path: String,
    /// Timeline position of the file's first frame
    #[serde(with = "seconds")]
    pub origin: RationalTime,
}

impl MediaSource {
    /// Create a new media source.
    pub fn new(path: impl Into<String>, origin: RationalTime) -> Self {
        Self {
            path: path.into(),
            origin,
        }
    }
}

/// A clip on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    /// Stable clip ID
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Scene this clip came from (ordering hint only)
    pub scene_number: u32,
    /// Start on the original timeline
    #[serde(with = "seconds")]
    pub start_time: RationalTime,
    /// End on the original timeline (exclusive)
    #[serde(with = "seconds")]
    pub end_time: RationalTime,
    /// Rendered sub-range start, if trimmed
    #[serde(with = "option_seconds", default, skip_serializing_if = "Option::is_none")]
    pub trim_start: Option<RationalTime>,
    /// Rendered sub-range end, if trimmed
    #[serde(with = "option_seconds", default, skip_serializing_if = "Option::is_none")]
    pub trim_end: Option<RationalTime>,
    /// Underlying rendered media, ordered by origin
    #[serde(default)]
    pub media: SmallVec<[MediaSource; 2]>,
    /// Split times applied to this clip's ancestors, oldest first (seconds)
    #[serde(default)]
    pub split_points: Vec<f64>,
    /// Clip this one was split from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_from: Option<Uuid>,
    /// Clips absorbed into this one by merges
    #[serde(default)]
    pub merged_with: Vec<Uuid>,
}

impl Clip {
    /// Create a clip covering `[start, end)` of one rendered media file
    /// whose first frame sits at `start`.
    pub fn new(
        scene_number: u32,
        path: impl Into<String>,
        start: RationalTime,
        end: RationalTime,
    ) -> Self {
        let mut media = SmallVec::new();
        media.push(MediaSource::new(path, start));
        Self {
            id: Uuid::new_v4(),
            scene_number,
            start_time: start,
            end_time: end,
            trim_start: None,
            trim_end: None,
            media,
            split_points: Vec::new(),
            split_from: None,
            merged_with: Vec::new(),
        }
    }

    /// Convenience constructor taking float seconds.
    pub fn from_seconds(scene_number: u32, path: impl Into<String>, start: f64, end: f64) -> Self {
        Self::new(
            scene_number,
            path,
            RationalTime::from_seconds_f64(start),
            RationalTime::from_seconds_f64(end),
        )
    }

    /// The range actually rendered: the trim range when set, else the full
    /// clip range.
    pub fn active_range(&self) -> TimeRange {
        TimeRange::from_start_end(self.active_start(), self.active_end())
    }

    /// Start of the rendered range.
    pub fn active_start(&self) -> RationalTime {
        self.trim_start.unwrap_or(self.start_time)
    }

    /// End of the rendered range.
    pub fn active_end(&self) -> RationalTime {
        self.trim_end.unwrap_or(self.end_time)
    }

    /// Rendered duration: `trim_end - trim_start` when trimmed, else
    /// `end_time - start_time`.
    pub fn duration(&self) -> RationalTime {
        self.active_end() - self.active_start()
    }

    /// Full range on the original timeline, ignoring trims.
    pub fn full_range(&self) -> TimeRange {
        TimeRange::from_start_end(self.start_time, self.end_time)
    }

    /// Whether a trim sub-range is set.
    pub fn is_trimmed(&self) -> bool {
        self.trim_start.is_some() || self.trim_end.is_some()
    }

    /// Primary media path (the first source).
    pub fn media_path(&self) -> Option<&str> {
        self.media.first().map(|m| m.path.as_str())
    }

    /// Check the clip's temporal invariants.
    ///
    /// `start_time < end_time`; when trimmed,
    /// `start_time <= trim_start < trim_end <= end_time`.
    pub fn validate(&self) -> Result<()> {
        if self.start_time >= self.end_time {
            return Err(AdReelError::InvalidEditingState(format!(
                "clip {}: start_time {} must be before end_time {}",
                self.id, self.start_time, self.end_time
            )));
        }
        let (ts, te) = (self.active_start(), self.active_end());
        if ts < self.start_time {
            return Err(AdReelError::InvalidEditingState(format!(
                "clip {}: trim_start {} is before start_time {}",
                self.id, ts, self.start_time
            )));
        }
        if te > self.end_time {
            return Err(AdReelError::InvalidEditingState(format!(
                "clip {}: trim_end {} is after end_time {}",
                self.id, te, self.end_time
            )));
        }
        if ts >= te {
            return Err(AdReelError::InvalidEditingState(format!(
                "clip {}: trim_start {} must be before trim_end {}",
                self.id, ts, te
            )));
        }
        if self.media.windows(2).any(|w| w[0].origin > w[1].origin) {
            return Err(AdReelError::InvalidEditingState(format!(
                "clip {}: media sources are not ordered by origin",
                self.id
            )));
        }
        Ok(())
    }

    /// Media sources that cover any part of `range`.
    pub(crate) fn sources_overlapping(&self, range: TimeRange) -> SmallVec<[MediaSource; 2]> {
        let mut out = SmallVec::new();
        for (i, src) in self.media.iter().enumerate() {
            let cover_end = self
                .media
                .get(i + 1)
                .map(|next| next.origin)
                .unwrap_or(self.end_time.max(range.end()));
            let cover = TimeRange::from_start_end(src.origin, cover_end);
            if cover.overlaps(range) {
                out.push(src.clone());
            }
        }
        out
    }
}
