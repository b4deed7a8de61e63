//! Media checks run before and after compositing.

use adreel_core::{AdReelError, FrameRate, RationalTime, Result, TimeRange};
use adreel_media::MediaBackend;
use std::path::Path;
use tracing::debug;

/// Frames decoded for validation are scaled down to this size.
const PROBE_SIZE: (u32, u32) = (64, 64);

/// Check that `path` can be used for `range` (the whole file when `None`):
/// the window has positive duration, lies inside the file, and both its
/// first frame and a frame near its end decode.
///
/// Returns the checked window.
pub fn validate_media(
    backend: &dyn MediaBackend,
    path: &Path,
    range: Option<TimeRange>,
    frame_rate: FrameRate,
) -> Result<TimeRange> {
    let info = backend.probe(path)?;
    if !info.duration.is_positive() {
        return Err(AdReelError::Decoder(format!(
            "duration is {}, expected a positive length",
            info.duration
        )));
    }
    let range = range.unwrap_or(TimeRange::new(RationalTime::ZERO, info.duration));
    if !range.duration.is_positive() {
        return Err(AdReelError::Decoder(format!(
            "window {range} has no duration"
        )));
    }
    if range.start < RationalTime::ZERO || range.end() > info.duration {
        return Err(AdReelError::Decoder(format!(
            "window {range} is outside the file (duration {})",
            info.duration
        )));
    }

    backend
        .decode_frame_at(path, range.start, frame_rate, PROBE_SIZE)?
        .validate()?;
    let near_end = (range.end() - frame_rate.frame_duration()).max(range.start);
    backend
        .decode_frame_at(path, near_end, frame_rate, PROBE_SIZE)?
        .validate()?;

    debug!(path = %path.display(), %range, "Media validated");
    Ok(range)
}
