//! The media I/O seam used by rendering and quality evaluation.

use adreel_core::{AdReelError, CancelToken, FrameBuffer, FrameRate, RationalTime, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::decoder::{self, DecodeWindow};
use crate::export::{ConcatRequest, EncodeJob, EncodeSettings};
use crate::probe::{self, MediaInfo};

/// Probe, decode and encode operations on media files.
///
/// Every call blocks until the work is done; async callers run them on a
/// blocking thread.
pub trait MediaBackend: Send + Sync {
    /// Read container and stream metadata.
    fn probe(&self, path: &Path) -> Result<MediaInfo>;

    /// Decode a time window resampled to the window's rate and size.
    fn decode_window(&self, path: &Path, window: &DecodeWindow) -> Result<Vec<FrameBuffer>>;

    /// Decode the frame shown at `time`.
    fn decode_frame_at(
        &self,
        path: &Path,
        time: RationalTime,
        frame_rate: FrameRate,
        size: (u32, u32),
    ) -> Result<FrameBuffer>;

    /// Encode frames into a new file.
    fn encode_frames(
        &self,
        frames: &[FrameBuffer],
        settings: &EncodeSettings,
        output: &Path,
        cancel: &CancelToken,
    ) -> Result<()>;

    /// Concatenate windows of several files into one output.
    fn concat(&self, request: &ConcatRequest) -> Result<()>;
}

/// Backend driving the `ffmpeg` and `ffprobe` executables.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegBackend {
    /// Use explicit executable paths.
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Find the executables: an explicit `ffmpeg` override (with `ffprobe`
    /// beside it), then `PATH`, then the ffmpeg-sidecar download location.
    pub fn locate(ffmpeg_override: Option<&Path>) -> Result<Self> {
        let ffmpeg = match ffmpeg_override {
            Some(path) => path.to_path_buf(),
            None => which::which("ffmpeg").unwrap_or_else(|_| ffmpeg_sidecar::paths::ffmpeg_path()),
        };
        if !ffmpeg.exists() && which::which(&ffmpeg).is_err() {
            return Err(AdReelError::NotFound(format!(
                "ffmpeg executable not found at {}",
                ffmpeg.display()
            )));
        }

        let sibling = ffmpeg.with_file_name(format!("ffprobe{}", std::env::consts::EXE_SUFFIX));
        let ffprobe = if sibling.exists() {
            sibling
        } else {
            which::which("ffprobe").map_err(|e| {
                AdReelError::NotFound(format!("ffprobe executable not found: {e}"))
            })?
        };

        info!(ffmpeg = %ffmpeg.display(), ffprobe = %ffprobe.display(), "Located FFmpeg");
        Ok(Self::new(ffmpeg, ffprobe))
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg
    }
}

impl MediaBackend for FfmpegBackend {
    fn probe(&self, path: &Path) -> Result<MediaInfo> {
        probe::probe_file(&self.ffprobe, path)
    }

    fn decode_window(&self, path: &Path, window: &DecodeWindow) -> Result<Vec<FrameBuffer>> {
        decoder::decode_window(&self.ffmpeg, path, window)
    }

    fn decode_frame_at(
        &self,
        path: &Path,
        time: RationalTime,
        frame_rate: FrameRate,
        size: (u32, u32),
    ) -> Result<FrameBuffer> {
        decoder::decode_frame_at(&self.ffmpeg, path, time, frame_rate, size)
    }

    fn encode_frames(
        &self,
        frames: &[FrameBuffer],
        settings: &EncodeSettings,
        output: &Path,
        cancel: &CancelToken,
    ) -> Result<()> {
        EncodeJob::new(output, settings.clone()).run(&self.ffmpeg, frames, cancel)
    }

    fn concat(&self, request: &ConcatRequest) -> Result<()> {
        request.run(&self.ffmpeg)
    }
}
