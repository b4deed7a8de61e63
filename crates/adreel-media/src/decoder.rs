//! Video decoder using FFmpeg via ffmpeg-sidecar.
//!
//! Spawns FFmpeg as a subprocess writing `rawvideo`/`rgba` to stdout, so no
//! FFmpeg development headers are needed.

use adreel_core::{AdReelError, FrameBuffer, FrameRate, RationalTime, Result, TimeRange};
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};
use std::path::Path;
use tracing::{debug, warn};

/// A decode request: one time window of one file, resampled to a fixed
/// rate and size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeWindow {
    pub range: TimeRange,
    pub frame_rate: FrameRate,
    pub width: u32,
    pub height: u32,
}

impl DecodeWindow {
    /// Frames expected for this window (at least one).
    pub fn expected_frames(&self) -> usize {
        self.range.duration.to_frames_rounded(self.frame_rate).max(1) as usize
    }

    /// Arguments placed after `-i`.
    pub fn output_args(&self) -> Vec<String> {
        vec![
            "-t".into(),
            format!("{:.6}", self.range.duration.to_seconds_f64()),
            "-vf".into(),
            format!(
                "fps={}/{},scale={}:{},setsar=1",
                self.frame_rate.numerator, self.frame_rate.denominator, self.width, self.height
            ),
            "-an".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgba".into(),
            "-".into(),
        ]
    }
}

/// Decode every frame of `window` from `path`.
pub fn decode_window(ffmpeg: &Path, path: &Path, window: &DecodeWindow) -> Result<Vec<FrameBuffer>> {
    let mut child = FfmpegCommand::new_with_path(ffmpeg)
        .hide_banner()
        .args(["-ss".to_string(), format!("{:.6}", window.range.start.to_seconds_f64())])
        .input(path)
        .args(window.output_args())
        .spawn()
        .map_err(|e| AdReelError::Decoder(format!("Failed to spawn ffmpeg: {e}")))?;

    let events = child
        .iter()
        .map_err(|e| AdReelError::Decoder(format!("Failed to read ffmpeg output: {e}")))?;

    let mut frames = Vec::with_capacity(window.expected_frames());
    let mut errors = Vec::new();
    for event in events {
        match event {
            FfmpegEvent::OutputFrame(frame) => {
                frames.push(FrameBuffer::from_rgba(frame.width, frame.height, frame.data)?);
            }
            FfmpegEvent::Error(msg) | FfmpegEvent::Log(LogLevel::Error | LogLevel::Fatal, msg) => {
                errors.push(msg);
            }
            _ => {}
        }
    }
    let _ = child.wait();

    if frames.is_empty() {
        return Err(AdReelError::Decoder(format!(
            "no frames decoded from {} in {}: {}",
            path.display(),
            window.range,
            errors.join("; ")
        )));
    }
    if !errors.is_empty() {
        warn!(path = %path.display(), errors = errors.len(), first = %errors[0], "Decoder reported errors");
    }
    debug!(path = %path.display(), frames = frames.len(), range = %window.range, "Decoded window");
    Ok(frames)
}

/// Decode the single frame at `time`.
pub fn decode_frame_at(
    ffmpeg: &Path,
    path: &Path,
    time: RationalTime,
    frame_rate: FrameRate,
    size: (u32, u32),
) -> Result<FrameBuffer> {
    let window = DecodeWindow {
        range: TimeRange::new(time, frame_rate.frame_duration()),
        frame_rate,
        width: size.0,
        height: size.1,
    };
    decode_window(ffmpeg, path, &window)?
        .into_iter()
        .next()
        .ok_or_else(|| AdReelError::Decoder(format!("no frame at {time} in {}", path.display())))
}
