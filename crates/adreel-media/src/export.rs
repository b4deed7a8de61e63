//! Encoding pipeline: raw RGBA frames in, H.264 files out.
//!
//! Uses FFmpeg as a subprocess. Frames are piped to stdin as `rawvideo`;
//! the final concatenation runs one `filter_complex` over every piece.

use adreel_core::{AdReelError, CancelToken, FrameBuffer, FrameRate, RationalTime, Result, TimeRange};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;
use tracing::{debug, info};

/// Output encoding parameters shared by segments and the final render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeSettings {
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    /// CRF value for H.264 (0-51, lower = better).
    pub crf: u32,
    /// x264 speed preset.
    pub preset: String,
}

impl Default for EncodeSettings {
    /// Vertical 1080x1920 at 30 fps, the usual short-form ad format.
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            frame_rate: FrameRate::FPS_30,
            crf: 18,
            preset: "veryfast".to_string(),
        }
    }
}

impl EncodeSettings {
    fn codec_args(&self) -> Vec<String> {
        vec![
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            self.preset.clone(),
            "-crf".into(),
            self.crf.to_string(),
            "-pix_fmt".into(),
            "yuv420p".into(),
        ]
    }
}

/// Encode a run of in-memory frames to a file.
#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub output_path: PathBuf,
    pub settings: EncodeSettings,
}

impl EncodeJob {
    pub fn new(output_path: impl Into<PathBuf>, settings: EncodeSettings) -> Self {
        Self {
            output_path: output_path.into(),
            settings,
        }
    }

    /// Build the FFmpeg command arguments.
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pixel_format".into(),
            "rgba".into(),
            "-video_size".into(),
            format!("{}x{}", self.settings.width, self.settings.height),
            "-framerate".into(),
            format!(
                "{}/{}",
                self.settings.frame_rate.numerator, self.settings.frame_rate.denominator
            ),
            "-i".into(),
            "pipe:0".into(),
        ];
        args.extend(self.settings.codec_args());
        args.push(self.output_path.to_string_lossy().into_owned());
        args
    }

    /// Pipe `frames` into FFmpeg. `cancel` is checked every frame.
    pub fn run(&self, ffmpeg: &Path, frames: &[FrameBuffer], cancel: &CancelToken) -> Result<()> {
        if frames.is_empty() {
            return Err(AdReelError::Encoder("no frames to encode".into()));
        }
        let (w, h) = (self.settings.width, self.settings.height);
        if let Some(bad) = frames.iter().find(|f| f.width != w || f.height != h) {
            return Err(AdReelError::Encoder(format!(
                "frame is {}x{}, encoder expects {}x{}",
                bad.width, bad.height, w, h
            )));
        }

        let mut child = Command::new(ffmpeg)
            .args(self.ffmpeg_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AdReelError::Encoder(format!("Failed to spawn ffmpeg: {e}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| AdReelError::Encoder("Failed to open ffmpeg stdin".into()))?;

        let start_time = Instant::now();
        for frame in frames {
            if cancel.is_cancelled() {
                // Drop stdin to signal EOF, then kill
                drop(stdin);
                let _ = child.kill();
                let _ = child.wait();
                return Err(AdReelError::CancelledByUser);
            }
            stdin
                .write_all(&frame.data)
                .map_err(|e| AdReelError::Encoder(format!("Failed to write frame: {e}")))?;
        }

        // Close stdin to signal end-of-stream
        drop(stdin);

        let output = child
            .wait_with_output()
            .map_err(|e| AdReelError::Encoder(format!("Failed to wait for ffmpeg: {e}")))?;
        if !output.status.success() {
            return Err(AdReelError::Encoder(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        debug!(
            path = %self.output_path.display(),
            frames = frames.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Encoded frames"
        );
        Ok(())
    }
}

/// One input of the final concatenation: a window of a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcatPiece {
    pub path: PathBuf,
    /// Window inside the file
    pub range: TimeRange,
}

/// Concatenate pieces into one file, normalising rate and size, with a
/// fade-in over the opening and a fade-out over the closing.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcatRequest {
    pub pieces: Vec<ConcatPiece>,
    pub settings: EncodeSettings,
    pub fade_in: RationalTime,
    pub fade_out: RationalTime,
    pub output_path: PathBuf,
}

fn secs(t: RationalTime) -> String {
    format!("{:.6}", t.to_seconds_f64())
}

impl ConcatRequest {
    /// Total duration of the output.
    pub fn total_duration(&self) -> RationalTime {
        self.pieces.iter().map(|p| p.range.duration).sum()
    }

    /// The `filter_complex` graph.
    pub fn filter_graph(&self) -> String {
        let s = &self.settings;
        let mut graph = String::new();
        for (i, piece) in self.pieces.iter().enumerate() {
            graph.push_str(&format!(
                "[{i}:v]trim=start={}:end={},setpts=PTS-STARTPTS,fps={}/{},scale={}:{},setsar=1,format=yuv420p[v{i}];",
                secs(piece.range.start),
                secs(piece.range.end()),
                s.frame_rate.numerator,
                s.frame_rate.denominator,
                s.width,
                s.height,
            ));
        }
        for i in 0..self.pieces.len() {
            graph.push_str(&format!("[v{i}]"));
        }
        graph.push_str(&format!("concat=n={}:v=1:a=0[cat]", self.pieces.len()));

        let mut fades = Vec::new();
        if self.fade_in.is_positive() {
            fades.push(format!("fade=t=in:st=0:d={}", secs(self.fade_in)));
        }
        if self.fade_out.is_positive() {
            let start = (self.total_duration() - self.fade_out).max(RationalTime::ZERO);
            fades.push(format!(
                "fade=t=out:st={}:d={}",
                secs(start),
                secs(self.fade_out)
            ));
        }
        if fades.is_empty() {
            graph.push_str(";[cat]null[out]");
        } else {
            graph.push_str(&format!(";[cat]{}[out]", fades.join(",")));
        }
        graph
    }

    /// Build the FFmpeg command arguments.
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["-y".into(), "-loglevel".into(), "error".into()];
        for piece in &self.pieces {
            args.push("-i".into());
            args.push(piece.path.to_string_lossy().into_owned());
        }
        args.extend([
            "-filter_complex".into(),
            self.filter_graph(),
            "-map".into(),
            "[out]".into(),
            "-an".into(),
        ]);
        args.extend(self.settings.codec_args());
        args.push(self.output_path.to_string_lossy().into_owned());
        args
    }

    /// Run the concatenation.
    pub fn run(&self, ffmpeg: &Path) -> Result<()> {
        if self.pieces.is_empty() {
            return Err(AdReelError::Encoder("nothing to concatenate".into()));
        }
        let output = Command::new(ffmpeg)
            .args(self.ffmpeg_args())
            .stdin(Stdio::null())
            .output()
            .map_err(|e| AdReelError::Encoder(format!("Failed to spawn ffmpeg: {e}")))?;
        if !output.status.success() {
            return Err(AdReelError::Encoder(format!(
                "ffmpeg concat exited with status {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        info!(
            path = %self.output_path.display(),
            pieces = self.pieces.len(),
            duration = %self.total_duration(),
            "Concatenated output"
        );
        Ok(())
    }
}
