//! Render output settings.

use adreel_core::{AdReelError, FrameRate, Result};
use adreel_media::EncodeSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Output format and scratch space for a render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Canonical frame rate every clip is normalised to.
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    /// CRF value for H.264 (0-51, lower = better).
    pub crf: u32,
    pub preset: String,
    /// Parent of the per-run scratch directories. System temp dir if unset.
    pub temp_dir: Option<PathBuf>,
    /// Explicit ffmpeg executable.
    pub ffmpeg_path: Option<PathBuf>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        let encode = EncodeSettings::default();
        Self {
            fps: encode.frame_rate.to_fps_f64(),
            width: encode.width,
            height: encode.height,
            crf: encode.crf,
            preset: encode.preset,
            temp_dir: None,
            ffmpeg_path: None,
        }
    }
}

impl RenderSettings {
    /// Encoder settings, checking the numbers make sense.
    pub fn encode_settings(&self) -> Result<EncodeSettings> {
        let frame_rate = FrameRate::from_fps_f64(self.fps).ok_or_else(|| {
            AdReelError::InvalidParameter(format!("fps must be at least one frame per thousand seconds, got {}", self.fps))
        })?;
        if self.width == 0 || self.height == 0 || self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(AdReelError::InvalidParameter(format!(
                "output size must be even and non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.crf > 51 {
            return Err(AdReelError::InvalidParameter(format!(
                "crf must be 0-51, got {}",
                self.crf
            )));
        }
        Ok(EncodeSettings {
            width: self.width,
            height: self.height,
            frame_rate,
            crf: self.crf,
            preset: self.preset.clone(),
        })
    }

    /// Parent directory for scratch files.
    pub fn temp_root(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
