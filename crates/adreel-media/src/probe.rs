//! Media file probing to get metadata without a full decode.

use adreel_core::{AdReelError, FrameRate, RationalTime, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Information about a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// File path
    pub path: String,
    /// Duration of the video stream
    #[serde(with = "adreel_core::time::seconds")]
    pub duration: RationalTime,
    pub frame_rate: FrameRate,
    pub width: u32,
    pub height: u32,
    /// Container format
    pub format: String,
    pub has_audio: bool,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    streams: Option<Vec<FfprobeStream>>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    format_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
}

/// Run ffprobe on `path`.
pub fn probe_file(ffprobe: &Path, path: &Path) -> Result<MediaInfo> {
    if !path.exists() {
        return Err(AdReelError::NotFound(format!(
            "File not found: {}",
            path.display()
        )));
    }

    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| AdReelError::Media(format!("Failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(AdReelError::Decoder(format!(
            "ffprobe failed on {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let info = parse_ffprobe_output(&path.to_string_lossy(), &output.stdout)?;
    debug!(path = %path.display(), duration = %info.duration, fps = %info.frame_rate, "Probed media");
    Ok(info)
}

/// Parse ffprobe's JSON into [`MediaInfo`].
pub(crate) fn parse_ffprobe_output(path: &str, json: &[u8]) -> Result<MediaInfo> {
    let output: FfprobeOutput = serde_json::from_slice(json)
        .map_err(|e| AdReelError::Decoder(format!("Failed to parse ffprobe output: {e}")))?;

    let streams = output.streams.unwrap_or_default();
    let video = streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| AdReelError::Decoder(format!("{path} has no video stream")))?;
    let has_audio = streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let duration = video
        .duration
        .as_deref()
        .or(output.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok())
        .and_then(RationalTime::try_from_seconds_f64)
        .unwrap_or(RationalTime::ZERO);

    let frame_rate = video
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or_default();

    Ok(MediaInfo {
        path: path.to_string(),
        duration,
        frame_rate,
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
        format: output
            .format
            .and_then(|f| f.format_name)
            .unwrap_or_default(),
        has_audio,
    })
}

/// Parse an ffprobe rate string such as `30/1` or `24000/1001`.
pub(crate) fn parse_frame_rate(raw: &str) -> Option<FrameRate> {
    let (num, den) = raw.split_once('/')?;
    let num: u32 = num.trim().parse().ok()?;
    let den: u32 = den.trim().parse().ok()?;
    if num == 0 || den == 0 {
        return None;
    }
    Some(FrameRate::new(num, den))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "video", "codec_name": "h264",
             "width": 1080, "height": 1920, "r_frame_rate": "24/1",
             "avg_frame_rate": "24/1", "duration": "5.000000"},
            {"index": 1, "codec_type": "audio", "codec_name": "aac"}
        ],
        "format": {"format_name": "mov,mp4,m4a,3gp,3g2,mj2", "duration": "5.021000"}
    }"#;

    #[test]
    fn test_parse_sample() {
        let info = parse_ffprobe_output("scene_1.mp4", SAMPLE.as_bytes()).unwrap();
        assert_eq!(info.duration, RationalTime::from_secs(5));
        assert_eq!(info.frame_rate, FrameRate::FPS_24);
        assert_eq!((info.width, info.height), (1080, 1920));
        assert!(info.has_audio);
    }

    #[test]
    fn test_audio_only_is_rejected() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {}}"#;
        assert!(parse_ffprobe_output("a.m4a", json.as_bytes()).is_err());
    }

    #[test]
    fn test_falls_back_to_container_duration() {
        let json = r#"{"streams": [{"codec_type": "video", "r_frame_rate": "30000/1001",
                       "avg_frame_rate": "0/0"}],
                       "format": {"duration": "2.5"}}"#;
        let info = parse_ffprobe_output("b.mp4", json.as_bytes()).unwrap();
        assert_eq!(info.duration, RationalTime::new(5, 2));
        assert_eq!(info.frame_rate, FrameRate::FPS_29_97);
    }

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("24000/1001"), Some(FrameRate::FPS_23_976));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("garbage"), None);
    }

    #[test]
    fn test_missing_file() {
        let err = probe_file(Path::new("ffprobe"), Path::new("/definitely/not/here.mp4")).unwrap_err();
        assert!(matches!(err, AdReelError::NotFound(_)));
    }
}
