//! In-memory media backend.
//!
//! Files are synthetic solid-colour clips registered by path. Encoding and
//! concatenation register their outputs, so a whole render can run without
//! touching FFmpeg.

use adreel_core::{AdReelError, CancelToken, FrameBuffer, FrameRate, RationalTime, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;

use crate::backend::MediaBackend;
use crate::decoder::DecodeWindow;
use crate::export::{ConcatRequest, EncodeSettings};
use crate::probe::MediaInfo;

/// A synthetic clip.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryClip {
    pub duration: RationalTime,
    pub frame_rate: FrameRate,
    pub width: u32,
    pub height: u32,
    /// Colour of every frame
    pub color: [u8; 4],
    /// Probes succeed but every decode fails
    pub corrupt: bool,
}

impl MemoryClip {
    pub fn new(duration: RationalTime, color: [u8; 4]) -> Self {
        Self {
            duration,
            frame_rate: FrameRate::FPS_30,
            width: 16,
            height: 16,
            color,
            corrupt: false,
        }
    }
}

#[derive(Default)]
struct State {
    clips: HashMap<String, MemoryClip>,
    concats: Vec<ConcatRequest>,
    decodes: usize,
}

/// Backend over synthetic clips.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a grey clip of `seconds` length.
    pub fn add_clip(&self, path: impl AsRef<Path>, seconds: f64) {
        self.insert(
            path,
            MemoryClip::new(RationalTime::from_seconds_f64(seconds), [128, 128, 128, 255]),
        );
    }

    /// Register a clip whose frames cannot be decoded.
    pub fn add_corrupt(&self, path: impl AsRef<Path>, seconds: f64) {
        let mut clip = MemoryClip::new(RationalTime::from_seconds_f64(seconds), [0, 0, 0, 255]);
        clip.corrupt = true;
        self.insert(path, clip);
    }

    pub fn insert(&self, path: impl AsRef<Path>, clip: MemoryClip) {
        self.state.lock().clips.insert(key(path.as_ref()), clip);
    }

    pub fn clip(&self, path: impl AsRef<Path>) -> Option<MemoryClip> {
        self.state.lock().clips.get(&key(path.as_ref())).cloned()
    }

    /// Concatenations run so far, oldest first.
    pub fn concats(&self) -> Vec<ConcatRequest> {
        self.state.lock().concats.clone()
    }

    /// Number of decode calls served.
    pub fn decode_count(&self) -> usize {
        self.state.lock().decodes
    }

    fn lookup(&self, path: &Path) -> Result<MemoryClip> {
        self.clip(path)
            .ok_or_else(|| AdReelError::NotFound(format!("File not found: {}", path.display())))
    }

    fn decodable(&self, path: &Path) -> Result<MemoryClip> {
        let clip = self.lookup(path)?;
        self.state.lock().decodes += 1;
        if clip.corrupt {
            return Err(AdReelError::Decoder(format!(
                "invalid data found when processing {}",
                path.display()
            )));
        }
        Ok(clip)
    }
}

impl MediaBackend for MemoryBackend {
    fn probe(&self, path: &Path) -> Result<MediaInfo> {
        let clip = self.lookup(path)?;
        Ok(MediaInfo {
            path: key(path),
            duration: clip.duration,
            frame_rate: clip.frame_rate,
            width: clip.width,
            height: clip.height,
            format: "memory".into(),
            has_audio: false,
        })
    }

    fn decode_window(&self, path: &Path, window: &DecodeWindow) -> Result<Vec<FrameBuffer>> {
        let clip = self.decodable(path)?;
        if window.range.start >= clip.duration || window.range.start < RationalTime::ZERO {
            return Err(AdReelError::Decoder(format!(
                "window {} is outside {} ({})",
                window.range,
                path.display(),
                clip.duration
            )));
        }
        let frame = FrameBuffer::solid(window.width, window.height, clip.color);
        Ok(vec![frame; window.expected_frames()])
    }

    fn decode_frame_at(
        &self,
        path: &Path,
        time: RationalTime,
        _frame_rate: FrameRate,
        size: (u32, u32),
    ) -> Result<FrameBuffer> {
        let clip = self.decodable(path)?;
        if time < RationalTime::ZERO || time >= clip.duration {
            return Err(AdReelError::Decoder(format!(
                "no frame at {time} in {}",
                path.display()
            )));
        }
        Ok(FrameBuffer::solid(size.0, size.1, clip.color))
    }

    fn encode_frames(
        &self,
        frames: &[FrameBuffer],
        settings: &EncodeSettings,
        output: &Path,
        cancel: &CancelToken,
    ) -> Result<()> {
        cancel.check()?;
        let first = frames
            .first()
            .ok_or_else(|| AdReelError::Encoder("no frames to encode".into()))?;
        let color = if first.is_empty() {
            [0, 0, 0, 255]
        } else {
            first.pixel(0, 0)
        };
        let duration = RationalTime::from_frames(frames.len() as i64, settings.frame_rate);
        self.insert(
            output,
            MemoryClip {
                duration,
                frame_rate: settings.frame_rate,
                width: first.width,
                height: first.height,
                color,
                corrupt: false,
            },
        );
        Ok(())
    }

    fn concat(&self, request: &ConcatRequest) -> Result<()> {
        for piece in &request.pieces {
            let clip = self.lookup(&piece.path)?;
            if piece.range.end() > clip.duration {
                return Err(AdReelError::Encoder(format!(
                    "piece {} ends after {} ({})",
                    piece.range,
                    piece.path.display(),
                    clip.duration
                )));
            }
        }
        let settings = &request.settings;
        let clip = MemoryClip {
            duration: request.total_duration(),
            frame_rate: settings.frame_rate,
            width: settings.width,
            height: settings.height,
            color: [128, 128, 128, 255],
            corrupt: false,
        };
        let mut state = self.state.lock();
        state.clips.insert(key(&request.output_path), clip);
        state.concats.push(request.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::ConcatPiece;
    use adreel_core::TimeRange;
    use std::path::PathBuf;

    #[test]
    fn test_probe_and_decode() {
        let backend = MemoryBackend::new();
        backend.add_clip("a.mp4", 2.0);
        let info = backend.probe(Path::new("a.mp4")).unwrap();
        assert_eq!(info.duration, RationalTime::from_secs(2));

        let window = DecodeWindow {
            range: TimeRange::new(RationalTime::from_secs(1), RationalTime::new(1, 2)),
            frame_rate: FrameRate::FPS_30,
            width: 8,
            height: 8,
        };
        let frames = backend.decode_window(Path::new("a.mp4"), &window).unwrap();
        assert_eq!(frames.len(), 15);
        assert_eq!(frames[0].width, 8);
        assert!(backend
            .decode_frame_at(Path::new("a.mp4"), RationalTime::from_secs(2), FrameRate::FPS_30, (8, 8))
            .is_err());
    }

    #[test]
    fn test_corrupt_clip_fails_decode_not_probe() {
        let backend = MemoryBackend::new();
        backend.add_corrupt("bad.mp4", 3.0);
        assert!(backend.probe(Path::new("bad.mp4")).is_ok());
        let err = backend
            .decode_frame_at(Path::new("bad.mp4"), RationalTime::ZERO, FrameRate::FPS_30, (8, 8))
            .unwrap_err();
        assert!(matches!(err, AdReelError::Decoder(_)));
    }

    #[test]
    fn test_encode_registers_output() {
        let backend = MemoryBackend::new();
        let frames = vec![FrameBuffer::solid(4, 4, [9, 9, 9, 255]); 15];
        backend
            .encode_frames(&frames, &EncodeSettings::default(), Path::new("seg.mp4"), &CancelToken::new())
            .unwrap();
        let clip = backend.clip("seg.mp4").unwrap();
        assert_eq!(clip.duration, RationalTime::new(1, 2));
        assert_eq!(clip.color, [9, 9, 9, 255]);
    }

    #[test]
    fn test_concat_sums_pieces() {
        let backend = MemoryBackend::new();
        backend.add_clip("a.mp4", 5.0);
        backend.add_clip("b.mp4", 5.0);
        let request = ConcatRequest {
            pieces: vec![
                ConcatPiece {
                    path: PathBuf::from("a.mp4"),
                    range: TimeRange::new(RationalTime::ZERO, RationalTime::from_secs(5)),
                },
                ConcatPiece {
                    path: PathBuf::from("b.mp4"),
                    range: TimeRange::new(RationalTime::from_secs(1), RationalTime::from_secs(4)),
                },
            ],
            settings: EncodeSettings::default(),
            fade_in: RationalTime::ZERO,
            fade_out: RationalTime::ZERO,
            output_path: PathBuf::from("out.mp4"),
        };
        backend.concat(&request).unwrap();
        assert_eq!(backend.clip("out.mp4").unwrap().duration, RationalTime::from_secs(9));
        assert_eq!(backend.concats().len(), 1);
    }
}
