//! The stitcher: per-boundary transition segments plus final concatenation.
//!
//! Boundaries are processed left to right. A boundary with overlap `o`
//! takes the last `o` of clip A and the first `o` of clip B, composites them
//! into a segment, then shortens A's tail and B's head by `o`. The output is
//! `A' + segment + B' + ...`, so its duration is the sum of the clip
//! durations minus one overlap per non-cut boundary.

use adreel_core::{AdReelError, CancelToken, FrameBuffer, RationalTime, Result, TimeRange};
use adreel_effects::{TransitionKind, FADE_DURATION};
use adreel_media::{ConcatPiece, ConcatRequest, DecodeWindow, EncodeSettings, MediaBackend};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::compositor::{EffectsCompositor, FrameCompositor};
use crate::settings::RenderSettings;
use crate::validate::validate_media;

/// One input clip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderClip {
    pub path: PathBuf,
    /// Window of the file to use; the whole file when `None`.
    pub range: Option<TimeRange>,
    /// Name used in errors; defaults to the path.
    pub label: Option<String>,
}

impl RenderClip {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            range: None,
            label: None,
        }
    }

    pub fn with_range(mut self, range: TimeRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    fn display_name(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Clips in order, one transition per boundary, and the output path.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub clips: Vec<RenderClip>,
    pub transitions: Vec<TransitionKind>,
    pub output_path: PathBuf,
}

impl RenderRequest {
    pub fn new(
        clips: Vec<RenderClip>,
        transitions: Vec<TransitionKind>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            clips,
            transitions,
            output_path: output_path.into(),
        }
    }

    /// Build a request from transition names. Unknown names become
    /// crossfades.
    pub fn from_names<S: AsRef<str>>(
        clips: Vec<RenderClip>,
        transitions: &[S],
        output_path: impl Into<PathBuf>,
    ) -> Self {
        let transitions = transitions
            .iter()
            .map(|name| TransitionKind::parse(name.as_ref()))
            .collect();
        Self::new(clips, transitions, output_path)
    }

    /// One transition per boundary: a short list is padded with
    /// crossfades and extra entries are dropped.
    fn boundary_transitions(&self) -> Vec<TransitionKind> {
        let boundaries = self.clips.len().saturating_sub(1);
        if self.transitions.len() != boundaries {
            warn!(
                given = self.transitions.len(),
                boundaries, "Transition count does not match clip boundaries"
            );
        }
        let mut kinds: Vec<TransitionKind> =
            self.transitions.iter().copied().take(boundaries).collect();
        kinds.resize(boundaries, TransitionKind::Crossfade);
        kinds
    }
}

/// What happened at one boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundaryReport {
    pub index: usize,
    pub requested: TransitionKind,
    pub applied: TransitionKind,
    /// The applied transition differs from the requested one.
    pub degraded: bool,
    /// First compositing error, when the requested transition failed.
    pub error: Option<String>,
}

/// The rendered file and how it was put together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderOutput {
    pub path: PathBuf,
    #[serde(with = "adreel_core::time::seconds")]
    pub duration: RationalTime,
    pub boundaries: Vec<BoundaryReport>,
}

impl RenderOutput {
    pub fn degraded_count(&self) -> usize {
        self.boundaries.iter().filter(|b| b.degraded).count()
    }
}

/// Scratch directory owned by one render; removed when dropped.
struct RunDir(PathBuf);

impl RunDir {
    fn create(root: &Path) -> Result<Self> {
        let dir = root.join(format!("adreel-render-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir)?;
        Ok(Self(dir))
    }
}

impl Drop for RunDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.0) {
            debug!(dir = %self.0.display(), error = %e, "Could not remove render scratch dir");
        }
    }
}

/// A transition segment written to the scratch directory.
struct Segment {
    path: PathBuf,
    duration: RationalTime,
}

/// Renders [`RenderRequest`]s through a [`MediaBackend`].
pub struct Stitcher {
    backend: Arc<dyn MediaBackend>,
    compositor: Arc<dyn FrameCompositor>,
    settings: RenderSettings,
}

impl Stitcher {
    pub fn new(backend: Arc<dyn MediaBackend>, settings: RenderSettings) -> Self {
        Self {
            backend,
            compositor: Arc::new(EffectsCompositor),
            settings,
        }
    }

    /// Replace the frame compositor.
    pub fn with_compositor(mut self, compositor: Arc<dyn FrameCompositor>) -> Self {
        self.compositor = compositor;
        self
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Render the request. Blocks until the output is written.
    pub fn render(&self, request: &RenderRequest, cancel: &CancelToken) -> Result<RenderOutput> {
        cancel.check()?;
        if request.clips.is_empty() {
            return Err(AdReelError::InvalidParameter("no clips to render".into()));
        }
        let encode = self.settings.encode_settings()?;

        let mut windows = Vec::with_capacity(request.clips.len());
        for clip in &request.clips {
            cancel.check()?;
            let window = validate_media(
                self.backend.as_ref(),
                &clip.path,
                clip.range,
                encode.frame_rate,
            )
            .map_err(|e| AdReelError::corrupt(clip.display_name(), e.to_string()))?;
            windows.push(window);
        }

        let kinds = request.boundary_transitions();
        let run_dir = RunDir::create(&self.settings.temp_root())?;
        let mut segments: Vec<Option<Segment>> = Vec::with_capacity(kinds.len());
        let mut reports = Vec::with_capacity(kinds.len());

        for (index, requested) in kinds.iter().copied().enumerate() {
            cancel.check()?;
            let (applied, segment, error) = self.boundary_with_fallback(
                index,
                requested,
                &request.clips,
                &windows,
                &encode,
                &run_dir.0,
                cancel,
            )?;
            if let Some(seg) = &segment {
                // `seg.duration` is the overlap actually consumed.
                windows[index] = windows[index].trim_tail(seg.duration);
                windows[index + 1] = windows[index + 1].trim_head(seg.duration);
            }
            let degraded = applied != requested;
            if degraded {
                warn!(
                    boundary = index,
                    %requested,
                    %applied,
                    error = error.as_deref().unwrap_or(""),
                    "Degraded transition"
                );
            }
            reports.push(BoundaryReport {
                index,
                requested,
                applied,
                degraded,
                error,
            });
            segments.push(segment);
        }

        let mut pieces = Vec::with_capacity(request.clips.len() + segments.len());
        for (i, clip) in request.clips.iter().enumerate() {
            pieces.push(ConcatPiece {
                path: clip.path.clone(),
                range: windows[i],
            });
            if let Some(Some(seg)) = segments.get(i) {
                pieces.push(ConcatPiece {
                    path: seg.path.clone(),
                    range: TimeRange::new(RationalTime::ZERO, seg.duration),
                });
            }
        }

        cancel.check()?;
        let concat = ConcatRequest {
            pieces,
            settings: encode.clone(),
            fade_in: RationalTime::ZERO,
            fade_out: RationalTime::ZERO,
            output_path: request.output_path.clone(),
        };
        let duration = concat.total_duration();
        let fade = FADE_DURATION.min(duration / 2);
        let concat = ConcatRequest {
            fade_in: fade,
            fade_out: fade,
            ..concat
        };
        if let Some(parent) = request.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        self.backend.concat(&concat)?;
        validate_media(
            self.backend.as_ref(),
            &request.output_path,
            None,
            encode.frame_rate,
        )
        .map_err(|e| AdReelError::Encoder(format!("rendered output failed validation: {e}")))?;
        drop(run_dir);

        let output = RenderOutput {
            path: request.output_path.clone(),
            duration,
            boundaries: reports,
        };
        info!(
            path = %output.path.display(),
            duration = %output.duration,
            clips = request.clips.len(),
            degraded = output.degraded_count(),
            "Render complete"
        );
        Ok(output)
    }

    /// Try the requested transition, then crossfade, then cut.
    #[allow(clippy::too_many_arguments)]
    fn boundary_with_fallback(
        &self,
        index: usize,
        requested: TransitionKind,
        clips: &[RenderClip],
        windows: &[TimeRange],
        encode: &EncodeSettings,
        run_dir: &Path,
        cancel: &CancelToken,
    ) -> Result<(TransitionKind, Option<Segment>, Option<String>)> {
        let mut ladder = vec![requested];
        if !matches!(requested, TransitionKind::Crossfade | TransitionKind::Cut) {
            ladder.push(TransitionKind::Crossfade);
        }
        if !requested.is_cut() {
            ladder.push(TransitionKind::Cut);
        }

        let mut first_error = None;
        for kind in ladder {
            if kind.is_cut() {
                return Ok((kind, None, first_error));
            }
            match self.build_segment(index, kind, clips, windows, encode, run_dir, cancel) {
                Ok(segment) => return Ok((kind, Some(segment), first_error)),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!(boundary = index, transition = %kind, error = %e, "Transition failed");
                    first_error.get_or_insert_with(|| e.to_string());
                }
            }
        }
        // Unreachable in practice: the ladder always ends in a cut.
        Ok((TransitionKind::Cut, None, first_error))
    }

    #[allow(clippy::too_many_arguments)]
    fn build_segment(
        &self,
        index: usize,
        kind: TransitionKind,
        clips: &[RenderClip],
        windows: &[TimeRange],
        encode: &EncodeSettings,
        run_dir: &Path,
        cancel: &CancelToken,
    ) -> Result<Segment> {
        let overlap = kind.overlap();
        let (a, b) = (&clips[index], &clips[index + 1]);
        let (wa, wb) = (windows[index], windows[index + 1]);
        if wa.duration <= overlap || wb.duration <= overlap {
            return Err(AdReelError::Effect(format!(
                "{kind} needs more than {overlap} on each side (have {} and {})",
                wa.duration, wb.duration
            )));
        }

        let rate = encode.frame_rate;
        let mut frame_count = overlap.to_frames(rate);
        if RationalTime::from_frames(frame_count, rate) < overlap {
            frame_count += 1;
        }
        let frame_count = frame_count.max(1) as usize;

        let window = |range: TimeRange| DecodeWindow {
            range,
            frame_rate: rate,
            width: encode.width,
            height: encode.height,
        };
        cancel.check()?;
        let tail = self
            .backend
            .decode_window(&a.path, &window(TimeRange::new(wa.end() - overlap, overlap)))?;
        cancel.check()?;
        let head = self
            .backend
            .decode_window(&b.path, &window(TimeRange::new(wb.start, overlap)))?;
        if tail.is_empty() || head.is_empty() {
            return Err(AdReelError::Effect(format!(
                "{kind}: no frames in the overlap window"
            )));
        }

        let mut frames: Vec<FrameBuffer> = Vec::with_capacity(frame_count);
        for k in 0..frame_count {
            cancel.check()?;
            let fa = &tail[k.min(tail.len() - 1)];
            let fb = &head[k.min(head.len() - 1)];
            let progress = (k + 1) as f32 / (frame_count + 1) as f32;
            let frame = self
                .compositor
                .composite(kind, fa, fb, progress, k as u32)?;
            frame.validate()?;
            frames.push(frame);
        }

        let path = run_dir.join(format!("transition_{index:03}_{kind}.mp4"));
        cancel.check()?;
        self.backend.encode_frames(&frames, encode, &path, cancel)?;
        validate_media(
            self.backend.as_ref(),
            &path,
            Some(TimeRange::new(RationalTime::ZERO, overlap)),
            rate,
        )?;

        debug!(boundary = index, transition = %kind, frames = frame_count, "Built transition segment");
        Ok(Segment {
            path,
            duration: overlap,
        })
    }
}
