//! Heuristic clip scoring from sampled frame statistics.
//!
//! Works without any model: consecutive-frame differences drive the
//! temporal and motion dimensions, histogram similarity of the centre and
//! border regions drives subject and background consistency, and single
//! frame statistics (colourfulness, exposure, Laplacian sharpness) drive
//! the aesthetic and imaging dimensions. Prompt-alignment dimensions are
//! left unscored.

use adreel_core::frame::luma;
use adreel_core::{FrameBuffer, FrameRate, RationalTime};
use adreel_media::MediaBackend;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::{AiError, AiResult};
use crate::generator::ClipEvaluator;
use crate::quality::{QualityDimension, QualityScores};

const HIST_BINS: usize = 16;

/// Frame-statistics scorer over a [`MediaBackend`].
pub struct FrameStatsEvaluator {
    backend: Arc<dyn MediaBackend>,
    sample_frames: usize,
    size: (u32, u32),
}

impl FrameStatsEvaluator {
    pub fn new(backend: Arc<dyn MediaBackend>, sample_frames: usize) -> Self {
        Self {
            backend,
            sample_frames: sample_frames.max(2),
            size: (128, 128),
        }
    }

    /// Decode `sample_frames` frames spread evenly over the clip.
    fn sample(
        backend: &dyn MediaBackend,
        path: &Path,
        count: usize,
        size: (u32, u32),
    ) -> AiResult<Vec<FrameBuffer>> {
        let info = backend.probe(path)?;
        if !info.duration.is_positive() {
            return Err(AiError::Evaluation(format!(
                "{} has no duration",
                path.display()
            )));
        }
        let rate = if info.frame_rate.numerator > 0 {
            info.frame_rate
        } else {
            FrameRate::FPS_30
        };
        let last = (info.duration - rate.frame_duration()).max(RationalTime::ZERO);
        let mut frames = Vec::with_capacity(count);
        for i in 0..count {
            let t = last * i as i64 / (count as i64 - 1).max(1);
            frames.push(backend.decode_frame_at(path, t, rate, size)?);
        }
        Ok(frames)
    }
}

#[async_trait]
impl ClipEvaluator for FrameStatsEvaluator {
    async fn evaluate(&self, clip_path: &str) -> AiResult<QualityScores> {
        let backend = self.backend.clone();
        let path = PathBuf::from(clip_path);
        let (count, size) = (self.sample_frames, self.size);
        let frames = tokio::task::spawn_blocking(move || Self::sample(backend.as_ref(), &path, count, size))
            .await
            .map_err(|e| AiError::Evaluation(format!("sampling task failed: {e}")))??;
        let scores = score_frames(&frames)?;
        debug!(clip = clip_path, dimensions = scores.len(), "Scored clip");
        Ok(scores)
    }
}

/// Score a sequence of equally sized frames.
pub fn score_frames(frames: &[FrameBuffer]) -> AiResult<QualityScores> {
    let first = frames
        .first()
        .ok_or_else(|| AiError::Evaluation("no frames to score".into()))?;
    if first.is_empty() || frames.iter().any(|f| !f.same_size(first)) {
        return Err(AiError::Evaluation("frames are empty or differ in size".into()));
    }

    let mut scores = QualityScores::new();

    let aesthetic: f64 = frames.iter().map(aesthetic_score).sum::<f64>() / frames.len() as f64;
    let imaging: f64 = frames.iter().map(sharpness_score).sum::<f64>() / frames.len() as f64;
    scores.set(QualityDimension::AestheticQuality, aesthetic);
    scores.set(QualityDimension::ImagingQuality, imaging);

    if frames.len() < 2 {
        return Ok(scores);
    }

    let diffs: Vec<f64> = frames
        .windows(2)
        .map(|pair| mean_absolute_difference(&pair[0], &pair[1]))
        .collect();
    let mean_diff = diffs.iter().sum::<f64>() / diffs.len() as f64;
    let variance = diffs.iter().map(|d| (d - mean_diff).powi(2)).sum::<f64>() / diffs.len() as f64;

    // Differences are fractions of full scale.
    scores.set(QualityDimension::TemporalConsistency, 100.0 * (1.0 - (mean_diff * 4.0).min(1.0)));
    scores.set(QualityDimension::MotionSmoothness, 100.0 * (1.0 - (variance.sqrt() * 10.0).min(1.0)));
    scores.set(QualityDimension::DynamicDegree, 100.0 * (mean_diff * 10.0).min(1.0));

    let centre_ref = histogram(first, Region::Centre);
    let border_ref = histogram(first, Region::Border);
    let rest = &frames[1..];
    let subject = rest
        .iter()
        .map(|f| histogram_intersection(&centre_ref, &histogram(f, Region::Centre)))
        .sum::<f64>()
        / rest.len() as f64;
    let background = rest
        .iter()
        .map(|f| histogram_intersection(&border_ref, &histogram(f, Region::Border)))
        .sum::<f64>()
        / rest.len() as f64;
    scores.set(QualityDimension::SubjectConsistency, 100.0 * subject);
    scores.set(QualityDimension::BackgroundConsistency, 100.0 * background);

    Ok(scores)
}

/// Mean absolute RGB difference in `[0, 1]`.
fn mean_absolute_difference(a: &FrameBuffer, b: &FrameBuffer) -> f64 {
    let pixels = a.data.len() / 4;
    if pixels == 0 {
        return 0.0;
    }
    let total: u64 = a
        .data
        .chunks_exact(4)
        .zip(b.data.chunks_exact(4))
        .map(|(pa, pb)| {
            (0..3)
                .map(|c| (pa[c] as i32 - pb[c] as i32).unsigned_abs() as u64)
                .sum::<u64>()
        })
        .sum();
    total as f64 / (pixels as f64 * 3.0 * 255.0)
}

#[derive(Clone, Copy)]
enum Region {
    Centre,
    Border,
}

fn in_centre(x: u32, y: u32, w: u32, h: u32) -> bool {
    x >= w / 4 && x < w - w / 4 && y >= h / 4 && y < h - h / 4
}

/// Normalised luma histogram of one region.
fn histogram(frame: &FrameBuffer, region: Region) -> [f64; HIST_BINS] {
    let (w, h) = (frame.width, frame.height);
    let mut bins = [0.0; HIST_BINS];
    let mut count = 0usize;
    for y in 0..h {
        for x in 0..w {
            let centre = in_centre(x, y, w, h);
            let wanted = match region {
                Region::Centre => centre,
                Region::Border => !centre,
            };
            if !wanted {
                continue;
            }
            let px = frame.pixel(x, y);
            let l = luma(px[0], px[1], px[2]).clamp(0.0, 255.0);
            let bin = ((l / 256.0) * HIST_BINS as f32) as usize;
            bins[bin.min(HIST_BINS - 1)] += 1.0;
            count += 1;
        }
    }
    if count > 0 {
        for b in &mut bins {
            *b /= count as f64;
        }
    }
    bins
}

fn histogram_intersection(a: &[f64; HIST_BINS], b: &[f64; HIST_BINS]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x.min(*y)).sum::<f64>().min(1.0)
}

/// Colourfulness (Hasler and Suesstrunk) blended with exposure.
fn aesthetic_score(frame: &FrameBuffer) -> f64 {
    let n = (frame.data.len() / 4) as f64;
    let (mut rg_sum, mut yb_sum, mut rg_sq, mut yb_sq) = (0.0, 0.0, 0.0, 0.0);
    for px in frame.data.chunks_exact(4) {
        let (r, g, b) = (px[0] as f64, px[1] as f64, px[2] as f64);
        let rg = r - g;
        let yb = 0.5 * (r + g) - b;
        rg_sum += rg;
        yb_sum += yb;
        rg_sq += rg * rg;
        yb_sq += yb * yb;
    }
    let (rg_mean, yb_mean) = (rg_sum / n, yb_sum / n);
    let rg_std = (rg_sq / n - rg_mean * rg_mean).max(0.0).sqrt();
    let yb_std = (yb_sq / n - yb_mean * yb_mean).max(0.0).sqrt();
    let colourfulness = (rg_std.hypot(yb_std) + 0.3 * rg_mean.hypot(yb_mean)) / 100.0;

    let exposure = 1.0 - ((frame.mean_luma() as f64 / 255.0) - 0.5).abs() * 2.0;
    100.0 * (0.5 * colourfulness.min(1.0) + 0.5 * exposure)
}

/// Variance of a 4-neighbour Laplacian over luma.
fn sharpness_score(frame: &FrameBuffer) -> f64 {
    let (w, h) = (frame.width, frame.height);
    if w < 3 || h < 3 {
        return 0.0;
    }
    let l = |x: u32, y: u32| {
        let px = frame.pixel(x, y);
        luma(px[0], px[1], px[2]) as f64
    };
    let mut values = Vec::with_capacity(((w - 2) * (h - 2)) as usize);
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            values.push(4.0 * l(x, y) - l(x - 1, y) - l(x + 1, y) - l(x, y - 1) - l(x, y + 1));
        }
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    100.0 * (var / 1000.0).min(1.0)
}
