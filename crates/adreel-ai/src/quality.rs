//! Quality dimensions, weighting and thresholds.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One scored aspect of a generated clip. Scores are 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityDimension {
    TemporalConsistency,
    SubjectConsistency,
    BackgroundConsistency,
    MotionSmoothness,
    DynamicDegree,
    AestheticQuality,
    ImagingQuality,
    ObjectClass,
    TextAlignment,
}

impl QualityDimension {
    pub const ALL: [Self; 9] = [
        Self::TemporalConsistency,
        Self::SubjectConsistency,
        Self::BackgroundConsistency,
        Self::MotionSmoothness,
        Self::DynamicDegree,
        Self::AestheticQuality,
        Self::ImagingQuality,
        Self::ObjectClass,
        Self::TextAlignment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TemporalConsistency => "temporal_consistency",
            Self::SubjectConsistency => "subject_consistency",
            Self::BackgroundConsistency => "background_consistency",
            Self::MotionSmoothness => "motion_smoothness",
            Self::DynamicDegree => "dynamic_degree",
            Self::AestheticQuality => "aesthetic_quality",
            Self::ImagingQuality => "imaging_quality",
            Self::ObjectClass => "object_class",
            Self::TextAlignment => "text_alignment",
        }
    }

    /// Share of the overall figure when every dimension is scored.
    pub fn default_weight(self) -> f64 {
        match self {
            Self::TemporalConsistency => 0.15,
            Self::SubjectConsistency => 0.15,
            Self::BackgroundConsistency => 0.10,
            Self::MotionSmoothness => 0.15,
            Self::DynamicDegree => 0.05,
            Self::AestheticQuality => 0.15,
            Self::ImagingQuality => 0.10,
            Self::ObjectClass => 0.05,
            Self::TextAlignment => 0.10,
        }
    }
}

impl fmt::Display for QualityDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-dimension scores for one clip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualityScores(BTreeMap<QualityDimension, f64>);

impl QualityScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every dimension set to `score`.
    pub fn uniform(score: f64) -> Self {
        let mut scores = Self::new();
        for dim in QualityDimension::ALL {
            scores.set(dim, score);
        }
        scores
    }

    /// Set a score, clamped to 0-100. Non-finite scores are dropped.
    pub fn set(&mut self, dim: QualityDimension, score: f64) {
        if score.is_finite() {
            self.0.insert(dim, score.clamp(0.0, 100.0));
        } else {
            self.0.remove(&dim);
        }
    }

    pub fn with(mut self, dim: QualityDimension, score: f64) -> Self {
        self.set(dim, score);
        self
    }

    pub fn get(&self, dim: QualityDimension) -> Option<f64> {
        self.0.get(&dim).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (QualityDimension, f64)> + '_ {
        self.0.iter().map(|(d, s)| (*d, *s))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// `overall_quality` is kept to six decimal places.
const OVERALL_SCALE: f64 = 1e6;

/// Weights and pass thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub weights: BTreeMap<QualityDimension, f64>,
    /// Minimum overall figure.
    pub overall_threshold: f64,
    /// Required dimensions and their minimum score. A required dimension
    /// that was not scored fails.
    pub dimension_thresholds: BTreeMap<QualityDimension, f64>,
    /// Frames sampled per clip by the frame-statistics evaluator.
    pub sample_frames: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            weights: QualityDimension::ALL
                .iter()
                .map(|d| (*d, d.default_weight()))
                .collect(),
            overall_threshold: 70.0,
            dimension_thresholds: [
                (QualityDimension::TemporalConsistency, 60.0),
                (QualityDimension::MotionSmoothness, 60.0),
                (QualityDimension::SubjectConsistency, 60.0),
            ]
            .into_iter()
            .collect(),
            sample_frames: 8,
        }
    }
}

/// Result of checking scores against the thresholds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdCheck {
    pub overall: f64,
    pub passed: bool,
    /// One line per failed requirement.
    pub failures: Vec<String>,
}

impl QualityConfig {
    /// Weighted mean over the dimensions that were scored, rounded to six
    /// decimal places.
    ///
    /// Weights of unscored dimensions are left out, so the result stays on
    /// the 0-100 scale. No scored dimension with positive weight gives 0.
    /// Rounding keeps a uniform score `q` at exactly `q`, so a clip scored
    /// at the threshold passes.
    pub fn overall(&self, scores: &QualityScores) -> f64 {
        let (sum, weight) = scores
            .iter()
            .filter_map(|(dim, score)| {
                let w = self.weights.get(&dim).copied().unwrap_or(0.0);
                (w.is_finite() && w > 0.0).then_some((score * w, w))
            })
            .fold((0.0, 0.0), |(s, tw), (v, w)| (s + v, tw + w));
        if weight > 0.0 {
            ((sum / weight) * OVERALL_SCALE).round() / OVERALL_SCALE
        } else {
            0.0
        }
    }

    pub fn check(&self, scores: &QualityScores) -> ThresholdCheck {
        let overall = self.overall(scores);
        let mut failures = Vec::new();
        if overall < self.overall_threshold {
            failures.push(format!(
                "overall_quality {overall:.1} below {:.1}",
                self.overall_threshold
            ));
        }
        for (dim, min) in &self.dimension_thresholds {
            match scores.get(*dim) {
                Some(score) if score >= *min => {}
                Some(score) => failures.push(format!("{dim} {score:.1} below {min:.1}")),
                None => failures.push(format!("{dim} was not scored")),
            }
        }
        ThresholdCheck {
            overall,
            passed: failures.is_empty(),
            failures,
        }
    }
}

/// Stored evaluation of one scene's clip, keyed by generation and scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetric {
    pub generation_id: String,
    pub scene_number: u32,
    pub clip_path: String,
    #[serde(default)]
    pub scores: QualityScores,
    #[serde(default)]
    pub overall_quality: f64,
    #[serde(default)]
    pub passed_threshold: bool,
    /// Regeneration attempts made so far, not counting the original clip.
    #[serde(default)]
    pub regeneration_attempts: u32,
}

impl QualityMetric {
    pub fn new(generation_id: impl Into<String>, scene_number: u32, clip_path: impl Into<String>) -> Self {
        Self {
            generation_id: generation_id.into(),
            scene_number,
            clip_path: clip_path.into(),
            scores: QualityScores::new(),
            overall_quality: 0.0,
            passed_threshold: false,
            regeneration_attempts: 0,
        }
    }

    /// Point the metric at a scored clip.
    pub fn apply(&mut self, clip_path: &str, scores: QualityScores, check: &ThresholdCheck) {
        self.clip_path = clip_path.to_string();
        self.scores = scores;
        self.overall_quality = check.overall;
        self.passed_threshold = check.passed;
    }
}
