//! Quality-gated regeneration.
//!
//! A scene's clip is scored; while it fails the thresholds a new clip is
//! generated with a fresh seed and scored in turn, up to `max_attempts`
//! regenerations. The first passing attempt is accepted. When none passes,
//! the highest-scoring attempt seen (the original included) is returned,
//! so the result is never worse than the clip we started from.
//!
//! Attempts run one after another; each reads and writes the scene's single
//! [`QualityMetric`] record.

use adreel_core::CancelToken;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{AiError, AiResult};
use crate::generator::{ClipEvaluator, ClipGenerator, SceneDescriptor};
use crate::metric_store::MetricStore;
use crate::quality::{QualityConfig, QualityMetric, QualityScores};

/// How often an in-flight generation or evaluation polls for cancellation.
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// Resolves once `cancel` fires.
async fn cancelled(cancel: &CancelToken) {
    while !cancel.is_cancelled() {
        tokio::time::sleep(CANCEL_POLL).await;
    }
}

/// Retry budget and seed derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegenerationConfig {
    /// Regenerations allowed per scene, across runs. The original clip is
    /// not counted.
    pub max_attempts: u32,
    /// Added to the seed once per attempt index.
    pub seed_stride: u64,
    /// Random perturbation is drawn from `0..perturbation_span`.
    pub perturbation_span: u64,
    /// Fixes the perturbation sequence for reproducible runs.
    pub rng_seed: Option<u64>,
}

impl Default for RegenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            seed_stride: 1,
            perturbation_span: 1000,
            rng_seed: None,
        }
    }
}

/// One candidate clip and how it scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    /// 0 for the clip the run started from.
    pub attempt_index: u32,
    /// `None` when generation itself failed.
    pub clip_path: Option<String>,
    pub seed: u64,
    pub overall_quality: Option<f64>,
    pub scores: Option<QualityScores>,
    pub passed: bool,
    pub error: Option<String>,
}

impl Attempt {
    fn failed(attempt_index: u32, clip_path: Option<String>, seed: u64, error: String) -> Self {
        Self {
            attempt_index,
            clip_path,
            seed,
            overall_quality: None,
            scores: None,
            passed: false,
            error: Some(error),
        }
    }

    pub fn is_scored(&self) -> bool {
        self.overall_quality.is_some()
    }
}

/// Result of one evaluate-and-maybe-regenerate run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegenerationOutcome {
    /// Clip to render for this scene.
    pub clip_path: String,
    /// The scene's metric as persisted.
    pub metric: QualityMetric,
    pub attempts: Vec<Attempt>,
    /// Index of the chosen attempt; `None` when nothing could be scored.
    pub selected_attempt: Option<u32>,
}

impl RegenerationOutcome {
    pub fn accepted(&self) -> bool {
        self.metric.passed_threshold
    }
}

/// Drives the evaluate / regenerate loop for one scene at a time.
pub struct RegenerationController {
    generator: Arc<dyn ClipGenerator>,
    evaluator: Arc<dyn ClipEvaluator>,
    store: Arc<dyn MetricStore>,
    quality: QualityConfig,
    config: RegenerationConfig,
    rng: Mutex<StdRng>,
}

impl RegenerationController {
    pub fn new(
        generator: Arc<dyn ClipGenerator>,
        evaluator: Arc<dyn ClipEvaluator>,
        store: Arc<dyn MetricStore>,
        quality: QualityConfig,
        config: RegenerationConfig,
    ) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            generator,
            evaluator,
            store,
            quality,
            config,
            rng: Mutex::new(rng),
        }
    }

    pub fn quality(&self) -> &QualityConfig {
        &self.quality
    }

    /// `prior + attempt_index * seed_stride + perturbation`, wrapping.
    pub fn derive_seed(&self, prior: u64, attempt_index: u32) -> u64 {
        let perturbation = if self.config.perturbation_span > 0 {
            self.rng.lock().gen_range(0..self.config.perturbation_span)
        } else {
            0
        };
        prior
            .wrapping_add(u64::from(attempt_index).wrapping_mul(self.config.seed_stride))
            .wrapping_add(perturbation)
    }

    /// Score the scene's clip and regenerate it while it fails.
    ///
    /// Generation and evaluation failures are recorded as failed attempts.
    /// Only cancellation and metric store failures are returned as errors.
    pub async fn evaluate_and_maybe_regenerate(
        &self,
        scene: &SceneDescriptor,
        cancel: &CancelToken,
    ) -> AiResult<RegenerationOutcome> {
        cancel.check()?;
        let mut metric = match self.store.load(&scene.generation_id, scene.scene_number)? {
            Some(existing) => existing,
            None => QualityMetric::new(&scene.generation_id, scene.scene_number, &scene.clip_path),
        };
        // A previous run may already have swapped in a regenerated clip.
        let start_path = metric.clip_path.clone();
        let used = metric.regeneration_attempts;

        let mut attempts = Vec::new();
        let first = self
            .evaluate_attempt(scene, 0, start_path.clone(), scene.seed, cancel)
            .await?;
        let passed = first.passed;
        attempts.push(first);
        self.persist(&mut metric, &attempts)?;
        if passed {
            return Ok(self.finish(metric, attempts, &start_path));
        }

        let mut prior_seed = scene.seed;
        for attempt_index in used.saturating_add(1)..=self.config.max_attempts {
            cancel.check()?;
            let seed = self.derive_seed(prior_seed, attempt_index);
            prior_seed = seed;
            metric.regeneration_attempts = attempt_index;

            // Losing the race drops the generation future, which stops it.
            let generated = tokio::select! {
                result = self.generator.generate_clip(scene, seed) => result,
                _ = cancelled(cancel) => Err(AiError::Cancelled),
            };
            let attempt = match generated {
                Ok(path) => {
                    self.evaluate_attempt(scene, attempt_index, path, seed, cancel)
                        .await?
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!(
                        scene = scene.scene_number,
                        attempt = attempt_index,
                        seed,
                        error = %e,
                        "Regeneration failed"
                    );
                    Attempt::failed(attempt_index, None, seed, e.to_string())
                }
            };
            let passed = attempt.passed;
            attempts.push(attempt);
            self.persist(&mut metric, &attempts)?;
            if passed {
                break;
            }
        }

        if used >= self.config.max_attempts {
            info!(
                scene = scene.scene_number,
                used,
                "Regeneration budget already spent"
            );
        }
        Ok(self.finish(metric, attempts, &start_path))
    }

    async fn evaluate_attempt(
        &self,
        scene: &SceneDescriptor,
        attempt_index: u32,
        clip_path: String,
        seed: u64,
        cancel: &CancelToken,
    ) -> AiResult<Attempt> {
        cancel.check()?;
        let evaluated = tokio::select! {
            result = self.evaluator.evaluate(&clip_path) => result,
            _ = cancelled(cancel) => Err(AiError::Cancelled),
        };
        match evaluated {
            Ok(scores) => {
                let check = self.quality.check(&scores);
                info!(
                    scene = scene.scene_number,
                    attempt = attempt_index,
                    seed,
                    overall = check.overall,
                    passed = check.passed,
                    "Scored attempt"
                );
                Ok(Attempt {
                    attempt_index,
                    clip_path: Some(clip_path),
                    seed,
                    overall_quality: Some(check.overall),
                    scores: Some(scores),
                    passed: check.passed,
                    error: None,
                })
            }
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                warn!(
                    scene = scene.scene_number,
                    attempt = attempt_index,
                    clip = %clip_path,
                    error = %e,
                    "Evaluation failed"
                );
                Ok(Attempt::failed(attempt_index, Some(clip_path), seed, e.to_string()))
            }
        }
    }

    /// Point the metric at the current selection and write it.
    fn persist(&self, metric: &mut QualityMetric, attempts: &[Attempt]) -> AiResult<()> {
        if let Some(chosen) = select(attempts) {
            if let (Some(path), Some(scores)) = (&chosen.clip_path, &chosen.scores) {
                let check = self.quality.check(scores);
                metric.apply(path, scores.clone(), &check);
            }
        }
        self.store.save(metric)
    }

    fn finish(&self, metric: QualityMetric, attempts: Vec<Attempt>, start_path: &str) -> RegenerationOutcome {
        let chosen = select(&attempts);
        let selected_attempt = chosen.map(|a| a.attempt_index);
        let clip_path = chosen
            .and_then(|a| a.clip_path.clone())
            .unwrap_or_else(|| start_path.to_string());
        info!(
            generation = %metric.generation_id,
            scene = metric.scene_number,
            clip = %clip_path,
            overall = metric.overall_quality,
            passed = metric.passed_threshold,
            attempts = attempts.len(),
            "Regeneration finished"
        );
        RegenerationOutcome {
            clip_path,
            metric,
            attempts,
            selected_attempt,
        }
    }
}

/// The first passing attempt, else the highest-scoring one (earliest on
/// ties).
fn select(attempts: &[Attempt]) -> Option<&Attempt> {
    if let Some(passing) = attempts.iter().find(|a| a.passed) {
        return Some(passing);
    }
    attempts
        .iter()
        .filter_map(|a| a.overall_quality.map(|q| (a, q)))
        .fold(None, |best: Option<(&Attempt, f64)>, (a, q)| match best {
            Some((_, bq)) if bq >= q => best,
            _ => Some((a, q)),
        })
        .map(|(a, _)| a)
}
