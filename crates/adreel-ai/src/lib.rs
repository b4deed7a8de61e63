//! AdReel AI - clip quality scoring and regeneration
//!
//! Provides:
//! - Quality dimensions, weights and thresholds
//! - A frame-statistics clip scorer that needs no model
//! - Generator and evaluator interfaces for external services
//! - Per-scene quality metric storage
//! - The quality-gated regeneration loop

pub mod error;
pub mod evaluator;
pub mod generator;
pub mod metric_store;
pub mod quality;
pub mod regenerate;

pub use error::{AiError, AiResult};
pub use evaluator::{score_frames, FrameStatsEvaluator};
pub use generator::{ClipEvaluator, ClipGenerator, CommandGenerator, CommandGeneratorConfig, SceneDescriptor};
pub use metric_store::{JsonMetricStore, MemoryMetricStore, MetricStore};
pub use quality::{QualityConfig, QualityDimension, QualityMetric, QualityScores, ThresholdCheck};
pub use regenerate::{Attempt, RegenerationConfig, RegenerationController, RegenerationOutcome};
