//! Integration tests for quality-gated regeneration.
//!
//! Drives the regeneration controller with scripted generators against the
//! JSON metric store, and with the frame-statistics scorer over the
//! in-memory media backend.

use adreel_ai::{
    AiError, AiResult, ClipEvaluator, ClipGenerator, CommandGenerator, CommandGeneratorConfig, FrameStatsEvaluator,
    JsonMetricStore, MemoryMetricStore, MetricStore, QualityConfig, QualityDimension, QualityScores,
    RegenerationConfig, RegenerationController, SceneDescriptor,
};
use adreel_core::CancelToken;
use adreel_media::MemoryBackend;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

// ── Helpers ────────────────────────────────────────────────────

/// Hands out `take_{n}.mp4` and registers it with the backend when one is
/// attached.
#[derive(Default)]
struct Takes {
    seeds: Mutex<Vec<u64>>,
    backend: Option<Arc<MemoryBackend>>,
}

#[async_trait]
impl ClipGenerator for Takes {
    async fn generate_clip(&self, _scene: &SceneDescriptor, seed: u64) -> AiResult<String> {
        let mut seeds = self.seeds.lock();
        seeds.push(seed);
        let path = format!("take_{}.mp4", seeds.len());
        if let Some(backend) = &self.backend {
            backend.add_clip(&path, 3.0);
        }
        Ok(path)
    }
}

/// Uniform score per path.
struct Scores(HashMap<String, f64>);

impl Scores {
    fn sequence(original: &str, overall: &[f64]) -> Self {
        let mut map = HashMap::new();
        for (i, q) in overall.iter().enumerate() {
            let path = if i == 0 {
                original.to_string()
            } else {
                format!("take_{i}.mp4")
            };
            map.insert(path, *q);
        }
        Self(map)
    }
}

#[async_trait]
impl ClipEvaluator for Scores {
    async fn evaluate(&self, clip_path: &str) -> AiResult<QualityScores> {
        self.0
            .get(clip_path)
            .map(|q| QualityScores::uniform(*q))
            .ok_or_else(|| AiError::Evaluation(format!("no score for {clip_path}")))
    }
}

fn scene(number: u32) -> SceneDescriptor {
    SceneDescriptor {
        generation_id: "gen-7".into(),
        scene_number: number,
        clip_path: format!("scene_{number}.mp4"),
        seed: 42,
        prompt: "a red car on a coastal road".into(),
    }
}

fn config(max_attempts: u32) -> RegenerationConfig {
    RegenerationConfig {
        max_attempts,
        rng_seed: Some(11),
        ..Default::default()
    }
}

// ── Loop behaviour ─────────────────────────────────────────────

#[tokio::test]
async fn stops_at_first_passing_take() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonMetricStore::new(dir.path()));
    let takes = Arc::new(Takes::default());
    let ctl = RegenerationController::new(
        takes.clone(),
        Arc::new(Scores::sequence("scene_1.mp4", &[40.0, 75.0, 99.0])),
        store.clone(),
        QualityConfig::default(),
        config(3),
    );

    let out = ctl
        .evaluate_and_maybe_regenerate(&scene(1), &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(out.attempts.len(), 2);
    assert_eq!(takes.seeds.lock().len(), 1);
    assert_eq!(out.clip_path, "take_1.mp4");
    assert_eq!(out.metric.overall_quality, 75.0);
    assert!(out.metric.passed_threshold);

    // Written in place: one record for the scene, pointing at the take.
    let stored = JsonMetricStore::new(dir.path()).list("gen-7").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].clip_path, "take_1.mp4");
    assert_eq!(stored[0].regeneration_attempts, 1);
}

#[tokio::test]
async fn clip_at_the_threshold_is_accepted() {
    let takes = Arc::new(Takes::default());
    let quality = QualityConfig::default();
    let ctl = RegenerationController::new(
        takes.clone(),
        Arc::new(Scores::sequence("scene_1.mp4", &[quality.overall_threshold])),
        Arc::new(MemoryMetricStore::new()),
        quality,
        config(3),
    );
    let out = ctl
        .evaluate_and_maybe_regenerate(&scene(1), &CancelToken::new())
        .await
        .unwrap();
    assert!(out.accepted());
    assert_eq!(out.metric.overall_quality, 70.0);
    assert!(takes.seeds.lock().is_empty());
}

#[tokio::test]
async fn result_never_worse_than_the_original() {
    let cases: [&[f64]; 5] = [
        &[10.0, 20.0, 30.0, 40.0],
        &[60.0, 10.0, 10.0, 10.0],
        &[30.0, 69.0, 5.0, 68.0],
        &[0.0, 0.0, 0.0, 0.0],
        &[50.0, 71.0, 90.0, 90.0],
    ];
    for overall in cases {
        let ctl = RegenerationController::new(
            Arc::new(Takes::default()),
            Arc::new(Scores::sequence("scene_2.mp4", overall)),
            Arc::new(MemoryMetricStore::new()),
            QualityConfig::default(),
            config(3),
        );
        let out = ctl
            .evaluate_and_maybe_regenerate(&scene(2), &CancelToken::new())
            .await
            .unwrap();
        assert!(out.metric.overall_quality >= overall[0], "{overall:?}");
        assert!(out.attempts.len() <= 4);
        assert_eq!(out.attempts[0].attempt_index, 0);
    }
}

#[tokio::test]
async fn second_run_spends_only_the_remaining_budget() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn MetricStore> = Arc::new(JsonMetricStore::new(dir.path()));
    let scores = || Arc::new(Scores::sequence("scene_3.mp4", &[20.0, 30.0, 40.0, 50.0]));

    let first = Arc::new(Takes::default());
    RegenerationController::new(first.clone(), scores(), store.clone(), QualityConfig::default(), config(2))
        .evaluate_and_maybe_regenerate(&scene(3), &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(first.seeds.lock().len(), 2);

    // Budget raised to 3: one more take, starting from the stored best.
    let second = Arc::new(Takes::default());
    let out = RegenerationController::new(second.clone(), scores(), store.clone(), QualityConfig::default(), config(3))
        .evaluate_and_maybe_regenerate(&scene(3), &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(second.seeds.lock().len(), 1);
    assert_eq!(out.attempts[0].clip_path.as_deref(), Some("take_2.mp4"));
    assert_eq!(out.metric.regeneration_attempts, 3);
    assert_eq!(store.list("gen-7").unwrap().len(), 1);
}

#[tokio::test]
async fn scenes_keep_separate_metrics() {
    let store = Arc::new(MemoryMetricStore::new());
    let mut table = HashMap::new();
    table.insert("scene_1.mp4".to_string(), 90.0);
    table.insert("scene_2.mp4".to_string(), 80.0);
    let ctl = RegenerationController::new(
        Arc::new(Takes::default()),
        Arc::new(Scores(table)),
        store.clone(),
        QualityConfig::default(),
        config(3),
    );
    for n in [1, 2] {
        ctl.evaluate_and_maybe_regenerate(&scene(n), &CancelToken::new())
            .await
            .unwrap();
    }
    let metrics = store.list("gen-7").unwrap();
    assert_eq!(metrics.len(), 2);
    assert_eq!(metrics[0].overall_quality, 90.0);
    assert_eq!(metrics[1].overall_quality, 80.0);
}

// ── Frame statistics ───────────────────────────────────────────

#[tokio::test]
async fn unreadable_original_replaced_by_scored_take() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_corrupt("scene_4.mp4", 3.0);
    let takes = Arc::new(Takes {
        backend: Some(backend.clone()),
        ..Default::default()
    });
    // Steady solid-colour clips clear the per-dimension gates.
    let quality = QualityConfig {
        overall_threshold: 0.0,
        ..Default::default()
    };
    let ctl = RegenerationController::new(
        takes,
        Arc::new(FrameStatsEvaluator::new(backend.clone(), 4)),
        Arc::new(MemoryMetricStore::new()),
        quality,
        config(3),
    );

    let out = ctl
        .evaluate_and_maybe_regenerate(&scene(4), &CancelToken::new())
        .await
        .unwrap();
    assert!(out.attempts[0].error.is_some());
    assert_eq!(out.clip_path, "take_1.mp4");
    assert!(out.accepted());
    assert_eq!(
        out.metric.scores.get(QualityDimension::TemporalConsistency),
        Some(100.0)
    );
}

// ── External generator ─────────────────────────────────────────

#[cfg(unix)]
#[tokio::test]
async fn timed_out_generation_is_a_failed_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let generator = CommandGenerator::new(CommandGeneratorConfig {
        program: "sleep".into(),
        args: vec!["30".into()],
        output_dir: dir.path().to_path_buf(),
        timeout_secs: 1,
    });
    let ctl = RegenerationController::new(
        Arc::new(generator),
        Arc::new(Scores::sequence("scene_5.mp4", &[40.0])),
        Arc::new(MemoryMetricStore::new()),
        QualityConfig::default(),
        config(1),
    );

    let started = std::time::Instant::now();
    let out = ctl
        .evaluate_and_maybe_regenerate(&scene(5), &CancelToken::new())
        .await
        .unwrap();
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
    assert_eq!(out.attempts.len(), 2);
    assert!(out.attempts[1].error.as_deref().unwrap().contains("timed out"));
    assert_eq!(out.clip_path, "scene_5.mp4");
    assert_eq!(out.metric.regeneration_attempts, 1);
}
