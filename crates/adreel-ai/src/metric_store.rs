//! Quality metric storage: one record per (generation, scene).
//!
//! The JSON store keeps one file per generation, rewritten under an OS file
//! lock so scenes scored by different processes never drop each other:
//! ```text
//! root/
//!   metrics/
//!     {encoded-generation-id}.json    # [QualityMetric, ...] sorted by scene
//!     {encoded-generation-id}.lock
//! ```

use adreel_core::fs::{encode_file_stem, with_file_lock, write_atomic};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::error::{AiError, AiResult};
use crate::quality::QualityMetric;

/// Durable metric storage. `save` replaces the record for the metric's
/// (generation, scene) pair; there is never more than one.
pub trait MetricStore: Send + Sync {
    fn load(&self, generation_id: &str, scene_number: u32) -> AiResult<Option<QualityMetric>>;

    fn save(&self, metric: &QualityMetric) -> AiResult<()>;

    /// All metrics of a generation, ordered by scene.
    fn list(&self, generation_id: &str) -> AiResult<Vec<QualityMetric>>;
}

/// In-process store.
#[derive(Default)]
pub struct MemoryMetricStore {
    records: Mutex<HashMap<String, BTreeMap<u32, QualityMetric>>>,
}

impl MemoryMetricStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricStore for MemoryMetricStore {
    fn load(&self, generation_id: &str, scene_number: u32) -> AiResult<Option<QualityMetric>> {
        Ok(self
            .records
            .lock()
            .get(generation_id)
            .and_then(|scenes| scenes.get(&scene_number))
            .cloned())
    }

    fn save(&self, metric: &QualityMetric) -> AiResult<()> {
        self.records
            .lock()
            .entry(metric.generation_id.clone())
            .or_default()
            .insert(metric.scene_number, metric.clone());
        Ok(())
    }

    fn list(&self, generation_id: &str) -> AiResult<Vec<QualityMetric>> {
        Ok(self
            .records
            .lock()
            .get(generation_id)
            .map(|scenes| scenes.values().cloned().collect())
            .unwrap_or_default())
    }
}

/// JSON files under a data directory.
pub struct JsonMetricStore {
    dir: PathBuf,
}

impl JsonMetricStore {
    pub fn new(root: &Path) -> Self {
        Self {
            dir: root.join("metrics"),
        }
    }

    fn path(&self, generation_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", encode_file_stem(generation_id)))
    }

    fn lock_path(&self, generation_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.lock", encode_file_stem(generation_id)))
    }

    fn read(&self, generation_id: &str) -> AiResult<BTreeMap<u32, QualityMetric>> {
        let path = self.path(generation_id);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let json = std::fs::read_to_string(&path)?;
        let metrics: Vec<QualityMetric> = serde_json::from_str(&json).map_err(|e| {
            AiError::Serialization(format!("Failed to read {}: {e}", path.display()))
        })?;
        if let Some(foreign) = metrics.iter().find(|m| m.generation_id != generation_id) {
            return Err(AiError::Store(format!(
                "{} holds metrics of generation {}, expected {generation_id}",
                path.display(),
                foreign.generation_id
            )));
        }
        Ok(metrics.into_iter().map(|m| (m.scene_number, m)).collect())
    }
}

impl MetricStore for JsonMetricStore {
    fn load(&self, generation_id: &str, scene_number: u32) -> AiResult<Option<QualityMetric>> {
        Ok(self.read(generation_id)?.remove(&scene_number))
    }

    fn save(&self, metric: &QualityMetric) -> AiResult<()> {
        with_file_lock(&self.lock_path(&metric.generation_id), || {
            let mut metrics = self.read(&metric.generation_id)?;
            metrics.insert(metric.scene_number, metric.clone());
            let list: Vec<&QualityMetric> = metrics.values().collect();
            let json = serde_json::to_string_pretty(&list).map_err(|e| {
                AiError::Serialization(format!("Failed to serialize metrics: {e}"))
            })?;
            write_atomic(&self.path(&metric.generation_id), json.as_bytes())
                .map_err(|e| AiError::Store(e.to_string()))
        })
    }

    fn list(&self, generation_id: &str) -> AiResult<Vec<QualityMetric>> {
        Ok(self.read(generation_id)?.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_upsert(store: &dyn MetricStore) {
        let mut metric = QualityMetric::new("gen-1", 1, "a.mp4");
        store.save(&metric).unwrap();
        metric.regeneration_attempts = 2;
        metric.clip_path = "b.mp4".into();
        store.save(&metric).unwrap();
        store.save(&QualityMetric::new("gen-1", 0, "z.mp4")).unwrap();

        let loaded = store.load("gen-1", 1).unwrap().unwrap();
        assert_eq!(loaded.regeneration_attempts, 2);
        assert_eq!(loaded.clip_path, "b.mp4");
        let all = store.list("gen-1").unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].scene_number, 0);
        assert!(store.load("gen-2", 1).unwrap().is_none());
    }

    #[test]
    fn test_memory_store_upserts() {
        check_upsert(&MemoryMetricStore::new());
    }

    #[test]
    fn test_json_store_upserts() {
        let dir = tempfile::tempdir().unwrap();
        check_upsert(&JsonMetricStore::new(dir.path()));
        // Survives a fresh handle.
        let again = JsonMetricStore::new(dir.path());
        assert_eq!(again.list("gen-1").unwrap().len(), 2);
    }

    #[test]
    fn test_json_store_keys_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonMetricStore::new(dir.path());
        store.save(&QualityMetric::new("gen/1", 1, "a.mp4")).unwrap();
        store.save(&QualityMetric::new("gen_1", 1, "b.mp4")).unwrap();
        assert_eq!(store.load("gen/1", 1).unwrap().unwrap().clip_path, "a.mp4");
        assert_eq!(store.load("gen_1", 1).unwrap().unwrap().clip_path, "b.mp4");
        assert!(store.load("gen 1", 1).unwrap().is_none());
    }

    #[test]
    fn test_json_store_keeps_scenes_from_concurrent_handles() {
        let dir = tempfile::tempdir().unwrap();
        let writers: Vec<_> = (0..8u32)
            .map(|scene| {
                let root = dir.path().to_path_buf();
                std::thread::spawn(move || {
                    let store = JsonMetricStore::new(&root);
                    for attempt in 0..5 {
                        let mut metric = QualityMetric::new("gen-1", scene, "a.mp4");
                        metric.regeneration_attempts = attempt;
                        store.save(&metric).unwrap();
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }
        let all = JsonMetricStore::new(dir.path()).list("gen-1").unwrap();
        assert_eq!(all.len(), 8);
        assert!(all.iter().all(|m| m.regeneration_attempts == 4));
    }
}
