//! Collaborator interfaces: clip generation and clip scoring.

use adreel_core::fs::encode_file_stem;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{AiError, AiResult};
use crate::quality::QualityScores;

/// What the generator needs to produce one scene's clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescriptor {
    pub generation_id: String,
    pub scene_number: u32,
    /// Clip produced by the original generation.
    pub clip_path: String,
    /// Seed the original clip was generated with.
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub prompt: String,
}

/// Produces a new clip for a scene.
#[async_trait]
pub trait ClipGenerator: Send + Sync {
    /// Generate a clip for `scene` with `seed`. Returns the clip's path.
    async fn generate_clip(&self, scene: &SceneDescriptor, seed: u64) -> AiResult<String>;
}

/// Scores a rendered clip.
#[async_trait]
pub trait ClipEvaluator: Send + Sync {
    async fn evaluate(&self, clip_path: &str) -> AiResult<QualityScores>;
}

/// Generator configuration: an external program invoked once per attempt.
///
/// Arguments may contain `{prompt}`, `{seed}`, `{scene}`, `{generation}`
/// and `{output}` placeholders. Placeholders are expanded once, so text
/// substituted into an argument is never expanded again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandGeneratorConfig {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    /// Directory new clips are written to.
    pub output_dir: PathBuf,
    /// The program is killed after this many seconds. 0 means no limit.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    900
}

/// Replace `{name}` tokens in one pass over `template`.
fn expand_placeholders(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let hit = values
            .iter()
            .find(|(name, _)| tail.starts_with(name) && tail[name.len()..].starts_with('}'));
        match hit {
            Some((name, value)) => {
                out.push_str(value);
                rest = &tail[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Runs an external program to generate clips.
pub struct CommandGenerator {
    config: CommandGeneratorConfig,
}

impl CommandGenerator {
    pub fn new(config: CommandGeneratorConfig) -> Self {
        Self { config }
    }

    pub(crate) fn output_path(&self, scene: &SceneDescriptor, seed: u64) -> PathBuf {
        self.config.output_dir.join(format!(
            "{}_scene{}_seed{}.mp4",
            encode_file_stem(&scene.generation_id),
            scene.scene_number,
            seed
        ))
    }

    pub(crate) fn expand_args(&self, scene: &SceneDescriptor, seed: u64, output: &str) -> Vec<String> {
        let seed = seed.to_string();
        let scene_number = scene.scene_number.to_string();
        let values = [
            ("prompt", scene.prompt.as_str()),
            ("seed", seed.as_str()),
            ("scene", scene_number.as_str()),
            ("generation", scene.generation_id.as_str()),
            ("output", output),
        ];
        self.config
            .args
            .iter()
            .map(|arg| expand_placeholders(arg, &values))
            .collect()
    }
}

#[async_trait]
impl ClipGenerator for CommandGenerator {
    async fn generate_clip(&self, scene: &SceneDescriptor, seed: u64) -> AiResult<String> {
        std::fs::create_dir_all(&self.config.output_dir)?;
        let output = self.output_path(scene, seed);
        let output_str = output.to_string_lossy().into_owned();
        let args = self.expand_args(scene, seed, &output_str);
        let program = &self.config.program;

        info!(
            program = %program.display(),
            scene = scene.scene_number,
            seed,
            "Running clip generator"
        );
        // Dropping the child (timeout, or the caller dropping this future on
        // cancellation) kills the process.
        let child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AiError::Generation(format!("failed to start generator: {e}")))?;

        let waited = match self.config.timeout_secs {
            0 => child.wait_with_output().await,
            secs => match tokio::time::timeout(Duration::from_secs(secs), child.wait_with_output()).await {
                Ok(waited) => waited,
                Err(_) => {
                    warn!(scene = scene.scene_number, seed, secs, "Clip generator timed out");
                    return Err(AiError::Generation(format!("generator timed out after {secs}s")));
                }
            },
        };
        let result = waited.map_err(|e| AiError::Generation(format!("generator failed: {e}")))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(AiError::Generation(format!(
                "generator exited with {}: {}",
                result.status,
                stderr.trim()
            )));
        }
        if !output.exists() {
            return Err(AiError::Generation(format!(
                "generator did not write {output_str}"
            )));
        }
        debug!(path = %output_str, "Generated clip");
        Ok(output_str)
    }
}
