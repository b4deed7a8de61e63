//! AdReel - short-form video ad editor
//!
//! Command-line entry point: editing-session commands, rendering, clip
//! regeneration and export. Results are printed to stdout as JSON; logs go
//! to stderr.

mod config;
mod export;

use adreel_ai::{
    AiError, AiResult, ClipGenerator, CommandGenerator, FrameStatsEvaluator, JsonMetricStore, RegenerationConfig,
    RegenerationController, SceneDescriptor,
};
use adreel_core::{AdReelError, CancelToken, RationalTime};
use adreel_effects::TransitionKind;
use adreel_media::{FfmpegBackend, MediaBackend};
use adreel_render::{RenderClip, RenderRequest, Stitcher};
use adreel_timeline::{Clip, EditCommand, JsonSessionStore, SessionService};
use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::export::{ExportRequest, Exporter};

#[derive(Parser, Debug)]
#[command(name = "adreel", version, about = "Edit, score and render AI-generated video ads")]
struct Cli {
    /// Config file [default: <config dir>/adreel/config.json]
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show a generation's editing session, creating it on first access
    Session {
        generation: String,
        /// JSON list of `{scene_number, path, duration}` used on first access
        #[arg(long)]
        scenes: Option<PathBuf>,
    },
    /// Set the rendered sub-range of a clip
    Trim {
        generation: String,
        #[arg(long)]
        clip: Uuid,
        #[arg(long)]
        start: f64,
        #[arg(long)]
        end: f64,
        /// Session version the edit is based on
        #[arg(long)]
        version: u64,
    },
    /// Split a clip in two
    Split {
        generation: String,
        #[arg(long)]
        clip: Uuid,
        #[arg(long)]
        at: f64,
        #[arg(long)]
        version: u64,
    },
    /// Merge adjacent clips
    Merge {
        generation: String,
        #[arg(long, value_delimiter = ',', required = true)]
        clips: Vec<Uuid>,
        #[arg(long)]
        version: u64,
    },
    /// Save the session, optionally replacing its clips from a JSON file
    Save {
        generation: String,
        #[arg(long)]
        version: u64,
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Stitch media files with transitions
    Render {
        #[arg(long = "clip", required = true)]
        clips: Vec<PathBuf>,
        /// One per boundary; unknown names become crossfades
        #[arg(long = "transition")]
        transitions: Vec<String>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Score a scene's clip and regenerate it while it fails
    Regenerate {
        generation: String,
        #[arg(long)]
        scene: u32,
        #[arg(long)]
        clip: String,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long, default_value = "")]
        prompt: String,
    },
    /// Render a saved session and mark it exported
    Export {
        generation: String,
        #[arg(long)]
        version: u64,
        #[arg(long = "transition")]
        transitions: Vec<String>,
        #[arg(short, long)]
        output: PathBuf,
        /// Skip quality scoring and regeneration
        #[arg(long)]
        no_regenerate: bool,
    },
}

/// One auto-generated scene for `session --scenes`.
#[derive(Debug, Deserialize)]
struct SceneInput {
    scene_number: u32,
    path: String,
    duration: f64,
}

/// Lay scenes end to end on the timeline.
fn scenes_to_clips(scenes: Vec<SceneInput>) -> Vec<Clip> {
    let mut cursor = RationalTime::ZERO;
    scenes
        .into_iter()
        .map(|scene| {
            let end = cursor + RationalTime::from_seconds_f64(scene.duration);
            let clip = Clip::new(scene.scene_number, scene.path, cursor, end);
            cursor = end;
            clip
        })
        .collect()
}

/// Stands in for a generator when none is configured.
struct NoGenerator;

#[async_trait]
impl ClipGenerator for NoGenerator {
    async fn generate_clip(&self, _scene: &SceneDescriptor, _seed: u64) -> AiResult<String> {
        Err(AiError::Generation("no clip generator configured".into()))
    }
}

struct App {
    config: AppConfig,
    sessions: SessionService,
}

impl App {
    fn new(config: AppConfig) -> Self {
        let store = Arc::new(JsonSessionStore::new(&config.storage.data_dir));
        let sessions = SessionService::new(store, config.timeline.clone());
        Self { config, sessions }
    }

    fn backend(&self) -> Result<Arc<dyn MediaBackend>> {
        let backend = FfmpegBackend::locate(self.config.render.ffmpeg_path.as_deref())?;
        Ok(Arc::new(backend))
    }

    fn stitcher(&self, backend: Arc<dyn MediaBackend>) -> Arc<Stitcher> {
        Arc::new(Stitcher::new(backend, self.config.render.clone()))
    }

    fn controller(&self, backend: Arc<dyn MediaBackend>) -> Arc<RegenerationController> {
        let (generator, regeneration): (Arc<dyn ClipGenerator>, RegenerationConfig) = match &self.config.generator {
            Some(cfg) => (Arc::new(CommandGenerator::new(cfg.clone())), self.config.regeneration.clone()),
            None => {
                warn!("No clip generator configured, clips will be scored only");
                (
                    Arc::new(NoGenerator),
                    RegenerationConfig {
                        max_attempts: 0,
                        ..self.config.regeneration.clone()
                    },
                )
            }
        };
        let evaluator = Arc::new(FrameStatsEvaluator::new(backend, self.config.quality.sample_frames));
        let metrics = Arc::new(JsonMetricStore::new(&self.config.storage.data_dir));
        Arc::new(RegenerationController::new(
            generator,
            evaluator,
            metrics,
            self.config.quality.clone(),
            regeneration,
        ))
    }

    fn edit(&self, generation: &str, command: EditCommand, version: u64) -> Result<Value> {
        let (session, outcome) = self.sessions.apply(generation, &command, version)?;
        Ok(json!({ "session": session, "clips": outcome.clips() }))
    }

    async fn run(&self, command: Commands, cancel: &CancelToken) -> Result<Value> {
        match command {
            Commands::Session { generation, scenes } => {
                let session = match scenes {
                    Some(path) => {
                        let json = std::fs::read_to_string(&path)
                            .with_context(|| format!("reading scenes {}", path.display()))?;
                        let scenes: Vec<SceneInput> = serde_json::from_str(&json)
                            .with_context(|| format!("parsing scenes {}", path.display()))?;
                        self.sessions.open_or_create(&generation, scenes_to_clips(scenes))?
                    }
                    None => self.sessions.load(&generation)?,
                };
                Ok(serde_json::to_value(&session)?)
            }
            Commands::Trim {
                generation,
                clip,
                start,
                end,
                version,
            } => self.edit(
                &generation,
                EditCommand::Trim {
                    clip_id: clip,
                    trim_start: start,
                    trim_end: end,
                },
                version,
            ),
            Commands::Split {
                generation,
                clip,
                at,
                version,
            } => self.edit(
                &generation,
                EditCommand::Split {
                    clip_id: clip,
                    split_time: at,
                },
                version,
            ),
            Commands::Merge {
                generation,
                clips,
                version,
            } => self.edit(&generation, EditCommand::Merge { clip_ids: clips }, version),
            Commands::Save {
                generation,
                version,
                state,
            } => {
                let snapshot = match state {
                    Some(path) => {
                        let json = std::fs::read_to_string(&path)
                            .with_context(|| format!("reading editing state {}", path.display()))?;
                        Some(serde_json::from_str::<Value>(&json).map_err(|e| {
                            AdReelError::InvalidEditingState(format!("editing state is not JSON: {e}"))
                        })?)
                    }
                    None => None,
                };
                let session = self.sessions.save(&generation, version, snapshot)?;
                Ok(serde_json::to_value(&session)?)
            }
            Commands::Render {
                clips,
                transitions,
                output,
            } => {
                let stitcher = self.stitcher(self.backend()?);
                let clips = clips.into_iter().map(RenderClip::new).collect();
                let request = RenderRequest::from_names(clips, &transitions, output);
                let token = cancel.clone();
                let rendered = tokio::task::spawn_blocking(move || stitcher.render(&request, &token)).await??;
                Ok(serde_json::to_value(&rendered)?)
            }
            Commands::Regenerate {
                generation,
                scene,
                clip,
                seed,
                prompt,
            } => {
                let controller = self.controller(self.backend()?);
                let scene = SceneDescriptor {
                    generation_id: generation,
                    scene_number: scene,
                    clip_path: clip,
                    seed,
                    prompt,
                };
                let outcome = controller
                    .evaluate_and_maybe_regenerate(&scene, cancel)
                    .await
                    .map_err(AdReelError::from)?;
                Ok(serde_json::to_value(&outcome)?)
            }
            Commands::Export {
                generation,
                version,
                transitions,
                output,
                no_regenerate,
            } => {
                let backend = self.backend()?;
                let exporter = Exporter::new(
                    self.sessions.clone(),
                    backend.clone(),
                    self.stitcher(backend.clone()),
                    Some(self.controller(backend)),
                );
                let request = ExportRequest {
                    generation_id: generation,
                    expected_version: version,
                    transitions: transitions.iter().map(|t| TransitionKind::parse(t)).collect(),
                    output_path: output,
                    regenerate: !no_regenerate,
                };
                let outcome = exporter.export(&request, cancel).await?;
                Ok(serde_json::to_value(&outcome)?)
            }
        }
    }
}

fn init_logging(config: &AppConfig) {
    let fallback = config.log_level.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_from_env("ADREEL_LOG")
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    init_logging(&config);
    info!(data_dir = %config.storage.data_dir.display(), "AdReel starting");

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    let app = App::new(config);
    match app.run(cli.command, &cancel).await {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) if matches!(e.downcast_ref::<AdReelError>(), Some(AdReelError::CancelledByUser)) => {
            warn!("Cancelled by user");
            std::process::exit(130);
        }
        Err(e) => Err(e),
    }
}
