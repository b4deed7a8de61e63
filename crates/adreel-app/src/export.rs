//! Export pipeline: saved session -> scored clips -> stitched output.

use adreel_ai::{RegenerationController, RegenerationOutcome, SceneDescriptor};
use adreel_core::{AdReelError, CancelToken, Result, TimeRange};
use adreel_effects::TransitionKind;
use adreel_media::MediaBackend;
use adreel_render::{RenderClip, RenderOutput, RenderRequest, Stitcher};
use adreel_timeline::{resolve_intervals, MediaInterval, SessionService, SessionStatus};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// What to export.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub generation_id: String,
    pub expected_version: u64,
    /// One transition per boundary between session clips.
    pub transitions: Vec<TransitionKind>,
    pub output_path: PathBuf,
    /// Score every scene's clip and regenerate the ones that fail.
    pub regenerate: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportOutcome {
    pub render: RenderOutput,
    pub scenes: Vec<RegenerationOutcome>,
    /// Session version after the export was recorded.
    pub version: u64,
}

/// Wires the session service, regeneration controller and stitcher.
pub struct Exporter {
    sessions: SessionService,
    backend: Arc<dyn MediaBackend>,
    stitcher: Arc<Stitcher>,
    controller: Option<Arc<RegenerationController>>,
}

impl Exporter {
    pub fn new(
        sessions: SessionService,
        backend: Arc<dyn MediaBackend>,
        stitcher: Arc<Stitcher>,
        controller: Option<Arc<RegenerationController>>,
    ) -> Self {
        Self {
            sessions,
            backend,
            stitcher,
            controller,
        }
    }

    pub async fn export(&self, request: &ExportRequest, cancel: &CancelToken) -> Result<ExportOutcome> {
        cancel.check()?;
        let session = self.sessions.load(&request.generation_id)?;
        let reexport = session.status() == SessionStatus::Exported;
        if reexport {
            session.check_version(request.expected_version)?;
        } else {
            // Fail on an unsaved or unedited session before rendering anything.
            session.clone().mark_exported(request.expected_version)?;
        }

        let intervals = resolve_intervals(&session)?;
        if intervals.is_empty() {
            return Err(AdReelError::InvalidEditingState("session has no clips".into()));
        }

        let mut scenes = Vec::new();
        let mut accepted: HashMap<String, String> = HashMap::new();
        if let (true, Some(controller)) = (request.regenerate, &self.controller) {
            let mut seen = HashSet::new();
            for interval in &intervals {
                if !seen.insert((interval.scene_number, interval.path.clone())) {
                    continue;
                }
                cancel.check()?;
                let scene = SceneDescriptor {
                    generation_id: request.generation_id.clone(),
                    scene_number: interval.scene_number,
                    clip_path: interval.path.clone(),
                    seed: 0,
                    prompt: String::new(),
                };
                let outcome = controller.evaluate_and_maybe_regenerate(&scene, cancel).await?;
                if outcome.clip_path != interval.path {
                    accepted.insert(interval.path.clone(), outcome.clip_path.clone());
                }
                scenes.push(outcome);
            }
        }

        let render_request = self.render_request(request, &intervals, &accepted)?;
        let stitcher = self.stitcher.clone();
        let token = cancel.clone();
        let render = tokio::task::spawn_blocking(move || stitcher.render(&render_request, &token))
            .await
            .map_err(|e| AdReelError::Internal(format!("render task failed: {e}")))??;

        let version = if reexport {
            session.version()
        } else {
            self.sessions
                .mark_exported(&request.generation_id, request.expected_version)?
                .version()
        };
        info!(
            generation = %request.generation_id,
            output = %render.path.display(),
            duration = %render.duration,
            version,
            "Export complete"
        );
        Ok(ExportOutcome {
            render,
            scenes,
            version,
        })
    }

    /// Clips and per-boundary transitions for the stitcher. Joins inside one
    /// session clip (a merge across media files) are cuts.
    fn render_request(
        &self,
        request: &ExportRequest,
        intervals: &[MediaInterval],
        accepted: &HashMap<String, String>,
    ) -> Result<RenderRequest> {
        let mut clips = Vec::with_capacity(intervals.len());
        for interval in intervals {
            let label = format!("scene {} ({})", interval.scene_number, interval.path);
            let clip = match accepted.get(&interval.path) {
                Some(path) => {
                    let range = self.fit_range(path, interval.range())?;
                    RenderClip {
                        path: PathBuf::from(path),
                        range,
                        label: Some(label),
                    }
                }
                None => RenderClip::new(&interval.path)
                    .with_range(interval.range())
                    .with_label(label),
            };
            clips.push(clip);
        }

        let boundaries = intervals.len().saturating_sub(1);
        let session_boundaries = intervals
            .windows(2)
            .filter(|pair| pair[0].clip_index != pair[1].clip_index)
            .count();
        if request.transitions.len() != session_boundaries {
            warn!(
                given = request.transitions.len(),
                boundaries = session_boundaries,
                "Transition count does not match clip boundaries"
            );
        }
        let mut transitions = Vec::with_capacity(boundaries);
        for pair in intervals.windows(2) {
            let kind = if pair[0].clip_index == pair[1].clip_index {
                TransitionKind::Cut
            } else {
                request
                    .transitions
                    .get(pair[0].clip_index)
                    .copied()
                    .unwrap_or_default()
            };
            transitions.push(kind);
        }
        Ok(RenderRequest::new(clips, transitions, &request.output_path))
    }

    /// Keep the trimmed window on a regenerated clip where it fits.
    fn fit_range(&self, path: &str, range: TimeRange) -> Result<Option<TimeRange>> {
        let info = self.backend.probe(Path::new(path))?;
        if range.end() <= info.duration {
            return Ok(Some(range));
        }
        if range.start < info.duration {
            return Ok(Some(TimeRange::from_start_end(range.start, info.duration)));
        }
        warn!(clip = path, %range, duration = %info.duration, "Regenerated clip is shorter than the edit, using all of it");
        Ok(None)
    }
}
