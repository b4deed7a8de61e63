//! Integration tests for stitching.
//!
//! Runs the stitcher over the in-memory media backend, so no ffmpeg binary
//! is needed. Covers the duration law, the fallback ladder and corrupt
//! sources.

use adreel_core::{AdReelError, CancelToken, FrameBuffer, RationalTime, Result, TimeRange};
use adreel_effects::{Direction, TransitionKind, FADE_DURATION};
use adreel_media::MemoryBackend;
use adreel_render::{EffectsCompositor, FrameCompositor, RenderClip, RenderRequest, RenderSettings, Stitcher};
use std::sync::Arc;

// ── Helpers ────────────────────────────────────────────────────

struct Fixture {
    backend: Arc<MemoryBackend>,
    temp: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            backend: Arc::new(MemoryBackend::new()),
            temp: tempfile::tempdir().unwrap(),
        }
    }

    fn clips(&self, seconds: &[f64]) -> Vec<RenderClip> {
        seconds
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let path = format!("clip_{i}.mp4");
                self.backend.add_clip(&path, *s);
                RenderClip::new(path)
            })
            .collect()
    }

    fn stitcher(&self) -> Stitcher {
        let settings = RenderSettings {
            width: 16,
            height: 16,
            temp_dir: Some(self.temp.path().to_path_buf()),
            ..Default::default()
        };
        Stitcher::new(self.backend.clone(), settings)
    }
}

/// Fails for the listed kinds, composites the rest normally.
struct FailingCompositor(Vec<TransitionKind>);

impl FrameCompositor for FailingCompositor {
    fn composite(
        &self,
        kind: TransitionKind,
        a: &FrameBuffer,
        b: &FrameBuffer,
        progress: f32,
        frame_index: u32,
    ) -> Result<FrameBuffer> {
        if self.0.contains(&kind) {
            return Err(AdReelError::Effect(format!("{kind} shader failed")));
        }
        EffectsCompositor.composite(kind, a, b, progress, frame_index)
    }
}

fn secs(s: i64) -> RationalTime {
    RationalTime::from_secs(s)
}

// ── Duration law ───────────────────────────────────────────────

#[test]
fn all_cuts_sum_durations() {
    let fx = Fixture::new();
    let clips = fx.clips(&[3.0, 4.0, 5.0, 2.0]);
    let req = RenderRequest::from_names(clips, &["cut", "cut", "cut"], "out.mp4");
    let out = fx.stitcher().render(&req, &CancelToken::new()).unwrap();
    assert_eq!(out.duration, secs(14));
    assert!(out.boundaries.iter().all(|b| !b.degraded));
}

#[test]
fn three_crossfaded_clips_last_fourteen_seconds() {
    let fx = Fixture::new();
    let clips = fx.clips(&[5.0, 5.0, 5.0]);
    let req = RenderRequest::from_names(clips, &["crossfade", "crossfade"], "out.mp4");
    let out = fx.stitcher().render(&req, &CancelToken::new()).unwrap();
    assert_eq!(out.duration, secs(14));
    assert_eq!(
        fx.backend.clip("out.mp4").unwrap().duration,
        secs(14),
        "backend output length"
    );
}

#[test]
fn every_transition_consumes_its_overlap() {
    for kind in TransitionKind::ALL {
        let fx = Fixture::new();
        let clips = fx.clips(&[2.0, 2.0]);
        let req = RenderRequest::new(clips, vec![kind], "out.mp4");
        let out = fx.stitcher().render(&req, &CancelToken::new()).unwrap();
        assert_eq!(out.duration, secs(4) - kind.overlap(), "{kind}");
        assert_eq!(out.boundaries[0].applied, kind);
    }
}

#[test]
fn unknown_transition_behaves_like_crossfade() {
    let unknown = {
        let fx = Fixture::new();
        let clips = fx.clips(&[5.0, 5.0]);
        let req = RenderRequest::from_names(clips, &["nonexistent_type"], "out.mp4");
        let out = fx.stitcher().render(&req, &CancelToken::new()).unwrap();
        (out.duration, out.boundaries[0].applied, fx.backend.concats())
    };
    let crossfade = {
        let fx = Fixture::new();
        let clips = fx.clips(&[5.0, 5.0]);
        let req = RenderRequest::from_names(clips, &["crossfade"], "out.mp4");
        let out = fx.stitcher().render(&req, &CancelToken::new()).unwrap();
        (out.duration, out.boundaries[0].applied, fx.backend.concats())
    };
    assert_eq!(unknown.0, crossfade.0);
    assert_eq!(unknown.1, TransitionKind::Crossfade);
    let ranges = |c: &Vec<adreel_media::ConcatRequest>| -> Vec<TimeRange> {
        c[0].pieces.iter().map(|p| p.range).collect()
    };
    assert_eq!(ranges(&unknown.2), ranges(&crossfade.2));
}

#[test]
fn fades_at_both_ends() {
    let fx = Fixture::new();
    let clips = fx.clips(&[2.0, 2.0]);
    let req = RenderRequest::from_names(clips, &["flash"], "out.mp4");
    fx.stitcher().render(&req, &CancelToken::new()).unwrap();
    let concat = &fx.backend.concats()[0];
    assert_eq!(concat.fade_in, FADE_DURATION);
    assert_eq!(concat.fade_out, FADE_DURATION);
}

#[test]
fn fades_clamped_on_tiny_output() {
    let fx = Fixture::new();
    let clips = fx.clips(&[0.4]);
    let req = RenderRequest::new(clips, Vec::new(), "out.mp4");
    let out = fx.stitcher().render(&req, &CancelToken::new()).unwrap();
    assert_eq!(out.duration, RationalTime::new(2, 5));
    assert_eq!(fx.backend.concats()[0].fade_in, RationalTime::new(1, 5));
}

#[test]
fn trimmed_windows_render_only_the_window() {
    let fx = Fixture::new();
    let mut clips = fx.clips(&[6.0, 6.0]);
    clips[0] = clips[0].clone().with_range(TimeRange::new(secs(1), secs(3)));
    let req = RenderRequest::from_names(clips, &["wipe_left"], "out.mp4");
    let out = fx.stitcher().render(&req, &CancelToken::new()).unwrap();
    assert_eq!(out.duration, RationalTime::new(17, 2));
    let first = &fx.backend.concats()[0].pieces[0];
    assert_eq!(first.range, TimeRange::new(secs(1), RationalTime::new(5, 2)));
}

// ── Fallback ladder ────────────────────────────────────────────

#[test]
fn failing_transition_degrades_to_crossfade() {
    let fx = Fixture::new();
    let clips = fx.clips(&[5.0, 5.0]);
    let glitch = TransitionKind::Glitch;
    let req = RenderRequest::new(clips, vec![glitch], "out.mp4");
    let stitcher = fx.stitcher().with_compositor(Arc::new(FailingCompositor(vec![glitch])));
    let out = stitcher.render(&req, &CancelToken::new()).unwrap();

    let report = &out.boundaries[0];
    assert!(report.degraded);
    assert_eq!(report.requested, glitch);
    assert_eq!(report.applied, TransitionKind::Crossfade);
    assert!(report.error.as_deref().unwrap().contains("shader failed"));
    assert_eq!(out.duration, RationalTime::new(19, 2));
}

#[test]
fn failing_crossfade_degrades_to_cut() {
    let fx = Fixture::new();
    let clips = fx.clips(&[5.0, 5.0, 5.0]);
    let wipe = TransitionKind::Wipe(Direction::Up);
    let req = RenderRequest::new(clips, vec![wipe, TransitionKind::Flash], "out.mp4");
    let failing = FailingCompositor(vec![wipe, TransitionKind::Crossfade]);
    let out = fx
        .stitcher()
        .with_compositor(Arc::new(failing))
        .render(&req, &CancelToken::new())
        .unwrap();

    assert_eq!(out.boundaries[0].applied, TransitionKind::Cut);
    assert!(out.boundaries[0].degraded);
    // The second boundary is unaffected.
    assert_eq!(out.boundaries[1].applied, TransitionKind::Flash);
    assert!(!out.boundaries[1].degraded);
    assert_eq!(out.degraded_count(), 1);
    assert_eq!(out.duration, secs(15) - TransitionKind::Flash.overlap());
}

#[test]
fn clip_shorter_than_overlap_degrades() {
    let fx = Fixture::new();
    let clips = fx.clips(&[0.4, 5.0]);
    let req = RenderRequest::from_names(clips, &["crossfade"], "out.mp4");
    let out = fx.stitcher().render(&req, &CancelToken::new()).unwrap();
    assert_eq!(out.boundaries[0].applied, TransitionKind::Cut);
    assert!(out.boundaries[0].degraded);
    assert_eq!(out.duration, RationalTime::new(27, 5));
}

#[test]
fn overlaps_cannot_consume_a_middle_clip() {
    let fx = Fixture::new();
    // 0.9 s middle clip: the first crossfade leaves 0.4 s, too short for
    // the second.
    let clips = fx.clips(&[5.0, 0.9, 5.0]);
    let req = RenderRequest::from_names(clips, &["crossfade", "crossfade"], "out.mp4");
    let out = fx.stitcher().render(&req, &CancelToken::new()).unwrap();
    assert_eq!(out.boundaries[0].applied, TransitionKind::Crossfade);
    assert_eq!(out.boundaries[1].applied, TransitionKind::Cut);
    assert_eq!(out.duration, RationalTime::new(52, 5));
}

// ── Fatal conditions ───────────────────────────────────────────

#[test]
fn corrupt_source_is_fatal_and_named() {
    let fx = Fixture::new();
    let mut clips = fx.clips(&[5.0, 5.0]);
    fx.backend.add_corrupt("broken.mp4", 5.0);
    clips.push(RenderClip::new("broken.mp4").with_label("scene 3"));
    let req = RenderRequest::from_names(clips, &["crossfade", "crossfade"], "out.mp4");
    let err = fx.stitcher().render(&req, &CancelToken::new()).unwrap_err();
    match err {
        AdReelError::CorruptClip { clip, .. } => assert_eq!(clip, "scene 3"),
        other => panic!("expected CorruptClip, got {other}"),
    }
    assert!(fx.backend.concats().is_empty());
}

#[test]
fn missing_source_is_corrupt() {
    let fx = Fixture::new();
    let mut clips = fx.clips(&[5.0]);
    clips.push(RenderClip::new("nowhere.mp4"));
    let req = RenderRequest::from_names(clips, &["cut"], "out.mp4");
    let err = fx.stitcher().render(&req, &CancelToken::new()).unwrap_err();
    assert!(matches!(err, AdReelError::CorruptClip { ref clip, .. } if clip == "nowhere.mp4"));
}

#[test]
fn empty_request_rejected() {
    let fx = Fixture::new();
    let req = RenderRequest::new(Vec::new(), Vec::new(), "out.mp4");
    assert!(fx.stitcher().render(&req, &CancelToken::new()).is_err());
}

#[test]
fn vanishing_frame_rate_rejected() {
    let fx = Fixture::new();
    let clips = fx.clips(&[2.0, 2.0]);
    let req = RenderRequest::from_names(clips, &["crossfade"], "out.mp4");
    let settings = RenderSettings {
        fps: 0.001,
        width: 16,
        height: 16,
        temp_dir: Some(fx.temp.path().to_path_buf()),
        ..Default::default()
    };
    let err = Stitcher::new(fx.backend.clone(), settings)
        .render(&req, &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, AdReelError::InvalidParameter(_)));
    assert!(fx.backend.concats().is_empty());
}

#[test]
fn cancellation_is_not_degradation() {
    /// Cancels the token from inside compositing.
    struct CancelOnComposite(CancelToken);

    impl FrameCompositor for CancelOnComposite {
        fn composite(
            &self,
            kind: TransitionKind,
            a: &FrameBuffer,
            b: &FrameBuffer,
            progress: f32,
            frame_index: u32,
        ) -> Result<FrameBuffer> {
            self.0.cancel();
            EffectsCompositor.composite(kind, a, b, progress, frame_index)
        }
    }

    let fx = Fixture::new();
    let clips = fx.clips(&[5.0, 5.0]);
    let req = RenderRequest::from_names(clips, &["zoom_blur"], "out.mp4");
    let cancel = CancelToken::new();
    let err = fx
        .stitcher()
        .with_compositor(Arc::new(CancelOnComposite(cancel.clone())))
        .render(&req, &cancel)
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(fx.backend.concats().is_empty());
    // Scratch directory removed on the error path too.
    assert_eq!(std::fs::read_dir(fx.temp.path()).unwrap().count(), 0);
}
