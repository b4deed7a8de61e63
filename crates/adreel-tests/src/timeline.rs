//! Integration tests for editing sessions.
//!
//! Exercises adreel-timeline through the session service and the JSON
//! store, and checks how edited sessions resolve into media intervals.

use adreel_core::{AdReelError, RationalTime};
use adreel_timeline::{
    resolve_intervals, Clip, EditCommand, EditOutcome, JsonSessionStore, SessionService, SessionStatus,
    TimelineConfig,
};
use std::sync::Arc;

// ── Helpers ────────────────────────────────────────────────────

fn scenes() -> Vec<Clip> {
    vec![
        Clip::from_seconds(1, "scene_1.mp4", 0.0, 5.0),
        Clip::from_seconds(2, "scene_2.mp4", 5.0, 10.0),
        Clip::from_seconds(3, "scene_3.mp4", 10.0, 18.0),
    ]
}

fn service(root: &std::path::Path) -> SessionService {
    SessionService::new(Arc::new(JsonSessionStore::new(root)), TimelineConfig::default())
}

fn secs(s: i64) -> RationalTime {
    RationalTime::from_secs(s)
}

// ── Lifecycle ──────────────────────────────────────────────────

#[test]
fn session_created_once_and_reloaded() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());
    let created = svc.open_or_create("gen-1", scenes()).unwrap();
    assert_eq!(created.version(), 1);
    assert_eq!(created.status(), SessionStatus::Active);

    // A second open ignores the scene list and returns the stored session.
    let again = service(dir.path())
        .open_or_create("gen-1", vec![Clip::from_seconds(9, "other.mp4", 0.0, 1.0)])
        .unwrap();
    assert_eq!(again.id(), created.id());
    assert_eq!(again.clips().len(), 3);
}

#[test]
fn edit_save_export_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());
    let session = svc.open_or_create("gen-1", scenes()).unwrap();

    // Export straight away is refused: nothing saved, nothing edited.
    assert!(matches!(
        svc.mark_exported("gen-1", 1).unwrap_err(),
        AdReelError::InvalidEditingState(_)
    ));

    let a = session.clips()[0].id;
    let b = session.clips()[1].id;
    let (session, outcome) = svc
        .apply("gen-1", &EditCommand::Merge { clip_ids: vec![a, b] }, 1)
        .unwrap();
    assert_eq!(session.version(), 2);
    assert_eq!(session.clips().len(), 2);
    let EditOutcome::Merged { clip } = outcome else {
        panic!("expected a merge outcome");
    };
    assert_eq!(clip.duration(), secs(10));

    let saved = svc.save("gen-1", 2, None).unwrap();
    assert_eq!(saved.status(), SessionStatus::Saved);
    let exported = svc.mark_exported("gen-1", saved.version()).unwrap();
    assert_eq!(exported.status(), SessionStatus::Exported);
    assert_eq!(exported.version(), 4);

    // Persisted across handles.
    let reloaded = service(dir.path()).load("gen-1").unwrap();
    assert_eq!(reloaded, exported);
}

#[test]
fn competing_edits_second_is_stale() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());
    let session = svc.open_or_create("gen-1", scenes()).unwrap();
    let clip = session.clips()[2].id;

    let first = EditCommand::Trim {
        clip_id: clip,
        trim_start: 11.0,
        trim_end: 17.0,
    };
    let second = EditCommand::Split {
        clip_id: clip,
        split_time: 14.0,
    };
    svc.apply("gen-1", &first, 1).unwrap();
    let err = svc.apply("gen-1", &second, 1).unwrap_err();
    assert_eq!(err.to_string(), AdReelError::StaleWriteConflict { expected: 1, actual: 2 }.to_string());

    let stored = svc.load("gen-1").unwrap();
    assert_eq!(stored.version(), 2);
    assert_eq!(stored.clips().len(), 3);
}

#[test]
fn invalid_snapshot_rejected_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());
    svc.open_or_create("gen-1", scenes()).unwrap();

    let snapshot = serde_json::json!({ "clips": [{ "scene_number": 1 }] });
    let err = svc.save("gen-1", 1, Some(snapshot)).unwrap_err();
    assert!(matches!(err, AdReelError::InvalidEditingState(ref msg) if msg.starts_with("entry 0")));
    assert_eq!(svc.load("gen-1").unwrap().status(), SessionStatus::Active);
}

#[test]
fn snapshot_roundtrips_through_save() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());
    let session = svc.open_or_create("gen-1", scenes()).unwrap();

    let mut clips = session.clips().to_vec();
    clips.pop();
    let snapshot = serde_json::to_value(&clips).unwrap();
    let saved = svc.save("gen-1", 1, Some(snapshot)).unwrap();
    assert_eq!(saved.clips().len(), 2);
    assert!(saved.has_edits());
    assert_eq!(saved.total_duration(), secs(10));
}

// ── Resolution ─────────────────────────────────────────────────

#[test]
fn split_and_trim_resolve_to_media_local_windows() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());
    let session = svc.open_or_create("gen-1", scenes()).unwrap();
    let third = session.clips()[2].id;

    let (session, _) = svc
        .apply(
            "gen-1",
            &EditCommand::Split {
                clip_id: third,
                split_time: 13.0,
            },
            1,
        )
        .unwrap();
    let right = session.clips()[3].id;
    let (session, _) = svc
        .apply(
            "gen-1",
            &EditCommand::Trim {
                clip_id: right,
                trim_start: 14.0,
                trim_end: 17.5,
            },
            2,
        )
        .unwrap();

    let intervals = resolve_intervals(&session).unwrap();
    assert_eq!(intervals.len(), 4);
    let last = &intervals[3];
    assert_eq!(last.path, "scene_3.mp4");
    // scene_3 starts at timeline 10 s.
    assert_eq!(last.in_point, secs(4));
    assert_eq!(last.out_point, RationalTime::new(15, 2));
    let total: RationalTime = intervals.iter().map(|i| i.duration()).sum();
    assert_eq!(total, session.total_duration());
}

#[test]
fn merged_clip_spans_two_media_files() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());
    let session = svc.open_or_create("gen-1", scenes()).unwrap();
    let ids = vec![session.clips()[1].id, session.clips()[2].id];
    let (session, _) = svc.apply("gen-1", &EditCommand::Merge { clip_ids: ids }, 1).unwrap();

    let intervals = resolve_intervals(&session).unwrap();
    assert_eq!(intervals.len(), 3);
    assert_eq!(intervals[1].clip_index, intervals[2].clip_index);
    assert_eq!(intervals[1].path, "scene_2.mp4");
    assert_eq!(intervals[2].path, "scene_3.mp4");
    assert_eq!(intervals[2].range().duration, secs(8));
}
