//! Job lifecycle integration tests.
//!
//! Drives [`JobCoordinator`] directly with the scripted engine and checks the
//! state machine, the produced timeline, and scratch-directory cleanup.

mod common;

use bf_av::workspace::UPLOAD_PREFIX;
use bf_av::ScopedDir;
use bf_core::{ChapterMetadata, Error, JobSubmission, UploadedChapter};
use bf_pipeline::{DeliveryOutcome, JobState};
use common::{write_chapter, ScriptedEngine, TestHarness};
use futures::StreamExt;

/// Stage `durations` as uploaded chapter files in a fresh upload scope.
fn staged_submission(harness: &TestHarness, durations: &[&str]) -> (ScopedDir, JobSubmission) {
    let staging = ScopedDir::acquire(Some(harness.root.path()), UPLOAD_PREFIX).unwrap();
    let files = durations
        .iter()
        .enumerate()
        .map(|(i, d)| UploadedChapter {
            path: write_chapter(staging.path(), &format!("chapter_{i}.mp3"), d),
            original_name: Some(format!("{:02} - Part.mp3", i + 1)),
        })
        .collect();
    let chapter_metadata = (0..durations.len())
        .map(|i| ChapterMetadata {
            original_name: format!("{:02} - Part.mp3", i + 1),
            title: format!("Part {}", i + 1),
        })
        .collect();
    let submission = JobSubmission {
        book_title: "Test".into(),
        author: "A".into(),
        cover_art_path: None,
        files,
        chapter_metadata,
    };
    (staging, submission)
}

// ---------------------------------------------------------------------------
// Received -> ... -> Done
// ---------------------------------------------------------------------------

#[tokio::test]
async fn job_runs_to_done_and_cleans_up() {
    let harness = TestHarness::new();
    let (staging, submission) = staged_submission(&harness, &["12345"]);
    let staging_path = staging.path().to_path_buf();

    let job = harness.coordinator().run(submission, Some(staging)).await.unwrap();
    assert_eq!(job.state(), JobState::Encoding);
    assert!(!staging_path.exists(), "staging must be released after encode");
    assert_eq!(job.file_name, "Test_Audiobook.m4b");
    assert_eq!(job.size_bytes, common::OUTPUT_SIZE as u64);
    assert_eq!(harness.scratch_dirs().len(), 1);

    let (stream, delivery) = job.into_stream().await.unwrap();
    let chunks: Vec<_> = stream.collect().await;
    assert!(chunks.len() >= 3, "expected chunked delivery, got {}", chunks.len());

    let (state, outcome) = delivery.finished().await;
    assert_eq!(state, JobState::Done);
    assert_eq!(
        outcome,
        DeliveryOutcome::Completed {
            bytes: common::OUTPUT_SIZE as u64
        }
    );
    harness.assert_all_released().await;
}

#[tokio::test]
async fn three_chapter_timeline() {
    let harness = TestHarness::new();
    let (staging, submission) = staged_submission(&harness, &["5000", "3000", "7000"]);

    let job = harness.coordinator().run(submission, Some(staging)).await.unwrap();
    let spans: Vec<(u64, u64, &str)> = job
        .timestamps
        .iter()
        .map(|t| (t.start_ms, t.end_ms, t.title.as_str()))
        .collect();
    assert_eq!(
        spans,
        vec![
            (0, 5000, "Part 1"),
            (5000, 8000, "Part 2"),
            (8000, 15000, "Part 3"),
        ]
    );

    let record = harness.engine.last();
    let audio: Vec<_> = record.invocation.plan().inputs()[..3]
        .iter()
        .map(|i| i.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(audio, vec!["chapter_0.mp3", "chapter_1.mp3", "chapter_2.mp3"]);
    assert_eq!(record.metadata_document.matches("[CHAPTER]").count(), 3);
    assert!(record.metadata_document.contains("date=2024\n"));

    drop(job);
    harness.assert_all_released().await;
}

#[tokio::test]
async fn zero_length_chapter_is_legal() {
    let harness = TestHarness::new();
    let (staging, submission) = staged_submission(&harness, &["0", "2500"]);

    let job = harness.coordinator().run(submission, Some(staging)).await.unwrap();
    assert_eq!((job.timestamps[0].start_ms, job.timestamps[0].end_ms), (0, 0));
    assert_eq!((job.timestamps[1].start_ms, job.timestamps[1].end_ms), (0, 2500));
}

// ---------------------------------------------------------------------------
// Failure paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn probe_failure_names_chapter_and_skips_encode() {
    let harness = TestHarness::new();
    let (staging, submission) = staged_submission(&harness, &["5000", "garbage", "7000"]);

    let err = harness
        .coordinator()
        .run(submission, Some(staging))
        .await
        .unwrap_err();
    match err {
        Error::Probe { chapter, message } => {
            assert_eq!(chapter, "02 - Part.mp3");
            assert!(!message.contains(harness.root.path().to_str().unwrap()));
        }
        other => panic!("expected probe error, got {other:?}"),
    }
    assert_eq!(harness.engine.mux_count(), 0);
    harness.assert_all_released().await;
}

#[tokio::test]
async fn encode_failure_releases_both_scopes() {
    let harness = TestHarness::with_engine(ScriptedEngine::failing());
    let (staging, submission) = staged_submission(&harness, &["1000", "2000"]);

    let err = harness
        .coordinator()
        .run(submission, Some(staging))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Encode { .. }));
    assert_eq!(err.http_status(), 500);
    assert!(err.details().unwrap().contains("Conversion failed!"));
    harness.assert_all_released().await;
}

#[tokio::test]
async fn validation_failure_releases_staging() {
    let harness = TestHarness::new();
    let (staging, mut submission) = staged_submission(&harness, &["1000"]);
    submission.author = String::new();

    let err = harness
        .coordinator()
        .run(submission, Some(staging))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    harness.assert_all_released().await;
}

#[tokio::test]
async fn abandoned_delivery_still_cleans_up() {
    let harness = TestHarness::new();
    let (staging, submission) = staged_submission(&harness, &["1000"]);
    let job = harness.coordinator().run(submission, Some(staging)).await.unwrap();

    let (mut stream, delivery) = job.into_stream().await.unwrap();
    let _first = stream.next().await.unwrap().unwrap();
    drop(stream);

    let (state, outcome) = delivery.finished().await;
    assert_eq!(state, JobState::Failed);
    assert!(matches!(outcome, DeliveryOutcome::Abandoned { .. }));
    harness.assert_all_released().await;
}

// ---------------------------------------------------------------------------
// Isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_jobs_use_separate_scopes() {
    let harness = TestHarness::new();
    let coordinator = harness.coordinator();

    let (s1, sub1) = staged_submission(&harness, &["1000", "2000"]);
    let (s2, sub2) = staged_submission(&harness, &["3000"]);

    let (a, b) = tokio::join!(
        coordinator.run(sub1, Some(s1)),
        coordinator.run(sub2, Some(s2))
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.id, b.id);
    assert_ne!(a.output_path.parent(), b.output_path.parent());
    assert_eq!(a.timestamps.last().unwrap().end_ms, 3000);
    assert_eq!(b.timestamps.last().unwrap().end_ms, 3000);

    drop(a);
    drop(b);
    harness.assert_all_released().await;
}

#[tokio::test]
async fn identical_inputs_give_identical_metadata() {
    let harness = TestHarness::new();
    let coordinator = harness.coordinator();

    let mut docs = Vec::new();
    for _ in 0..2 {
        let (staging, submission) = staged_submission(&harness, &["5000", "3000"]);
        let job = coordinator.run(submission, Some(staging)).await.unwrap();
        docs.push(harness.engine.last().metadata_document);
        drop(job);
    }
    assert_eq!(docs[0], docs[1]);
}
