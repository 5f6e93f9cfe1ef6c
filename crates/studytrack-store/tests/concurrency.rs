//! Concurrent submissions against every profile store.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use futures::future::join_all;
use serde_json::json;

use studytrack_core::engine::{EngineConfig, QuizResponse, StudyEngine};
use studytrack_core::error::StoreError;
use studytrack_core::memory::MemoryStore;
use studytrack_core::model::{QuestionKind, StudentProfile};
use studytrack_core::traits::{FixedClock, ProfileStore};
use studytrack_store::{DocumentStore, FileBackend, MockDocuments, RetryPolicy};

const SUBMISSIONS: usize = 20;

fn engine(store: Arc<dyn ProfileStore>) -> Arc<StudyEngine> {
    let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    Arc::new(StudyEngine::new(store, EngineConfig::default()).with_clock(Arc::new(FixedClock(today))))
}

fn perfect_response(i: usize) -> Vec<QuizResponse> {
    vec![QuizResponse::new(
        format!("q{i}"),
        QuestionKind::MultipleChoice,
        "A",
        "A",
    )]
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 10,
        retry_delay: Duration::from_millis(1),
    }
}

async fn submit_concurrently(store: Arc<dyn ProfileStore>) -> StudentProfile {
    let engine = engine(Arc::clone(&store));
    let tasks = (0..SUBMISSIONS).map(|i| {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine
                .grade_session("alice", "algebra", &perfect_response(i))
                .await
        })
    });
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }
    store.get_or_create("alice").await.unwrap()
}

fn assert_no_lost_updates(profile: &StudentProfile) {
    assert_eq!(profile.quiz_history.len(), SUBMISSIONS);
    // One XP per single-question session.
    assert_eq!(profile.xp, SUBMISSIONS as u64);
    assert_eq!(profile.srs["algebra"].repetitions, SUBMISSIONS as u32);
    assert_eq!(profile.streak, 1);
    assert!(profile.completed_topics.contains("algebra"));
    assert!(profile.badges.contains("mastery_algebra"));

    let mut ids: Vec<&str> = profile
        .quiz_history
        .iter()
        .map(|q| q.answers[0].question_id.as_str())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), SUBMISSIONS, "every submission recorded once");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn memory_store_keeps_every_submission() {
    let profile = submit_concurrently(Arc::new(MemoryStore::new())).await;
    assert_no_lost_updates(&profile);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn file_store_keeps_every_submission() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FileBackend::open(dir.path()).unwrap();
    let store = Arc::new(DocumentStore::new(backend, fast_retry()));

    let profile = submit_concurrently(store).await;
    assert_no_lost_updates(&profile);

    // A second store over the same directory sees the same state.
    let reopened = DocumentStore::new(FileBackend::open(dir.path()).unwrap(), fast_retry());
    let again = reopened.get_or_create("alice").await.unwrap();
    assert_eq!(again, profile);
}

#[tokio::test]
async fn different_students_do_not_interfere() {
    let store: Arc<dyn ProfileStore> =
        Arc::new(DocumentStore::new(MockDocuments::new(), fast_retry()));
    let engine = engine(Arc::clone(&store));

    let tasks = (0..10).map(|i| {
        let engine = Arc::clone(&engine);
        async move {
            engine
                .grade_session(&format!("student{i}"), "algebra", &perfect_response(i))
                .await
        }
    });
    for result in join_all(tasks).await {
        result.unwrap();
    }

    for i in 0..10 {
        let profile = store.get_or_create(&format!("student{i}")).await.unwrap();
        assert_eq!(profile.quiz_history.len(), 1);
        assert_eq!(profile.xp, 1);
    }
}

#[tokio::test]
async fn conflicting_commits_are_retried() {
    let store = DocumentStore::new(MockDocuments::new(), fast_retry());
    store.get_or_create("alice").await.unwrap();

    store.backend().inject_conflicts(3);
    let before = store.backend().commit_count();
    let profile = store.add_study_time("alice", 10).await.unwrap();

    assert_eq!(profile.total_study_time_minutes, 10);
    assert_eq!(store.backend().commit_count() - before, 4);
}

#[tokio::test]
async fn persistent_conflicts_surface_as_error() {
    let policy = RetryPolicy {
        max_retries: 2,
        retry_delay: Duration::from_millis(1),
    };
    let store = DocumentStore::new(MockDocuments::new(), policy);
    store.get_or_create("alice").await.unwrap();

    store.backend().inject_conflicts(100);
    let err = store.add_study_time("alice", 10).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict { attempts: 3, .. }));

    store.backend().inject_conflicts(0);
    let profile = store.get_or_create("alice").await.unwrap();
    assert_eq!(profile.total_study_time_minutes, 0);
}

#[tokio::test]
async fn external_writes_are_merged_not_overwritten() {
    let backend = MockDocuments::new();
    let seeded = json!({
        "student_id": "alice",
        "xp": 7,
        "badges": ["early_bird"],
        "legacy_field": {"kept": true}
    });
    if let serde_json::Value::Object(fields) = seeded {
        backend.seed("alice", fields).await;
    }
    let store = DocumentStore::new(backend, fast_retry());

    store.mark_topic_completed("alice", "algebra").await.unwrap();
    let profile = store.add_study_time("alice", 5).await.unwrap();
    assert_eq!(profile.xp, 7);
    assert!(profile.badges.contains("early_bird"));
    assert!(profile.completed_topics.contains("algebra"));

    let doc = store.backend().document("alice").await.unwrap();
    assert_eq!(doc.revision, 3);
    assert_eq!(doc.fields["legacy_field"], json!({"kept": true}));
    assert_eq!(doc.fields["completed_topics"], json!(["algebra"]));
}

#[tokio::test]
async fn rejected_transition_commits_nothing() {
    let store = DocumentStore::new(MockDocuments::new(), fast_retry());
    store.add_study_time("alice", 30).await.unwrap();
    let commits = store.backend().commit_count();

    let shrink = |p: &mut StudentProfile| -> Result<(), StoreError> {
        p.total_study_time_minutes = 0;
        Ok(())
    };
    let err = store.modify("alice", &shrink).await.unwrap_err();
    assert!(matches!(err, StoreError::Rejected { .. }));
    assert_eq!(store.backend().commit_count(), commits);
}

#[tokio::test]
async fn unchanged_profile_skips_commit() {
    let store = DocumentStore::new(MockDocuments::new(), fast_retry());
    store.get_or_create("alice").await.unwrap();
    let commits = store.backend().commit_count();

    store.mark_topic_completed("alice", "algebra").await.unwrap();
    store.mark_topic_completed("alice", "algebra").await.unwrap();
    assert_eq!(store.backend().commit_count(), commits + 1);
}
