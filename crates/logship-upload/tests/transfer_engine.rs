//! Transfer engine behaviour against a fake transport

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use common::{list_dir, ready_policy, write_aged, FakeFactory, FakeServer, RecordingNotifier};
use logship_core::domain::{FileResult, JobOutcome};
use logship_upload::{TransferEngine, TransferOptions};

fn engine(server: &Arc<FakeServer>, notifier: &Arc<RecordingNotifier>) -> TransferEngine {
    engine_with_limit(server, notifier, None)
}

fn engine_with_limit(
    server: &Arc<FakeServer>,
    notifier: &Arc<RecordingNotifier>,
    file_attempt_limit: Option<u32>,
) -> TransferEngine {
    TransferEngine::new(
        Arc::new(FakeFactory(Arc::clone(server))),
        notifier.clone(),
        TransferOptions {
            retry_backoff: Duration::from_millis(10),
            file_attempt_limit,
        },
    )
}

/// a, b, c and d (newest) in the json class
fn seed_json(dir: &std::path::Path) {
    write_aged(dir, "a.json", 400);
    write_aged(dir, "b.json", 300);
    write_aged(dir, "c.json", 200);
    write_aged(dir, "d.json", 100);
}

#[tokio::test]
async fn test_uploads_in_order_and_holds_back_newest() {
    let dir = tempfile::tempdir().unwrap();
    seed_json(dir.path());
    let server = FakeServer::new();
    let notifier = Arc::new(RecordingNotifier::default());

    let report = engine(&server, &notifier)
        .run_job(&ready_policy(), dir.path(), &CancellationToken::new())
        .await;

    assert_eq!(report.outcome, JobOutcome::Completed);
    assert_eq!(server.stored_names(), vec!["a.json", "b.json", "c.json"]);
    assert_eq!(server.stored()[0].1, b"a.json".to_vec());
    assert_eq!(list_dir(dir.path()), vec!["d.json"]);
    assert_eq!(report.sessions, 1);
    assert_eq!(report.uploaded_count(), 3);
    assert!(report
        .files
        .iter()
        .all(|f| f.result == FileResult::Uploaded { bytes: 6, deleted: true }));
    assert!(notifier.errors.lock().unwrap().is_empty());
    assert_eq!(notifier.raised.load(Ordering::SeqCst), 1);
    assert_eq!(notifier.cleared.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_put_failure_resumes_from_failed_file() {
    let dir = tempfile::tempdir().unwrap();
    seed_json(dir.path());
    let server = FakeServer::new();
    server.fail_put("b.json", 1);
    server.observe(dir.path());
    let notifier = Arc::new(RecordingNotifier::default());

    let report = engine(&server, &notifier)
        .run_job(&ready_policy(), dir.path(), &CancellationToken::new())
        .await;

    assert_eq!(
        server.events(),
        vec![
            "connect",
            "put a.json",
            "put-fail b.json",
            "close",
            "connect",
            "put b.json",
            "put c.json",
            "close",
        ]
    );
    // a was deleted before the retry session opened
    assert_eq!(server.listings()[1], vec!["b.json", "c.json", "d.json"]);
    assert_eq!(list_dir(dir.path()), vec!["d.json"]);

    assert_eq!(report.sessions, 2);
    let b = report.files.iter().find(|f| f.name == "b.json").unwrap();
    assert_eq!(b.attempts, 2);
    assert!(b.result.is_uploaded());
    assert_eq!(notifier.errors.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_file_is_retried_until_accepted() {
    let dir = tempfile::tempdir().unwrap();
    seed_json(dir.path());
    let server = FakeServer::new();
    server.fail_put("b.json", 5);
    let notifier = Arc::new(RecordingNotifier::default());

    let report = engine(&server, &notifier)
        .run_job(&ready_policy(), dir.path(), &CancellationToken::new())
        .await;

    assert_eq!(report.outcome, JobOutcome::Completed);
    // c never leaves ahead of b
    assert_eq!(server.stored_names(), vec!["a.json", "b.json", "c.json"]);
    assert_eq!(list_dir(dir.path()), vec!["d.json"]);
    assert_eq!(report.sessions, 6);
    let puts: Vec<String> = server
        .events()
        .into_iter()
        .filter(|e| e.starts_with("put"))
        .collect();
    assert_eq!(puts[0], "put a.json");
    assert!(puts[1..6].iter().all(|e| e == "put-fail b.json"));
    assert_eq!(puts[6..].to_vec(), vec!["put b.json", "put c.json"]);

    let b = report.files.iter().find(|f| f.name == "b.json").unwrap();
    assert_eq!(b.attempts, 6);
    assert!(b.result.is_uploaded());
    assert_eq!(report.failed_count(), 0);
    assert_eq!(notifier.errors.lock().unwrap().len(), 5);
}

#[tokio::test]
async fn test_attempt_limit_leaves_rest_of_class_in_place() {
    let dir = tempfile::tempdir().unwrap();
    seed_json(dir.path());
    let server = FakeServer::new();
    server.fail_put("b.json", u32::MAX);
    let notifier = Arc::new(RecordingNotifier::default());

    let report = engine_with_limit(&server, &notifier, Some(3))
        .run_job(&ready_policy(), dir.path(), &CancellationToken::new())
        .await;

    assert_eq!(report.outcome, JobOutcome::Completed);
    assert_eq!(server.stored_names(), vec!["a.json"]);
    assert_eq!(list_dir(dir.path()), vec!["b.json", "c.json", "d.json"]);
    assert_eq!(report.sessions, 3);
    assert!(!server.events().iter().any(|e| e.contains("c.json")));

    let b = report.files.iter().find(|f| f.name == "b.json").unwrap();
    assert_eq!(b.attempts, 3);
    assert!(matches!(&b.result, FileResult::Failed { reason } if reason.contains("put failed")));
    assert!(report.files.iter().all(|f| f.name != "c.json"));
    assert_eq!(report.failed_count(), 1);
}

#[tokio::test]
async fn test_failed_file_keeps_its_place_in_next_job() {
    let dir = tempfile::tempdir().unwrap();
    seed_json(dir.path());
    let server = FakeServer::new();
    server.fail_put("b.json", 1);
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = engine_with_limit(&server, &notifier, Some(1));

    let first = engine
        .run_job(&ready_policy(), dir.path(), &CancellationToken::new())
        .await;
    assert_eq!(first.sessions, 1);
    assert_eq!(server.stored_names(), vec!["a.json"]);
    assert_eq!(list_dir(dir.path()), vec!["b.json", "c.json", "d.json"]);

    // A newer file arrives, so d becomes eligible too
    write_aged(dir.path(), "e.json", 10);
    let second = engine
        .run_job(&ready_policy(), dir.path(), &CancellationToken::new())
        .await;

    assert_eq!(second.outcome, JobOutcome::Completed);
    assert_eq!(second.sessions, 1);
    let names: Vec<&str> = second.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["b.json", "c.json", "d.json"]);
    assert_eq!(
        server.stored_names(),
        vec!["a.json", "b.json", "c.json", "d.json"]
    );
    assert_eq!(list_dir(dir.path()), vec!["e.json"]);
}

#[tokio::test]
async fn test_classes_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    write_aged(dir.path(), "a.json", 300);
    write_aged(dir.path(), "z.json", 10);
    write_aged(dir.path(), "a.txt", 300);
    write_aged(dir.path(), "b.txt", 200);
    write_aged(dir.path(), "z.txt", 10);
    let server = FakeServer::new();
    server.fail_put("a.json", u32::MAX);
    let notifier = Arc::new(RecordingNotifier::default());

    let report = engine_with_limit(&server, &notifier, Some(3))
        .run_job(&ready_policy(), dir.path(), &CancellationToken::new())
        .await;

    assert_eq!(server.stored_names(), vec!["a.txt", "b.txt"]);
    assert_eq!(list_dir(dir.path()), vec!["a.json", "z.json", "z.txt"]);
    assert_eq!(report.uploaded_count(), 2);
    assert_eq!(report.failed_count(), 1);
}

#[tokio::test]
async fn test_configuration_error_aborts_without_attempt() {
    let dir = tempfile::tempdir().unwrap();
    seed_json(dir.path());
    let server = FakeServer::new();
    let notifier = Arc::new(RecordingNotifier::default());

    let mut policy = ready_policy();
    policy.credentials.secret = "  ".into();
    let report = engine(&server, &notifier)
        .run_job(&policy, dir.path(), &CancellationToken::new())
        .await;

    assert!(matches!(&report.outcome, JobOutcome::Aborted { reason } if reason.contains("password")));
    assert_eq!(report.sessions, 0);
    assert!(server.events().is_empty());
    assert_eq!(list_dir(dir.path()).len(), 4);
    assert_eq!(notifier.errors.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_directory_aborts() {
    let server = FakeServer::new();
    let notifier = Arc::new(RecordingNotifier::default());

    let report = engine(&server, &notifier)
        .run_job(
            &ready_policy(),
            std::path::Path::new("/nonexistent/logship/outbox"),
            &CancellationToken::new(),
        )
        .await;

    assert!(!report.is_completed());
    assert_eq!(report.sessions, 0);
}

#[tokio::test]
async fn test_cancellation_stops_at_backoff() {
    let dir = tempfile::tempdir().unwrap();
    seed_json(dir.path());
    let server = FakeServer::new();
    server.fail_connect(u32::MAX);
    let notifier = Arc::new(RecordingNotifier::default());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = engine(&server, &notifier)
        .run_job(&ready_policy(), dir.path(), &cancel)
        .await;

    assert_eq!(
        report.outcome,
        JobOutcome::Aborted {
            reason: "cancelled".into()
        }
    );
    assert_eq!(report.sessions, 1);
    assert_eq!(report.failed_count(), 3);
    assert_eq!(list_dir(dir.path()).len(), 4);
}

#[tokio::test]
async fn test_connect_failures_are_retried() {
    let dir = tempfile::tempdir().unwrap();
    seed_json(dir.path());
    let server = FakeServer::new();
    server.fail_connect(2);
    let notifier = Arc::new(RecordingNotifier::default());

    let report = engine(&server, &notifier)
        .run_job(&ready_policy(), dir.path(), &CancellationToken::new())
        .await;

    assert_eq!(report.sessions, 3);
    assert_eq!(server.stored_names(), vec!["a.json", "b.json", "c.json"]);
    assert_eq!(notifier.errors.lock().unwrap().len(), 2);
    assert_eq!(server.max_active(), 1);
}
