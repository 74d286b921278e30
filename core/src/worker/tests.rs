//! Integration tests for the Worker module

use super::*;
use crate::channel::{mailbox, MailboxSender};
use crate::config::WorkerConfig;
use crate::error::BenchResult;
use crate::metrics::RecordingMetrics;
use crate::otlp::OtlpHttpExporter;
use crate::result_log::ResultLog;
use crate::test_support::{LoopbackExporter, MockExporter};
use crate::traits::{Notifier, TraceExporter};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Helpers
// ============================================================================

/// Notifier that wakes exactly one worker
struct SingleWorker(MailboxSender);

impl Notifier for SingleWorker {
    fn notify(&self, _worker_id: u64) -> BenchResult<()> {
        self.0.try_notify();
        Ok(())
    }
}

struct Harness {
    worker: Worker,
    tx: MailboxSender,
    cancel: CancellationToken,
    log: Arc<ResultLog>,
    metrics: Arc<RecordingMetrics>,
    errors: Arc<AtomicUsize>,
    _dir: TempDir,
}

fn config() -> WorkerConfig {
    WorkerConfig::new("unused:4318", "unused:4319")
        .with_max_trace_depth(3)
        .with_max_span_length(Duration::from_millis(5))
        .with_max_cool_down(Duration::from_millis(10))
        .with_send_timeout(Duration::from_secs(1))
        .with_receive_timeout(Duration::from_secs(5))
}

fn harness(exporter: Arc<dyn TraceExporter>) -> Harness {
    harness_with(exporter, config())
}

fn harness_with(exporter: Arc<dyn TraceExporter>, config: WorkerConfig) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(ResultLog::create(dir.path(), "worker-test").unwrap());
    let metrics = Arc::new(RecordingMetrics::new());
    let errors = Arc::new(AtomicUsize::new(0));
    let cancel = CancellationToken::new();
    let (tx, rx) = mailbox();

    let worker = WorkerBuilder::new("pool", 7)
        .config(Arc::new(config))
        .exporter(exporter)
        .mailbox(rx)
        .cancel_token(cancel.clone())
        .metrics(metrics.clone())
        .result_log(log.clone())
        .error_counter(errors.clone())
        .seed(Some(11))
        .build()
        .unwrap();

    Harness {
        worker,
        tx,
        cancel,
        log,
        metrics,
        errors,
        _dir: dir,
    }
}

/// Status code of every line, in order
fn statuses(log: &ResultLog) -> Vec<u8> {
    log.lines()
        .unwrap()
        .iter()
        .map(|line| line.split(' ').nth(1).unwrap().parse().unwrap())
        .collect()
}

fn last_fields(log: &ResultLog) -> Vec<i64> {
    log.lines()
        .unwrap()
        .last()
        .unwrap()
        .split(' ')
        .map(|f| f.parse().unwrap())
        .collect()
}

// ============================================================================
// Iteration outcomes
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_success_records_round_trip() {
    let loopback = Arc::new(LoopbackExporter::new(Duration::from_millis(20)));
    let mut h = harness(loopback.clone());
    let notifier: Arc<dyn Notifier> = Arc::new(SingleWorker(h.tx.clone()));
    loopback.connect(Arc::downgrade(&notifier));

    let outcome = h.worker.run_once().await.unwrap();
    let round_trip = match outcome {
        IterationOutcome::Success { round_trip } => round_trip,
        other => panic!("expected success, got {other:?}"),
    };
    assert!(round_trip >= Duration::from_millis(20));
    assert!(round_trip < Duration::from_secs(5));

    assert_eq!(statuses(&h.log), vec![WorkerStatus::Success.code()]);
    let fields = last_fields(&h.log);
    assert_eq!(fields.len(), 12);
    assert_eq!(fields[0], 7);
    // Delta equals the measured round trip and is never negative
    assert_eq!(fields[11], round_trip.as_millis() as i64);
    // send-end <= receive
    assert!(fields[9] <= fields[10]);
    assert!(fields[6] < 10);

    let snapshot = h.metrics.snapshot("pool");
    assert_eq!(snapshot.traces_sent, 1);
    assert_eq!(snapshot.traces_received, 1);
    assert_eq!(snapshot.round_trip_samples, 1);
    assert_eq!(h.errors.load(Ordering::SeqCst), 0);
    assert_eq!(h.worker.stats().received, 1);
}

#[tokio::test(start_paused = true)]
async fn test_receive_timeout_logs_once_and_continues() {
    let mut h = harness(Arc::new(MockExporter::new()));

    let outcome = h.worker.run_once().await.unwrap();
    assert_eq!(outcome, IterationOutcome::ReceiveTimeout);
    assert_eq!(statuses(&h.log), vec![WorkerStatus::ReceiveTimeout.code()]);
    assert_eq!(last_fields(&h.log)[11], 5000);
    assert_eq!(h.errors.load(Ordering::SeqCst), 1);

    // The next iteration starts fresh
    let outcome = h.worker.run_once().await.unwrap();
    assert_eq!(outcome, IterationOutcome::ReceiveTimeout);
    assert_eq!(statuses(&h.log).len(), 2);
    assert_eq!(h.errors.load(Ordering::SeqCst), 2);
    assert_eq!(
        h.metrics.snapshot("pool").errors.get("receive_timeout"),
        Some(&2)
    );
}

#[tokio::test(start_paused = true)]
async fn test_send_timeout() {
    let exporter = Arc::new(MockExporter::new().with_delay(Duration::from_secs(2)));
    let mut h = harness(exporter);

    let outcome = h.worker.run_once().await.unwrap();
    assert_eq!(outcome, IterationOutcome::SendTimeout);
    assert_eq!(statuses(&h.log), vec![WorkerStatus::SendTimeout.code()]);
    assert_eq!(h.metrics.snapshot("pool").traces_sent, 0);
    assert_eq!(h.worker.stats().send_timeouts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_send_error() {
    let mut h = harness(Arc::new(MockExporter::new().failing()));

    let outcome = h.worker.run_once().await.unwrap();
    assert!(matches!(outcome, IterationOutcome::SendError(_)));
    assert_eq!(statuses(&h.log), vec![WorkerStatus::SendError.code()]);
    assert_eq!(
        h.metrics.snapshot("pool").errors.get("send_error"),
        Some(&1)
    );
}

#[tokio::test]
async fn test_silent_backend_is_send_timeout() {
    // Accepts connections and never answers
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let exporter = Arc::new(OtlpHttpExporter::new(&addr.to_string()).unwrap());
    let mut h = harness_with(exporter, config().with_send_timeout(Duration::from_millis(300)));

    for _ in 0..3 {
        let outcome = h.worker.run_once().await.unwrap();
        assert_eq!(outcome, IterationOutcome::SendTimeout);
    }
    assert_eq!(statuses(&h.log), vec![WorkerStatus::SendTimeout.code(); 3]);
    assert_eq!(h.worker.stats().send_timeouts, 3);
    assert_eq!(h.worker.stats().send_errors, 0);
    let snapshot = h.metrics.snapshot("pool");
    assert_eq!(snapshot.errors.get("send_timeout"), Some(&3));
    assert_eq!(snapshot.errors.get("send_error"), None);
}

#[tokio::test(start_paused = true)]
async fn test_stale_notification_is_discarded() {
    let exporter = Arc::new(MockExporter::new());
    let mut h = harness(exporter.clone());

    // A late confirmation for an earlier trace sits in the mailbox
    h.tx.try_notify();

    let outcome = h.worker.run_once().await.unwrap();
    assert_eq!(outcome, IterationOutcome::ReceiveTimeout);
    assert_eq!(exporter.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_trace_carries_worker_identity() {
    let exporter = Arc::new(MockExporter::new());
    let mut h = harness(exporter.clone());
    h.worker.run_once().await.unwrap();

    let traces = exporter.exported();
    assert_eq!(traces.len(), 1);
    assert_eq!(traces[0].service_name, "benchd-worker.pool.7");
    assert_eq!(traces[0].root().unwrap().name, "parentTrace");

    let depth = last_fields(&h.log)[2] as usize;
    assert_eq!(traces[0].child_count(), depth);
}

// ============================================================================
// Run loop and cancellation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_wait_stops_promptly() {
    let h = harness(Arc::new(MockExporter::new()));
    let Harness {
        mut worker,
        cancel,
        log,
        tx: _tx,
        _dir,
        ..
    } = h;

    let handle = tokio::spawn(async move {
        let exit = worker.run().await;
        (exit, worker)
    });

    // Well inside the 5s receive timeout
    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();

    let (exit, worker) = tokio::time::timeout(Duration::from_millis(100), handle)
        .await
        .expect("worker did not stop promptly")
        .unwrap();
    assert!(matches!(exit, WorkerExit::Cancelled));
    assert!(worker.stats().ended_at.is_some());

    let codes = statuses(&log);
    assert_eq!(codes.first(), Some(&WorkerStatus::Initialized.code()));
    assert_eq!(codes.last(), Some(&WorkerStatus::Stopped.code()));
    assert_eq!(codes.len(), 2);

    // Nothing is written after the stop line
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(statuses(&log).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_run_loops_across_failures() {
    let config = config().with_receive_timeout(Duration::from_millis(100));
    let h = harness_with(Arc::new(MockExporter::new()), config);
    let Harness {
        mut worker,
        cancel,
        log,
        tx: _tx,
        _dir,
        ..
    } = h;

    let handle = tokio::spawn(async move { worker.run().await });
    tokio::time::sleep(Duration::from_millis(550)).await;
    cancel.cancel();
    assert!(matches!(handle.await.unwrap(), WorkerExit::Cancelled));

    let codes = statuses(&log);
    let timeouts = codes
        .iter()
        .filter(|c| **c == WorkerStatus::ReceiveTimeout.code())
        .count();
    assert!(timeouts >= 4, "only {timeouts} timeouts in {codes:?}");
    assert_eq!(codes.iter().filter(|c| **c == 0).count(), 1);
    assert_eq!(codes.last(), Some(&WorkerStatus::Stopped.code()));
}

#[tokio::test(start_paused = true)]
async fn test_restarted_worker_does_not_repeat_initialized() {
    let mut h = harness(Arc::new(MockExporter::new()));
    h.cancel.cancel();

    assert!(matches!(h.worker.run().await, WorkerExit::Cancelled));
    assert!(matches!(h.worker.run().await, WorkerExit::Cancelled));

    let codes = statuses(&h.log);
    assert_eq!(codes.iter().filter(|c| **c == 0).count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_closed_mailbox_stops_worker() {
    let h = harness(Arc::new(MockExporter::new()));
    let Harness {
        mut worker,
        tx,
        log,
        _dir,
        ..
    } = h;
    drop(tx);

    assert!(matches!(worker.run().await, WorkerExit::Cancelled));
    assert_eq!(statuses(&log).last(), Some(&WorkerStatus::Stopped.code()));
}
