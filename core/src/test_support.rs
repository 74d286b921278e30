//! Mock implementations of the core seams, shared by unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{BenchError, BenchResult};
use crate::trace::SyntheticTrace;
use crate::traits::{ExportError, Notifier, TraceExporter, WorkerPool};

// ============================================================================
// Mock Exporter
// ============================================================================

/// Exporter that records traces and optionally delays or fails
pub(crate) struct MockExporter {
    delay: Option<Duration>,
    fail: bool,
    exported: Mutex<Vec<SyntheticTrace>>,
    calls: AtomicUsize,
}

impl MockExporter {
    pub(crate) fn new() -> Self {
        Self {
            delay: None,
            fail: false,
            exported: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn exported(&self) -> Vec<SyntheticTrace> {
        self.exported.lock().unwrap().clone()
    }
}

#[async_trait]
impl TraceExporter for MockExporter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn export(&self, trace: &SyntheticTrace) -> Result<(), ExportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ExportError::Rejected { status: 500 });
        }
        self.exported.lock().unwrap().push(trace.clone());
        Ok(())
    }
}

// ============================================================================
// Loopback Exporter
// ============================================================================

/// Exporter that confirms each trace straight back through a notifier,
/// standing in for a collector plus the correlation receiver
pub(crate) struct LoopbackExporter {
    notifier: Mutex<Option<Weak<dyn Notifier>>>,
    delay: Duration,
}

impl LoopbackExporter {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            notifier: Mutex::new(None),
            delay,
        }
    }

    pub(crate) fn connect(&self, notifier: Weak<dyn Notifier>) {
        *self.notifier.lock().unwrap() = Some(notifier);
    }
}

#[async_trait]
impl TraceExporter for LoopbackExporter {
    fn name(&self) -> &str {
        "loopback"
    }

    async fn export(&self, trace: &SyntheticTrace) -> Result<(), ExportError> {
        let id = trace
            .service_name
            .rsplit('.')
            .next()
            .and_then(|id| id.parse::<u64>().ok())
            .ok_or_else(|| ExportError::Other("no worker id".into()))?;
        let notifier = self.notifier.lock().unwrap().clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(notifier) = notifier.and_then(|n| n.upgrade()) {
                let _ = notifier.notify(id);
            }
        });
        Ok(())
    }
}

// ============================================================================
// Counting Pool
// ============================================================================

/// Pool that only records how many workers were requested, and when
pub(crate) struct CountingPool {
    total: AtomicUsize,
    calls: Mutex<Vec<(tokio::time::Instant, usize)>>,
    stopped: std::sync::atomic::AtomicBool,
}

impl CountingPool {
    pub(crate) fn new() -> Self {
        Self {
            total: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            stopped: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub(crate) fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub(crate) fn calls(&self) -> Vec<(tokio::time::Instant, usize)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

impl WorkerPool for CountingPool {
    fn add_workers(&self, count: usize) -> BenchResult<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(BenchError::ManagerStopped);
        }
        self.total.fetch_add(count, Ordering::SeqCst);
        self.calls
            .lock()
            .unwrap()
            .push((tokio::time::Instant::now(), count));
        Ok(())
    }
}

// ============================================================================
// Recording Notifier
// ============================================================================

/// Notifier that records every ID and can reject unknown ones
pub(crate) struct RecordingNotifier {
    known: Option<Vec<u64>>,
    pub(crate) notified: Mutex<Vec<u64>>,
}

impl RecordingNotifier {
    pub(crate) fn new() -> Self {
        Self {
            known: None,
            notified: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn knowing(ids: Vec<u64>) -> Self {
        Self {
            known: Some(ids),
            notified: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn ids(&self) -> Vec<u64> {
        self.notified.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, worker_id: u64) -> BenchResult<()> {
        if let Some(known) = &self.known {
            if !known.contains(&worker_id) {
                return Err(BenchError::WorkerNotFound(worker_id));
            }
        }
        self.notified.lock().unwrap().push(worker_id);
        Ok(())
    }
}

/// Shorthand for a notifier trait object
pub(crate) fn notifier(n: &Arc<RecordingNotifier>) -> Arc<dyn Notifier> {
    n.clone()
}
