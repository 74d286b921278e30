//! Capacity-1 notification mailbox between the pool manager and a worker
//!
//! The manager holds the sending half and never blocks on it; a second
//! notification arriving before the worker consumed the first is dropped.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Mailbox capacity
pub const MAILBOX_CAPACITY: usize = 1;

/// Create a connected mailbox pair
pub fn mailbox() -> (MailboxSender, MailboxReceiver) {
    let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
    (MailboxSender { tx }, MailboxReceiver { rx })
}

/// Result of a non-blocking notification attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The notification is waiting for the worker
    Delivered,
    /// A notification was already pending; this one was discarded
    Dropped,
    /// The worker side is gone
    Closed,
}

/// Manager side of a mailbox
#[derive(Debug, Clone)]
pub struct MailboxSender {
    tx: mpsc::Sender<()>,
}

impl MailboxSender {
    /// Try to deliver a notification without waiting
    pub fn try_notify(&self) -> Delivery {
        match self.tx.try_send(()) {
            Ok(()) => Delivery::Delivered,
            Err(TrySendError::Full(())) => Delivery::Dropped,
            Err(TrySendError::Closed(())) => Delivery::Closed,
        }
    }

    /// Whether the worker side has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Worker side of a mailbox
#[derive(Debug)]
pub struct MailboxReceiver {
    rx: mpsc::Receiver<()>,
}

impl MailboxReceiver {
    /// Wait for the next notification
    ///
    /// Returns `false` once every sender is gone.
    pub async fn recv(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }

    /// Discard pending notifications, returning how many were discarded
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        while self.rx.try_recv().is_ok() {
            drained += 1;
        }
        drained
    }
}
