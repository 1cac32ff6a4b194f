//! Per-subscriber mailbox
//!
//! Each subscriber owns a bounded mailbox. Publishing is a single
//! non-blocking attempt: when the mailbox is full the line is dropped for
//! this subscriber only, so a stalled reader never holds up the producer or
//! any other reader.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

use super::line::Line;
use super::tail::{Completion, LineStream, Tail};

/// Default number of lines buffered per subscriber
pub const DEFAULT_MAILBOX_CAPACITY: usize = 5000;

/// Outcome of a single publish attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Line was enqueued
    Delivered,
    /// Mailbox was full, line discarded for this subscriber
    Dropped,
    /// Subscriber is closed or its reader has gone away
    Closed,
}

/// One attached reader of a stream
pub struct Subscriber {
    id: u64,
    /// Sending half of the mailbox; `None` once closed
    tx: Mutex<Option<mpsc::Sender<Arc<Line>>>>,
    /// Fired exactly once, on close
    closed: CancellationToken,
    /// Lines discarded because the mailbox was full
    dropped: AtomicU64,
}

impl Subscriber {
    /// Create a subscriber and the reader-side handle for its mailbox
    pub fn new(id: u64, capacity: usize) -> (Self, Tail) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let closed = CancellationToken::new();

        let subscriber = Self {
            id,
            tx: Mutex::new(Some(tx)),
            closed: closed.clone(),
            dropped: AtomicU64::new(0),
        };
        let tail = Tail::new(LineStream::new(rx), Completion::new(closed));

        (subscriber, tail)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Try to enqueue a line without waiting
    ///
    /// A full mailbox is intended backpressure, not a failure: the line is
    /// dropped for this subscriber and counted.
    pub fn publish(&self, line: &Arc<Line>) -> Delivery {
        let tx = self.tx.lock();
        let Some(tx) = tx.as_ref() else {
            return Delivery::Closed;
        };

        match tx.try_send(Arc::clone(line)) {
            Ok(()) => Delivery::Delivered,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(
                    subscriber = self.id,
                    line = line.number,
                    "Mailbox full, line dropped"
                );
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Close the subscriber
    ///
    /// Safe to call any number of times from any task. Only the first call
    /// performs the transition and fires the completion signal; it returns
    /// `true`, every later call returns `false`.
    ///
    /// Lines already in the mailbox stay readable; the reader sees end of
    /// stream once it has drained them.
    pub fn close(&self) -> bool {
        let mut tx = self.tx.lock();
        if tx.take().is_none() {
            return false;
        }
        self.closed.cancel();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Token fired when this subscriber closes
    pub(crate) fn closed_token(&self) -> &CancellationToken {
        &self.closed
    }

    /// Lines dropped because the mailbox was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .field("dropped", &self.dropped())
            .finish()
    }
}
