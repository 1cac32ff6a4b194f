//! Per-stream state
//!
//! A stream owns its bounded history and its live subscriber set, both
//! guarded by one lock. Writes and subscriptions serialize on that lock, which
//! is what makes replay-then-live delivery exactly-once: a line is either in
//! the history replayed to a new subscriber, or written after the subscriber
//! was registered, never both and never neither.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::history::HistoryBuffer;
use crate::stats::StreamStats;

use super::config::RegistryConfig;
use super::line::{Line, StreamId};
use super::subscriber::{Delivery, Subscriber};
use super::tail::Tail;

/// State mutated under the stream lock
struct StreamInner {
    history: HistoryBuffer,
    subscribers: HashMap<u64, Arc<Subscriber>>,
    lines_written: u64,
    lines_dropped: u64,
    /// Set once by `close`; later subscribers are closed on arrival
    closed: bool,
}

/// One logical log stream
pub struct LogStream {
    id: StreamId,
    inner: Mutex<StreamInner>,
    mailbox_capacity: usize,
    next_subscriber_id: AtomicU64,
    created_at: Instant,
}

impl LogStream {
    /// Create an empty stream
    pub fn new(id: StreamId, config: &RegistryConfig) -> Self {
        Self {
            id,
            inner: Mutex::new(StreamInner {
                history: HistoryBuffer::with_capacity(config.history_capacity),
                subscribers: HashMap::new(),
                lines_written: 0,
                lines_dropped: 0,
                closed: false,
            }),
            mailbox_capacity: config.mailbox_capacity.max(1),
            next_subscriber_id: AtomicU64::new(1),
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Append a line and fan it out to every live subscriber
    ///
    /// Never waits on a subscriber. Subscribers whose reader has gone away
    /// are closed and removed here.
    pub fn write(&self, line: Line) {
        let line = Arc::new(line);
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        inner.history.push(Arc::clone(&line));
        inner.lines_written += 1;

        let mut gone = Vec::new();
        for (id, subscriber) in &inner.subscribers {
            match subscriber.publish(&line) {
                Delivery::Delivered => {}
                Delivery::Dropped => inner.lines_dropped += 1,
                Delivery::Closed => gone.push(*id),
            }
        }

        for id in gone {
            if let Some(subscriber) = inner.subscribers.remove(&id) {
                subscriber.close();
                tracing::debug!(
                    stream = %self.id,
                    subscriber = id,
                    "Reader gone, subscriber removed"
                );
            }
        }
    }

    /// Attach a new subscriber
    ///
    /// The current history is replayed into the subscriber's mailbox and the
    /// subscriber is registered for live lines within the same critical
    /// section. Firing `cancel` closes this subscriber only.
    ///
    /// Subscribing to a stream that has already been closed returns a
    /// handle that ends as soon as the replayed history is read.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(self: &Arc<Self>, cancel: CancellationToken) -> Tail {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let (subscriber, tail) = Subscriber::new(id, self.mailbox_capacity);
        let subscriber = Arc::new(subscriber);

        let (replayed, subscribers, closed) = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;

            let mut replayed = 0usize;
            for line in inner.history.iter() {
                match subscriber.publish(line) {
                    Delivery::Delivered => replayed += 1,
                    Delivery::Dropped => inner.lines_dropped += 1,
                    Delivery::Closed => break,
                }
            }

            if inner.closed {
                subscriber.close();
            } else {
                inner.subscribers.insert(id, Arc::clone(&subscriber));
            }
            (replayed, inner.subscribers.len(), inner.closed)
        };

        if closed {
            tracing::debug!(
                stream = %self.id,
                subscriber = id,
                replayed = replayed,
                "Subscribed to closed stream"
            );
            return tail;
        }

        tracing::debug!(
            stream = %self.id,
            subscriber = id,
            replayed = replayed,
            subscribers = subscribers,
            "Subscriber added"
        );

        self.spawn_watcher(subscriber, cancel);
        tail
    }

    /// Wait for either external cancellation or the subscriber closing on
    /// its own, and make sure the subscriber ends up closed and detached.
    fn spawn_watcher(self: &Arc<Self>, subscriber: Arc<Subscriber>, cancel: CancellationToken) {
        let stream = Arc::downgrade(self);

        tokio::spawn(async move {
            tokio::select! {
                _ = subscriber.closed_token().cancelled() => {}
                _ = cancel.cancelled() => {
                    if subscriber.close() {
                        tracing::debug!(subscriber = subscriber.id(), "Subscriber cancelled");
                    }
                    if let Some(stream) = stream.upgrade() {
                        stream.detach(subscriber.id());
                    }
                }
            }
        });
    }

    /// Remove a subscriber from the live set and close it
    fn detach(&self, id: u64) -> bool {
        let removed = self.inner.lock().subscribers.remove(&id);
        match removed {
            Some(subscriber) => {
                subscriber.close();
                true
            }
            None => false,
        }
    }

    /// Close and detach every subscriber
    ///
    /// Returns the number of subscribers that were attached.
    pub fn close(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.closed = true;
        let count = inner.subscribers.len();

        for (_, subscriber) in inner.subscribers.drain() {
            subscriber.close();
        }

        count
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    /// Copy of the retained history, oldest first
    pub fn history(&self) -> Vec<Arc<Line>> {
        self.inner.lock().history.snapshot()
    }

    pub fn stats(&self) -> StreamStats {
        let inner = self.inner.lock();
        StreamStats {
            id: self.id,
            subscriber_count: inner.subscribers.len(),
            history_len: inner.history.len(),
            history_capacity: inner.history.capacity(),
            lines_written: inner.lines_written,
            lines_evicted: inner.history.evicted(),
            lines_dropped: inner.lines_dropped,
            age: self.created_at.elapsed(),
        }
    }
}

impl std::fmt::Debug for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStream")
            .field("id", &self.id)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn stream_with(config: RegistryConfig) -> Arc<LogStream> {
        Arc::new(LogStream::new(StreamId(1), &config))
    }

    fn line(n: u64) -> Line {
        Line::new(n, format!("line {}", n), 1_700_000_000)
    }

    #[tokio::test]
    async fn test_replay_then_live() {
        let stream = stream_with(RegistryConfig::default());
        stream.write(line(0));
        stream.write(line(1));

        let mut tail = stream.subscribe(CancellationToken::new());
        stream.write(line(2));

        for expected in 0..3 {
            assert_eq!(tail.recv().await.unwrap().number, expected);
        }
        assert!(tail.lines().try_recv().is_none());
    }

    #[tokio::test]
    async fn test_history_trimmed() {
        let stream = stream_with(RegistryConfig::default().history_capacity(3));
        for n in 0..5 {
            stream.write(line(n));
        }

        let numbers: Vec<u64> = stream.history().iter().map(|l| l.number).collect();
        assert_eq!(numbers, vec![2, 3, 4]);

        let stats = stream.stats();
        assert_eq!(stats.lines_written, 5);
        assert_eq!(stats.lines_evicted, 2);
        assert_eq!(stats.history_len, 3);
    }

    #[tokio::test]
    async fn test_close_ends_every_subscriber() {
        let stream = stream_with(RegistryConfig::default());
        let mut first = stream.subscribe(CancellationToken::new());
        let mut second = stream.subscribe(CancellationToken::new());
        assert_eq!(stream.subscriber_count(), 2);

        assert_eq!(stream.close(), 2);
        assert_eq!(stream.subscriber_count(), 0);

        assert!(first.recv().await.is_none());
        assert!(second.recv().await.is_none());
        assert!(first.completion().is_complete());
        assert!(second.completion().is_complete());

        // Closing again is harmless
        assert_eq!(stream.close(), 0);
    }

    #[tokio::test]
    async fn test_cancel_detaches_one_subscriber() {
        let stream = stream_with(RegistryConfig::default());
        let cancel = CancellationToken::new();
        let cancelled = stream.subscribe(cancel.clone());
        let mut kept = stream.subscribe(CancellationToken::new());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), cancelled.completion().wait())
            .await
            .unwrap();

        // Watcher removes the subscriber right after closing it
        tokio::time::timeout(Duration::from_secs(1), async {
            while stream.subscriber_count() != 1 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        stream.write(line(0));
        assert_eq!(kept.recv().await.unwrap().number, 0);
        assert!(!kept.completion().is_complete());
    }

    #[tokio::test]
    async fn test_subscribe_after_close_ends() {
        let stream = stream_with(RegistryConfig::default());
        stream.write(line(0));
        stream.close();

        let mut tail = stream.subscribe(CancellationToken::new());
        assert_eq!(stream.subscriber_count(), 0);
        assert!(tail.completion().is_complete());

        // History is still replayed, then end of stream
        let drained = tokio::time::timeout(Duration::from_secs(1), async {
            let first = tail.recv().await.map(|l| l.number);
            (first, tail.recv().await.is_none())
        })
        .await
        .unwrap();
        assert_eq!(drained, (Some(0), true));

        // A write after close still lands in history only
        stream.write(line(1));
        assert_eq!(stream.history().len(), 2);
        assert_eq!(stream.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_detach_closes_subscriber() {
        let stream = stream_with(RegistryConfig::default());
        let mut tail = stream.subscribe(CancellationToken::new());

        assert!(stream.detach(1));
        assert!(!stream.detach(1));
        assert_eq!(stream.subscriber_count(), 0);

        assert!(tail.completion().is_complete());
        assert!(tail.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_slow_subscriber_drops() {
        let stream = stream_with(RegistryConfig::default().mailbox_capacity(2));
        let mut slow = stream.subscribe(CancellationToken::new());

        for n in 0..5 {
            stream.write(line(n));
        }

        assert_eq!(stream.stats().lines_dropped, 3);
        assert_eq!(slow.recv().await.unwrap().number, 0);
        assert_eq!(slow.recv().await.unwrap().number, 1);
        assert!(slow.lines().try_recv().is_none());
    }

    #[tokio::test]
    async fn test_dropped_reader_pruned_on_write() {
        let stream = stream_with(RegistryConfig::default());
        let tail = stream.subscribe(CancellationToken::new());
        let completion = tail.completion().clone();
        assert_eq!(stream.subscriber_count(), 1);

        drop(tail);
        stream.write(line(0));

        assert_eq!(stream.subscriber_count(), 0);
        assert!(completion.is_complete());
    }
}
