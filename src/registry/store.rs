//! Log stream registry implementation
//!
//! The central registry mapping stream ids to streams. The registry lock
//! guards only that mapping: every operation looks a stream up, releases the
//! registry lock, and only then touches the stream, so work on different
//! streams never contends beyond the map lookup.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::stats::{LogStreamInfo, StreamStats};

use super::config::RegistryConfig;
use super::error::RegistryError;
use super::line::{Line, StreamId};
use super::stream::LogStream;
use super::tail::Tail;

/// Central registry for all live log streams
pub struct LogStreamRegistry {
    /// Map of stream id to stream
    streams: RwLock<HashMap<StreamId, Arc<LogStream>>>,

    /// Configuration
    config: RegistryConfig,
}

impl LogStreamRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a fresh stream for `id`
    ///
    /// An existing stream under the same id is replaced. Its subscribers are
    /// not closed: they stay attached to the old stream and receive nothing
    /// further until their own cancellation fires.
    pub async fn create(&self, id: StreamId) {
        let stream = Arc::new(LogStream::new(id, &self.config));
        let previous = self.streams.write().await.insert(id, stream);

        match previous {
            Some(old) => {
                tracing::warn!(
                    stream = %id,
                    orphaned_subscribers = old.subscriber_count(),
                    "Stream replaced"
                );
            }
            None => {
                tracing::info!(stream = %id, "Stream created");
            }
        }
    }

    /// Remove a stream and disconnect all of its subscribers
    pub async fn delete(&self, id: StreamId) -> Result<(), RegistryError> {
        let stream = self
            .streams
            .write()
            .await
            .remove(&id)
            .ok_or(RegistryError::StreamNotFound(id))?;

        let closed = stream.close();
        tracing::info!(stream = %id, subscribers = closed, "Stream deleted");

        Ok(())
    }

    /// Append a line to a stream and fan it out
    ///
    /// Returns once delivery has been attempted for every subscriber; never
    /// waits on a slow one.
    pub async fn write(&self, id: StreamId, line: Line) -> Result<(), RegistryError> {
        let stream = self.get(id).await.ok_or(RegistryError::StreamNotFound(id))?;
        stream.write(line);
        Ok(())
    }

    /// Attach to a stream: replayed history first, then live lines
    ///
    /// Tailing an unknown id yields a handle that is already finished, see
    /// [`Tail::closed`]. Use [`try_tail`](Self::try_tail) to get an explicit
    /// error instead.
    pub async fn tail(&self, id: StreamId, cancel: CancellationToken) -> Tail {
        match self.get(id).await {
            Some(stream) => stream.subscribe(cancel),
            None => {
                tracing::debug!(stream = %id, "Tail on unknown stream");
                Tail::closed()
            }
        }
    }

    /// Like [`tail`](Self::tail), but fails on an unknown id
    pub async fn try_tail(
        &self,
        id: StreamId,
        cancel: CancellationToken,
    ) -> Result<Tail, RegistryError> {
        let stream = self.get(id).await.ok_or(RegistryError::StreamNotFound(id))?;
        Ok(stream.subscribe(cancel))
    }

    /// Subscriber count per stream
    ///
    /// Each stream is read under its own lock after the registry lock is
    /// released, so the result is consistent per stream but not a single
    /// atomic snapshot across streams.
    pub async fn info(&self) -> LogStreamInfo {
        let streams: Vec<Arc<LogStream>> = self.streams.read().await.values().cloned().collect();

        LogStreamInfo {
            streams: streams
                .iter()
                .map(|stream| (stream.id(), stream.subscriber_count()))
                .collect(),
        }
    }

    /// Get statistics for one stream
    pub async fn stream_stats(&self, id: StreamId) -> Option<StreamStats> {
        self.get(id).await.map(|stream| stream.stats())
    }

    /// Check if a stream exists
    pub async fn stream_exists(&self, id: StreamId) -> bool {
        self.streams.read().await.contains_key(&id)
    }

    /// Get total number of streams
    pub async fn stream_count(&self) -> usize {
        self.streams.read().await.len()
    }

    async fn get(&self, id: StreamId) -> Option<Arc<LogStream>> {
        self.streams.read().await.get(&id).cloned()
    }
}

impl Default for LogStreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}
