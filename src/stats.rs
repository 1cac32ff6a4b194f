//! Statistics for log streams

use std::collections::HashMap;
use std::time::Duration;

use crate::registry::StreamId;

/// Subscriber counts across the registry
///
/// Intended for metrics collectors. Each count is read under its stream's
/// own lock; the map as a whole is not an atomic snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogStreamInfo {
    /// Live subscriber count per stream
    pub streams: HashMap<StreamId, usize>,
}

impl LogStreamInfo {
    /// Sum of subscribers over all streams
    pub fn total_subscribers(&self) -> usize {
        self.streams.values().sum()
    }
}

/// Stream-level statistics
#[derive(Debug, Clone)]
pub struct StreamStats {
    /// Stream id
    pub id: StreamId,
    /// Number of live subscribers
    pub subscriber_count: usize,
    /// Lines currently retained
    pub history_len: usize,
    /// Maximum lines retained
    pub history_capacity: usize,
    /// Lines written since creation
    pub lines_written: u64,
    /// Lines evicted from history
    pub lines_evicted: u64,
    /// Deliveries dropped because a mailbox was full
    pub lines_dropped: u64,
    /// Time since the stream was created
    pub age: Duration,
}

impl StreamStats {
    /// Write rate in lines per second
    pub fn lines_per_second(&self) -> f64 {
        let secs = self.age.as_secs_f64();
        if secs > 0.0 {
            self.lines_written as f64 / secs
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_total_subscribers() {
        let mut info = LogStreamInfo::default();
        assert_eq!(info.total_subscribers(), 0);

        info.streams.insert(StreamId(1), 3);
        info.streams.insert(StreamId(2), 2);
        assert_eq!(info.total_subscribers(), 5);
    }

    #[test]
    fn test_lines_per_second() {
        let stats = StreamStats {
            id: StreamId(1),
            subscriber_count: 0,
            history_len: 10,
            history_capacity: 5000,
            lines_written: 100,
            lines_evicted: 0,
            lines_dropped: 0,
            age: Duration::from_secs(10),
        };
        assert_eq!(stats.lines_per_second(), 10.0);

        let fresh = StreamStats {
            age: Duration::ZERO,
            ..stats
        };
        assert_eq!(fresh.lines_per_second(), 0.0);
    }
}
