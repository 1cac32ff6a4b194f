//! Bounded line history for late-joiner support
//!
//! When a reader attaches to a stream that has already produced output, it
//! first receives the retained history, oldest line first, before any live
//! line. The buffer keeps at most `capacity` lines and evicts the oldest ones
//! once that limit is exceeded.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::registry::Line;

/// Default number of lines retained per stream
pub const DEFAULT_HISTORY_CAPACITY: usize = 5000;

/// Ring of the most recent lines written to a stream
#[derive(Debug)]
pub struct HistoryBuffer {
    /// Maximum number of retained lines
    capacity: usize,
    /// Retained lines, oldest at the front
    lines: VecDeque<Arc<Line>>,
    /// Lines evicted since creation
    evicted: u64,
}

impl HistoryBuffer {
    /// Create a history buffer with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Create a history buffer holding at most `capacity` lines
    ///
    /// A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            lines: VecDeque::with_capacity(capacity.min(1024)),
            evicted: 0,
        }
    }

    /// Append a line, then trim to capacity
    ///
    /// Returns the number of lines evicted to make room.
    pub fn push(&mut self, line: Arc<Line>) -> usize {
        self.lines.push_back(line);

        let mut dropped = 0;
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
            dropped += 1;
        }
        self.evicted += dropped as u64;
        dropped
    }

    /// Iterate retained lines, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Line>> {
        self.lines.iter()
    }

    /// Copy out the retained lines, oldest first
    pub fn snapshot(&self) -> Vec<Arc<Line>> {
        self.lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total lines evicted since the buffer was created
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Sequence numbers of the oldest and newest retained lines
    pub fn sequence_range(&self) -> Option<(u64, u64)> {
        let first = self.lines.front()?.number;
        let last = self.lines.back()?.number;
        Some((first, last))
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new()
    }
}
