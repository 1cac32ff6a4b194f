//! Stream identifiers and log lines
//!
//! This module defines the key type for addressing streams and the line
//! values fanned out to subscribers.

/// Identifier for a logical log stream (e.g. one build step)
///
/// Uniqueness is the caller's responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub i64);

impl From<i64> for StreamId {
    fn from(id: i64) -> Self {
        StreamId(id)
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single line of captured output
///
/// Lines are produced once and shared behind `Arc` by the stream history and
/// every subscriber mailbox, so fan-out never copies the message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Sequence number assigned by the producer
    pub number: u64,
    /// Line text, without the trailing newline
    pub message: String,
    /// Capture time in unix seconds
    pub timestamp: i64,
}

impl Line {
    /// Create a line
    pub fn new(number: u64, message: impl Into<String>, timestamp: i64) -> Self {
        Self {
            number,
            message: message.into(),
            timestamp,
        }
    }
}

impl std::fmt::Display for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.number, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_id_display() {
        assert_eq!(StreamId(42).to_string(), "42");
        assert_eq!(StreamId::from(-7), StreamId(-7));
    }

    #[test]
    fn test_line_new() {
        let line = Line::new(3, "cargo build", 1_700_000_000);
        assert_eq!(line.number, 3);
        assert_eq!(line.message, "cargo build");
        assert_eq!(line.timestamp, 1_700_000_000);
        assert_eq!(line.to_string(), "[3] cargo build");
    }
}
