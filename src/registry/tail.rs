//! Reader-side handles returned by `tail`
//!
//! A [`Tail`] pairs the line sequence of one subscriber with its completion
//! signal. The transport layer reads lines until `None`, and can consult the
//! completion to tell teardown or cancellation apart from other exits.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::line::Line;

/// Read-only sequence of lines delivered to one subscriber
#[derive(Debug)]
pub struct LineStream {
    rx: mpsc::Receiver<Arc<Line>>,
}

impl LineStream {
    pub(super) fn new(rx: mpsc::Receiver<Arc<Line>>) -> Self {
        Self { rx }
    }

    /// Wait for the next line
    ///
    /// Returns `None` once the subscriber is closed and every line enqueued
    /// before the close has been read.
    pub async fn recv(&mut self) -> Option<Arc<Line>> {
        self.rx.recv().await
    }

    /// Take the next line if one is already buffered
    pub fn try_recv(&mut self) -> Option<Arc<Line>> {
        self.rx.try_recv().ok()
    }

    /// Number of buffered lines
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Signal fired once when a subscriber closes, for any reason
#[derive(Debug, Clone)]
pub struct Completion {
    token: CancellationToken,
}

impl Completion {
    pub(super) fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Wait until the subscriber has closed
    pub async fn wait(&self) {
        self.token.cancelled().await
    }

    pub fn is_complete(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Handle for one attached reader: its lines plus its completion signal
#[derive(Debug)]
pub struct Tail {
    lines: LineStream,
    completion: Completion,
}

impl Tail {
    pub(super) fn new(lines: LineStream, completion: Completion) -> Self {
        Self { lines, completion }
    }

    /// A handle that is already finished
    ///
    /// Its line sequence yields `None` immediately and its completion has
    /// already fired. Returned when tailing a stream that does not exist.
    pub fn closed() -> Self {
        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        let token = CancellationToken::new();
        token.cancel();

        Self::new(LineStream::new(rx), Completion::new(token))
    }

    /// Wait for the next line, `None` at end of stream
    pub async fn recv(&mut self) -> Option<Arc<Line>> {
        self.lines.recv().await
    }

    pub fn lines(&mut self) -> &mut LineStream {
        &mut self.lines
    }

    pub fn completion(&self) -> &Completion {
        &self.completion
    }

    /// Split into the line sequence and the completion signal
    pub fn into_parts(self) -> (LineStream, Completion) {
        (self.lines, self.completion)
    }
}
