//! Process output capture
//!
//! Turns a raw byte stream (a child process's stdout, a pipe) into numbered,
//! timestamped lines and writes them into a registry stream, one `write` per
//! line. `run_merged` interleaves two readers, e.g. stdout and stderr of the
//! same child, into one numbered sequence.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::Result;
use crate::registry::{Line, LogStreamRegistry, StreamId};

/// Read chunk size
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Longest line emitted before it is split
pub const DEFAULT_MAX_LINE_LEN: usize = 64 * 1024;

/// Incremental newline splitter
///
/// Bytes are buffered until a `\n` arrives. A trailing `\r` is stripped and
/// invalid UTF-8 is replaced rather than rejected. A line longer than the
/// maximum length is emitted in pieces of at most that length, so the buffer
/// never grows past it.
#[derive(Debug)]
pub struct LineSplitter {
    buf: BytesMut,
    /// Prefix of `buf` already known to contain no newline
    scanned: usize,
    max_line_len: usize,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::with_max_line_len(DEFAULT_MAX_LINE_LEN)
    }

    /// Splitter that cuts lines longer than `max_line_len` bytes
    ///
    /// Zero is treated as one.
    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            scanned: 0,
            max_line_len: max_line_len.max(1),
        }
    }

    /// Feed bytes, returning every line they complete
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(data);

        let mut lines = Vec::new();
        loop {
            let newline = self.buf[self.scanned..]
                .iter()
                .position(|&b| b == b'\n')
                .map(|pos| self.scanned + pos);

            match newline {
                Some(end) if end <= self.max_line_len => {
                    let raw = self.buf.split_to(end + 1);
                    lines.push(decode(&raw[..end]));
                    self.scanned = 0;
                }
                _ if self.buf.len() > self.max_line_len => {
                    let raw = self.buf.split_to(self.max_line_len);
                    lines.push(decode(&raw));
                    self.scanned = 0;
                }
                _ => {
                    self.scanned = self.buf.len();
                    break;
                }
            }
        }
        lines
    }

    /// Flush a final line that had no terminating newline
    pub fn finish(&mut self) -> Option<String> {
        self.scanned = 0;
        if self.buf.is_empty() {
            return None;
        }
        let raw = self.buf.split();
        Some(decode(&raw))
    }

    /// Bytes waiting for a newline
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::new()
    }
}

fn decode(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// One reader with its own partial-line state
struct Source<R> {
    reader: R,
    chunk: BytesMut,
    splitter: LineSplitter,
    done: bool,
}

impl<R: AsyncRead + Unpin> Source<R> {
    fn new(reader: R, max_line_len: usize) -> Self {
        Self {
            reader,
            chunk: BytesMut::with_capacity(READ_CHUNK_SIZE),
            splitter: LineSplitter::with_max_line_len(max_line_len),
            done: false,
        }
    }

    /// Read one chunk; at EOF flush the partial line and mark done
    async fn read_lines(&mut self) -> std::io::Result<Vec<String>> {
        self.chunk.clear();
        if self.reader.read_buf(&mut self.chunk).await? == 0 {
            self.done = true;
            return Ok(self.splitter.finish().into_iter().collect());
        }
        Ok(self.splitter.push(&self.chunk))
    }
}

/// Producer that feeds one registry stream from a reader
pub struct LineCapture {
    registry: Arc<LogStreamRegistry>,
    id: StreamId,
    next_number: u64,
    max_line_len: usize,
}

impl LineCapture {
    /// Capture into `id`, numbering lines from zero
    pub fn new(registry: Arc<LogStreamRegistry>, id: StreamId) -> Self {
        Self {
            registry,
            id,
            next_number: 0,
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }

    /// Start numbering at `number` instead of zero
    pub fn starting_at(mut self, number: u64) -> Self {
        self.next_number = number;
        self
    }

    /// Split lines longer than `len` bytes
    pub fn max_line_len(mut self, len: usize) -> Self {
        self.max_line_len = len.max(1);
        self
    }

    /// Sequence number the next line will get
    pub fn next_number(&self) -> u64 {
        self.next_number
    }

    /// Read until EOF, writing each line to the stream
    ///
    /// Returns the number of lines written. Stops early if the stream is
    /// deleted underneath it.
    pub async fn run<R>(&mut self, reader: R) -> Result<u64>
    where
        R: AsyncRead + Unpin,
    {
        let mut source = Source::new(reader, self.max_line_len);
        let mut written = 0u64;

        while !source.done {
            for message in source.read_lines().await? {
                self.emit(message).await?;
                written += 1;
            }
        }

        tracing::debug!(stream = %self.id, lines = written, "Capture finished");
        Ok(written)
    }

    /// Read two sources until both reach EOF, writing lines as they complete
    ///
    /// Each source keeps its own partial line, so lines from one never get
    /// spliced into lines from the other. Numbering is shared.
    pub async fn run_merged<A, B>(&mut self, first: A, second: B) -> Result<u64>
    where
        A: AsyncRead + Unpin,
        B: AsyncRead + Unpin,
    {
        let mut first = Source::new(first, self.max_line_len);
        let mut second = Source::new(second, self.max_line_len);
        let mut written = 0u64;

        loop {
            let messages = tokio::select! {
                lines = first.read_lines(), if !first.done => lines?,
                lines = second.read_lines(), if !second.done => lines?,
                else => break,
            };

            for message in messages {
                self.emit(message).await?;
                written += 1;
            }
        }

        tracing::debug!(stream = %self.id, lines = written, "Merged capture finished");
        Ok(written)
    }

    async fn emit(&mut self, message: String) -> Result<()> {
        let line = Line::new(self.next_number, message, unix_now());
        self.registry.write(self.id, line).await?;
        self.next_number += 1;
        Ok(())
    }
}
