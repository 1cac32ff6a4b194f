//! livelog: in-process live log multiplexer
//!
//! Distributes log lines produced by a long-running task (a build step, a
//! deploy job) to any number of concurrent readers, replaying retained output
//! to readers that attach late.
//!
//! # Architecture
//!
//! ```text
//!                      LogStreamRegistry
//!                 ┌─────────────────────────┐
//!                 │ streams: HashMap<Id,    │
//!                 │   Arc<LogStream {       │
//!                 │     history,            │
//!                 │     subscribers,        │
//!                 │   }>                    │
//!                 │ >                       │
//!                 └───────────┬─────────────┘
//!                             │
//!     ┌───────────────────────┼───────────────────────┐
//!     │                       │                       │
//!     ▼                       ▼                       ▼
//! [Producer]            [Subscriber]            [Subscriber]
//! registry.write()      tail.recv()             tail.recv()
//! ```
//!
//! # Example
//!
//! ```no_run
//! use livelog::{CancellationToken, Line, LogStreamRegistry, StreamId};
//!
//! # async fn demo() -> Result<(), livelog::RegistryError> {
//! let registry = LogStreamRegistry::new();
//! let id = StreamId(1);
//!
//! registry.create(id).await;
//! registry.write(id, Line::new(0, "compiling", 1_700_000_000)).await?;
//!
//! let mut tail = registry.tail(id, CancellationToken::new()).await;
//! while let Some(line) = tail.recv().await {
//!     println!("{}: {}", line.number, line.message);
//! }
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod error;
pub mod history;
pub mod registry;
pub mod stats;

pub use capture::{LineCapture, LineSplitter};
pub use error::{Error, Result};
pub use history::HistoryBuffer;
pub use registry::{
    Completion, Line, LineStream, LogStreamRegistry, RegistryConfig, RegistryError, StreamId,
    Tail,
};
pub use stats::{LogStreamInfo, StreamStats};

pub use tokio_util::sync::CancellationToken;
