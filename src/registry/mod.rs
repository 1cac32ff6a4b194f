//! Log stream registry
//!
//! The registry routes lines from producers to readers. It has three layers,
//! each with its own lock:
//!
//! ```text
//!                      Arc<LogStreamRegistry>
//!                 ┌─────────────────────────────┐
//!                 │ streams: RwLock<HashMap<Id, │
//!                 │   Arc<LogStream>>>          │
//!                 └──────────────┬──────────────┘
//!                                │
//!                                ▼
//!                 LogStream: Mutex<{ history, subscribers }>
//!                                │
//!                ┌───────────────┼───────────────┐
//!                ▼               ▼               ▼
//!           Subscriber      Subscriber      Subscriber
//!           mailbox (mpsc)  mailbox (mpsc)  mailbox (mpsc)
//!                │               │               │
//!                ▼               ▼               ▼
//!              Tail            Tail            Tail
//! ```
//!
//! The registry lock is released before a stream lock is taken. A stream
//! lock is held only for one history/subscriber-set mutation, and delivery
//! into a mailbox is always a non-blocking attempt, so a stalled reader
//! cannot hold up the producer or other readers.
//!
//! # Backpressure
//!
//! A full mailbox drops the line for that subscriber only. Completeness for
//! a slow reader is traded for availability of everyone else.

pub mod config;
pub mod error;
pub mod line;
pub mod store;
pub mod stream;
pub mod subscriber;
pub mod tail;

pub use config::RegistryConfig;
pub use error::RegistryError;
pub use line::{Line, StreamId};
pub use store::LogStreamRegistry;
pub use stream::LogStream;
pub use subscriber::{Delivery, Subscriber};
pub use tail::{Completion, LineStream, Tail};
