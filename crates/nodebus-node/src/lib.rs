//! Cooperative bus node.
//!
//! A [`Node`] is one addressable participant on the bus. Application code
//! builds outgoing packets field by field between `begin_write` and
//! `end_write`, consumes incoming packets between `parse_packet` and
//! `end_read`, and calls `poll` regularly to service the transport. Nothing
//! blocks and nothing runs on another thread.
//!
//! The transport, the clock and the diagnostic text sink are injected at
//! construction and owned by the node.

pub mod clock;
pub mod config;
pub mod diag;
pub mod error;
pub mod node;

pub use clock::{ticks_since, Clock, ManualClock, SystemClock};
pub use config::NodeConfig;
pub use diag::{DiagnosticSink, MemorySink, NullSink, StdoutSink, TracingSink};
pub use error::{NodeError, Result};
pub use node::{Node, NodeStats, RECEIVE_CHUNK};
