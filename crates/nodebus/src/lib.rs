//! Addressed packet protocol for cooperative nodes on a shared bus.
//!
//! nodebus lets small devices exchange variable-length binary packets over
//! any byte transport. Each node has an 8-bit address, builds packets from
//! fixed-width big-endian fields, and is driven by a non-blocking poll loop.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte-level transport boundary (loopback bus, UDP)
//! - [`frame`]: Wire format, addressing, field writer/reader, resynchronization
//! - [`node`]: The node: framing state machines, poll loop, clock and diagnostics
//!
//! # Example
//!
//! ```
//! use nodebus::node::{ManualClock, Node, NodeConfig, NullSink};
//! use nodebus::transport::LoopbackBus;
//!
//! let bus = LoopbackBus::new();
//! let mut a = Node::with_parts(NodeConfig::new(1u8), bus.tap(), ManualClock::new(0), NullSink)?;
//! let mut b = Node::with_parts(NodeConfig::new(2u8), bus.tap(), ManualClock::new(0), NullSink)?;
//!
//! a.begin_write(2u8)?;
//! a.write8(0xAB)?;
//! a.write16(0x1234)?;
//! a.end_write()?;
//!
//! assert_eq!(b.parse_packet()?, Some(3));
//! assert_eq!(b.read8()?, 0xAB);
//! assert_eq!(b.read16()?, 0x1234);
//! b.end_read();
//! # Ok::<(), nodebus::node::NodeError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use nodebus_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use nodebus_frame::*;
}

/// Re-export node types.
pub mod node {
    pub use nodebus_node::*;
}

pub use nodebus_frame::DeviceId;
pub use nodebus_node::{Node, NodeConfig, NodeError};
