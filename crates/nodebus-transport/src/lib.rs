//! Byte-level transport abstraction for the node bus.
//!
//! A node only ever needs two primitives from the medium: put a complete
//! frame on the wire, and collect whatever bytes have arrived. This crate
//! defines that boundary as the [`Transport`] trait and ships two media:
//! - [`LoopbackBus`], an in-process shared bus for tests and simulation
//! - [`UdpTransport`], one datagram per frame over a UDP socket
//!
//! This is the lowest layer of nodebus. Framing and addressing live above it.

pub mod error;
pub mod loopback;
pub mod traits;
pub mod udp;

pub use error::{Result, TransportError};
pub use loopback::{LoopbackBus, LoopbackTap, DEFAULT_TAP_CAPACITY};
pub use traits::Transport;
pub use udp::{UdpTransport, MAX_DATAGRAM_SIZE};
