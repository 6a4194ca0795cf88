//! Addressed, checksummed packet framing for a shared device bus.
//!
//! Every packet on the wire is framed with:
//! - A 2-byte sync marker ("NB") for stream synchronization
//! - 1-byte destination and 1-byte source device ids
//! - A 2-byte big-endian payload length
//! - A 2-byte big-endian CRC-16/IBM-3740 over everything after the sync
//!
//! Payload fields are written and read back in order with fixed big-endian
//! widths. Corrupt or foreign bytes are skipped by resynchronizing on the
//! next sync marker; they never surface as packets.

pub mod accumulator;
pub mod address;
pub mod codec;
pub mod error;
pub mod reader;
#[cfg(feature = "async")]
pub mod tokio_codec;
pub mod writer;

pub use accumulator::FrameAccumulator;
pub use address::{DeviceId, ParseDeviceIdError};
pub use codec::{
    checksum, decode_frame, encode_frame, Frame, DEFAULT_MAX_PAYLOAD, FRAME_OVERHEAD,
    HEADER_SIZE, MAX_PAYLOAD_LIMIT, SYNC, TRAILER_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::PacketReader;
#[cfg(feature = "async")]
pub use tokio_codec::BusCodec;
pub use writer::PacketWriter;
