use bytes::{BufMut, Bytes, BytesMut};

use crate::address::DeviceId;
use crate::codec::{encode_frame, DEFAULT_MAX_PAYLOAD, FRAME_OVERHEAD, MAX_PAYLOAD_LIMIT};
use crate::error::{FrameError, Result};

/// An outgoing packet under construction.
///
/// Fields are appended in call order using fixed big-endian widths. The
/// packet is sealed into a wire frame by [`PacketWriter::finish`].
///
/// Once a field would push the payload past the maximum size the writer is
/// poisoned: that field and every later one are rejected, and `finish`
/// reports the overflow instead of producing a truncated frame.
#[derive(Debug)]
pub struct PacketWriter {
    destination: DeviceId,
    payload: BytesMut,
    max_payload: usize,
    overflow: Option<usize>,
}

impl PacketWriter {
    /// Start a packet for `destination` with the default payload limit.
    pub fn new(destination: DeviceId) -> Self {
        Self::with_max_payload(destination, DEFAULT_MAX_PAYLOAD)
    }

    /// Start a packet for `destination` with an explicit payload limit.
    ///
    /// Limits above what the length field can describe are clamped.
    pub fn with_max_payload(destination: DeviceId, max_payload: usize) -> Self {
        let max_payload = max_payload.min(MAX_PAYLOAD_LIMIT);
        Self {
            destination,
            payload: BytesMut::with_capacity(max_payload.min(256)),
            max_payload,
            overflow: None,
        }
    }

    /// Where this packet is going.
    pub fn destination(&self) -> DeviceId {
        self.destination
    }

    /// Payload bytes written so far.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// True when no field has been written.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Payload bytes still available before the limit.
    pub fn remaining(&self) -> usize {
        self.max_payload.saturating_sub(self.payload.len())
    }

    /// True once a write has exceeded the payload limit.
    pub fn is_poisoned(&self) -> bool {
        self.overflow.is_some()
    }

    /// Append an 8-bit field.
    pub fn put_u8(&mut self, value: u8) -> Result<()> {
        self.reserve(1)?;
        self.payload.put_u8(value);
        Ok(())
    }

    /// Append a 16-bit field (big-endian).
    pub fn put_u16(&mut self, value: u16) -> Result<()> {
        self.reserve(2)?;
        self.payload.put_u16(value);
        Ok(())
    }

    /// Append a 32-bit field (big-endian).
    pub fn put_u32(&mut self, value: u32) -> Result<()> {
        self.reserve(4)?;
        self.payload.put_u32(value);
        Ok(())
    }

    /// Append raw bytes verbatim. An empty slice is a no-op.
    pub fn put_slice(&mut self, data: &[u8]) -> Result<()> {
        self.reserve(data.len())?;
        self.payload.put_slice(data);
        Ok(())
    }

    /// Seal the packet into a complete wire frame sent from `source`.
    pub fn finish(self, source: DeviceId) -> Result<Bytes> {
        if let Some(size) = self.overflow {
            return Err(FrameError::PayloadTooLarge {
                size,
                max: self.max_payload,
            });
        }
        let mut out = BytesMut::with_capacity(FRAME_OVERHEAD + self.payload.len());
        encode_frame(self.destination, source, &self.payload, &mut out)?;
        Ok(out.freeze())
    }

    fn reserve(&mut self, additional: usize) -> Result<()> {
        if let Some(size) = self.overflow {
            return Err(FrameError::PayloadTooLarge {
                size,
                max: self.max_payload,
            });
        }
        let size = self.payload.len() + additional;
        if size > self.max_payload {
            self.overflow = Some(size);
            return Err(FrameError::PayloadTooLarge {
                size,
                max: self.max_payload,
            });
        }
        Ok(())
    }
}
