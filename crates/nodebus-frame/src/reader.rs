use bytes::Bytes;

use crate::address::DeviceId;
use crate::codec::Frame;
use crate::error::{FrameError, Result};

/// Sequential field reader over one received packet.
///
/// Fields must be read back with the same widths, in the same order, as
/// they were written. A read that would run past the end of the payload is
/// rejected and leaves the cursor where it was.
#[derive(Debug, Clone)]
pub struct PacketReader {
    frame: Frame,
    cursor: usize,
}

impl PacketReader {
    /// Start reading `frame` from its first payload byte.
    pub fn new(frame: Frame) -> Self {
        Self { frame, cursor: 0 }
    }

    /// The node that sent this packet.
    pub fn source(&self) -> DeviceId {
        self.frame.source
    }

    /// The destination the packet was addressed to.
    pub fn destination(&self) -> DeviceId {
        self.frame.destination
    }

    /// Total payload length.
    pub fn len(&self) -> usize {
        self.frame.payload.len()
    }

    /// True for a packet with no payload.
    pub fn is_empty(&self) -> bool {
        self.frame.payload.is_empty()
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.len() - self.cursor
    }

    /// The unread tail of the payload.
    pub fn rest(&self) -> Bytes {
        self.frame.payload.slice(self.cursor..)
    }

    /// Read an 8-bit field.
    pub fn read_u8(&mut self) -> Result<u8> {
        let [b] = self.take_array::<1>()?;
        Ok(b)
    }

    /// Read a 16-bit field (big-endian).
    pub fn read_u16(&mut self) -> Result<u16> {
        self.take_array().map(u16::from_be_bytes)
    }

    /// Read a 32-bit field (big-endian).
    pub fn read_u32(&mut self) -> Result<u32> {
        self.take_array().map(u32::from_be_bytes)
    }

    /// Fill `buf` with the next `buf.len()` raw bytes.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<()> {
        let src = self.take(buf.len())?;
        buf.copy_from_slice(src);
        Ok(())
    }

    /// Borrow the underlying frame.
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Consume the reader and return the frame.
    pub fn into_frame(self) -> Frame {
        self.frame
    }

    fn take(&mut self, n: usize) -> Result<&[u8]> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(FrameError::ReadPastEnd {
                requested: n,
                remaining,
            });
        }
        let start = self.cursor;
        self.cursor += n;
        Ok(&self.frame.payload[start..start + n])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}
