use bytes::{Buf, BytesMut};
use tracing::{debug, warn};

use crate::codec::{decode_frame, Frame, DEFAULT_MAX_PAYLOAD, FRAME_OVERHEAD, SYNC};
use crate::error::FrameError;

/// Reassembles frames from a byte stream that may be fragmented, may carry
/// several frames at once, and may contain noise.
///
/// Only frames with a valid sync, an in-bounds length and a matching CRC are
/// surfaced. Anything else is skipped by scanning forward to the next
/// candidate sync byte, so a corrupt frame costs at most its own bytes.
pub struct FrameAccumulator {
    buf: BytesMut,
    max_payload: usize,
    discarded_bytes: u64,
    rejected_frames: u64,
}

impl FrameAccumulator {
    /// Create an accumulator with the default payload limit.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    /// Create an accumulator that rejects frames declaring more than
    /// `max_payload` bytes.
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(FRAME_OVERHEAD + max_payload.min(4096)),
            max_payload,
            discarded_bytes: 0,
            rejected_frames: 0,
        }
    }

    /// Append received bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Extract the next valid frame, if one is complete.
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            match decode_frame(&mut self.buf, self.max_payload) {
                Ok(frame) => return frame,
                Err(err) => self.resync(&err),
            }
        }
    }

    /// Bytes buffered toward a frame that is not complete yet.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// True while part of a frame is waiting for more bytes.
    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Give up on the partial frame at the head of the buffer.
    ///
    /// Skips to the next candidate sync byte, so complete frames queued
    /// behind a header whose length was corrupted can still be extracted
    /// with [`next_frame`](Self::next_frame). Returns the number of bytes
    /// skipped.
    pub fn skip_stale(&mut self) -> usize {
        let skip = resync_offset(&self.buf);
        self.buf.advance(skip);
        self.discarded_bytes += skip as u64;
        skip
    }

    /// Total bytes skipped while resynchronizing or expiring partial frames.
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded_bytes
    }

    /// Frames that were complete enough to inspect but failed validation.
    pub fn rejected_frames(&self) -> u64 {
        self.rejected_frames
    }

    fn resync(&mut self, cause: &FrameError) {
        let skip = resync_offset(&self.buf);
        self.buf.advance(skip);
        self.discarded_bytes += skip as u64;

        match cause {
            FrameError::InvalidSync => debug!(skipped = skip, "resynchronizing on frame sync"),
            other => {
                self.rejected_frames += 1;
                warn!(error = %other, skipped = skip, "dropping invalid frame");
            }
        }
    }
}

impl Default for FrameAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameAccumulator")
            .field("buffered", &self.buf.len())
            .field("max_payload", &self.max_payload)
            .field("discarded_bytes", &self.discarded_bytes)
            .field("rejected_frames", &self.rejected_frames)
            .finish()
    }
}

/// Bytes to skip so the buffer starts at the next candidate sync byte.
///
/// Always skips at least one byte; skips everything when no candidate
/// remains.
pub(crate) fn resync_offset(buf: &[u8]) -> usize {
    if buf.is_empty() {
        return 0;
    }
    buf[1..]
        .iter()
        .position(|&b| b == SYNC[0])
        .map_or(buf.len(), |pos| pos + 1)
}
