//! `tokio_util` codec over the bus wire format.
//!
//! Lets a host drive a serial port or socket with `FramedRead` /
//! `FramedWrite` instead of the cooperative node loop. Decoding applies the
//! same resynchronization rules as [`FrameAccumulator`](crate::FrameAccumulator).

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::accumulator::resync_offset;
use crate::codec::{decode_frame, encode_frame, Frame, DEFAULT_MAX_PAYLOAD};
use crate::error::{FrameError, Result};

/// Frame codec for `tokio_util::codec`.
#[derive(Debug, Clone)]
pub struct BusCodec {
    max_payload: usize,
    discarded_bytes: u64,
}

impl BusCodec {
    /// Codec with the default payload limit.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    /// Codec rejecting payloads above `max_payload` in both directions.
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            max_payload,
            discarded_bytes: 0,
        }
    }

    /// Bytes skipped while resynchronizing.
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded_bytes
    }
}

impl Default for BusCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for BusCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        loop {
            match decode_frame(src, self.max_payload) {
                Ok(frame) => return Ok(frame),
                Err(err) if err.is_wire_corruption() => {
                    let skip = resync_offset(src);
                    src.advance(skip);
                    self.discarded_bytes += skip as u64;
                    if !matches!(err, FrameError::InvalidSync) {
                        warn!(error = %err, skipped = skip, "dropping invalid frame");
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Encoder<Frame> for BusCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        if frame.payload.len() > self.max_payload {
            return Err(FrameError::PayloadTooLarge {
                size: frame.payload.len(),
                max: self.max_payload,
            });
        }
        encode_frame(frame.destination, frame.source, &frame.payload, dst)
    }
}
