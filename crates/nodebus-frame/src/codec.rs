use bytes::{Buf, BufMut, Bytes, BytesMut};
use crc::{Crc, CRC_16_IBM_3740};

use crate::address::DeviceId;
use crate::error::{FrameError, Result};

/// Sync bytes: "NB" (0x4E 0x42).
pub const SYNC: [u8; 2] = [0x4E, 0x42];

/// Frame header: sync (2) + destination (1) + source (1) + length (2) = 6 bytes.
pub const HEADER_SIZE: usize = 6;

/// Frame trailer: CRC-16 (2).
pub const TRAILER_SIZE: usize = 2;

/// Bytes a frame adds around its payload.
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + TRAILER_SIZE;

/// Default maximum payload size: 1 KiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 1024;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD_LIMIT: usize = u16::MAX as usize;

static CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// An addressed packet as it travels on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The node this packet is for.
    pub destination: DeviceId,
    /// The node that sent this packet.
    pub source: DeviceId,
    /// The encoded packet fields.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(destination: DeviceId, source: DeviceId, payload: impl Into<Bytes>) -> Self {
        Self {
            destination,
            source,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (header + payload + trailer).
    pub fn wire_size(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }
}

/// CRC-16/IBM-3740 over `bytes`.
pub fn checksum(bytes: &[u8]) -> u16 {
    CRC16.checksum(bytes)
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────┬──────┬──────────┬─────────────┬──────────┐
/// │ Sync (2) │ Dest │ Src  │ Length   │ Payload     │ CRC-16   │
/// │ 0x4E 0x42│ (1)  │ (1)  │ (2B BE)  │ (Length B)  │ (2B BE)  │
/// │ "NB"     │      │      │          │             │          │
/// └──────────┴──────┴──────┴──────────┴─────────────┴──────────┘
/// ```
///
/// The CRC covers destination through the last payload byte.
pub fn encode_frame(
    destination: DeviceId,
    source: DeviceId,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    if payload.len() > MAX_PAYLOAD_LIMIT {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD_LIMIT,
        });
    }
    let start = dst.len();
    dst.reserve(FRAME_OVERHEAD + payload.len());
    dst.put_slice(&SYNC);
    dst.put_u8(destination.get());
    dst.put_u8(source.get());
    dst.put_u16(payload.len() as u16);
    dst.put_slice(payload);
    let crc = checksum(&dst[start + SYNC.len()..]);
    dst.put_u16(crc);
    Ok(())
}

/// Decode a frame from the head of a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer. On error the
/// buffer is left untouched so the caller can decide how to resynchronize.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.is_empty() {
        return Ok(None);
    }

    // Reject a bad sync as soon as the first differing byte is visible.
    if src[0] != SYNC[0] || (src.len() > 1 && src[1] != SYNC[1]) {
        return Err(FrameError::InvalidSync);
    }

    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let payload_len = u16::from_be_bytes([src[4], src[5]]) as usize;
    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len + TRAILER_SIZE;
    if src.len() < total {
        return Ok(None);
    }

    let expected = u16::from_be_bytes([src[total - 2], src[total - 1]]);
    let actual = checksum(&src[SYNC.len()..total - TRAILER_SIZE]);
    if expected != actual {
        return Err(FrameError::ChecksumMismatch { expected, actual });
    }

    let destination = DeviceId::new(src[2]);
    let source = DeviceId::new(src[3]);

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();
    src.advance(TRAILER_SIZE);

    Ok(Some(Frame {
        destination,
        source,
        payload,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: DeviceId = DeviceId::new(1);
    const B: DeviceId = DeviceId::new(2);

    #[test]
    fn test_checksum_check_value() {
        // Published check value for CRC-16/IBM-3740.
        assert_eq!(checksum(b"123456789"), 0x29B1);
    }

    #[test]
    fn test_encode_layout() {
        let mut buf = BytesMut::new();
        encode_frame(B, A, &[0xAB, 0x12, 0x34], &mut buf).unwrap();

        assert_eq!(&buf[..HEADER_SIZE], &[0x4E, 0x42, 0x02, 0x01, 0x00, 0x03]);
        assert_eq!(&buf[HEADER_SIZE..HEADER_SIZE + 3], &[0xAB, 0x12, 0x34]);
        let crc = checksum(&buf[2..HEADER_SIZE + 3]);
        assert_eq!(&buf[HEADER_SIZE + 3..], &crc.to_be_bytes());
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = b"hello, bus!";

        encode_frame(B, A, payload, &mut buf).unwrap();
        assert_eq!(buf.len(), FRAME_OVERHEAD + payload.len());

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();

        assert_eq!(frame.destination, B);
        assert_eq!(frame.source, A);
        assert_eq!(frame.payload.as_ref(), payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x4E, 0x42, 0x02][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_frame(B, A, b"hello", &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 2);

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_invalid_sync() {
        let mut buf = BytesMut::from(&[0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::InvalidSync)));
    }

    #[test]
    fn test_decode_invalid_second_sync_byte() {
        let mut buf = BytesMut::from(&[0x4E, 0x00][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::InvalidSync)));
    }

    #[test]
    fn test_decode_checksum_mismatch() {
        let mut buf = BytesMut::new();
        encode_frame(B, A, b"data", &mut buf).unwrap();
        buf[HEADER_SIZE] ^= 0x01;

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::ChecksumMismatch { .. })));
        assert_eq!(buf.len(), FRAME_OVERHEAD + 4, "error must not consume");
    }

    #[test]
    fn test_decode_payload_too_large() {
        let mut buf = BytesMut::new();
        buf.put_slice(&SYNC);
        buf.put_u8(2);
        buf.put_u8(1);
        buf.put_u16(4096);

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_multiple_frames() {
        let mut buf = BytesMut::new();
        encode_frame(B, A, b"first", &mut buf).unwrap();
        encode_frame(A, B, b"second", &mut buf).unwrap();

        let f1 = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!((f1.destination, f1.source), (B, A));
        assert_eq!(f1.payload.as_ref(), b"first");

        let f2 = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!((f2.destination, f2.source), (A, B));
        assert_eq!(f2.payload.as_ref(), b"second");

        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_payload() {
        let mut buf = BytesMut::new();
        encode_frame(DeviceId::BROADCAST, A, b"", &mut buf).unwrap();

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert!(frame.destination.is_broadcast());
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_frame_wire_size() {
        let frame = Frame::new(B, A, Bytes::from_static(b"test"));
        assert_eq!(frame.wire_size(), FRAME_OVERHEAD + 4);
    }
}
