/// Errors that can occur while building, decoding or reading packets.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The bytes at the head of the stream are not a frame start.
    #[error("invalid frame sync (expected 0x4E42 \"NB\")")]
    InvalidSync,

    /// The frame arrived complete but its checksum does not match.
    #[error("frame checksum mismatch (frame carries {expected:#06x}, computed {actual:#06x})")]
    ChecksumMismatch { expected: u16, actual: u16 },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A field read asked for more bytes than the packet has left.
    #[error("read past end of packet ({requested} bytes requested, {remaining} remaining)")]
    ReadPastEnd { requested: usize, remaining: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// True for errors caused by corrupt or foreign bytes on the wire.
    ///
    /// These are handled by resynchronizing, never surfaced as packets.
    pub fn is_wire_corruption(&self) -> bool {
        matches!(
            self,
            FrameError::InvalidSync
                | FrameError::ChecksumMismatch { .. }
                | FrameError::PayloadTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
