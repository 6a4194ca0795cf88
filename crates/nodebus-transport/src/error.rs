use std::net::SocketAddr;

/// Errors that can occur in bus transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The transport cannot accept the frame right now; try again later.
    #[error("transport busy (would block)")]
    WouldBlock,

    /// Failed to bind to the specified local address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// The configured peer address could not be resolved.
    #[error("invalid peer address {addr}: {reason}")]
    InvalidPeer { addr: String, reason: String },

    /// An I/O error occurred on the transport.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The frame does not fit in a single transport unit.
    #[error("frame too large for transport ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The transport has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

impl TransportError {
    /// Returns true for the back-pressure signal, which is not a failure.
    pub fn is_would_block(&self) -> bool {
        matches!(self, TransportError::WouldBlock)
    }
}

pub(crate) fn bind_error(addr: SocketAddr, source: std::io::Error) -> TransportError {
    TransportError::Bind {
        addr: addr.to_string(),
        source,
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
