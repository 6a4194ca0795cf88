/// Errors that can occur in node operations.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] nodebus_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] nodebus_frame::FrameError),

    /// `begin_write` was called while another outgoing packet is open.
    #[error("an outgoing packet is already open")]
    WriteAlreadyOpen,

    /// A field write was attempted without `begin_write`.
    #[error("no outgoing packet is open")]
    NoOpenWrite,

    /// `parse_packet` was called while an incoming packet is still open.
    #[error("an incoming packet is already open")]
    ReadAlreadyOpen,

    /// A field read was attempted without a packet from `parse_packet`.
    #[error("no incoming packet is open")]
    NoOpenRead,

    /// The outbound queue cannot hold another frame.
    #[error("outbound queue full ({depth} frames)")]
    TxQueueFull { depth: usize },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reading or parsing a configuration file failed.
    #[error("failed to load configuration: {0}")]
    Config(String),
}

impl NodeError {
    /// True for errors caused by calling framing operations out of order.
    pub fn is_framing_violation(&self) -> bool {
        matches!(
            self,
            NodeError::WriteAlreadyOpen
                | NodeError::NoOpenWrite
                | NodeError::ReadAlreadyOpen
                | NodeError::NoOpenRead
        )
    }
}

pub type Result<T> = std::result::Result<T, NodeError>;
