use std::fmt;
use std::io;

use nodebus_frame::FrameError;
use nodebus_node::NodeError;
use nodebus_transport::TransportError;

// sysexits-style exit codes.
pub const SUCCESS: i32 = 0;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const CONFIG_INVALID: i32 = 78;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::AddrInUse | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { addr, source } => {
            let code = match source.kind() {
                io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
                _ => TRANSPORT_ERROR,
            };
            CliError::new(code, format!("{context}: cannot bind {addr}: {source}"))
        }
        TransportError::InvalidPeer { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } | FrameError::ReadPastEnd { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn node_error(context: &str, err: NodeError) -> CliError {
    match err {
        NodeError::Transport(err) => transport_error(context, err),
        NodeError::Frame(err) => frame_error(context, err),
        NodeError::TxQueueFull { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        NodeError::InvalidConfig(_) | NodeError::Config(_) => {
            CliError::new(CONFIG_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_failure_maps_to_transport_code() {
        let err = TransportError::Bind {
            addr: "127.0.0.1:1".to_string(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        };
        let mapped = transport_error("bind failed", err);
        assert_eq!(mapped.code, TRANSPORT_ERROR);
        assert!(mapped.message.contains("127.0.0.1:1"));
    }

    #[test]
    fn oversize_payload_is_data_invalid() {
        let err = NodeError::Frame(FrameError::PayloadTooLarge { size: 2000, max: 1024 });
        assert_eq!(node_error("send failed", err).code, DATA_INVALID);
    }

    #[test]
    fn bad_config_has_its_own_code() {
        let err = NodeError::InvalidConfig("rx_queue_depth must be at least 1".to_string());
        assert_eq!(node_error("config", err).code, CONFIG_INVALID);
    }
}
