use std::path::Path;

use nodebus_frame::{DeviceId, DEFAULT_MAX_PAYLOAD, MAX_PAYLOAD_LIMIT};
use serde::{Deserialize, Serialize};

use crate::error::{NodeError, Result};

/// Maximum bytes accepted from a configuration file.
const MAX_CONFIG_FILE_SIZE: u64 = 64 * 1024;

/// Controls node identity, buffering and filtering behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    /// This node's bus address.
    pub device_id: u8,
    /// Largest payload accepted in either direction.
    pub max_payload_size: usize,
    /// Accepted packets held until the application parses them.
    pub rx_queue_depth: usize,
    /// Sealed frames held while the transport reports busy.
    pub tx_queue_depth: usize,
    /// Upper bound on transport receives per `poll`.
    pub max_reads_per_poll: usize,
    /// Idle polls after which a partially received frame is dropped.
    pub stale_frame_polls: u32,
    /// Accept packets sent to the broadcast address.
    pub accept_broadcast: bool,
    /// Accept packets regardless of destination.
    pub promiscuous: bool,
    /// Drop packets whose source is this node.
    pub ignore_own_frames: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            rx_queue_depth: 16,
            tx_queue_depth: 16,
            max_reads_per_poll: 8,
            stale_frame_polls: 64,
            accept_broadcast: true,
            promiscuous: false,
            ignore_own_frames: true,
        }
    }
}

impl NodeConfig {
    /// Default configuration for `device_id`.
    pub fn new(device_id: impl Into<DeviceId>) -> Self {
        Self {
            device_id: device_id.into().get(),
            ..Self::default()
        }
    }

    /// This node's address as a [`DeviceId`].
    pub fn device(&self) -> DeviceId {
        DeviceId::new(self.device_id)
    }

    /// Parse and validate a JSON document.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let config: Self =
            serde_json::from_slice(bytes).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(NodeError::Config(format!(
                "{}: file too large ({} bytes, max {MAX_CONFIG_FILE_SIZE})",
                path.display(),
                metadata.len()
            )));
        }
        let bytes = std::fs::read(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_slice(&bytes)
    }

    /// Check that every limit is usable.
    pub fn validate(&self) -> Result<()> {
        if DeviceId::new(self.device_id).is_broadcast() {
            return Err(NodeError::InvalidConfig(
                "device_id 255 is reserved for broadcast".to_string(),
            ));
        }
        if self.max_payload_size > MAX_PAYLOAD_LIMIT {
            return Err(NodeError::InvalidConfig(format!(
                "max_payload_size {} exceeds {MAX_PAYLOAD_LIMIT}",
                self.max_payload_size
            )));
        }
        if self.rx_queue_depth == 0 {
            return Err(NodeError::InvalidConfig(
                "rx_queue_depth must be at least 1".to_string(),
            ));
        }
        if self.tx_queue_depth == 0 {
            return Err(NodeError::InvalidConfig(
                "tx_queue_depth must be at least 1".to_string(),
            ));
        }
        if self.max_reads_per_poll == 0 {
            return Err(NodeError::InvalidConfig(
                "max_reads_per_poll must be at least 1".to_string(),
            ));
        }
        if self.stale_frame_polls == 0 {
            return Err(NodeError::InvalidConfig(
                "stale_frame_polls must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
