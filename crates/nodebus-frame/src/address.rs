//! Device addressing.
//!
//! Every node on the bus owns one 8-bit identifier. `0xFF` is reserved as
//! the broadcast destination; a node never uses it as its own id.

use std::fmt;
use std::str::FromStr;

/// An 8-bit bus device identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(u8);

impl DeviceId {
    /// Destination that every node observes.
    pub const BROADCAST: DeviceId = DeviceId(0xFF);

    /// Wrap a raw identifier.
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// The raw identifier.
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Returns true for the broadcast destination.
    pub const fn is_broadcast(self) -> bool {
        self.0 == Self::BROADCAST.0
    }
}

impl From<u8> for DeviceId {
    fn from(id: u8) -> Self {
        Self(id)
    }
}

impl From<DeviceId> for u8 {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_broadcast() {
            f.write_str("broadcast")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Error returned when a device id string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid device id '{0}' (expected 0-255, 0x00-0xff or \"broadcast\")")]
pub struct ParseDeviceIdError(String);

impl FromStr for DeviceId {
    type Err = ParseDeviceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("broadcast") {
            return Ok(Self::BROADCAST);
        }
        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(hex) => u8::from_str_radix(hex, 16),
            None => trimmed.parse::<u8>(),
        };
        parsed
            .map(Self)
            .map_err(|_| ParseDeviceIdError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_hex_and_broadcast() {
        assert_eq!("7".parse::<DeviceId>().unwrap(), DeviceId::new(7));
        assert_eq!("0x1f".parse::<DeviceId>().unwrap(), DeviceId::new(0x1F));
        assert_eq!("BROADCAST".parse::<DeviceId>().unwrap(), DeviceId::BROADCAST);
    }

    #[test]
    fn rejects_out_of_range() {
        assert!("256".parse::<DeviceId>().is_err());
        assert!("0x100".parse::<DeviceId>().is_err());
        assert!("node".parse::<DeviceId>().is_err());
    }

    #[test]
    fn display_names_broadcast() {
        assert_eq!(DeviceId::new(2).to_string(), "2");
        assert_eq!(DeviceId::BROADCAST.to_string(), "broadcast");
    }
}
