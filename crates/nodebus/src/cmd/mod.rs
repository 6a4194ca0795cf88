use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use nodebus_node::{Node, NodeConfig, SystemClock, TracingSink};
use nodebus_transport::UdpTransport;

use crate::exit::{node_error, transport_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::{OutputFormat, ReceivedPacket};

pub mod echo;
pub mod listen;
pub mod send;
pub mod version;

/// Sleep between polls when nothing arrived.
pub const POLL_INTERVAL: Duration = Duration::from_millis(2);

pub type UdpNode = Node<UdpTransport, SystemClock, TracingSink>;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build one packet from typed fields and transmit it.
    Send(SendArgs),
    /// Print every accepted packet.
    Listen(ListenArgs),
    /// Return each accepted packet's payload to its sender.
    Echo(EchoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Echo(args) => echo::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Options shared by every command that joins the bus.
#[derive(Args, Debug)]
pub struct NodeArgs {
    /// Local UDP address to bind.
    #[arg(long, env = "NODEBUS_BIND", value_name = "ADDR")]
    pub bind: String,
    /// This node's device id (0-254). Overrides the config file.
    #[arg(long, env = "NODEBUS_DEVICE_ID", value_name = "N")]
    pub device_id: Option<u8>,
    /// JSON node configuration file.
    #[arg(long, env = "NODEBUS_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub node: NodeArgs,
    /// Address frames are sent to (unicast or broadcast).
    #[arg(long, env = "NODEBUS_PEER", value_name = "ADDR")]
    pub peer: String,
    /// Destination device id (255 broadcasts).
    #[arg(long, value_name = "N")]
    pub to: u8,
    /// Payload field as KIND=VALUE where KIND is u8, u16, u32, str or hex.
    #[arg(long = "field", value_name = "KIND=VALUE")]
    pub fields: Vec<send::Field>,
    /// Give up if the packet is still queued after this long (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub node: NodeArgs,
    /// Exit after printing N packets.
    #[arg(long)]
    pub count: Option<usize>,
    /// Accept packets addressed to any device.
    #[arg(long)]
    pub promiscuous: bool,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    #[command(flatten)]
    pub node: NodeArgs,
    /// Address replies are sent to.
    #[arg(long, env = "NODEBUS_PEER", value_name = "ADDR")]
    pub peer: String,
    /// Exit after echoing N packets.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Layer the config file under the command-line device id.
pub fn resolve_config(device_id: Option<u8>, path: Option<&Path>) -> CliResult<NodeConfig> {
    let mut config = match (path, device_id) {
        (Some(path), _) => NodeConfig::load(path).map_err(|err| node_error("config", err))?,
        (None, Some(_)) => NodeConfig::default(),
        (None, None) => {
            return Err(CliError::new(
                USAGE,
                "a device id is required (--device-id, NODEBUS_DEVICE_ID or --config)",
            ))
        }
    };
    if let Some(id) = device_id {
        config.device_id = id;
    }
    config
        .validate()
        .map_err(|err| node_error("config", err))?;
    Ok(config)
}

pub fn open_node(config: NodeConfig, bind: &str, peer: &str) -> CliResult<UdpNode> {
    let transport =
        UdpTransport::bind(bind, peer).map_err(|err| transport_error("bind failed", err))?;
    Node::with_parts(config, transport, SystemClock::new(), TracingSink::new())
        .map_err(|err| node_error("node setup failed", err))
}

/// Poll once and drain the next accepted packet, if any.
pub fn next_packet(node: &mut UdpNode) -> CliResult<Option<ReceivedPacket>> {
    node.poll().map_err(|err| node_error("poll failed", err))?;
    let Some(len) = node
        .parse_packet()
        .map_err(|err| node_error("receive failed", err))?
    else {
        return Ok(None);
    };

    let (Some(source), Some(destination)) = (node.packet_source(), node.packet_destination())
    else {
        return Err(CliError::new(INTERNAL, "parsed packet has no header"));
    };
    let mut payload = vec![0u8; len];
    node.read(&mut payload)
        .map_err(|err| node_error("receive failed", err))?;
    node.end_read();

    Ok(Some(ReceivedPacket {
        source,
        destination,
        payload,
    }))
}

pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

/// Parse a `--timeout` value such as `500ms` or `2s`.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    let parsed = if let Some(ms) = input.strip_suffix("ms") {
        ms.parse().ok().map(Duration::from_millis)
    } else if let Some(secs) = input.strip_suffix('s') {
        secs.parse().ok().map(Duration::from_secs)
    } else {
        None
    };

    match parsed {
        Some(duration) if !duration.is_zero() => Ok(duration),
        Some(_) => Err(CliError::new(USAGE, "timeout must be greater than zero")),
        None => Err(CliError::new(
            USAGE,
            format!("invalid timeout {input:?} (expected e.g. 500ms or 2s)"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_units() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("4").unwrap_err().code, USAGE);
        assert_eq!(parse_duration("0s").unwrap_err().code, USAGE);
        assert_eq!(parse_duration("soon").unwrap_err().code, USAGE);
    }

    #[test]
    fn device_id_is_required_without_config() {
        let err = resolve_config(None, None).unwrap_err();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn flag_device_id_is_used() {
        let config = resolve_config(Some(9), None).unwrap();
        assert_eq!(config.device_id, 9);
    }

    #[test]
    fn broadcast_device_id_is_a_config_error() {
        let err = resolve_config(Some(255), None).unwrap_err();
        assert_eq!(err.code, crate::exit::CONFIG_INVALID);
    }
}
