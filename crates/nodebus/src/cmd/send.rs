use std::str::FromStr;
use std::thread;
use std::time::Instant;

use tracing::debug;

use crate::cmd::{open_node, parse_duration, resolve_config, SendArgs, UdpNode, POLL_INTERVAL};
use crate::exit::{node_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_send_report, OutputFormat, SendReport};

/// One typed payload field given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    U8(u8),
    U16(u16),
    U32(u32),
    Str(String),
    Hex(Vec<u8>),
}

impl Field {
    fn encoded_len(&self) -> usize {
        match self {
            Self::U8(_) => 1,
            Self::U16(_) => 2,
            Self::U32(_) => 4,
            Self::Str(s) => s.len(),
            Self::Hex(b) => b.len(),
        }
    }

    fn write_to(&self, node: &mut UdpNode) -> nodebus_node::Result<()> {
        match self {
            Self::U8(v) => node.write8(*v),
            Self::U16(v) => node.write16(*v),
            Self::U32(v) => node.write32(*v),
            Self::Str(s) => node.write(s.as_bytes()),
            Self::Hex(b) => node.write(b),
        }
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (kind, value) = input
            .split_once('=')
            .ok_or_else(|| format!("expected KIND=VALUE, got {input:?}"))?;

        match kind.to_ascii_lowercase().as_str() {
            "u8" => parse_int(value).and_then(|v| narrow(v, kind)).map(Self::U8),
            "u16" => parse_int(value).and_then(|v| narrow(v, kind)).map(Self::U16),
            "u32" => parse_int(value).and_then(|v| narrow(v, kind)).map(Self::U32),
            "str" => Ok(Self::Str(value.to_string())),
            "hex" => parse_hex(value).map(Self::Hex),
            other => Err(format!("unknown field kind {other:?} (u8, u16, u32, str, hex)")),
        }
    }
}

fn parse_int(value: &str) -> Result<u64, String> {
    let value = value.trim();
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|_| format!("invalid integer: {value:?}"))
}

fn narrow<T: TryFrom<u64>>(value: u64, kind: &str) -> Result<T, String> {
    T::try_from(value).map_err(|_| format!("{value} does not fit in {kind}"))
}

fn parse_hex(value: &str) -> Result<Vec<u8>, String> {
    let digits: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("invalid hex payload: {value:?}"));
    }
    if digits.len() % 2 != 0 {
        return Err("hex payload needs an even number of digits".to_string());
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| "invalid hex byte".to_string())
        })
        .collect()
}

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let config = resolve_config(args.node.device_id, args.node.config.as_deref())?;
    let mut node = open_node(config, &args.node.bind, &args.peer)?;

    node.begin_write(args.to)
        .map_err(|err| node_error("send failed", err))?;
    for field in &args.fields {
        if let Err(err) = field.write_to(&mut node) {
            node.abort_write();
            return Err(node_error("send failed", err));
        }
    }
    let wire_size = node
        .end_write()
        .map_err(|err| node_error("send failed", err))?;

    let deadline = Instant::now() + timeout;
    while node.pending_tx() > 0 {
        if Instant::now() >= deadline {
            return Err(CliError::new(
                TIMEOUT,
                format!("packet still queued after {timeout:?}"),
            ));
        }
        node.poll().map_err(|err| node_error("send failed", err))?;
        thread::sleep(POLL_INTERVAL);
    }
    debug!(to = args.to, wire_size, "packet sent");

    let report = SendReport {
        source: node.device_id().get(),
        destination: args.to,
        fields: args.fields.len(),
        payload_size: args.fields.iter().map(Field::encoded_len).sum(),
        wire_size,
    };
    print_send_report(&report, format);
    Ok(SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integer_kinds() {
        assert_eq!("u8=255".parse::<Field>().unwrap(), Field::U8(255));
        assert_eq!("u16=0x1234".parse::<Field>().unwrap(), Field::U16(0x1234));
        assert_eq!("U32=4096".parse::<Field>().unwrap(), Field::U32(4096));
    }

    #[test]
    fn rejects_out_of_range_integers() {
        assert!("u8=256".parse::<Field>().is_err());
        assert!("u16=0x10000".parse::<Field>().is_err());
        assert!("u32=-1".parse::<Field>().is_err());
    }

    #[test]
    fn parses_text_and_hex() {
        assert_eq!(
            "str=a=b".parse::<Field>().unwrap(),
            Field::Str("a=b".to_string())
        );
        assert_eq!(
            "hex=de ad BE ef".parse::<Field>().unwrap(),
            Field::Hex(vec![0xDE, 0xAD, 0xBE, 0xEF])
        );
        assert!("hex=abc".parse::<Field>().is_err());
        assert!("hex=zz".parse::<Field>().is_err());
    }

    #[test]
    fn rejects_unknown_kind_and_missing_separator() {
        assert!("f32=1.0".parse::<Field>().is_err());
        assert!("u8".parse::<Field>().is_err());
    }

    #[test]
    fn encoded_len_matches_wire_width() {
        let fields = [
            Field::U8(1),
            Field::U16(1),
            Field::U32(1),
            Field::Str("abc".to_string()),
            Field::Hex(vec![1, 2]),
        ];
        let total: usize = fields.iter().map(Field::encoded_len).sum();
        assert_eq!(total, 1 + 2 + 4 + 3 + 2);
    }
}
