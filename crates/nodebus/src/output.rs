use std::fmt::Write as _;
use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use nodebus_frame::DeviceId;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// A received packet, fully drained from the node.
#[derive(Debug, Clone)]
pub struct ReceivedPacket {
    pub source: DeviceId,
    pub destination: DeviceId,
    pub payload: Vec<u8>,
}

#[derive(Serialize)]
struct PacketOutput<'a> {
    source: u8,
    destination: u8,
    broadcast: bool,
    payload_size: usize,
    payload: String,
    payload_hex: &'a str,
    timestamp: String,
}

/// Summary of one transmitted packet.
#[derive(Debug, Clone, Serialize)]
pub struct SendReport {
    pub source: u8,
    pub destination: u8,
    pub fields: usize,
    pub payload_size: usize,
    pub wire_size: usize,
}

pub fn print_packet(packet: &ReceivedPacket, format: OutputFormat) {
    let hex = to_hex(&packet.payload);
    match format {
        OutputFormat::Json => {
            let out = PacketOutput {
                source: packet.source.get(),
                destination: packet.destination.get(),
                broadcast: packet.destination.is_broadcast(),
                payload_size: packet.payload.len(),
                payload: payload_preview(&packet.payload),
                payload_hex: &hex,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SOURCE", "DESTINATION", "SIZE", "HEX", "PAYLOAD"])
                .add_row(vec![
                    packet.source.to_string(),
                    packet.destination.to_string(),
                    packet.payload.len().to_string(),
                    hex,
                    payload_preview(&packet.payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "src={} dst={} size={} hex={} payload={}",
                packet.source,
                packet.destination,
                packet.payload.len(),
                hex,
                payload_preview(&packet.payload)
            );
        }
        OutputFormat::Raw => print_raw(&packet.payload),
    }
}

pub fn print_send_report(report: &SendReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["SOURCE", "DESTINATION", "FIELDS", "PAYLOAD", "WIRE"])
                .add_row(vec![
                    DeviceId::new(report.source).to_string(),
                    DeviceId::new(report.destination).to_string(),
                    report.fields.to_string(),
                    report.payload_size.to_string(),
                    report.wire_size.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "sent {} fields ({} payload bytes, {} on the wire) from {} to {}",
                report.fields,
                report.payload_size,
                report.wire_size,
                DeviceId::new(report.source),
                DeviceId::new(report.destination)
            );
        }
        OutputFormat::Raw => {}
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => format!("<binary {} bytes>", payload.len()),
    }
}

pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
