//! Two nodes on an in-process bus trading a counter back and forth.
//!
//! Run with:
//!   cargo run --example ping-pong

use nodebus::node::{Node, NodeConfig, SystemClock, StdoutSink};
use nodebus::transport::LoopbackBus;

const PING: u8 = 0x01;
const PONG: u8 = 0x02;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bus = LoopbackBus::new();
    let mut pinger = Node::new(1u8, bus.tap());
    let mut ponger = Node::with_parts(NodeConfig::new(2u8), bus.tap(), SystemClock::new(), StdoutSink)?;

    pinger.begin_write(2u8)?;
    pinger.write8(PING)?;
    pinger.write32(0)?;
    pinger.end_write()?;

    let mut exchanged = 0;
    while exchanged < 6 {
        for node in [&mut pinger, &mut ponger] {
            node.poll()?;
            let Some(_len) = node.parse_packet()? else {
                continue;
            };
            let kind = node.read8()?;
            let counter = node.read32()?;
            let Some(from) = node.packet_source() else {
                continue;
            };
            node.end_read();

            let reply = if kind == PING { PONG } else { PING };
            node.println(format!(
                "[t={}ms] node {} got {} #{counter} from {from}",
                node.local_clock(),
                node.device_id(),
                if kind == PING { "ping" } else { "pong" },
            ));

            node.begin_write(from)?;
            node.write8(reply)?;
            node.write32(counter + 1)?;
            node.end_write()?;
            exchanged += 1;
        }
    }

    println!("pinger stats: {:?}", pinger.stats());
    println!("ponger stats: {:?}", ponger.stats());
    Ok(())
}
