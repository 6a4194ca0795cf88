use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{debug, info};

use crate::cmd::{
    install_ctrlc_handler, next_packet, open_node, resolve_config, EchoArgs, POLL_INTERVAL,
};
use crate::exit::{node_error, CliResult, SUCCESS};
use crate::output::{print_packet, OutputFormat};

pub fn run(args: EchoArgs, format: OutputFormat) -> CliResult<i32> {
    let config = resolve_config(args.node.device_id, args.node.config.as_deref())?;
    let mut node = open_node(config, &args.node.bind, &args.peer)?;
    info!(device = %node.device_id(), peer = %args.peer, "echo server started");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut echoed = 0usize;

    while running.load(Ordering::SeqCst) {
        let Some(packet) = next_packet(&mut node)? else {
            thread::sleep(POLL_INTERVAL);
            continue;
        };

        node.begin_write(packet.source)
            .map_err(|err| node_error("echo failed", err))?;
        node.write(&packet.payload)
            .map_err(|err| node_error("echo failed", err))?;
        node.end_write()
            .map_err(|err| node_error("echo failed", err))?;
        debug!(to = %packet.source, bytes = packet.payload.len(), "echoed packet");

        print_packet(&packet, format);
        echoed = echoed.saturating_add(1);

        if let Some(count) = args.count {
            if echoed >= count {
                break;
            }
        }
    }

    // Push out anything still queued behind a WouldBlock.
    while node.pending_tx() > 0 && running.load(Ordering::SeqCst) {
        node.poll().map_err(|err| node_error("echo failed", err))?;
        thread::sleep(POLL_INTERVAL);
    }

    info!(echoed, stats = ?node.stats(), "echo server stopped");
    Ok(SUCCESS)
}
