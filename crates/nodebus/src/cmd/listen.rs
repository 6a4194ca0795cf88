use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::info;

use crate::cmd::{
    install_ctrlc_handler, next_packet, open_node, resolve_config, ListenArgs, POLL_INTERVAL,
};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_packet, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = resolve_config(args.node.device_id, args.node.config.as_deref())?;
    if args.promiscuous {
        config.promiscuous = true;
    }
    // Listening never transmits, so the peer is just the bound address.
    let mut node = open_node(config, &args.node.bind, &args.node.bind)?;
    info!(device = %node.device_id(), bind = %args.node.bind, "listening");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let Some(packet) = next_packet(&mut node)? else {
            thread::sleep(POLL_INTERVAL);
            continue;
        };

        print_packet(&packet, format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                return Ok(SUCCESS);
            }
        }
    }

    info!(printed, stats = ?node.stats(), "listener stopped");
    Ok(SUCCESS)
}
