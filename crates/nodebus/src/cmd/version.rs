use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("nodebus {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: nodebus");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("NODEBUS_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("NODEBUS_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!(
        "wire: sync=0x{:02x}{:02x} header={} trailer={} max_payload={}",
        nodebus_frame::SYNC[0],
        nodebus_frame::SYNC[1],
        nodebus_frame::HEADER_SIZE,
        nodebus_frame::TRAILER_SIZE,
        nodebus_frame::DEFAULT_MAX_PAYLOAD
    );
    println!("features: async={}, cli=true", cfg!(feature = "async"));

    Ok(SUCCESS)
}
