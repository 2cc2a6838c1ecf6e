//! Trellis worker binary
//!
//! One worker serves one compute device, named by `--device`. Jobs and
//! control messages arrive as JSON lines on stdin, status messages leave on
//! stdout, and logging goes to stderr where the parent relays it. Exits on
//! stdin EOF or a shutdown control message.

use std::sync::Arc;

use tokio::io::BufReader;

use trellis_server::constants::defaults;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let device = device_arg().unwrap_or_else(|| defaults::DEVICES.to_string());
    log::info!("worker starting on device {}", device);

    let registry = Arc::new(graph_nodes::registry());
    executor::worker::run(
        registry,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await?;

    log::info!("worker on {} exiting", device);
    Ok(())
}

fn device_arg() -> Option<String> {
    let mut args = std::env::args();
    while let Some(arg) = args.next() {
        if arg == "--device" {
            return args.next();
        }
    }
    None
}
