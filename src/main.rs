mod args;

use std::process;

use args::process_cli_args;
use pingmon::{logging, PingMonitor};
use tracing::error;

#[tokio::main]
async fn main() {
    let config = match process_cli_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    if let Err(e) = logging::init(&config) {
        eprintln!("{e}");
        process::exit(1);
    }

    if let Err(e) = PingMonitor::new(config).start().await {
        error!("{}", e);
        process::exit(1);
    }
}
