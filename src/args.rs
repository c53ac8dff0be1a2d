use std::path::PathBuf;

use clap::Parser;
use pingmon::{config::PingMonitorConfig, error::PingMonitorErrorKind};

#[derive(Parser, Debug)]
#[command(author, version, about = "Starlink ping drop monitor", long_about = None)]
pub struct Args {
    #[arg(
        short = 'c',
        long = "config",
        help = "Path to an optional TOML configuration file"
    )]
    pub config_path: Option<PathBuf>,
    #[arg(
        short = 'f',
        long = "log-file",
        help = "Append logs to this file instead of stdout"
    )]
    pub log_file: Option<PathBuf>,
}

/// Parses the command line and loads the configuration it points to.
pub fn process_cli_args() -> Result<PingMonitorConfig, PingMonitorErrorKind> {
    let args = Args::parse();
    let mut config = PingMonitorConfig::load(args.config_path.as_deref())?;
    config.set_log_file(args.log_file);
    Ok(config)
}
