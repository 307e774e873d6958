use std::path::PathBuf;

use clap::Parser;

// Define command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the service configuration YAML file.
    #[arg(short = 'c', long, default_value = "config/docflow.yaml")]
    pub config: PathBuf,

    /// Address to listen on; overrides `server.bind_addr` from the config file.
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    /// Optional: directory for daily-rolling log files
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    pub validate_config: bool,
}
