//! Kiln CLI
//!
//! Command-line interface for developing configuration scripts locally:
//! run a script against repository and build descriptors and print the
//! generated configuration, or set up editor support for script authors.

mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Kiln configuration script CLI", long_about = None)]
struct Cli {
    /// Log filter directives
    #[arg(long, env = "KILN_LOG", default_value = "warn")]
    log: String,

    /// Show script print output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        format!("{},kiln_lua=trace", cli.log)
    } else {
        cli.log.clone()
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    handle_command(cli.command)
}
