//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod convert;
mod init;

pub use convert::ConvertArgs;
pub use init::InitCommands;

use anyhow::Result;
use clap::Subcommand;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run a configuration script and print the generated configuration
    Convert(ConvertArgs),
    /// Initialize development environment
    Init {
        #[command(subcommand)]
        command: InitCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Convert(args) => convert::handle_convert_command(args),
        Commands::Init { command } => init::handle_init_command(command),
    }
}
