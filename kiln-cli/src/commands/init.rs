//! Init command handlers
//!
//! Handles initialization of a script development environment: a
//! .luarc.json for the Lua Language Server and stub files describing the
//! sandbox globals and the `ctx` argument of `main`.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use kiln_lua::modules::TraceSink;
use kiln_lua::sandbox::sandbox_modules;
use kiln_lua::CONTEXT_STUBS;
use std::fs;
use std::path::Path;

/// Init subcommands
#[derive(Subcommand)]
pub enum InitCommands {
    /// Generate Lua development files (.luarc.json and stubs)
    Lua {
        /// Output directory for generated files
        #[arg(short, long, default_value = ".")]
        output: String,

        /// Generate only .luarc.json
        #[arg(long)]
        config_only: bool,

        /// Generate only stub files
        #[arg(long)]
        stubs_only: bool,
    },
}

/// Handle init commands
pub fn handle_init_command(command: InitCommands) -> Result<()> {
    match command {
        InitCommands::Lua {
            output,
            config_only,
            stubs_only,
        } => generate_lua_dev_files(&output, config_only, stubs_only),
    }
}

/// Generate Lua development files
fn generate_lua_dev_files(output_dir: &str, config_only: bool, stubs_only: bool) -> Result<()> {
    let output_path = Path::new(output_dir);

    if !stubs_only {
        generate_luarc_json(output_path)?;
    }

    if !config_only {
        generate_stub_files(output_path)?;
    }

    println!("{}", "✓ Lua development files generated!".green().bold());
    println!();
    println!("{}", "Next steps:".bold());
    println!("  1. Install Lua Language Server in your editor");
    println!("  2. Define a global function main(ctx) in your configuration script");
    println!("  3. Use {} to preview the result", "kiln convert <script>".cyan());

    Ok(())
}

/// Generate .luarc.json for Lua LSP configuration
fn generate_luarc_json(output_path: &Path) -> Result<()> {
    let luarc_path = output_path.join(".luarc.json");

    let luarc_content = r#"{
  "$schema": "https://raw.githubusercontent.com/sumneko/vscode-lua/master/setting/schema.json",
  "runtime": {
    "version": "Lua 5.4",
    "builtin": {
      "io": "disable",
      "os": "disable",
      "package": "disable",
      "debug": "disable",
      "coroutine": "disable"
    }
  },
  "diagnostics": {
    "globals": ["main", "null"]
  },
  "workspace": {
    "library": [".kiln/stubs"],
    "checkThirdParty": false
  }
}
"#;

    fs::write(&luarc_path, luarc_content)
        .with_context(|| format!("Failed to write .luarc.json to {:?}", luarc_path))?;

    println!("  {} .luarc.json", "Created".green());

    Ok(())
}

/// Generate stub files for the sandbox globals and the `ctx` argument
///
/// Uses the actual sandbox modules to generate stubs, so they stay in sync
/// with what scripts really see.
fn generate_stub_files(output_path: &Path) -> Result<()> {
    let stubs_dir = output_path.join(".kiln").join("stubs");
    fs::create_dir_all(&stubs_dir)
        .with_context(|| format!("Failed to create stubs directory at {:?}", stubs_dir))?;

    let stubs = [
        ("context", CONTEXT_STUBS.to_string()),
        ("sandbox", sandbox_modules(NoOpTraceSink).generate_stubs()),
    ];

    for (name, stub_content) in stubs {
        let stub_path = stubs_dir.join(format!("{}.lua", name));

        fs::write(&stub_path, stub_content)
            .with_context(|| format!("Failed to write stub file {:?}", stub_path))?;

        println!("  {} {}.lua", "Created".green(), name);
    }

    println!(
        "  {} in {}",
        "Stubs ready".green(),
        stubs_dir.display().to_string().cyan()
    );

    Ok(())
}

/// No-op trace sink; stub generation never runs a script
struct NoOpTraceSink;

impl TraceSink for NoOpTraceSink {
    fn write(&mut self, _message: &str) {}
}
