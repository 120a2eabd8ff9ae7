//! Kiln Lua
//!
//! Turns a configuration script into pipeline configuration documents.
//! It includes:
//! - Sandbox creation: a fresh, restricted Lua state per conversion with
//!   refused module loading, traced `print` and a step ceiling
//! - Argument building: the `ctx` table handed to the script
//! - Entry-point invocation: locating and calling the global `main`
//! - Canonical rendering of the returned tables into a multi-document stream
//! - A converter plugin for the CI host

pub mod args;
pub mod config;
pub mod converter;
pub mod error;
pub mod invoke;
pub mod module;
pub mod modules;
pub mod parser;
pub mod render;
pub mod sandbox;

pub use args::{CONTEXT_STUBS, build_args};
pub use config::ConverterConfig;
pub use converter::{Converter, ScriptConverter};
pub use error::{ConvertError, Result};
pub use invoke::invoke;
pub use module::{ModuleRegistry, SandboxModule};
pub use modules::{LoaderModule, NullModule, TraceModule, TraceSink, TracingSink};
pub use parser::{parse_script, parse_script_with};
pub use render::{MAX_ARTIFACT_SIZE, render_artifact};
pub use sandbox::{MAX_STEPS, create_sandbox, create_sandbox_with};
