//! Sandbox modules
//!
//! Each module is one capability of the sandbox:
//! - Loader: refuses every attempt to pull in external code
//! - Trace: routes `print` to a host-provided sink
//! - Null: a sentinel for emitting explicit null values

pub mod loader;
pub mod null;
pub mod trace;

pub use loader::LoaderModule;
pub use null::NullModule;
pub use trace::{TraceModule, TraceSink, TracingSink};
