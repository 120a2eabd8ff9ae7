//! Trace module
//!
//! Scripts write diagnostics with `print`. The output never becomes part of
//! the generated configuration; it goes to a `TraceSink` instead.

use mlua::prelude::*;
use std::sync::{Arc, Mutex};
use tracing::trace;

use crate::module::SandboxModule;

/// Trait for trace sinks
///
/// Implement this trait to decide where script output ends up. The default
/// `TracingSink` forwards to the `tracing` subscriber of the host.
pub trait TraceSink: Send + Sync {
    /// Write one line of script output
    fn write(&mut self, message: &str);
}

/// Sink emitting every line as a `tracing` event at trace level, tagged with
/// the repository it belongs to
#[derive(Debug, Clone)]
pub struct TracingSink {
    namespace: String,
    name: String,
}

impl TracingSink {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl TraceSink for TracingSink {
    fn write(&mut self, message: &str) {
        trace!(namespace = %self.namespace, name = %self.name, "{}", message);
    }
}

/// Module replacing `print` with a call into a `TraceSink`
pub struct TraceModule<S: TraceSink> {
    sink: Arc<Mutex<S>>,
}

impl<S: TraceSink> TraceModule<S> {
    /// Creates a new TraceModule owning the provided sink
    pub fn new(sink: S) -> Self {
        Self::shared(Arc::new(Mutex::new(sink)))
    }

    /// Creates a TraceModule writing into a sink the caller keeps a handle on
    pub fn shared(sink: Arc<Mutex<S>>) -> Self {
        Self { sink }
    }
}

impl<S: TraceSink + 'static> SandboxModule for TraceModule<S> {
    fn id(&self) -> &'static str {
        "print"
    }

    fn register(&self, lua: &Lua) -> LuaResult<()> {
        let sink = self.sink.clone();
        let tostring: LuaFunction = lua.globals().get("tostring")?;

        let print = lua.create_function(move |_, args: LuaMultiValue| {
            let mut parts = Vec::with_capacity(args.len());
            for value in args {
                parts.push(tostring.call::<String>(value)?);
            }
            sink.lock()
                .map_err(|e| LuaError::RuntimeError(format!("Failed to lock sink: {}", e)))?
                .write(&parts.join("\t"));
            Ok(())
        })?;

        lua.globals().set(self.id(), print)?;
        Ok(())
    }
}
