use mlua::prelude::*;

/// Trait for sandbox modules.
///
/// A module is one capability installed into a fresh sandbox: it may add
/// globals, or replace globals the base library ships with. The sandbox is
/// assembled by registering a set of modules into a bare Lua state.
///
/// # Example
///
/// ```rust
/// use kiln_lua::module::SandboxModule;
/// use mlua::prelude::*;
///
/// struct VersionModule;
///
/// impl SandboxModule for VersionModule {
///     fn id(&self) -> &'static str {
///         "version"
///     }
///
///     fn register(&self, lua: &Lua) -> LuaResult<()> {
///         lua.globals().set(self.id(), "1.0.0")?;
///         Ok(())
///     }
///
///     fn stubs(&self) -> String {
///         "---@type string\nversion = \"\"".to_string()
///     }
/// }
/// ```
pub trait SandboxModule: Send + Sync {
    /// Returns the unique identifier for this module.
    ///
    /// Modules that install a single global use the global's name.
    fn id(&self) -> &'static str;

    /// Registers this module's functions and values into the Lua context.
    ///
    /// # Errors
    /// Returns `LuaError` if registration fails
    fn register(&self, lua: &Lua) -> LuaResult<()>;

    /// Generates Lua Language Server stubs for this module.
    ///
    /// Modules that only take capabilities away return an empty string.
    fn stubs(&self) -> String {
        String::new()
    }
}

/// Registry for managing sandbox modules
pub struct ModuleRegistry {
    modules: Vec<Box<dyn SandboxModule>>,
}

impl ModuleRegistry {
    /// Creates a new empty module registry
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    /// Registers a module
    ///
    /// # Panics
    /// Panics if a module with the same ID is already registered
    pub fn register<M: SandboxModule + 'static>(&mut self, module: M) {
        let id = module.id();
        if self.modules.iter().any(|m| m.id() == id) {
            panic!("Module with id '{}' is already registered", id);
        }
        self.modules.push(Box::new(module));
    }

    /// Registers all modules into a Lua context, in registration order
    ///
    /// # Errors
    /// Returns the first error encountered during registration
    pub fn register_all(&self, lua: &Lua) -> LuaResult<()> {
        for module in &self.modules {
            module.register(lua)?;
        }
        Ok(())
    }

    /// Generates a combined stub file for all registered modules
    pub fn generate_stubs(&self) -> String {
        let mut stubs = String::new();
        for module in &self.modules {
            let module_stubs = module.stubs();
            if module_stubs.is_empty() {
                continue;
            }
            stubs.push_str(&module_stubs);
            stubs.push_str("\n\n");
        }
        stubs
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
