//! Null module
//!
//! Lua tables cannot hold `nil`, so scripts that need an explicit null in
//! the generated configuration store the `null` sentinel instead.

use mlua::prelude::*;

use crate::module::SandboxModule;

/// Module exposing the `null` sentinel
pub struct NullModule;

impl SandboxModule for NullModule {
    fn id(&self) -> &'static str {
        "null"
    }

    fn register(&self, lua: &Lua) -> LuaResult<()> {
        lua.globals().set(self.id(), LuaValue::NULL)
    }

    fn stubs(&self) -> String {
        r#"---@meta

---Sentinel rendered as an explicit null in the generated configuration
---@type lightuserdata
null = nil
"#
        .to_string()
    }
}
