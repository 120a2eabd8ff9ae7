//! Loader module
//!
//! Replaces every base-library entry point that can pull code into the
//! state with a function that refuses, whatever the requested name.

use mlua::prelude::*;
use tracing::debug;

use crate::error::LoadRefused;
use crate::module::SandboxModule;

/// Globals that can load code from outside the script
const LOADERS: [&str; 4] = ["require", "load", "loadfile", "dofile"];

/// Module that refuses all external loads
pub struct LoaderModule;

impl SandboxModule for LoaderModule {
    fn id(&self) -> &'static str {
        "loader"
    }

    fn register(&self, lua: &Lua) -> LuaResult<()> {
        let globals = lua.globals();
        for loader in LOADERS {
            let refuse = lua.create_function(move |_, _args: LuaMultiValue| {
                debug!(loader, "refused external load");
                Err::<(), _>(LuaError::external(LoadRefused))
            })?;
            globals.set(loader, refuse)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConvertError;

    fn lua_with_loader() -> Lua {
        let lua = Lua::new();
        LoaderModule.register(&lua).unwrap();
        lua
    }

    #[test]
    fn test_every_loader_is_refused() {
        let lua = lua_with_loader();
        for source in [
            r#"require("other")"#,
            r#"load("return 1")"#,
            r#"loadfile("other.lua")"#,
            r#"dofile("other.lua")"#,
        ] {
            let err = lua.load(source).exec().unwrap_err();
            assert!(
                matches!(ConvertError::from(err), ConvertError::CannotLoad),
                "{source} was not refused"
            );
        }
    }

    #[test]
    fn test_refusal_ignores_arguments() {
        let lua = lua_with_loader();
        let err = lua.load("require()").exec().unwrap_err();
        assert!(matches!(ConvertError::from(err), ConvertError::CannotLoad));
    }

    #[test]
    fn test_refusal_can_be_caught() {
        let lua = lua_with_loader();
        let ok: bool = lua
            .load(r#"local ok = pcall(require, "other") return ok"#)
            .eval()
            .unwrap();
        assert!(!ok);
    }
}
