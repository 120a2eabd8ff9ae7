//! Entry-point invoker
//!
//! Runs the script's top level to populate its globals, then calls the
//! global `main` with the conversion context.

use mlua::{ChunkMode, Function, Lua, Table, Value};
use tracing::debug;

use crate::error::{ConvertError, Result};

/// Name of the global the script must define
pub const ENTRY_POINT: &str = "main";

/// The callable found under `main`
enum EntryPoint {
    Function(Function),
    /// A table with a `__call` metamethod
    Callable { target: Table, call: Function },
}

impl EntryPoint {
    fn call(&self, arg: Table) -> mlua::Result<Value> {
        match self {
            EntryPoint::Function(main) => main.call(arg),
            EntryPoint::Callable { target, call } => call.call((target.clone(), arg)),
        }
    }
}

/// Evaluate `source` and call its `main` with `arg` as the only argument
///
/// `file_name` only shows up in diagnostics (error positions, tracebacks).
///
/// # Errors
/// - `ConvertError::MainMissing` if no global `main` exists after evaluation
/// - `ConvertError::MainInvalid` if `main` cannot be called
/// - `ConvertError::CannotLoad` if the script tried to load external code
/// - `ConvertError::Script` for any other interpreter error, including the
///   step ceiling
pub fn invoke(lua: &Lua, source: &[u8], file_name: &str, arg: Table) -> Result<Value> {
    debug!(file = file_name, "evaluating script");

    lua.load(source)
        .set_name(format!("@{}", file_name))
        .set_mode(ChunkMode::Text)
        .exec()?;

    let main = entry_point(&lua.globals())?;

    debug!(file = file_name, "calling {}", ENTRY_POINT);
    Ok(main.call(arg)?)
}

fn entry_point(globals: &Table) -> Result<EntryPoint> {
    match globals.raw_get::<Value>(ENTRY_POINT)? {
        Value::Nil => Err(ConvertError::MainMissing),
        Value::Function(main) => Ok(EntryPoint::Function(main)),
        Value::Table(target) => match call_metamethod(&target)? {
            Some(call) => Ok(EntryPoint::Callable { target, call }),
            None => Err(ConvertError::MainInvalid),
        },
        _ => Err(ConvertError::MainInvalid),
    }
}

fn call_metamethod(table: &Table) -> mlua::Result<Option<Function>> {
    match table.metatable() {
        Some(metatable) => match metatable.raw_get::<Value>("__call")? {
            Value::Function(call) => Ok(Some(call)),
            _ => Ok(None),
        },
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::create_sandbox;

    fn run(source: &str) -> Result<Value> {
        let lua = create_sandbox("octocat", "hello-world").unwrap();
        let arg = lua.create_table().unwrap();
        arg.set("answer", 42).unwrap();
        invoke(&lua, source.as_bytes(), ".kiln.lua", arg)
    }

    #[test]
    fn test_main_receives_argument() {
        let value = run("function main(ctx) return ctx.answer end").unwrap();
        assert_eq!(value, Value::Integer(42));
    }

    #[test]
    fn test_main_receives_exactly_one_argument() {
        let value = run("function main(...) return select('#', ...) end").unwrap();
        assert_eq!(value, Value::Integer(1));
    }

    #[test]
    fn test_missing_main() {
        assert!(matches!(run("x = 1"), Err(ConvertError::MainMissing)));
    }

    #[test]
    fn test_local_main_is_not_an_entry_point() {
        let result = run("local function main(ctx) return {} end");
        assert!(matches!(result, Err(ConvertError::MainMissing)));
    }

    #[test]
    fn test_entry_point_is_case_sensitive() {
        let result = run("function Main(ctx) return {} end");
        assert!(matches!(result, Err(ConvertError::MainMissing)));
    }

    #[test]
    fn test_non_callable_main() {
        for source in ["main = 42", r#"main = "main""#, "main = { kind = 'pipeline' }", "main = true"] {
            assert!(
                matches!(run(source), Err(ConvertError::MainInvalid)),
                "{source} should be rejected"
            );
        }
    }

    #[test]
    fn test_callable_table_main() {
        let source = r#"
            main = setmetatable({}, {
                __call = function(self, ctx) return ctx.answer + 1 end
            })
        "#;
        assert_eq!(run(source).unwrap(), Value::Integer(43));
    }

    #[test]
    fn test_syntax_error_is_forwarded() {
        let err = run("function main(ctx) return").unwrap_err();
        match err {
            ConvertError::Script(inner) => {
                assert!(matches!(inner, mlua::Error::SyntaxError { .. }));
                assert!(inner.to_string().contains(".kiln.lua"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_runtime_error_is_forwarded() {
        let err = run(r#"function main(ctx) error("no pipelines today") end"#).unwrap_err();
        match err {
            ConvertError::Script(inner) => assert!(inner.to_string().contains("no pipelines today")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_top_level_error_stops_before_main() {
        let err = run(r#"error("top level") function main(ctx) return {} end"#).unwrap_err();
        assert!(err.to_string().contains("top level"));
    }

    #[test]
    fn test_load_inside_main() {
        let result = run(r#"function main(ctx) return require("pipelines") end"#);
        assert!(matches!(result, Err(ConvertError::CannotLoad)));
    }

    #[test]
    fn test_step_ceiling_inside_main() {
        let err = run("function main(ctx) while true do end end").unwrap_err();
        assert!(matches!(err, ConvertError::Script(_)));
        assert!(err.to_string().contains("maximum execution steps exceeded"));
    }

    #[test]
    fn test_step_ceiling_at_top_level() {
        let err = run("while true do end function main(ctx) return {} end").unwrap_err();
        assert!(err.to_string().contains("maximum execution steps exceeded"));
    }
}
