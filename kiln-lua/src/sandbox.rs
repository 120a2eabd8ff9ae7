//! Lua sandbox creation
//!
//! Every conversion runs in its own Lua state built here. The state only
//! carries the `table`, `string`, `math` and `utf8` libraries (no `io`,
//! `os`, `package`, `debug` or `coroutine`) and is assembled from sandbox
//! modules:
//! - `LoaderModule` refuses `require`, `load`, `loadfile` and `dofile`
//! - `TraceModule` routes `print` to the host's trace sink
//! - `NullModule` exposes the `null` sentinel
//!
//! On top of that a step budget bounds the work a script can do. An
//! instruction hook charges one step per VM instruction, and the string
//! pattern functions charge their worst-case matching work up front, since
//! a single call can otherwise backtrack for a very long time inside one
//! instruction. The allocator enforces a memory ceiling. A sandbox is
//! single-use: callers create one per conversion and drop it afterwards.

use mlua::{
    Function, HookTriggers, Lua, LuaOptions, Result as LuaResult, StdLib, Table, Value, Variadic,
    VmState,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::module::ModuleRegistry;
use crate::modules::{LoaderModule, NullModule, TraceModule, TraceSink, TracingSink};

/// Name of the host, used for diagnostics only
pub const SANDBOX_NAME: &str = "kiln";

/// Maximum number of VM instructions a script may execute, top-level
/// evaluation and the `main` call combined
pub const MAX_STEPS: u64 = 50_000;

/// Maximum memory a script may allocate, in bytes
pub const MAX_MEMORY: usize = 64 * 1024 * 1024;

/// Estimated pattern matching work worth one step
pub const PATTERN_WORK_PER_STEP: f64 = 10_000.0;

/// String functions taking a Lua pattern as second argument
const PATTERN_FUNCTIONS: [&str; 4] = ["find", "match", "gmatch", "gsub"];

/// Create a sandbox whose `print` output is traced for the given repository
///
/// # Example
/// ```no_run
/// use kiln_lua::sandbox::create_sandbox;
///
/// let lua = create_sandbox("octocat", "hello-world")?;
/// lua.load(r#"print("traced, not rendered")"#).exec()?;
///
/// // Loading external code is refused
/// assert!(lua.load(r#"require("other")"#).exec().is_err());
/// # Ok::<(), mlua::Error>(())
/// ```
pub fn create_sandbox(namespace: &str, name: &str) -> LuaResult<Lua> {
    create_sandbox_with(TracingSink::new(namespace, name))
}

/// Create a sandbox writing script output into a custom trace sink
pub fn create_sandbox_with<S: TraceSink + 'static>(sink: S) -> LuaResult<Lua> {
    let lua = Lua::new_with(
        StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::UTF8,
        LuaOptions::default(),
    )?;

    sandbox_modules(sink).register_all(&lua)?;

    let budget = StepBudget::new(MAX_STEPS);
    install_pattern_guard(&lua, &budget)?;
    lua.set_memory_limit(MAX_MEMORY)?;
    install_step_limit(&lua, budget)?;

    Ok(lua)
}

/// Modules every sandbox is assembled from
pub fn sandbox_modules<S: TraceSink + 'static>(sink: S) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry.register(LoaderModule);
    registry.register(TraceModule::new(sink));
    registry.register(NullModule);
    registry
}

/// Step counter shared by everything that charges work to one conversion
#[derive(Debug, Clone)]
pub(crate) struct StepBudget {
    used: Arc<AtomicU64>,
    max: u64,
}

impl StepBudget {
    fn new(max: u64) -> Self {
        Self {
            used: Arc::new(AtomicU64::new(0)),
            max,
        }
    }

    /// Charge `steps`, failing once the total is over the ceiling.
    ///
    /// The counter never goes back down, so every charge after the first
    /// failure fails as well.
    fn charge(&self, steps: u64) -> LuaResult<()> {
        let steps = steps.min(self.max.saturating_add(1));
        let used = self.used.fetch_add(steps, Ordering::Relaxed).saturating_add(steps);
        if used > self.max {
            return Err(mlua::Error::runtime(format!(
                "maximum execution steps exceeded ({})",
                self.max
            )));
        }
        Ok(())
    }

    #[cfg(test)]
    fn used(&self) -> u64 {
        self.used.load(Ordering::Relaxed)
    }
}

/// Abort the script once it has executed more instructions than the budget
/// allows.
///
/// Once over the ceiling every further instruction fails, so a script that
/// catches the error with `pcall` is stopped at the next instruction outside
/// the protected call.
fn install_step_limit(lua: &Lua, budget: StepBudget) -> LuaResult<()> {
    lua.set_hook(
        HookTriggers::new().every_nth_instruction(1),
        move |_, _| {
            budget.charge(1)?;
            Ok(VmState::Continue)
        },
    )
}

/// Wrap the pattern functions of `string` so each call pays for its worst
/// case before it runs.
///
/// Strings index the `string` table through their metatable, so method
/// calls such as `s:find(p)` go through the wrappers too.
fn install_pattern_guard(lua: &Lua, budget: &StepBudget) -> LuaResult<()> {
    let string: Table = lua.globals().get("string")?;

    for name in PATTERN_FUNCTIONS {
        let original: Function = string.get(name)?;
        let budget = budget.clone();
        let guarded = lua.create_function(
            move |_, (subject, pattern, rest): (Value, Value, Variadic<Value>)| {
                let plain = name == "find" && rest.get(1).is_some_and(is_truthy);
                if !plain {
                    budget.charge(pattern_steps(&subject, &pattern))?;
                }
                original.call::<Variadic<Value>>((subject, pattern, rest))
            },
        )?;
        string.set(name, guarded)?;
    }
    Ok(())
}

fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Nil | Value::Boolean(false))
}

/// Steps charged for matching `pattern` against `subject`.
///
/// Every backtracking quantifier (`*`, `+`, `-`) can retry against the whole
/// subject, and an unanchored pattern is retried from every start position,
/// so the worst case grows as `len ^ (quantifiers + 1)`.
fn pattern_steps(subject: &Value, pattern: &Value) -> u64 {
    let len = match subject {
        Value::String(s) => s.as_bytes().len(),
        _ => 32,
    };
    let Value::String(pattern) = pattern else {
        // Not a pattern; the original function reports the type error.
        return 1;
    };
    let bytes = pattern.as_bytes();

    let quantifiers = backtracking_quantifiers(&bytes);
    let exponent = if quantifiers == 0 {
        1
    } else if bytes.first() == Some(&b'^') {
        quantifiers
    } else {
        quantifiers + 1
    };

    let work = (len.max(1) as f64).powi(exponent);
    (work / PATTERN_WORK_PER_STEP).ceil().max(1.0) as u64
}

/// Count the `*`, `+` and `-` quantifiers applied to a single character
/// class in a Lua pattern
fn backtracking_quantifiers(pattern: &[u8]) -> i32 {
    let mut count = 0;
    let mut quantifiable = false;
    let mut i = 0;

    while i < pattern.len() {
        match pattern[i] {
            b'%' => match pattern.get(i + 1) {
                Some(b'b') => {
                    i += 4;
                    quantifiable = false;
                    continue;
                }
                Some(b'f') => {
                    i += 2;
                    quantifiable = false;
                    continue;
                }
                _ => {
                    i += 2;
                    quantifiable = true;
                    continue;
                }
            },
            b'[' => {
                i = skip_set(pattern, i);
                quantifiable = true;
                continue;
            }
            b'*' | b'+' | b'-' if quantifiable => {
                count += 1;
                quantifiable = false;
            }
            b'?' if quantifiable => quantifiable = false,
            b'(' | b')' => quantifiable = false,
            b'^' if i == 0 => quantifiable = false,
            _ => quantifiable = true,
        }
        i += 1;
    }
    count
}

/// Index just past the `]` closing the set opened at `start`
fn skip_set(pattern: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    if pattern.get(i) == Some(&b'^') {
        i += 1;
    }
    // A `]` right after the opening bracket is a literal member.
    if pattern.get(i) == Some(&b']') {
        i += 1;
    }
    while i < pattern.len() {
        match pattern[i] {
            b'%' => i += 2,
            b']' => return i + 1,
            _ => i += 1,
        }
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConvertError;

    #[test]
    fn test_sandbox_basic_lua() {
        let lua = create_sandbox("octocat", "hello-world").unwrap();

        let result: i32 = lua
            .load(
                r#"
                local t = {a = 1, b = 2}
                return t.a + t.b
            "#,
            )
            .eval()
            .unwrap();
        assert_eq!(result, 3);

        let result: String = lua.load(r#"return string.upper("hello")"#).eval().unwrap();
        assert_eq!(result, "HELLO");

        let result: f64 = lua.load(r#"return math.sqrt(16)"#).eval().unwrap();
        assert_eq!(result, 4.0);

        let result: i64 = lua.load(r#"return utf8.len("héllo")"#).eval().unwrap();
        assert_eq!(result, 5);
    }

    #[test]
    fn test_sandbox_no_io() {
        let lua = create_sandbox("octocat", "hello-world").unwrap();

        for global in ["io", "os", "package", "debug"] {
            let present: bool = lua
                .load(format!("return {} ~= nil", global))
                .eval()
                .unwrap();
            assert!(!present, "{global} should not be available");
        }
    }

    #[test]
    fn test_sandbox_refuses_require() {
        let lua = create_sandbox("octocat", "hello-world").unwrap();

        let err = lua.load(r#"require("os")"#).exec().unwrap_err();
        assert!(matches!(ConvertError::from(err), ConvertError::CannotLoad));
    }

    #[test]
    fn test_sandbox_has_null() {
        let lua = create_sandbox("octocat", "hello-world").unwrap();

        let has_null: bool = lua.load("return null ~= nil").eval().unwrap();
        assert!(has_null);
    }

    #[test]
    fn test_step_limit_stops_infinite_loop() {
        let lua = create_sandbox("octocat", "hello-world").unwrap();

        let err = lua.load("while true do end").exec().unwrap_err();
        assert!(err.to_string().contains("maximum execution steps exceeded"));
    }

    #[test]
    fn test_step_limit_survives_pcall() {
        let lua = create_sandbox("octocat", "hello-world").unwrap();

        let err = lua
            .load("while true do pcall(function() while true do end end) end")
            .exec()
            .unwrap_err();
        assert!(err.to_string().contains("maximum execution steps exceeded"));
    }

    #[test]
    fn test_coroutines_are_unavailable() {
        let lua = create_sandbox("octocat", "hello-world").unwrap();

        let present: bool = lua.load("return coroutine ~= nil").eval().unwrap();
        assert!(!present);

        // A loop that would otherwise run in a fresh thread fails right away.
        let err = lua
            .load("local co = coroutine.wrap(function() while true do end end) co()")
            .exec()
            .unwrap_err();
        assert!(err.to_string().contains("coroutine"));
    }

    #[test]
    fn test_step_limit_counts_pattern_backtracking() {
        let lua = create_sandbox("octocat", "hello-world").unwrap();

        let err = lua
            .load(r#"return string.rep("a", 3000):find(".-.-.-.-b")"#)
            .exec()
            .unwrap_err();
        assert!(err.to_string().contains("maximum execution steps exceeded"));
    }

    #[test]
    fn test_pattern_guard_covers_every_entry_point() {
        for source in [
            r#"return string.find(string.rep("a", 3000), ".-.-.-b")"#,
            r#"return string.rep("a", 3000):match("(.-)(.-)(.-)b")"#,
            r#"for w in string.rep("a", 3000):gmatch(".*.*.*b") do end"#,
            r#"return (string.rep("a", 3000):gsub(".-.-.-b", ""))"#,
        ] {
            let lua = create_sandbox("octocat", "hello-world").unwrap();
            let err = lua.load(source).exec().unwrap_err();
            assert!(
                err.to_string().contains("maximum execution steps exceeded"),
                "{source} should exhaust the budget"
            );
        }
    }

    #[test]
    fn test_pattern_functions_still_work() {
        let lua = create_sandbox("octocat", "hello-world").unwrap();

        let (trimmed, replaced, first, words): (String, String, i64, i64) = lua
            .load(
                r#"
                local trimmed = ("  main  "):match("^%s*(.-)%s*$")
                local replaced = string.gsub("v1.2.3", "%.", "-")
                local first = ("feature/login"):find("/", 1, true)
                local words = 0
                for _ in ("cargo build --release"):gmatch("%S+") do words = words + 1 end
                return trimmed, replaced, first, words
            "#,
            )
            .eval()
            .unwrap();
        assert_eq!(trimmed, "main");
        assert_eq!(replaced, "v1-2-3");
        assert_eq!(first, 8);
        assert_eq!(words, 3);
    }

    #[test]
    fn test_plain_find_is_not_charged_as_a_pattern() {
        let lua = create_sandbox("octocat", "hello-world").unwrap();

        let found: Option<i64> = lua
            .load(r#"return (string.rep("a", 100000) .. ".-.-b"):find(".-.-b", 1, true)"#)
            .eval()
            .unwrap();
        assert_eq!(found, Some(100001));
    }

    #[test]
    fn test_backtracking_quantifiers() {
        let cases: [(&str, i32); 9] = [
            (".-.-.-.-b", 4),
            ("%s+", 1),
            ("[a-z]+", 1),
            ("a-b", 1),
            ("%-", 0),
            ("^(.-)%s*$", 2),
            ("%b()", 0),
            ("[]]*", 1),
            ("v%d+%.%d+", 2),
        ];
        for (pattern, expected) in cases {
            assert_eq!(backtracking_quantifiers(pattern.as_bytes()), expected, "{pattern}");
        }
    }

    #[test]
    fn test_step_budget_stays_exhausted() {
        let budget = StepBudget::new(10);
        budget.charge(10).unwrap();
        assert!(budget.charge(1).is_err());
        assert!(budget.charge(0).is_err());
        assert!(budget.charge(u64::MAX).is_err());
        assert!(budget.used() > 10);
    }

    #[test]
    fn test_step_limit_allows_bounded_work() {
        let lua = create_sandbox("octocat", "hello-world").unwrap();

        let sum: i64 = lua
            .load("local s = 0 for i = 1, 1000 do s = s + i end return s")
            .eval()
            .unwrap();
        assert_eq!(sum, 500500);
    }

    #[test]
    fn test_step_budget_is_shared_across_chunks() {
        let lua = create_sandbox("octocat", "hello-world").unwrap();

        // Each chunk stays under the ceiling on its own; together they do not.
        let chunk = "local s = 0 for i = 1, 5000 do s = s + i end";
        let mut failed = false;
        for _ in 0..20 {
            if lua.load(chunk).exec().is_err() {
                failed = true;
                break;
            }
        }
        assert!(failed);
    }

    #[test]
    fn test_bytecode_is_rejected() {
        let lua = create_sandbox("octocat", "hello-world").unwrap();

        let result = lua
            .load(&b"\x1bLua\x54\x00"[..])
            .set_mode(mlua::ChunkMode::Text)
            .exec();
        assert!(result.is_err());
    }

    #[test]
    fn test_memory_limit() {
        let lua = create_sandbox("octocat", "hello-world").unwrap();

        let err = lua
            .load(r#"return string.rep("x", 128 * 1024 * 1024)"#)
            .exec()
            .unwrap_err();
        assert!(matches!(err, mlua::Error::MemoryError(_)));
    }
}
