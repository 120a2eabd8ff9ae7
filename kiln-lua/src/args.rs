//! Argument builder
//!
//! Translates the host's request structures into the single table handed to
//! the script's `main`:
//!
//! ```lua
//! ctx.repo   -- repository descriptor
//! ctx.build  -- build descriptor
//! ctx.input  -- template data, keys preserved
//! ```
//!
//! Fields may be added over time; scripts must not rely on the absence of a
//! key.

use kiln_core::{Build, Repository, TemplateData};
use mlua::{Lua, Table, Value};
use serde_json::Value as JsonValue;

use crate::error::{ConvertError, Result};

/// LuaLS annotations describing the `ctx` argument
pub const CONTEXT_STUBS: &str = r#"---@meta

---@class kiln.Repo
---@field uid string
---@field namespace string
---@field name string
---@field slug string Namespace and name joined by a slash
---@field git_http_url string
---@field git_ssh_url string
---@field link string
---@field branch string Default branch
---@field private boolean
---@field visibility string
---@field active boolean
---@field trusted boolean
---@field protected boolean
---@field ignore_forks boolean
---@field ignore_pull_requests boolean
---@field config string Path of the configuration file
---@field timeout integer Build timeout in minutes

---@class kiln.Build
---@field number integer
---@field event string push, pull_request, tag, promote, rollback, cron or custom
---@field action string
---@field cron string
---@field environment string Target environment of a promotion or rollback
---@field link string
---@field title string
---@field message string
---@field before string
---@field after string
---@field commit string Same as after
---@field ref string
---@field source_repo string
---@field source string
---@field target string
---@field branch string Same as target
---@field author_login string
---@field author_name string
---@field author_email string
---@field author_avatar string
---@field sender string
---@field debug boolean
---@field params table<string, string>

---@class kiln.Context
---@field repo kiln.Repo
---@field build kiln.Build
---@field input table<string, any> Template data
"#;

/// Build the argument passed to `main`
///
/// # Errors
/// Returns `ConvertError::Argument` if the template data holds a value the
/// script side cannot represent, before any script code runs.
pub fn build_args(lua: &Lua, repo: &Repository, build: &Build, input: &TemplateData) -> Result<Table> {
    let args = lua.create_table()?;
    args.set("repo", repo_table(lua, repo)?)?;
    args.set("build", build_table(lua, build)?)?;
    args.set("input", object_to_lua(lua, input, "input")?)?;
    Ok(args)
}

fn repo_table(lua: &Lua, repo: &Repository) -> mlua::Result<Table> {
    let table = lua.create_table()?;
    table.set("uid", repo.uid.as_str())?;
    table.set("namespace", repo.namespace.as_str())?;
    table.set("name", repo.name.as_str())?;
    table.set("slug", repo.slug.as_str())?;
    table.set("git_http_url", repo.http_url.as_str())?;
    table.set("git_ssh_url", repo.ssh_url.as_str())?;
    table.set("link", repo.link.as_str())?;
    table.set("branch", repo.branch.as_str())?;
    table.set("private", repo.private)?;
    table.set("visibility", repo.visibility.as_str())?;
    table.set("active", repo.active)?;
    table.set("trusted", repo.trusted)?;
    table.set("protected", repo.protected)?;
    table.set("ignore_forks", repo.ignore_forks)?;
    table.set("ignore_pull_requests", repo.ignore_pulls)?;
    table.set("config", repo.config.as_str())?;
    table.set("timeout", repo.timeout)?;
    Ok(table)
}

fn build_table(lua: &Lua, build: &Build) -> mlua::Result<Table> {
    let table = lua.create_table()?;
    table.set("number", build.number)?;
    table.set("event", build.event.as_str())?;
    table.set("action", build.action.as_str())?;
    table.set("cron", build.cron.as_str())?;
    table.set("environment", build.deploy_to.as_str())?;
    table.set("link", build.link.as_str())?;
    table.set("title", build.title.as_str())?;
    table.set("message", build.message.as_str())?;
    table.set("before", build.before.as_str())?;
    table.set("after", build.after.as_str())?;
    table.set("commit", build.after.as_str())?;
    table.set("ref", build.git_ref.as_str())?;
    table.set("source_repo", build.fork.as_str())?;
    table.set("source", build.source.as_str())?;
    table.set("target", build.target.as_str())?;
    table.set("branch", build.target.as_str())?;
    table.set("author_login", build.author_login.as_str())?;
    table.set("author_name", build.author_name.as_str())?;
    table.set("author_email", build.author_email.as_str())?;
    table.set("author_avatar", build.author_avatar.as_str())?;
    table.set("sender", build.sender.as_str())?;
    table.set("debug", build.debug)?;

    let params = lua.create_table()?;
    for (key, value) in &build.params {
        params.set(key.as_str(), value.as_str())?;
    }
    table.set("params", params)?;

    Ok(table)
}

fn object_to_lua(
    lua: &Lua,
    object: &serde_json::Map<String, JsonValue>,
    path: &str,
) -> Result<Table> {
    let table = lua.create_table()?;
    for (key, value) in object {
        let value = json_to_lua(lua, value, &format!("{}.{}", path, key))?;
        table.raw_set(key.as_str(), value)?;
    }
    Ok(table)
}

/// Translate a host value into a script value.
///
/// Null becomes `nil`, except inside arrays where it becomes the `null`
/// sentinel so that element positions are preserved.
pub fn json_to_lua(lua: &Lua, value: &JsonValue, path: &str) -> Result<Value> {
    let value = match value {
        JsonValue::Null => Value::Nil,
        JsonValue::Bool(b) => Value::Boolean(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if n.is_u64() {
                return Err(ConvertError::argument(
                    path,
                    format!("integer {} does not fit in 64-bit signed range", n),
                ));
            } else {
                match n.as_f64() {
                    Some(f) => Value::Number(f),
                    None => return Err(ConvertError::argument(path, "unrepresentable number")),
                }
            }
        }
        JsonValue::String(s) => Value::String(lua.create_string(s)?),
        JsonValue::Array(items) => {
            let table = lua.create_table_with_capacity(items.len(), 0)?;
            for (idx, item) in items.iter().enumerate() {
                let item = match item {
                    JsonValue::Null => Value::NULL,
                    other => json_to_lua(lua, other, &format!("{}[{}]", path, idx))?,
                };
                table.raw_set(idx + 1, item)?;
            }
            Value::Table(table)
        }
        JsonValue::Object(object) => Value::Table(object_to_lua(lua, object, path)?),
    };
    Ok(value)
}
