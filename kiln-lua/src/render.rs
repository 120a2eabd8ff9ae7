//! Canonical serializer
//!
//! Renders the value returned by `main` into the multi-document text stream
//! handed to the pipeline parser:
//! - a sequence table becomes one document per element, each introduced by
//!   a `---` line and followed by an empty line
//! - any other table becomes a single document without separator
//!
//! Lua tables are first turned into YAML values, then emitted block style by
//! `serde_yaml`, which owns scalar quoting. Lua does not keep the insertion
//! order of table keys, so mapping keys are sorted: integers numerically,
//! then floats, then booleans, then strings by their bytes. Keys keep their
//! type, so `[true]` and `[1.5]` stay a boolean and a number.

use mlua::{Table, Value};
use serde_yaml::{Mapping, Value as YamlValue};
use std::cmp::Ordering;
use std::ffi::c_void;
use std::io::{self, Write};
use tracing::debug;

use crate::error::{ConvertError, Result};

/// Maximum size of a generated configuration, in bytes
pub const MAX_ARTIFACT_SIZE: usize = 1_000_000;

/// Maximum nesting depth of a rendered value
pub const MAX_DEPTH: usize = 256;

const SEPARATOR: &str = "---\n";
const NEWLINE: &str = "\n";

/// Render the value returned by `main` into a configuration artifact.
///
/// Returns `Ok(None)` when the artifact would be larger than
/// [`MAX_ARTIFACT_SIZE`]; the overflow is not reported as an error.
///
/// # Errors
/// - `ConvertError::MainReturn` if `value` is not a table
/// - `ConvertError::Unsupported` if the value holds something that cannot be
///   rendered (functions, userdata, cycles, table keys)
pub fn render_artifact(value: &Value) -> Result<Option<String>> {
    match render_documents(value, MAX_ARTIFACT_SIZE) {
        Ok(artifact) => Ok(Some(artifact)),
        Err(ConvertError::MaximumSize) => {
            debug!(limit = MAX_ARTIFACT_SIZE, "configuration exceeds maximum size, dropped");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Render the value returned by `main`, failing with
/// `ConvertError::MaximumSize` as soon as the output would exceed `limit`.
pub(crate) fn render_documents(value: &Value, limit: usize) -> Result<String> {
    let Value::Table(_) = value else {
        return Err(ConvertError::MainReturn);
    };

    let mut out = LimitedBuffer::new(limit);
    match DocumentBuilder::new().value(value, "")? {
        YamlValue::Sequence(documents) => {
            for document in &documents {
                out.push_str(SEPARATOR)?;
                out.emit(document)?;
                out.push_str(NEWLINE)?;
            }
        }
        document => out.emit(&document)?,
    }
    out.into_string()
}

/// Byte buffer refusing to grow past a limit
///
/// Writes that would cross the limit fail and leave the buffer unchanged, so
/// the emitter stops at the ceiling instead of producing the whole stream.
#[derive(Debug)]
struct LimitedBuffer {
    buf: Vec<u8>,
    limit: usize,
    overflowed: bool,
}

impl LimitedBuffer {
    fn new(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit,
            overflowed: false,
        }
    }

    fn push_str(&mut self, s: &str) -> Result<()> {
        self.write_all(s.as_bytes())
            .map_err(|_| ConvertError::MaximumSize)
    }

    /// Emit one YAML document
    fn emit(&mut self, document: &YamlValue) -> Result<()> {
        match serde_yaml::to_writer(&mut *self, document) {
            Ok(()) => Ok(()),
            Err(_) if self.overflowed => Err(ConvertError::MaximumSize),
            Err(err) => Err(err.into()),
        }
    }

    fn into_string(self) -> Result<String> {
        String::from_utf8(self.buf).map_err(|err| ConvertError::unsupported("", err.to_string()))
    }
}

impl Write for LimitedBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.buf.len() + data.len() > self.limit {
            self.overflowed = true;
            return Err(io::Error::other("maximum file size exceeded"));
        }
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Mapping key, keeping its Lua type
#[derive(Debug, Clone, PartialEq)]
enum Key {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
}

impl Key {
    fn rank(&self) -> u8 {
        match self {
            Key::Integer(_) => 0,
            Key::Float(_) => 1,
            Key::Boolean(_) => 2,
            Key::Text(_) => 3,
        }
    }

    fn order(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Integer(a), Key::Integer(b)) => a.cmp(b),
            (Key::Float(a), Key::Float(b)) => a.total_cmp(b),
            (Key::Boolean(a), Key::Boolean(b)) => a.cmp(b),
            (Key::Text(a), Key::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn to_yaml(&self) -> YamlValue {
        match self {
            Key::Integer(i) => YamlValue::Number((*i).into()),
            Key::Float(n) => YamlValue::Number((*n).into()),
            Key::Boolean(b) => YamlValue::Bool(*b),
            Key::Text(s) => YamlValue::String(s.clone()),
        }
    }

    fn child_path(&self, path: &str) -> String {
        match self {
            Key::Integer(i) => format!("{}[{}]", path, i),
            Key::Float(n) => format!("{}[{}]", path, n),
            Key::Boolean(b) => format!("{}[{}]", path, b),
            Key::Text(s) if path.is_empty() => s.clone(),
            Key::Text(s) => format!("{}.{}", path, s),
        }
    }
}

/// What a table is rendered as
enum Shape {
    /// Keys are exactly `1..n`; also the empty table
    Sequence(Vec<Value>),
    Mapping(Vec<(Key, Value)>),
}

fn classify(table: &Table, path: &str) -> Result<Shape> {
    let mut entries = Vec::new();
    for pair in table.pairs::<Value, Value>() {
        entries.push(pair?);
    }

    let count = entries.len();
    let is_sequence = entries
        .iter()
        .all(|(key, _)| matches!(key, Value::Integer(i) if *i >= 1 && (*i as u64) <= count as u64));

    if is_sequence {
        let mut items: Vec<(i64, Value)> = entries
            .into_iter()
            .filter_map(|(key, value)| match key {
                Value::Integer(i) => Some((i, value)),
                _ => None,
            })
            .collect();
        items.sort_by_key(|(i, _)| *i);
        return Ok(Shape::Sequence(items.into_iter().map(|(_, value)| value).collect()));
    }

    let mut mapping = Vec::with_capacity(count);
    for (key, value) in entries {
        mapping.push((mapping_key(&key, path)?, value));
    }
    mapping.sort_by(|(a, _), (b, _)| a.order(b));
    Ok(Shape::Mapping(mapping))
}

fn mapping_key(key: &Value, path: &str) -> Result<Key> {
    match key {
        Value::Integer(i) => Ok(Key::Integer(*i)),
        Value::Number(n) => Ok(Key::Float(*n)),
        Value::Boolean(b) => Ok(Key::Boolean(*b)),
        Value::String(s) => {
            let s = s
                .to_str()
                .map_err(|_| ConvertError::unsupported(path, "key is not valid UTF-8"))?;
            Ok(Key::Text(s.to_string()))
        }
        other => Err(ConvertError::unsupported(
            path,
            format!("keys must be strings, numbers or booleans, found {}", other.type_name()),
        )),
    }
}

/// Walks script tables into YAML values
struct DocumentBuilder {
    /// Tables on the current path, for cycle detection
    visiting: Vec<*const c_void>,
}

impl DocumentBuilder {
    fn new() -> Self {
        Self {
            visiting: Vec::new(),
        }
    }

    fn value(&mut self, value: &Value, path: &str) -> Result<YamlValue> {
        let Value::Table(table) = value else {
            return scalar(value, path);
        };

        let pointer = table.to_pointer();
        if self.visiting.contains(&pointer) {
            return Err(ConvertError::unsupported(path, "table contains itself"));
        }
        if self.visiting.len() >= MAX_DEPTH {
            return Err(ConvertError::unsupported(
                path,
                format!("nesting deeper than {} levels", MAX_DEPTH),
            ));
        }

        self.visiting.push(pointer);
        let result = self.table(table, path);
        self.visiting.pop();
        result
    }

    fn table(&mut self, table: &Table, path: &str) -> Result<YamlValue> {
        match classify(table, path)? {
            Shape::Sequence(items) => {
                let mut sequence = Vec::with_capacity(items.len());
                for (idx, item) in items.iter().enumerate() {
                    sequence.push(self.value(item, &format!("{}[{}]", path, idx + 1))?);
                }
                Ok(YamlValue::Sequence(sequence))
            }
            Shape::Mapping(entries) => {
                let mut mapping = Mapping::with_capacity(entries.len());
                for (key, value) in &entries {
                    let child = key.child_path(path);
                    mapping.insert(key.to_yaml(), self.value(value, &child)?);
                }
                Ok(YamlValue::Mapping(mapping))
            }
        }
    }
}

fn scalar(value: &Value, path: &str) -> Result<YamlValue> {
    match value {
        Value::Nil => Ok(YamlValue::Null),
        Value::LightUserData(ud) if ud.0.is_null() => Ok(YamlValue::Null),
        Value::Boolean(b) => Ok(YamlValue::Bool(*b)),
        Value::Integer(i) => Ok(YamlValue::Number((*i).into())),
        Value::Number(n) => Ok(YamlValue::Number((*n).into())),
        Value::String(s) => {
            let s = s
                .to_str()
                .map_err(|_| ConvertError::unsupported(path, "string is not valid UTF-8"))?;
            Ok(YamlValue::String(s.to_string()))
        }
        other => Err(ConvertError::unsupported(
            path,
            format!("cannot render a {}", other.type_name()),
        )),
    }
}
