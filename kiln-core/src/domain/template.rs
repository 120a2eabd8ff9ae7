//! Template domain types

use serde::{Deserialize, Serialize};

/// Free-form variables handed to a template, exposed to scripts as `input`
pub type TemplateData = serde_json::Map<String, serde_json::Value>;

/// A named, reusable configuration script
///
/// When a template is supplied its `data` replaces the repository's inline
/// configuration and its `name` is used as the script file name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub data: String,
}

impl Template {
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}
