//! Converter configuration
//!
//! Decides whether script conversion is enabled and which configuration
//! paths are treated as scripts. The step and size ceilings are fixed and
//! deliberately not part of the configuration.

use serde::{Deserialize, Serialize};

/// Extensions recognised as configuration scripts by default
pub const DEFAULT_EXTENSIONS: &[&str] = &[".lua", ".kiln", ".script"];

/// Converter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Whether scripts are converted at all
    pub enabled: bool,

    /// File extensions (with leading dot) that mark a configuration as a script
    pub extensions: Vec<String>,
}

impl ConverterConfig {
    /// Creates a configuration with the default extensions
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - KILN_SCRIPT_ENABLED (optional, true/false, default: true)
    /// - KILN_SCRIPT_EXTENSIONS (optional, comma-separated, default: .lua,.kiln,.script)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Creates configuration from a variable lookup
    pub fn from_vars<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(enabled) = lookup("KILN_SCRIPT_ENABLED") {
            config.enabled = parse_bool(&enabled).ok_or_else(|| {
                anyhow::anyhow!("KILN_SCRIPT_ENABLED must be true or false, got '{}'", enabled)
            })?;
        }

        if let Some(extensions) = lookup("KILN_SCRIPT_EXTENSIONS") {
            config.extensions = extensions
                .split(',')
                .map(str::trim)
                .filter(|ext| !ext.is_empty())
                .map(str::to_string)
                .collect();
        }

        config.validate()?;
        Ok(config)
    }

    /// Adds a script extension
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extensions.push(extension.into());
        self
    }

    /// Returns true if `path` names a configuration script
    pub fn is_script(&self, path: &str) -> bool {
        self.extensions.iter().any(|ext| path.ends_with(ext.as_str()))
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.extensions.is_empty() {
            anyhow::bail!("at least one script extension is required");
        }

        for ext in &self.extensions {
            if !ext.starts_with('.') || ext.len() < 2 {
                anyhow::bail!("script extension '{}' must start with a dot", ext);
            }
        }

        Ok(())
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self::new(true)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
