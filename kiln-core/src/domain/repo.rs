//! Repository domain types

use serde::{Deserialize, Serialize};

/// Repository descriptor
///
/// `config` is the path of the configuration file inside the repository. It
/// doubles as the script file name when the configuration is a script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repository {
    pub uid: String,
    pub namespace: String,
    pub name: String,
    pub slug: String,
    pub http_url: String,
    pub ssh_url: String,
    pub link: String,
    /// Default branch
    pub branch: String,
    pub private: bool,
    pub visibility: String,
    pub active: bool,
    pub trusted: bool,
    pub protected: bool,
    pub ignore_forks: bool,
    pub ignore_pulls: bool,
    pub config: String,
    /// Build timeout in minutes
    pub timeout: i64,
}

impl Repository {
    /// Creates a repository with the given namespace and name.
    ///
    /// The slug is derived as `namespace/name`.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let name = name.into();
        Self {
            slug: format!("{}/{}", namespace, name),
            namespace,
            name,
            branch: "main".to_string(),
            visibility: "public".to_string(),
            active: true,
            timeout: 60,
            ..Default::default()
        }
    }

    /// Sets the configuration file path
    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.config = config.into();
        self
    }
}
