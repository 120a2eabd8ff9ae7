//! Conversion request types

use serde::{Deserialize, Serialize};

use super::build::Build;
use super::repo::Repository;

/// A configuration file, either as fetched from the repository or as produced
/// by a converter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub data: String,
}

impl ConfigFile {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }
}

/// Everything the host knows when asking for a configuration to be converted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvertRequest {
    pub repo: Repository,
    pub build: Build,
    pub config: ConfigFile,
}

impl ConvertRequest {
    pub fn new(repo: Repository, build: Build, config: ConfigFile) -> Self {
        Self {
            repo,
            build,
            config,
        }
    }
}
