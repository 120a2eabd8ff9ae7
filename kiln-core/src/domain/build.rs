//! Build domain types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Event that triggered a build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildEvent {
    #[default]
    Push,
    PullRequest,
    Tag,
    Promote,
    Rollback,
    Cron,
    Custom,
}

impl BuildEvent {
    /// Returns the wire name of the event, as seen by scripts
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildEvent::Push => "push",
            BuildEvent::PullRequest => "pull_request",
            BuildEvent::Tag => "tag",
            BuildEvent::Promote => "promote",
            BuildEvent::Rollback => "rollback",
            BuildEvent::Cron => "cron",
            BuildEvent::Custom => "custom",
        }
    }
}

/// Build descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Build {
    pub number: i64,
    pub event: BuildEvent,
    pub action: String,
    pub cron: String,
    /// Target environment of a promotion or rollback
    pub deploy_to: String,
    pub link: String,
    pub title: String,
    pub message: String,
    pub before: String,
    /// Commit sha the build runs against
    pub after: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// Source repository slug of a pull request from a fork
    pub fork: String,
    pub source: String,
    pub target: String,
    pub author_login: String,
    pub author_name: String,
    pub author_email: String,
    pub author_avatar: String,
    pub sender: String,
    pub debug: bool,
    pub params: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(BuildEvent::PullRequest.as_str(), "pull_request");
        let event: BuildEvent = serde_json::from_str(r#""pull_request""#).unwrap();
        assert_eq!(event, BuildEvent::PullRequest);
    }

    #[test]
    fn test_ref_field_name() {
        let build: Build = serde_json::from_str(r#"{"ref": "refs/heads/main"}"#).unwrap();
        assert_eq!(build.git_ref, "refs/heads/main");
        assert_eq!(build.event, BuildEvent::Push);
    }
}
