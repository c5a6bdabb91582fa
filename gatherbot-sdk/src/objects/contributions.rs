//! Code-host webhook payloads.

use serde::{Deserialize, Serialize};

/// Pull-request webhook body from the code host.
///
/// Only the fields the bot reacts to; everything else in the payload is
/// ignored on ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestEvent {
    pub action: String,
    pub pull_request: PullRequest,
    #[serde(default)]
    pub repository: Option<Repository>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub merged: bool,
    #[serde(default)]
    pub user: Option<Author>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub full_name: String,
}
