//! Engagement-tracker activity entries.

use serde::{Deserialize, Serialize};

/// One engagement activity recorded against a community member.
///
/// `key` deduplicates on the tracker side: repeated completion
/// notifications for the same session produce the same key and are
/// collapsed into one entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub title: String,
    pub description: String,
    pub activity_type: String,
    pub key: String,
    #[serde(default)]
    pub link: Option<String>,
}

/// Identity of the member an activity belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberIdentity {
    pub uid: String,
    pub source: String,
}
