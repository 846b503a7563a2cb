use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Linked accounts keyed by the external (chat platform) account id.
pub type LinkedAccounts = BTreeMap<String, LinkRecord>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRecord {
    pub minecraft_username: String,
    pub linked_at: LinkedAt,
}

/// Link timestamp. Values that are not RFC 3339 are kept verbatim so that
/// rewriting the store never loses them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkedAt {
    Parsed(DateTime<Utc>),
    Raw(String),
}

impl LinkedAt {
    pub fn display(&self) -> String {
        match self {
            LinkedAt::Parsed(time) => time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            LinkedAt::Raw(raw) => raw.clone(),
        }
    }
}

impl LinkRecord {
    pub fn new(minecraft_username: String) -> Self {
        Self {
            minecraft_username,
            linked_at: LinkedAt::Parsed(Utc::now()),
        }
    }

    pub fn display_linked_at(&self) -> String {
        self.linked_at.display()
    }
}
