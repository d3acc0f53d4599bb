use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A session member, keyed by email within a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Client-generated at join time
    pub id: String,

    /// Display name shown on video tiles and transcript lines
    pub name: String,

    /// Identity key; at most one active entry per (session, email)
    pub email: String,

    pub is_host: bool,

    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,

    /// Accumulated speaking time in seconds (maintained server-side)
    #[serde(default)]
    pub speaking_time: i64,
}

impl Participant {
    /// Build a fresh participant entry for a join call.
    pub fn new(name: impl Into<String>, email: impl Into<String>, is_host: bool) -> Self {
        Self {
            id: format!("participant-{}", uuid::Uuid::new_v4()),
            name: name.into(),
            email: email.into(),
            is_host,
            joined_at: Some(Utc::now()),
            speaking_time: 0,
        }
    }
}
