use super::participant::Participant;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Session lifecycle status. Transitions are monotonic:
/// `SCHEDULED -> LIVE -> COMPLETED`, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Scheduled,
    Live,
    Completed,
}

impl SessionStatus {
    /// Position in the lifecycle, used to reject regressions.
    pub fn rank(self) -> u8 {
        match self {
            SessionStatus::Scheduled => 0,
            SessionStatus::Live => 1,
            SessionStatus::Completed => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

/// Whether the host takes part in the media mesh or only watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostRole {
    Participant,
    Observer,
}

impl Default for HostRole {
    fn default() -> Self {
        HostRole::Participant
    }
}

/// A group-discussion session as returned by the session backend.
///
/// Every mutating API call returns the full updated object; clients
/// replace their cached copy verbatim rather than merging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub topic: String,
    #[serde(default)]
    pub description: Option<String>,

    #[serde(rename = "type")]
    pub visibility: Visibility,

    /// 6-digit numeric join code, client-generated
    pub code: String,

    #[serde(default)]
    pub host_id: Option<String>,
    pub host_email: String,
    #[serde(default)]
    pub host_role: HostRole,

    /// Time budget in minutes; countdown starts at `start_time`
    #[serde(default)]
    pub time_limit: Option<i64>,

    #[serde(default)]
    pub max_participants: Option<usize>,
    #[serde(default)]
    pub has_waiting_room: bool,
    #[serde(default)]
    pub is_locked: bool,

    pub status: SessionStatus,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub waiting_list: Vec<Participant>,

    /// Append-only, speaker-tagged utterances ("Name: text")
    #[serde(default)]
    pub transcript: Vec<String>,

    #[serde(default)]
    pub participants_count: Option<usize>,
}

/// Parameters for creating a session. The service fills in the generated
/// pieces (code, empty lists, `SCHEDULED` status).
#[derive(Debug, Clone)]
pub struct NewSession {
    pub topic: String,
    pub description: Option<String>,
    pub visibility: Visibility,
    pub host_email: String,
    pub host_role: HostRole,
    pub time_limit: i64,
    pub max_participants: Option<usize>,
    pub has_waiting_room: bool,
}

impl Session {
    pub fn is_host(&self, email: &str) -> bool {
        self.host_email == email
    }

    pub fn participant(&self, email: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.email == email)
    }

    pub fn in_waiting_list(&self, email: &str) -> bool {
        self.waiting_list.iter().any(|p| p.email == email)
    }

    pub fn is_full(&self) -> bool {
        match self.max_participants {
            Some(max) => self.participants.len() >= max,
            None => false,
        }
    }

    /// Time budget in minutes, defaulting like the live view does.
    pub fn time_limit_minutes(&self) -> i64 {
        self.time_limit.unwrap_or(60)
    }

    /// Display name for an identity: participant name if joined, otherwise
    /// the local part of the email.
    pub fn display_name_for(&self, email: &str) -> String {
        match self.participant(email) {
            Some(p) => p.name.clone(),
            None => email.split('@').next().unwrap_or(email).to_string(),
        }
    }
}

/// Generate a 6-digit numeric join code. Uniqueness against live sessions
/// is checked by the caller; see `SessionService::create_session`.
pub fn generate_join_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}
