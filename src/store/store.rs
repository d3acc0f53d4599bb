use crate::model::{Session, SessionStatus};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::warn;

/// In-memory cache of session entities, keyed by session id.
///
/// Mutations come from exactly two places: responses to API calls this
/// client issued, and inbound topic events carrying authoritative server
/// state. There is no merging of concurrent edits — the server object
/// replaces the cached one verbatim. The single guard is monotonicity:
/// a stale update that would move `status` backwards is dropped.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    current: RwLock<Option<String>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached session with an authoritative copy.
    ///
    /// Two fields survive the replace: the lock flag, which is
    /// client-local (the API has no lock endpoint, so server objects
    /// never carry it), and the transcript, which accumulates locally
    /// until the completed session's server copy supersedes it.
    ///
    /// Returns false when the update was dropped for regressing status.
    pub async fn replace(&self, mut session: Session) -> bool {
        let mut sessions = self.sessions.write().await;

        if let Some(existing) = sessions.get(&session.id) {
            if existing.status.rank() > session.status.rank() {
                warn!(
                    "Dropping stale update for session {}: {:?} would regress {:?}",
                    session.id, session.status, existing.status
                );
                return false;
            }

            session.is_locked |= existing.is_locked;

            if session.status != SessionStatus::Completed
                && session.transcript.len() < existing.transcript.len()
            {
                session.transcript = existing.transcript.clone();
            }
        }

        sessions.insert(session.id.clone(), session);
        true
    }

    /// Replace the full session list (periodic poll of the session API).
    pub async fn replace_all(&self, list: Vec<Session>) {
        for session in list {
            self.replace(session).await;
        }
    }

    pub async fn get(&self, id: &str) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn all(&self) -> Vec<Session> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Append one speaker-tagged line to a session's transcript.
    pub async fn append_transcript(&self, id: &str, line: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(id) {
            Some(session) => {
                session.transcript.push(line.to_string());
                true
            }
            None => false,
        }
    }

    /// Flip the lock flag locally. The session API has no lock endpoint;
    /// the flag lives on this client and the coupled start goes through
    /// the API.
    pub async fn set_locked(&self, id: &str) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(id)?;
        session.is_locked = true;
        Some(session.clone())
    }

    pub async fn set_current(&self, id: &str) {
        *self.current.write().await = Some(id.to_string());
    }

    pub async fn clear_current(&self) {
        *self.current.write().await = None;
    }

    pub async fn current(&self) -> Option<Session> {
        let id = self.current.read().await.clone()?;
        self.get(&id).await
    }
}
