use super::backend::{ApiError, SessionApi};
use crate::model::{Participant, Session, SessionStatus};
use crate::signaling::{LocalBroker, TopicEvent};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory session backend with the same semantics as the real service:
/// join places non-hosts behind the waiting-room gate, joins deduplicate
/// by email across both lists, start/end stamp times, and — when wired to
/// a broker — every mutation pushes the updated session to the session
/// topic like the production backend does.
#[derive(Default)]
pub struct MemorySessionApi {
    sessions: Mutex<HashMap<String, Session>>,
    broker: Option<Arc<LocalBroker>>,
}

impl MemorySessionApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push session updates through the given broker after each mutation.
    pub fn with_broker(broker: Arc<LocalBroker>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            broker: Some(broker),
        }
    }

    fn publish_update(&self, session: &Session) {
        if let Some(broker) = &self.broker {
            broker.publish(&session.id, TopicEvent::Session(Box::new(session.clone())));
        }
    }
}

#[async_trait::async_trait]
impl SessionApi for MemorySessionApi {
    async fn list_sessions(&self) -> Result<Vec<Session>, ApiError> {
        Ok(self.sessions.lock().unwrap().values().cloned().collect())
    }

    async fn fetch_session(&self, id: &str) -> Result<Session, ApiError> {
        self.sessions
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn fetch_by_code(&self, code: &str) -> Result<Session, ApiError> {
        self.sessions
            .lock()
            .unwrap()
            .values()
            .find(|s| s.code == code)
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn create_session(&self, session: &Session) -> Result<Session, ApiError> {
        let mut created = session.clone();
        if created.id.is_empty() {
            created.id = uuid::Uuid::new_v4().to_string();
        }
        created.status = SessionStatus::Scheduled;
        created.start_time = None;
        created.end_time = None;

        self.sessions
            .lock()
            .unwrap()
            .insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn join_session(
        &self,
        id: &str,
        participant: &Participant,
    ) -> Result<Session, ApiError> {
        let updated = {
            let mut sessions = self.sessions.lock().unwrap();
            let session = sessions.get_mut(id).ok_or(ApiError::NotFound)?;

            let already_joined = session.participant(&participant.email).is_some();
            let already_waiting = session.in_waiting_list(&participant.email);
            if already_joined || already_waiting {
                return Ok(session.clone());
            }

            let mut entry = participant.clone();
            entry.joined_at = Some(Utc::now());
            entry.speaking_time = 0;

            if session.has_waiting_room && !entry.is_host {
                session.waiting_list.push(entry);
            } else {
                session.participants.push(entry);
                session.participants_count = Some(session.participants.len());
            }

            session.clone()
        };

        self.publish_update(&updated);
        Ok(updated)
    }

    async fn start_session(&self, id: &str) -> Result<Session, ApiError> {
        let updated = {
            let mut sessions = self.sessions.lock().unwrap();
            let session = sessions.get_mut(id).ok_or(ApiError::NotFound)?;

            if session.status != SessionStatus::Completed {
                session.status = SessionStatus::Live;
                if session.start_time.is_none() {
                    session.start_time = Some(Utc::now());
                }
            }
            session.clone()
        };

        self.publish_update(&updated);
        Ok(updated)
    }

    async fn end_session(&self, id: &str, transcript: &[String]) -> Result<Session, ApiError> {
        let updated = {
            let mut sessions = self.sessions.lock().unwrap();
            let session = sessions.get_mut(id).ok_or(ApiError::NotFound)?;

            session.status = SessionStatus::Completed;
            session.end_time = Some(Utc::now());
            session.transcript = transcript.to_vec();
            session.clone()
        };

        self.publish_update(&updated);
        Ok(updated)
    }

    async fn admit_participant(
        &self,
        id: &str,
        participant_id: &str,
    ) -> Result<Session, ApiError> {
        let updated = {
            let mut sessions = self.sessions.lock().unwrap();
            let session = sessions.get_mut(id).ok_or(ApiError::NotFound)?;

            let position = session
                .waiting_list
                .iter()
                .position(|p| p.id == participant_id || p.email == participant_id)
                .ok_or(ApiError::NotFound)?;

            let participant = session.waiting_list.remove(position);
            session.participants.push(participant);
            session.participants_count = Some(session.participants.len());
            session.clone()
        };

        self.publish_update(&updated);
        Ok(updated)
    }
}
