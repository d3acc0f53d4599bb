use crate::api::{ApiError, SessionApi};
use crate::model::{generate_join_code, NewSession, Participant, Session, SessionStatus};
use crate::store::{LocalCache, ScheduledEntry, SessionStore, TranscriptBackup};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Attempts before accepting a possibly colliding join code.
const CODE_ATTEMPTS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    #[error("session not found")]
    NotFound,

    #[error("session is locked")]
    Locked,

    #[error("session is full")]
    Full,

    #[error("session already completed")]
    Completed,

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// On the participant list.
    Joined,
    /// Was already on the participant list; nothing changed.
    AlreadyJoined,
    /// Held on the waiting list until the host admits.
    Waiting,
}

/// The session-state service: all session mutations flow through here,
/// and every server response replaces the cached session verbatim.
pub struct SessionService {
    api: Arc<dyn SessionApi>,
    store: Arc<SessionStore>,
    cache: Option<LocalCache>,
}

impl SessionService {
    pub fn new(api: Arc<dyn SessionApi>, store: Arc<SessionStore>) -> Self {
        Self {
            api,
            store,
            cache: None,
        }
    }

    /// Persist scheduled sessions and transcript backups to the cache.
    pub fn with_cache(mut self, cache: LocalCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn store(&self) -> Arc<SessionStore> {
        self.store.clone()
    }

    /// Poll the full session list and refresh the cache.
    pub async fn refresh_sessions(&self) -> Result<(), ApiError> {
        let sessions = self.api.list_sessions().await?;
        self.store.replace_all(sessions).await;
        Ok(())
    }

    /// Fetch one session and refresh the cache, returning the freshest
    /// copy the store accepted.
    pub async fn refresh_session(&self, id: &str) -> Result<Session, ApiError> {
        let session = self.api.fetch_session(id).await?;
        self.store.replace(session.clone()).await;
        Ok(self.store.get(id).await.unwrap_or(session))
    }

    /// Create a session and, when a host name is given, join the host to
    /// it immediately.
    pub async fn create_session(
        &self,
        draft: NewSession,
        host_name: Option<&str>,
    ) -> Result<Session, ApiError> {
        let code = self.unique_code().await;

        let session = Session {
            id: String::new(),
            topic: draft.topic,
            description: draft.description,
            visibility: draft.visibility,
            code,
            host_id: None,
            host_email: draft.host_email.clone(),
            host_role: draft.host_role,
            time_limit: Some(draft.time_limit),
            max_participants: draft.max_participants,
            has_waiting_room: draft.has_waiting_room,
            is_locked: false,
            status: SessionStatus::Scheduled,
            start_time: None,
            end_time: None,
            participants: Vec::new(),
            waiting_list: Vec::new(),
            transcript: Vec::new(),
            participants_count: None,
        };

        let mut created = self.api.create_session(&session).await?;
        self.store.replace(created.clone()).await;
        info!("Created session {} with code {}", created.id, created.code);

        if let Some(cache) = &self.cache {
            let entry = ScheduledEntry {
                session_id: created.id.clone(),
                topic: created.topic.clone(),
                code: created.code.clone(),
                time_limit: created.time_limit_minutes(),
                created_at: Utc::now(),
            };
            if let Err(e) = cache.remember_scheduled(entry) {
                warn!("Failed to record scheduled session: {}", e);
            }
        }

        if let Some(name) = host_name {
            let host = Participant::new(name, &draft.host_email, true);
            created = self.api.join_session(&created.id, &host).await?;
            self.store.replace(created.clone()).await;
            self.store.set_current(&created.id).await;
        }

        Ok(created)
    }

    /// Draw join codes until one is unused, within a bounded number of
    /// attempts; the last draw is kept if every attempt collides.
    async fn unique_code(&self) -> String {
        let mut code = generate_join_code();
        for _ in 0..CODE_ATTEMPTS {
            match self.api.fetch_by_code(&code).await {
                Err(ApiError::NotFound) => return code,
                Ok(_) => {
                    code = generate_join_code();
                }
                Err(e) => {
                    warn!("Code uniqueness check failed, keeping {}: {}", code, e);
                    return code;
                }
            }
        }
        warn!("Join code {} may collide with an existing session", code);
        code
    }

    /// Join an identity to a session. The server decides whether the
    /// joiner lands on the participant list or behind the waiting-room
    /// gate; locked and full sessions reject new joiners here.
    pub async fn join_session(
        &self,
        session_id: &str,
        name: &str,
        email: &str,
    ) -> Result<JoinOutcome, JoinError> {
        let fetched = match self.api.fetch_session(session_id).await {
            Ok(session) => session,
            Err(ApiError::NotFound) => return Err(JoinError::NotFound),
            Err(e) => return Err(JoinError::Api(e)),
        };
        self.store.replace(fetched.clone()).await;
        // The store copy carries the client-local lock flag.
        let session = self.store.get(session_id).await.unwrap_or(fetched);

        if session.participant(email).is_some() {
            self.store.set_current(session_id).await;
            return Ok(JoinOutcome::AlreadyJoined);
        }
        if session.in_waiting_list(email) {
            return Ok(JoinOutcome::Waiting);
        }

        if session.status == SessionStatus::Completed {
            return Err(JoinError::Completed);
        }
        if session.is_locked {
            return Err(JoinError::Locked);
        }

        let is_host = session.is_host(email);
        if session.is_full() && !is_host {
            return Err(JoinError::Full);
        }

        let participant = Participant::new(name, email, is_host);
        let updated = self.api.join_session(session_id, &participant).await?;
        self.store.replace(updated.clone()).await;

        if updated.in_waiting_list(email) {
            info!("{} held in waiting room for session {}", email, session_id);
            Ok(JoinOutcome::Waiting)
        } else {
            self.store.set_current(session_id).await;
            Ok(JoinOutcome::Joined)
        }
    }

    /// Look a session up by its 6-digit code and join it.
    pub async fn join_by_code(
        &self,
        code: &str,
        name: &str,
        email: &str,
    ) -> Result<(String, JoinOutcome), JoinError> {
        let session = match self.api.fetch_by_code(code).await {
            Ok(session) => session,
            Err(ApiError::NotFound) => return Err(JoinError::NotFound),
            Err(e) => return Err(JoinError::Api(e)),
        };

        if session.status == SessionStatus::Completed {
            return Err(JoinError::Completed);
        }

        let outcome = self.join_session(&session.id, name, email).await?;
        Ok((session.id, outcome))
    }

    /// Lock the session against new admissions and start the countdown if
    /// it has not started. The lock flag is client-local (the API has no
    /// lock endpoint); the coupled start goes through the API.
    pub async fn lock_session(&self, session_id: &str) -> Result<Session, ApiError> {
        if self.store.get(session_id).await.is_none() {
            self.refresh_session(session_id).await?;
        }

        let locked = self
            .store
            .set_locked(session_id)
            .await
            .ok_or(ApiError::NotFound)?;

        if locked.start_time.is_none() || locked.status != SessionStatus::Live {
            info!("Locking session {} and starting it", session_id);
            self.start_session(session_id).await?;
        }

        self.store.get(session_id).await.ok_or(ApiError::NotFound)
    }

    pub async fn start_session(&self, session_id: &str) -> Result<Session, ApiError> {
        let updated = self.api.start_session(session_id).await?;
        self.store.replace(updated.clone()).await;
        Ok(updated)
    }

    /// End the session: back the transcript up locally, submit it with
    /// the end call, and replace the cached session with the completed
    /// state.
    pub async fn end_session(&self, session_id: &str) -> Result<Session, ApiError> {
        let transcript = self
            .store
            .get(session_id)
            .await
            .map(|s| s.transcript)
            .unwrap_or_default();

        if let Some(cache) = &self.cache {
            if let Some(session) = self.store.get(session_id).await {
                let backup = TranscriptBackup {
                    session_id: session.id.clone(),
                    topic: session.topic.clone(),
                    transcript: transcript.clone(),
                    saved_at: Utc::now(),
                };
                if let Err(e) = cache.record_transcript(backup) {
                    warn!("Failed to back transcript up: {}", e);
                }
            }
        }

        let updated = self.api.end_session(session_id, &transcript).await?;
        self.store.replace(updated.clone()).await;
        self.store.clear_current().await;
        Ok(updated)
    }

    pub async fn admit_from_waiting(
        &self,
        session_id: &str,
        participant_id: &str,
    ) -> Result<Session, ApiError> {
        let updated = self.api.admit_participant(session_id, participant_id).await?;
        self.store.replace(updated.clone()).await;
        Ok(updated)
    }

    /// Optimistic local append of a transcript line.
    pub async fn add_to_transcript(&self, session_id: &str, line: &str) {
        self.store.append_transcript(session_id, line).await;
    }
}
