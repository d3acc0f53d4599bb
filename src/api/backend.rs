use crate::model::{Participant, Session};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("session not found")]
    NotFound,

    #[error("request failed: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Protocol(String),
}

/// The session backend. One implementation talks HTTP to the real
/// service; `MemorySessionApi` reproduces its semantics in-process for
/// tests and backend-less embedding.
#[async_trait::async_trait]
pub trait SessionApi: Send + Sync {
    async fn list_sessions(&self) -> Result<Vec<Session>, ApiError>;

    async fn fetch_session(&self, id: &str) -> Result<Session, ApiError>;

    async fn fetch_by_code(&self, code: &str) -> Result<Session, ApiError>;

    /// Create a session; the server assigns the id.
    async fn create_session(&self, session: &Session) -> Result<Session, ApiError>;

    /// Join. The server decides waiting-list vs participant placement
    /// and deduplicates by email across both lists.
    async fn join_session(
        &self,
        id: &str,
        participant: &Participant,
    ) -> Result<Session, ApiError>;

    async fn start_session(&self, id: &str) -> Result<Session, ApiError>;

    async fn end_session(&self, id: &str, transcript: &[String]) -> Result<Session, ApiError>;

    /// Move a held participant (by id or email) from the waiting list to
    /// the participant list.
    async fn admit_participant(
        &self,
        id: &str,
        participant_id: &str,
    ) -> Result<Session, ApiError>;
}
