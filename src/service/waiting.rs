use super::session::SessionService;
use crate::api::ApiError;
use crate::model::SessionStatus;
use std::time::Duration;
use tracing::info;

/// How often a held participant polls for admission.
pub const ADMISSION_POLL_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("session ended before admission")]
    SessionEnded,

    #[error("removed from the waiting list")]
    Removed,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Poll until the host admits this identity onto the participant list.
///
/// Resolves once the identity appears among the participants; ends with
/// an error when the session completes first or the identity is no longer
/// held. The caller owns cancellation — dropping the future stops the
/// poll, which is how view teardown clears this timer.
pub async fn await_admission(
    service: &SessionService,
    session_id: &str,
    email: &str,
) -> Result<(), WaitError> {
    let mut interval = tokio::time::interval(ADMISSION_POLL_INTERVAL);

    loop {
        interval.tick().await;

        let session = service.refresh_session(session_id).await?;

        if session.participant(email).is_some() {
            info!("{} admitted to session {}", email, session_id);
            return Ok(());
        }
        if session.status == SessionStatus::Completed {
            return Err(WaitError::SessionEnded);
        }
        if !session.in_waiting_list(email) {
            return Err(WaitError::Removed);
        }
    }
}
