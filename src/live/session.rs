use super::lifecycle::{LifecycleController, LifecycleEvent, Phase};
use crate::api::ApiError;
use crate::mesh::{MediaEngine, MediaError, PeerMesh};
use crate::model::{HostRole, Session, SessionStatus};
use crate::service::{JoinError, SessionService};
use crate::signaling::{Signaling, TopicEvent};
use crate::store::SessionStore;
use crate::transcribe::{SpeechRecognizer, TranscriptionEngine};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum LiveError {
    #[error("session not found")]
    SessionNotFound,

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Join(#[from] JoinError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("signaling failure: {0}")]
    Signaling(String),

    #[error("only the host can do that")]
    NotHost,
}

#[derive(Debug, Clone)]
pub struct LiveOptions {
    pub session_id: String,
    pub email: String,
    pub display_name: String,
    /// Initial recognition locale, e.g. "en-US".
    pub locale: String,
}

/// Result of entering the live view.
pub enum Admission {
    Connected(LiveSession),
    /// Held behind the waiting-room gate; poll with `await_admission`
    /// and join again once admitted.
    Waiting,
}

/// Everything the background loops need, and the one teardown sequence
/// every exit path runs through.
struct Shared {
    session_id: String,
    email: String,
    media_active: bool,
    service: Arc<SessionService>,
    store: Arc<SessionStore>,
    media: Arc<dyn MediaEngine>,
    mesh: Arc<PeerMesh>,
    transcription: Arc<TranscriptionEngine>,
    running: AtomicBool,
    /// Latches the first LIVE transition so the recognizer starts once,
    /// whether the transition arrives over the topic or from our own
    /// start/lock call.
    seen_live: AtomicBool,
    stop_tx: watch::Sender<bool>,
    ended_tx: watch::Sender<bool>,
    phase_tx: watch::Sender<Phase>,
}

impl Shared {
    /// The single teardown sequence: stop speech capture, tell the peers
    /// we are leaving, close every peer connection, release local media,
    /// and stop the signal and timer loops. Idempotent — the first caller
    /// wins, every later exit path becomes a no-op.
    async fn shutdown(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.transcription.stop().await;

            if self.media_active {
                self.mesh.announce_leave().await;
            }
            self.mesh.shutdown().await;
            self.media.close_local_media().await;

            let _ = self.stop_tx.send(true);
            let _ = self.ended_tx.send(true);

            info!("Live session {} torn down", self.session_id);
        }
    }

    /// React to the session's status, wherever the update came from.
    /// Returns true when the session completed and the view must go down.
    async fn handle_status(&self, status: SessionStatus) -> bool {
        match status {
            SessionStatus::Live => {
                if !self.seen_live.swap(true, Ordering::SeqCst) {
                    info!("Session {} is live", self.session_id);
                    if self.media_active {
                        self.transcription.start().await;
                    }
                }
                false
            }
            SessionStatus::Completed => {
                info!("Session {} ended by the host", self.session_id);
                self.shutdown().await;
                true
            }
            SessionStatus::Scheduled => false,
        }
    }

    /// Apply an authoritative session object pushed over the topic.
    /// Returns true when the session completed and the view must go down.
    async fn on_session_update(&self, session: Session) -> bool {
        if session.id != self.session_id {
            return false;
        }

        self.store.replace(session.clone()).await;
        self.handle_status(session.status).await
    }
}

/// A connected live session view.
///
/// Owns the signaling channel, the peer mesh, the transcription engine
/// and the lifecycle timer for one session. Dropping it without calling
/// `leave` leaks the open connections — the UI must route every exit
/// through `leave` or `end`.
pub struct LiveSession {
    shared: Arc<Shared>,
    is_host: bool,
    phase_rx: watch::Receiver<Phase>,
    ended_rx: watch::Receiver<bool>,
    signal_task: Mutex<Option<JoinHandle<()>>>,
    timer_task: Mutex<Option<JoinHandle<()>>>,
}

impl LiveSession {
    /// Enter the live view: validate the session, auto-join unless
    /// already a member, acquire local media, open signaling, announce
    /// ourselves to the mesh and start the background loops.
    pub async fn join(
        opts: LiveOptions,
        service: Arc<SessionService>,
        signaling: Arc<dyn Signaling>,
        media: Arc<dyn MediaEngine>,
        recognizer: Arc<dyn SpeechRecognizer>,
    ) -> Result<Admission, LiveError> {
        let store = service.store();

        let session = match service.refresh_session(&opts.session_id).await {
            Ok(session) => session,
            Err(ApiError::NotFound) => return Err(LiveError::SessionNotFound),
            Err(e) => return Err(LiveError::Api(e)),
        };

        if session.participant(&opts.email).is_none() {
            match service
                .join_session(&opts.session_id, &opts.display_name, &opts.email)
                .await
            {
                Ok(crate::service::JoinOutcome::Waiting) => return Ok(Admission::Waiting),
                Ok(_) => {}
                Err(e) => return Err(LiveError::Join(e)),
            }
        }

        let session = store.get(&opts.session_id).await.unwrap_or(session);
        let is_host = session.is_host(&opts.email);

        // An observer host is tracked for identity but never enters the
        // media mesh.
        let media_active = !(is_host && session.host_role == HostRole::Observer);

        if media_active {
            media.open_local_media().await?;
        }

        let channel = signaling
            .open(&opts.session_id)
            .await
            .map_err(|e| LiveError::Signaling(e.to_string()))?;
        let events = channel
            .subscribe()
            .await
            .map_err(|e| LiveError::Signaling(e.to_string()))?;

        let mesh = Arc::new(PeerMesh::new(
            &opts.session_id,
            &opts.email,
            media.clone(),
            channel.clone(),
        ));

        let transcription = Arc::new(TranscriptionEngine::new(
            &opts.session_id,
            &opts.email,
            store.clone(),
            channel.clone(),
            recognizer,
            &opts.locale,
        ));

        let (stop_tx, stop_rx) = watch::channel(false);
        let (ended_tx, ended_rx) = watch::channel(false);
        let (phase_tx, phase_rx) = watch::channel(Phase::NotStarted);

        let shared = Arc::new(Shared {
            session_id: opts.session_id.clone(),
            email: opts.email.clone(),
            media_active,
            service,
            store: store.clone(),
            media,
            mesh,
            transcription,
            running: AtomicBool::new(true),
            seen_live: AtomicBool::new(false),
            stop_tx,
            ended_tx,
            phase_tx,
        });

        let signal_task = tokio::spawn(signal_loop(shared.clone(), events, stop_rx.clone()));
        let timer_task = tokio::spawn(timer_loop(shared.clone(), stop_rx));

        if media_active {
            shared.mesh.announce_join().await;
        }
        shared.handle_status(session.status).await;

        store.set_current(&opts.session_id).await;

        Ok(Admission::Connected(Self {
            shared,
            is_host,
            phase_rx,
            ended_rx,
            signal_task: Mutex::new(Some(signal_task)),
            timer_task: Mutex::new(Some(timer_task)),
        }))
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn phase(&self) -> watch::Receiver<Phase> {
        self.phase_rx.clone()
    }

    /// Becomes true once the view is torn down, whatever the exit path.
    pub fn ended(&self) -> watch::Receiver<bool> {
        self.ended_rx.clone()
    }

    pub async fn session(&self) -> Option<Session> {
        self.shared.store.get(&self.shared.session_id).await
    }

    pub fn transcription(&self) -> &TranscriptionEngine {
        &self.shared.transcription
    }

    pub fn mesh(&self) -> &PeerMesh {
        &self.shared.mesh
    }

    /// Host action: lock the session against new admissions, starting
    /// the countdown if it has not started yet.
    pub async fn lock(&self) -> Result<Session, LiveError> {
        if !self.is_host {
            return Err(LiveError::NotHost);
        }
        let locked = self
            .shared
            .service
            .lock_session(&self.shared.session_id)
            .await?;
        self.shared.handle_status(locked.status).await;
        Ok(locked)
    }

    /// Host action: admit a held participant from the waiting list.
    pub async fn admit(&self, participant_id: &str) -> Result<Session, LiveError> {
        if !self.is_host {
            return Err(LiveError::NotHost);
        }
        Ok(self
            .shared
            .service
            .admit_from_waiting(&self.shared.session_id, participant_id)
            .await?)
    }

    /// Leave the session without ending it for the others.
    pub async fn leave(&self) {
        self.shared.shutdown().await;
        self.join_tasks().await;
    }

    /// Host action: end the session for everyone. Submits the transcript,
    /// then runs the same teardown as `leave`.
    pub async fn end(&self) -> Result<Session, LiveError> {
        if !self.is_host {
            return Err(LiveError::NotHost);
        }

        let ended = self
            .shared
            .service
            .end_session(&self.shared.session_id)
            .await?;
        self.shared.shutdown().await;
        self.join_tasks().await;
        Ok(ended)
    }

    async fn join_tasks(&self) {
        for slot in [&self.signal_task, &self.timer_task] {
            let task = slot.lock().await.take();
            if let Some(task) = task {
                if let Err(e) = task.await {
                    if !e.is_cancelled() {
                        error!("Live session task panicked: {}", e);
                    }
                }
            }
        }
    }
}

/// Consumes the session topic: authoritative session updates, peer
/// signaling, and transcript fragments from the other participants.
async fn signal_loop(
    shared: Arc<Shared>,
    mut events: mpsc::Receiver<TopicEvent>,
    mut stop: watch::Receiver<bool>,
) {
    info!("Signal loop started for session {}", shared.session_id);

    loop {
        tokio::select! {
            _ = stop.changed() => {
                if *stop.borrow() {
                    break;
                }
            }
            event = events.recv() => {
                let Some(event) = event else {
                    warn!("Signaling channel closed for session {}", shared.session_id);
                    break;
                };

                match event {
                    TopicEvent::Session(session) => {
                        if shared.on_session_update(*session).await {
                            break;
                        }
                    }
                    TopicEvent::Signal(signal) => {
                        if signal.sender == shared.email
                            || signal.session_id != shared.session_id
                        {
                            continue;
                        }
                        if shared.media_active {
                            shared.mesh.handle_signal(&signal).await;
                        }
                    }
                    TopicEvent::Transcript(fragment) => {
                        if fragment.sender == shared.email
                            || fragment.session_id != shared.session_id
                        {
                            continue;
                        }
                        shared
                            .store
                            .append_transcript(&shared.session_id, &fragment.text)
                            .await;
                    }
                }
            }
        }
    }

    info!("Signal loop stopped for session {}", shared.session_id);
}

/// One-second lifecycle tick: countdown, conclusion phase, and the
/// host-side auto-end inside the overtime sanity window.
async fn timer_loop(shared: Arc<Shared>, mut stop: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    let mut controller = LifecycleController::new();

    loop {
        tokio::select! {
            _ = stop.changed() => {
                if *stop.borrow() {
                    break;
                }
            }
            _ = interval.tick() => {
                let Some(session) = shared.store.get(&shared.session_id).await else {
                    continue;
                };

                let (phase, event) = controller.tick(&session, chrono::Utc::now());
                if *shared.phase_tx.borrow() != phase {
                    let _ = shared.phase_tx.send(phase);
                }

                match event {
                    LifecycleEvent::ConclusionStarted => {
                        info!(
                            "Session {} entered its conclusion phase",
                            shared.session_id
                        );
                    }
                    LifecycleEvent::AutoEnd => {
                        if session.is_host(&shared.email) {
                            warn!(
                                "Session {} exceeded its time budget, ending it",
                                shared.session_id
                            );
                            if let Err(e) =
                                shared.service.end_session(&shared.session_id).await
                            {
                                error!("Auto-end failed: {}", e);
                            }
                            shared.shutdown().await;
                            break;
                        }
                    }
                    LifecycleEvent::None => {}
                }
            }
        }
    }
}
