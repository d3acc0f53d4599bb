use super::recognizer::{RecognizerError, SpeechRecognizer};
use crate::signaling::{SignalingChannel, TranscriptFragment};
use crate::store::SessionStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Backoff before restarting a recognition stream that ended on its own.
pub const RESTART_BACKOFF: Duration = Duration::from_secs(1);

/// Whether a recognition stream is currently delivering utterances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Listening,
}

/// Drives continuous speech capture for one session view.
///
/// The "should record" intent is tracked separately from the stream's
/// running state: platform recognition streams end on their own, and only
/// the intent flag decides whether the supervising loop restarts one.
/// Intentional stops clear the intent first, so they never race into the
/// restart path.
pub struct TranscriptionEngine {
    ctx: RunCtx,
    state_rx: watch::Receiver<RecorderState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Clone)]
struct RunCtx {
    session_id: String,
    local_email: String,
    store: Arc<SessionStore>,
    channel: Arc<dyn SignalingChannel>,
    recognizer: Arc<dyn SpeechRecognizer>,
    should_record: Arc<AtomicBool>,
    locale: Arc<StdMutex<String>>,
    state_tx: Arc<watch::Sender<RecorderState>>,
    last_error: Arc<StdMutex<Option<RecognizerError>>>,
    backoff: Duration,
}

impl TranscriptionEngine {
    pub fn new(
        session_id: &str,
        local_email: &str,
        store: Arc<SessionStore>,
        channel: Arc<dyn SignalingChannel>,
        recognizer: Arc<dyn SpeechRecognizer>,
        locale: &str,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(RecorderState::Idle);

        Self {
            ctx: RunCtx {
                session_id: session_id.to_string(),
                local_email: local_email.to_string(),
                store,
                channel,
                recognizer,
                should_record: Arc::new(AtomicBool::new(false)),
                locale: Arc::new(StdMutex::new(locale.to_string())),
                state_tx: Arc::new(state_tx),
                last_error: Arc::new(StdMutex::new(None)),
                backoff: RESTART_BACKOFF,
            },
            state_rx,
            task: Mutex::new(None),
        }
    }

    /// Override the restart backoff (tests).
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.ctx.backoff = backoff;
        self
    }

    /// Set the intent to record and start the supervising loop.
    pub async fn start(&self) {
        if self.ctx.should_record.swap(true, Ordering::SeqCst) {
            warn!("Recording already started");
            return;
        }

        *self.ctx.last_error.lock().unwrap() = None;

        let ctx = self.ctx.clone();
        let task = tokio::spawn(Self::run(ctx));

        let mut handle = self.task.lock().await;
        *handle = Some(task);
    }

    /// Clear the intent and end the current stream. Never restarts.
    pub async fn stop(&self) {
        if !self.ctx.should_record.swap(false, Ordering::SeqCst) {
            return;
        }

        self.ctx.recognizer.stop().await;

        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("Transcription task panicked: {}", e);
            }
        }
    }

    /// Switch the recognition locale at runtime. The current stream is
    /// stopped; the supervising loop brings it back with the new locale
    /// while the rest of the session keeps running.
    pub async fn set_locale(&self, locale: &str) {
        *self.ctx.locale.lock().unwrap() = locale.to_string();

        if self.ctx.should_record.load(Ordering::SeqCst) {
            info!("Switching recognition locale to {}", locale);
            self.ctx.recognizer.stop().await;
        }
    }

    /// The recording intent (not the stream state).
    pub fn is_recording(&self) -> bool {
        self.ctx.should_record.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> RecorderState {
        *self.state_rx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<RecorderState> {
        self.state_rx.clone()
    }

    /// The error that took recognition down, if any (e.g. microphone
    /// access denied). The session continues degraded without it.
    pub fn last_error(&self) -> Option<RecognizerError> {
        self.ctx.last_error.lock().unwrap().clone()
    }

    async fn run(ctx: RunCtx) {
        info!("Transcription loop started");

        loop {
            if !ctx.should_record.load(Ordering::SeqCst) {
                break;
            }

            let locale = ctx.locale.lock().unwrap().clone();

            let mut utterances = match ctx.recognizer.start(&locale).await {
                Ok(rx) => rx,
                Err(e) => {
                    error!("Speech recognition failed to start: {}", e);
                    *ctx.last_error.lock().unwrap() = Some(e);
                    ctx.should_record.store(false, Ordering::SeqCst);
                    break;
                }
            };

            // A stop that raced the restart: end the stream we just
            // opened instead of blocking on it.
            if !ctx.should_record.load(Ordering::SeqCst) {
                ctx.recognizer.stop().await;
                break;
            }

            let _ = ctx.state_tx.send(RecorderState::Listening);

            while let Some(utterance) = utterances.recv().await {
                if !ctx.should_record.load(Ordering::SeqCst) {
                    break;
                }
                if !utterance.is_final {
                    continue;
                }
                let text = utterance.text.trim();
                if text.is_empty() {
                    continue;
                }

                Self::fan_out(&ctx, text).await;
            }

            let _ = ctx.state_tx.send(RecorderState::Idle);

            if !ctx.should_record.load(Ordering::SeqCst) {
                break;
            }

            // Platform-imposed stream end while we still intend to record.
            info!("Recognition stream ended, restarting");
            tokio::time::sleep(ctx.backoff).await;
        }

        let _ = ctx.state_tx.send(RecorderState::Idle);
        info!("Transcription loop stopped");
    }

    /// Tag the utterance with the speaker's display name, echo it into
    /// the local transcript, and broadcast it to the other participants.
    async fn fan_out(ctx: &RunCtx, text: &str) {
        let name = match ctx.store.get(&ctx.session_id).await {
            Some(session) => session.display_name_for(&ctx.local_email),
            None => ctx
                .local_email
                .split('@')
                .next()
                .unwrap_or(&ctx.local_email)
                .to_string(),
        };

        let line = format!("{}: {}", name, text);

        ctx.store.append_transcript(&ctx.session_id, &line).await;

        let fragment = TranscriptFragment {
            session_id: ctx.session_id.clone(),
            sender: ctx.local_email.clone(),
            text: line,
        };
        if let Err(e) = ctx.channel.publish_transcript(&fragment).await {
            // The line stays visible locally; nothing to retry.
            warn!("Failed to broadcast transcript line: {}", e);
        }
    }
}
