use tokio::sync::mpsc;

/// One recognized stretch of speech.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub text: String,
    /// Interim results carry false; the engine only uses finalized ones.
    pub is_final: bool,
}

impl Utterance {
    pub fn finalized(text: &str) -> Self {
        Self {
            text: text.to_string(),
            is_final: true,
        }
    }

    pub fn interim(text: &str) -> Self {
        Self {
            text: text.to_string(),
            is_final: false,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RecognizerError {
    #[error("microphone access denied")]
    AccessDenied,

    #[error("speech recognition unavailable: {0}")]
    Unavailable(String),
}

/// Platform speech-recognition boundary.
///
/// `start` opens a recognition stream for the given locale and returns a
/// receiver of utterances; the channel closing means the stream ended —
/// platforms impose session limits, so streams end on their own. `stop`
/// ends the current stream. Restart policy is the engine's job, not the
/// recognizer's.
#[async_trait::async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn start(&self, locale: &str) -> Result<mpsc::Receiver<Utterance>, RecognizerError>;

    async fn stop(&self);
}
