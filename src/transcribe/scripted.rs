use super::recognizer::{RecognizerError, SpeechRecognizer, Utterance};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Scripted recognizer for tests.
///
/// Each `start` plays the next take: its utterances are delivered and the
/// stream then ends on its own, the way platform recognition sessions do.
/// Once the takes run out, `start` returns a stream that stays open until
/// `stop` — so restart behavior, locale switches and intent handling can
/// all be observed deterministically.
#[derive(Default)]
pub struct ScriptedRecognizer {
    takes: Mutex<VecDeque<Vec<Utterance>>>,
    deny_access: bool,
    starts: AtomicUsize,
    locales: Mutex<Vec<String>>,
    active: Mutex<Option<mpsc::Sender<Utterance>>>,
}

impl ScriptedRecognizer {
    pub fn new(takes: Vec<Vec<Utterance>>) -> Self {
        Self {
            takes: Mutex::new(takes.into()),
            ..Self::default()
        }
    }

    /// Fail every `start` with an access-denied error.
    pub fn denying_access() -> Self {
        Self {
            deny_access: true,
            ..Self::default()
        }
    }

    /// How many times `start` was called.
    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Locales passed to `start`, in order.
    pub fn locales(&self) -> Vec<String> {
        self.locales.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    async fn start(&self, locale: &str) -> Result<mpsc::Receiver<Utterance>, RecognizerError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.locales.lock().unwrap().push(locale.to_string());

        if self.deny_access {
            return Err(RecognizerError::AccessDenied);
        }

        let take = self.takes.lock().unwrap().pop_front();
        let (tx, rx) = mpsc::channel(64);

        match take {
            Some(utterances) => {
                // Deliver the take, then let the stream end.
                tokio::spawn(async move {
                    for utterance in utterances {
                        if tx.send(utterance).await.is_err() {
                            break;
                        }
                    }
                });
            }
            None => {
                // Out of takes: hold the stream open until stop().
                *self.active.lock().unwrap() = Some(tx);
            }
        }

        Ok(rx)
    }

    async fn stop(&self) {
        self.active.lock().unwrap().take();
    }
}
