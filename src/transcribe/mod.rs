//! Live transcription
//!
//! Continuous speech capture behind the `SpeechRecognizer` trait, a
//! supervising engine that keeps the "should record" intent separate from
//! the stream's running state (so intentional stops never restart, while
//! platform-imposed stream ends do, after a fixed backoff), speaker
//! tagging, and fan-out to the local transcript plus the signaling topic.

mod engine;
mod recognizer;
mod scripted;

pub use engine::{RecorderState, TranscriptionEngine, RESTART_BACKOFF};
pub use recognizer::{RecognizerError, SpeechRecognizer, Utterance};
pub use scripted::ScriptedRecognizer;
