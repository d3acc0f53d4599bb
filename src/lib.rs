pub mod api;
pub mod config;
pub mod live;
pub mod mesh;
pub mod model;
pub mod service;
pub mod signaling;
pub mod store;
pub mod transcribe;

pub use api::{ApiError, MemorySessionApi, RestSessionApi, SessionApi};
pub use config::Config;
pub use live::{Admission, LifecycleController, LiveError, LiveOptions, LiveSession, Phase};
pub use mesh::{LoopbackEngine, MediaEngine, PeerMesh};
pub use model::{HostRole, NewSession, Participant, Session, SessionStatus, Visibility};
pub use service::{await_admission, JoinError, JoinOutcome, SessionService};
pub use signaling::{
    LocalBroker, NatsSignaling, SignalEnvelope, SignalKind, Signaling, TopicEvent,
    TranscriptFragment,
};
pub use store::{LocalCache, SessionStore};
pub use transcribe::{ScriptedRecognizer, SpeechRecognizer, TranscriptionEngine};
