use crate::model::Session;
use serde::{Deserialize, Serialize};

/// Kind of peer-signaling message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Join,
    Leave,
    Offer,
    Answer,
    Candidate,
}

/// Peer-signaling envelope published to the session topic.
///
/// `receiver` absent means broadcast; the broker fans every message out to
/// all subscribers and clients filter self-originated ones by convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalEnvelope {
    #[serde(rename = "type")]
    pub kind: SignalKind,

    /// Sender identity (email)
    pub sender: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,

    /// Opaque serialized offer/answer/ICE payload; empty for join/leave
    #[serde(default)]
    pub data: String,

    pub session_id: String,
}

impl SignalEnvelope {
    /// Broadcast envelope (no receiver).
    pub fn broadcast(kind: SignalKind, sender: &str, session_id: &str, data: String) -> Self {
        Self {
            kind,
            sender: sender.to_string(),
            receiver: None,
            data,
            session_id: session_id.to_string(),
        }
    }

    /// Envelope addressed to a single peer.
    pub fn directed(
        kind: SignalKind,
        sender: &str,
        receiver: &str,
        session_id: &str,
        data: String,
    ) -> Self {
        Self {
            kind,
            sender: sender.to_string(),
            receiver: Some(receiver.to_string()),
            data,
            session_id: session_id.to_string(),
        }
    }
}

/// A finalized, speaker-tagged utterance fanned out to the session topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptFragment {
    pub session_id: String,
    pub sender: String,
    pub text: String,
}

/// Everything that can arrive on a session topic.
///
/// Untagged: a payload is tried as a signaling envelope first, then a
/// transcript fragment, then a full session object pushed by the backend
/// after join/start/end/admit mutations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TopicEvent {
    Signal(SignalEnvelope),
    Transcript(TranscriptFragment),
    Session(Box<Session>),
}
