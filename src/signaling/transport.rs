use super::messages::{SignalEnvelope, TopicEvent, TranscriptFragment};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Connector that opens one duplex channel per session.
#[async_trait::async_trait]
pub trait Signaling: Send + Sync {
    async fn open(&self, session_id: &str) -> Result<Arc<dyn SignalingChannel>>;
}

/// A session-scoped publish/subscribe channel.
///
/// `subscribe` returns a channel receiver fed by a background task; the
/// task parses inbound payloads and drops malformed ones after logging,
/// so one bad message never tears down the stream.
#[async_trait::async_trait]
pub trait SignalingChannel: Send + Sync {
    async fn publish_signal(&self, signal: &SignalEnvelope) -> Result<()>;

    async fn publish_transcript(&self, fragment: &TranscriptFragment) -> Result<()>;

    async fn subscribe(&self) -> Result<mpsc::Receiver<TopicEvent>>;
}
