use super::messages::{SignalEnvelope, TopicEvent, TranscriptFragment};
use super::transport::{Signaling, SignalingChannel};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

/// In-process topic broker with the same fan-out contract as the real one:
/// every published message reaches all current subscribers, including the
/// sender (clients filter self-originated messages).
///
/// Used by tests and by `MemorySessionApi` to push session updates the way
/// the production backend does.
#[derive(Default)]
pub struct LocalBroker {
    topics: Mutex<HashMap<String, broadcast::Sender<TopicEvent>>>,
}

impl LocalBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn topic(&self, session_id: &str) -> broadcast::Sender<TopicEvent> {
        let mut topics = self.topics.lock().unwrap();
        topics
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(256).0)
            .clone()
    }

    /// Publish directly to a session topic. No-op when nobody subscribes.
    pub fn publish(&self, session_id: &str, event: TopicEvent) {
        let _ = self.topic(session_id).send(event);
    }
}

#[async_trait::async_trait]
impl Signaling for LocalBroker {
    async fn open(&self, session_id: &str) -> Result<Arc<dyn SignalingChannel>> {
        Ok(Arc::new(LocalChannel {
            tx: self.topic(session_id),
        }))
    }
}

struct LocalChannel {
    tx: broadcast::Sender<TopicEvent>,
}

#[async_trait::async_trait]
impl SignalingChannel for LocalChannel {
    async fn publish_signal(&self, signal: &SignalEnvelope) -> Result<()> {
        let _ = self.tx.send(TopicEvent::Signal(signal.clone()));
        Ok(())
    }

    async fn publish_transcript(&self, fragment: &TranscriptFragment) -> Result<()> {
        let _ = self.tx.send(TopicEvent::Transcript(fragment.clone()));
        Ok(())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<TopicEvent>> {
        let mut sub = self.tx.subscribe();
        let (tx, rx) = mpsc::channel(256);

        tokio::spawn(async move {
            loop {
                match sub.recv().await {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Local subscriber lagged, {} messages dropped", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(rx)
    }
}
