use super::messages::{SignalEnvelope, TopicEvent, TranscriptFragment};
use super::transport::{Signaling, SignalingChannel};
use anyhow::{Context, Result};
use async_nats::Client;
use futures::stream::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// NATS-backed signaling: one subject per session.
pub struct NatsSignaling {
    client: Client,
}

impl NatsSignaling {
    /// Connect to the signaling broker.
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to signaling broker at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to signaling broker")?;

        info!("Connected to signaling broker");

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Signaling for NatsSignaling {
    async fn open(&self, session_id: &str) -> Result<Arc<dyn SignalingChannel>> {
        Ok(Arc::new(NatsChannel {
            client: self.client.clone(),
            subject: format!("gd.session.{}", session_id),
        }))
    }
}

struct NatsChannel {
    client: Client,
    subject: String,
}

impl NatsChannel {
    async fn publish(&self, event: &TopicEvent) -> Result<()> {
        let payload = serde_json::to_vec(event)?;
        self.client
            .publish(self.subject.clone(), payload.into())
            .await
            .context("Failed to publish to session topic")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SignalingChannel for NatsChannel {
    async fn publish_signal(&self, signal: &SignalEnvelope) -> Result<()> {
        self.publish(&TopicEvent::Signal(signal.clone())).await
    }

    async fn publish_transcript(&self, fragment: &TranscriptFragment) -> Result<()> {
        self.publish(&TopicEvent::Transcript(fragment.clone())).await
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<TopicEvent>> {
        let mut subscriber = self
            .client
            .subscribe(self.subject.clone())
            .await
            .context("Failed to subscribe to session topic")?;

        info!("Subscribed to {}", self.subject);

        let (tx, rx) = mpsc::channel(256);
        let subject = self.subject.clone();

        tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                match serde_json::from_slice::<TopicEvent>(&msg.payload) {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Dropping malformed message on {}: {}", subject, e);
                    }
                }
            }
            info!("Subscription to {} closed", subject);
        });

        Ok(rx)
    }
}
