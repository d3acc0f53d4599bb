use super::engine::{IceCandidate, MediaEngine, PeerConnection, PeerState, Sdp};
use crate::signaling::{SignalEnvelope, SignalKind, SignalingChannel};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

struct PeerLink {
    connection: Arc<dyn PeerConnection>,
    /// Candidates that arrived before the remote description was set,
    /// replayed once it is.
    pending_candidates: Vec<IceCandidate>,
    /// Forwards locally gathered candidates to the peer.
    forwarder: JoinHandle<()>,
}

/// Maintains the full mesh: one connection per remote participant.
///
/// Fed signaling envelopes by the session's signal loop (a single task, so
/// handling is effectively serialized). Errors local to one message or one
/// peer are logged and dropped; they never abort the mesh.
pub struct PeerMesh {
    session_id: String,
    local_email: String,
    engine: Arc<dyn MediaEngine>,
    channel: Arc<dyn SignalingChannel>,
    peers: Mutex<HashMap<String, PeerLink>>,
}

impl PeerMesh {
    pub fn new(
        session_id: &str,
        local_email: &str,
        engine: Arc<dyn MediaEngine>,
        channel: Arc<dyn SignalingChannel>,
    ) -> Self {
        Self {
            session_id: session_id.to_string(),
            local_email: local_email.to_string(),
            engine,
            channel,
            peers: Mutex::new(HashMap::new()),
        }
    }

    /// Broadcast our `join` so existing peers offer toward us.
    pub async fn announce_join(&self) {
        self.send(SignalEnvelope::broadcast(
            SignalKind::Join,
            &self.local_email,
            &self.session_id,
            String::new(),
        ))
        .await;
    }

    /// Broadcast `leave` so peers drop their connection to us.
    pub async fn announce_leave(&self) {
        self.send(SignalEnvelope::broadcast(
            SignalKind::Leave,
            &self.local_email,
            &self.session_id,
            String::new(),
        ))
        .await;
    }

    /// Dispatch one inbound signaling envelope.
    pub async fn handle_signal(&self, signal: &SignalEnvelope) {
        // Self-originated messages are ignored by every handler.
        if signal.sender == self.local_email {
            return;
        }

        let directed_to_us = signal.receiver.as_deref() == Some(self.local_email.as_str());

        match signal.kind {
            SignalKind::Join => self.on_join(&signal.sender).await,
            SignalKind::Leave => self.on_leave(&signal.sender).await,
            SignalKind::Offer if directed_to_us => {
                self.on_offer(&signal.sender, &signal.data).await
            }
            SignalKind::Answer if directed_to_us => {
                self.on_answer(&signal.sender, &signal.data).await
            }
            SignalKind::Candidate if directed_to_us => {
                self.on_candidate(&signal.sender, &signal.data).await
            }
            // Directed at another peer.
            _ => {}
        }
    }

    /// A new participant joined: existing peers initiate the offer.
    /// Idempotent for peers we already hold a connection to.
    async fn on_join(&self, remote: &str) {
        let connection = {
            let mut peers = self.peers.lock().await;
            if peers.contains_key(remote) {
                return;
            }

            let link = match self.open_link(remote).await {
                Ok(link) => link,
                Err(e) => {
                    warn!("Failed to open connection to {}: {}", remote, e);
                    return;
                }
            };
            let connection = link.connection.clone();
            peers.insert(remote.to_string(), link);
            connection
        };

        let offer = match connection.create_offer().await {
            Ok(offer) => offer,
            Err(e) => {
                warn!("Failed to create offer for {}: {}", remote, e);
                return;
            }
        };

        info!("Offering to new peer {}", remote);
        self.send(SignalEnvelope::directed(
            SignalKind::Offer,
            &self.local_email,
            remote,
            &self.session_id,
            offer.0,
        ))
        .await;
    }

    /// Directed offer from a peer: answer it on the (possibly new)
    /// connection for that sender.
    async fn on_offer(&self, sender: &str, data: &str) {
        let connection = {
            let mut peers = self.peers.lock().await;
            match peers.get(sender) {
                Some(link) => link.connection.clone(),
                None => {
                    let link = match self.open_link(sender).await {
                        Ok(link) => link,
                        Err(e) => {
                            warn!("Failed to open connection to {}: {}", sender, e);
                            return;
                        }
                    };
                    let connection = link.connection.clone();
                    peers.insert(sender.to_string(), link);
                    connection
                }
            }
        };

        let answer = match connection.accept_offer(&Sdp(data.to_string())).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Failed to apply offer from {}: {}", sender, e);
                return;
            }
        };

        self.send(SignalEnvelope::directed(
            SignalKind::Answer,
            &self.local_email,
            sender,
            &self.session_id,
            answer.0,
        ))
        .await;

        self.flush_pending(sender).await;
    }

    async fn on_answer(&self, sender: &str, data: &str) {
        let connection = {
            let peers = self.peers.lock().await;
            match peers.get(sender) {
                Some(link) => link.connection.clone(),
                None => {
                    warn!("Answer from {} with no matching connection", sender);
                    return;
                }
            }
        };

        if let Err(e) = connection.accept_answer(&Sdp(data.to_string())).await {
            warn!("Failed to apply answer from {}: {}", sender, e);
            return;
        }

        self.flush_pending(sender).await;
    }

    /// Apply a candidate, or queue it while the remote description is
    /// still unset so it can be replayed afterwards.
    async fn on_candidate(&self, sender: &str, data: &str) {
        let connection = {
            let mut peers = self.peers.lock().await;
            let link = match peers.get_mut(sender) {
                Some(link) => link,
                None => {
                    warn!("Candidate from {} with no matching connection", sender);
                    return;
                }
            };

            if !link.connection.has_remote_description() {
                link.pending_candidates.push(IceCandidate(data.to_string()));
                return;
            }
            link.connection.clone()
        };

        if let Err(e) = connection.add_candidate(&IceCandidate(data.to_string())).await {
            warn!("Dropping ICE candidate from {}: {}", sender, e);
        }
    }

    async fn on_leave(&self, sender: &str) {
        let link = {
            let mut peers = self.peers.lock().await;
            peers.remove(sender)
        };

        if let Some(link) = link {
            link.forwarder.abort();
            link.connection.close().await;
            info!("Peer {} left, connection closed", sender);
        }
    }

    /// Replay candidates queued before the remote description was set.
    async fn flush_pending(&self, remote: &str) {
        let (connection, pending) = {
            let mut peers = self.peers.lock().await;
            match peers.get_mut(remote) {
                Some(link) => (
                    link.connection.clone(),
                    std::mem::take(&mut link.pending_candidates),
                ),
                None => return,
            }
        };

        for candidate in pending {
            if let Err(e) = connection.add_candidate(&candidate).await {
                warn!("Dropping replayed ICE candidate for {}: {}", remote, e);
            }
        }
    }

    /// Create the engine connection and the task forwarding its locally
    /// gathered candidates to the peer.
    async fn open_link(&self, remote: &str) -> Result<PeerLink> {
        let handle = self.engine.connect(remote).await?;
        let mut candidates = handle.candidates;

        let channel = self.channel.clone();
        let local = self.local_email.clone();
        let session_id = self.session_id.clone();
        let peer = remote.to_string();

        let forwarder = tokio::spawn(async move {
            while let Some(candidate) = candidates.recv().await {
                let envelope = SignalEnvelope::directed(
                    SignalKind::Candidate,
                    &local,
                    &peer,
                    &session_id,
                    candidate.0,
                );
                if let Err(e) = channel.publish_signal(&envelope).await {
                    warn!("Failed to send candidate to {}: {}", peer, e);
                }
            }
        });

        Ok(PeerLink {
            connection: handle.connection,
            pending_candidates: Vec::new(),
            forwarder,
        })
    }

    async fn send(&self, envelope: SignalEnvelope) {
        if let Err(e) = self.channel.publish_signal(&envelope).await {
            warn!("Signaling send failed: {}", e);
        }
    }

    pub async fn peer_count(&self) -> usize {
        self.peers.lock().await.len()
    }

    pub async fn peers(&self) -> Vec<String> {
        self.peers.lock().await.keys().cloned().collect()
    }

    pub async fn peer_state(&self, remote: &str) -> Option<PeerState> {
        self.peers
            .lock()
            .await
            .get(remote)
            .map(|link| link.connection.state())
    }

    pub async fn pending_candidates(&self, remote: &str) -> usize {
        self.peers
            .lock()
            .await
            .get(remote)
            .map(|link| link.pending_candidates.len())
            .unwrap_or(0)
    }

    /// Close every connection and stop the candidate forwarders.
    pub async fn shutdown(&self) {
        let links: Vec<_> = {
            let mut peers = self.peers.lock().await;
            peers.drain().collect()
        };

        let count = links.len();
        for (_, link) in links {
            link.forwarder.abort();
            link.connection.close().await;
        }

        if count > 0 {
            info!("Closed {} peer connections", count);
        }
    }
}
