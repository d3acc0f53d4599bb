use super::engine::{
    IceCandidate, MediaEngine, MediaError, PeerConnection, PeerHandle, PeerState, Sdp,
};
use anyhow::{bail, Result};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Deterministic in-process media engine for tests: no real capture or
/// codecs, scripted local candidates, and remote-description gating that
/// matches real engine behavior (candidates fail until the description is
/// set).
pub struct LoopbackEngine {
    local: String,
    deny_media: bool,
    candidates_per_connection: usize,
    connections: Mutex<Vec<Arc<LoopbackConnection>>>,
}

impl LoopbackEngine {
    pub fn new(local: &str) -> Self {
        Self {
            local: local.to_string(),
            deny_media: false,
            candidates_per_connection: 0,
            connections: Mutex::new(Vec::new()),
        }
    }

    /// Emit `n` scripted local candidates per connection.
    pub fn with_candidates(mut self, n: usize) -> Self {
        self.candidates_per_connection = n;
        self
    }

    /// Simulate the user denying camera/microphone access.
    pub fn deny_media(mut self) -> Self {
        self.deny_media = true;
        self
    }

    /// Connections created so far, for inspection in tests.
    pub fn connections(&self) -> Vec<Arc<LoopbackConnection>> {
        self.connections.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MediaEngine for LoopbackEngine {
    async fn open_local_media(&self) -> Result<(), MediaError> {
        if self.deny_media {
            return Err(MediaError::AccessDenied);
        }
        Ok(())
    }

    async fn close_local_media(&self) {}

    async fn connect(&self, remote: &str) -> Result<PeerHandle> {
        let connection = Arc::new(LoopbackConnection::new(&self.local, remote));
        self.connections.lock().unwrap().push(connection.clone());

        let (tx, rx) = mpsc::channel(16);
        for i in 0..self.candidates_per_connection {
            let _ = tx
                .send(IceCandidate(format!("cand-{}-{}", self.local, i)))
                .await;
        }

        Ok(PeerHandle {
            connection,
            candidates: rx,
        })
    }
}

/// Connection double backing `LoopbackEngine`.
pub struct LoopbackConnection {
    local: String,
    remote: String,
    state: Mutex<PeerState>,
    remote_description: Mutex<Option<Sdp>>,
    applied_candidates: Mutex<Vec<IceCandidate>>,
}

impl LoopbackConnection {
    fn new(local: &str, remote: &str) -> Self {
        Self {
            local: local.to_string(),
            remote: remote.to_string(),
            state: Mutex::new(PeerState::New),
            remote_description: Mutex::new(None),
            applied_candidates: Mutex::new(Vec::new()),
        }
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn applied_candidates(&self) -> Vec<IceCandidate> {
        self.applied_candidates.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PeerConnection for LoopbackConnection {
    async fn create_offer(&self) -> Result<Sdp> {
        *self.state.lock().unwrap() = PeerState::Connecting;
        Ok(Sdp(format!("offer:{}->{}", self.local, self.remote)))
    }

    async fn accept_offer(&self, offer: &Sdp) -> Result<Sdp> {
        *self.remote_description.lock().unwrap() = Some(offer.clone());
        *self.state.lock().unwrap() = PeerState::Connected;
        Ok(Sdp(format!("answer:{}->{}", self.local, self.remote)))
    }

    async fn accept_answer(&self, answer: &Sdp) -> Result<()> {
        *self.remote_description.lock().unwrap() = Some(answer.clone());
        *self.state.lock().unwrap() = PeerState::Connected;
        Ok(())
    }

    async fn add_candidate(&self, candidate: &IceCandidate) -> Result<()> {
        if self.remote_description.lock().unwrap().is_none() {
            bail!("remote description not set");
        }
        self.applied_candidates.lock().unwrap().push(candidate.clone());
        Ok(())
    }

    fn has_remote_description(&self) -> bool {
        self.remote_description.lock().unwrap().is_some()
    }

    fn state(&self) -> PeerState {
        *self.state.lock().unwrap()
    }

    async fn close(&self) {
        *self.state.lock().unwrap() = PeerState::Closed;
    }
}
