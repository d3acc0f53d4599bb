use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Opaque serialized session description (offer or answer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sdp(pub String);

/// Opaque serialized ICE candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceCandidate(pub String);

/// Local media acquisition failures. Access denial is a view-level fatal
/// condition; everything else degrades to a missing tile.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("camera or microphone access denied")]
    AccessDenied,

    #[error("media engine failure: {0}")]
    Engine(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    New,
    Connecting,
    Connected,
    Closed,
}

/// One point-to-point media connection to a remote participant.
///
/// Owned exclusively by the mesh manager, keyed by remote identity.
/// Within one connection the offer must be fully applied before an answer
/// is processed, and candidates only apply once the remote description is
/// set — the manager queues early ones and replays them.
#[async_trait::async_trait]
pub trait PeerConnection: Send + Sync {
    /// Create and set the local offer.
    async fn create_offer(&self) -> Result<Sdp>;

    /// Set the remote offer and produce the local answer.
    async fn accept_offer(&self, offer: &Sdp) -> Result<Sdp>;

    /// Set the remote answer on a connection that sent the offer.
    async fn accept_answer(&self, answer: &Sdp) -> Result<()>;

    /// Apply a remote ICE candidate. Fails while the remote description
    /// is unset.
    async fn add_candidate(&self, candidate: &IceCandidate) -> Result<()>;

    fn has_remote_description(&self) -> bool;

    fn state(&self) -> PeerState;

    async fn close(&self);
}

/// A freshly created connection plus the stream of local ICE candidates
/// the engine gathers for it.
pub struct PeerHandle {
    pub connection: Arc<dyn PeerConnection>,
    pub candidates: mpsc::Receiver<IceCandidate>,
}

/// Platform WebRTC engine boundary.
///
/// Implementations own capture devices and codec internals; this crate
/// only drives connection lifecycle and signaling.
#[async_trait::async_trait]
pub trait MediaEngine: Send + Sync {
    /// Acquire the local camera/microphone tracks. Called once per live
    /// view, before any peer connection is made.
    async fn open_local_media(&self) -> Result<(), MediaError>;

    /// Release local capture tracks.
    async fn close_local_media(&self);

    /// Create a connection toward a remote participant with the local
    /// tracks attached.
    async fn connect(&self, remote: &str) -> Result<PeerHandle>;
}
