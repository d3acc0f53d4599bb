//! Full-mesh peer connection management
//!
//! Every participant holds one direct connection per remote participant —
//! no relay. Existing peers are always the offer-initiators toward a new
//! joiner; `leave` tears the link down. The platform WebRTC engine sits
//! behind the `MediaEngine`/`PeerConnection` traits (encoding internals
//! are out of scope for this crate).

mod engine;
mod loopback;
mod manager;

pub use engine::{IceCandidate, MediaEngine, MediaError, PeerConnection, PeerHandle, PeerState, Sdp};
pub use loopback::{LoopbackConnection, LoopbackEngine};
pub use manager::PeerMesh;
