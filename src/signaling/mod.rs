//! Session-scoped signaling transport
//!
//! One duplex channel per session view, carrying three payload shapes on a
//! single topic: peer signaling envelopes (join/leave/offer/answer/candidate),
//! transcript fragments, and full session objects pushed by the backend.
//!
//! Delivery is at-most-once; ordering is only guaranteed per sender. The
//! transport does not reconnect on its own.

mod local;
mod messages;
mod nats;
mod transport;

pub use local::LocalBroker;
pub use messages::{SignalEnvelope, SignalKind, TopicEvent, TranscriptFragment};
pub use nats::NatsSignaling;
pub use transport::{Signaling, SignalingChannel};
