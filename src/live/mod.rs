//! The live session view runtime
//!
//! Joins the session, opens the signaling channel, wires the peer mesh
//! and the transcription engine together, drives the 1-second lifecycle
//! countdown, and funnels every exit path (manual leave, host end,
//! completion observed over signaling, timer-driven auto-end) through a
//! single teardown sequence.

mod lifecycle;
mod session;

pub use lifecycle::{
    LifecycleController, LifecycleEvent, Phase, CONCLUSION_MINUTES, OVERTIME_SANITY_MINUTES,
};
pub use session::{Admission, LiveError, LiveOptions, LiveSession};
