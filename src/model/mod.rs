//! Domain entities shared across the crate
//!
//! These mirror the session backend's wire representation (camelCase JSON,
//! upper-case status literals) so server responses deserialize verbatim.

mod participant;
mod session;

pub use participant::Participant;
pub use session::{
    generate_join_code, HostRole, NewSession, Session, SessionStatus, Visibility,
};
