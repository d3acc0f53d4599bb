//! Session REST API boundary
//!
//! The backend persists sessions and fans session updates out to the
//! signaling topic; this crate only consumes it. Every mutating call
//! returns the full updated session object, which callers treat as
//! authoritative.

mod backend;
mod client;
mod memory;

pub use backend::{ApiError, SessionApi};
pub use client::RestSessionApi;
pub use memory::MemorySessionApi;
