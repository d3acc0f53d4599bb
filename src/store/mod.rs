//! Client-side session state
//!
//! `SessionStore` is the single source of truth for session, participant
//! and waiting-list state on this client. It is only written by responses
//! to calls this client issued and by inbound topic events; server state
//! replaces local state wholesale. `LocalCache` persists the auxiliary
//! scheduled-sessions list and transcript backups, which are never read
//! back as the source of truth.

mod cache;
mod store;

pub use cache::{LocalCache, ScheduledEntry, TranscriptBackup};
pub use store::SessionStore;
