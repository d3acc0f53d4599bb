//! Session-state service
//!
//! The explicit mutation API over the store and the session backend:
//! every component that needs session state receives a `SessionService`
//! handle instead of reaching into ambient globals. The waiting-room
//! admission poll lives here too.

mod session;
mod waiting;

pub use session::{JoinError, JoinOutcome, SessionService};
pub use waiting::{await_admission, WaitError, ADMISSION_POLL_INTERVAL};
