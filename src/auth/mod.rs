//! Authentication module for the NGOConnect client
//!
//! This module owns the session lifecycle: sign-in, registration,
//! token persistence and the notifications the host reacts to.

mod events;
mod session;
mod state;

pub use events::{SessionEvent, TerminationReason};
pub use session::SessionStore;
pub use state::{Session, SessionState};
