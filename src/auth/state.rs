use serde::Serialize;
use std::fmt;

use crate::api::models::Profile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// No tokens.
    Anonymous,
    /// Startup profile check in flight.
    Initializing,
    /// Tokens and a backend-confirmed profile.
    Authenticated,
    /// Tokens present but the startup profile fetch failed; the profile is a
    /// stand-in built from the cached email and role.
    Degraded,
}

impl SessionState {
    pub fn is_signed_in(&self) -> bool {
        matches!(self, SessionState::Authenticated | SessionState::Degraded)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Anonymous => "anonymous",
            SessionState::Initializing => "initializing",
            SessionState::Authenticated => "authenticated",
            SessionState::Degraded => "degraded",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub state: SessionState,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<Profile>,
}

impl Session {
    pub fn is_signed_in(&self) -> bool {
        self.state.is_signed_in() && self.access_token.is_some()
    }
}
