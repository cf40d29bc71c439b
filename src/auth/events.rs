/// Why the session was torn down without the user asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    NoRefreshToken,
    RefreshFailed,
}

/// Session lifecycle notifications for the hosting application.
///
/// `LoginRequired` is the host's cue to send the user back to the login
/// entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { email: String },
    Degraded { email: String },
    TokenRefreshed,
    SignedOut,
    LoginRequired { reason: TerminationReason },
}
