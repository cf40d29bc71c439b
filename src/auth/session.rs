use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use super::events::{SessionEvent, TerminationReason};
use super::state::{Session, SessionState};
use crate::api::models::{
    Acknowledgement, Profile, ProfileUpdate, RegistrationResult, Role, VerificationResult,
};
use crate::config::EndpointsConfig;
use crate::error::ClientError;
use crate::gateway::{ApiRequest, Backend};
use crate::storage::{TokenRecord, TokenStore};
use crate::Result;

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Deserialize)]
struct TokenPair {
    access: String,
    refresh: String,
}

#[derive(Debug)]
struct Inner {
    state: SessionState,
    profile: Option<Profile>,
}

/// Owner of "who is logged in".
///
/// The only writer of the token store. Every persisted change happens while
/// holding the inner write lock, so concurrent writers never interleave a
/// load and a save.
pub struct SessionStore {
    backend: Backend,
    endpoints: EndpointsConfig,
    tokens: Arc<dyn TokenStore>,
    inner: RwLock<Inner>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    pub fn new(backend: Backend, endpoints: EndpointsConfig, tokens: Arc<dyn TokenStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            backend,
            endpoints,
            tokens,
            inner: RwLock::new(Inner {
                state: SessionState::Anonymous,
                profile: None,
            }),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn state(&self) -> SessionState {
        self.inner.read().await.state
    }

    pub async fn profile(&self) -> Option<Profile> {
        self.inner.read().await.profile.clone()
    }

    pub async fn snapshot(&self) -> Result<Session> {
        let inner = self.inner.read().await;
        let record = self.tokens.load().await?;
        Ok(Session {
            state: inner.state,
            access_token: record.access_token,
            refresh_token: record.refresh_token,
            user: inner.profile.clone(),
        })
    }

    /// Current access token, read from storage on every call.
    pub async fn access_token(&self) -> Result<Option<String>> {
        Ok(self.tokens.load().await?.access_token)
    }

    pub(crate) async fn tokens(&self) -> Result<TokenRecord> {
        self.tokens.load().await
    }

    /// Restores the persisted session on startup.
    ///
    /// A failed profile fetch is not surfaced: with a cached email the session
    /// continues in [`SessionState::Degraded`], otherwise everything is
    /// cleared. Only storage failures are returned.
    pub async fn initialize(&self) -> Result<SessionState> {
        let record = self.tokens.load().await?;
        let Some(access) = record.access_token.clone() else {
            debug!("No persisted access token, starting anonymous");
            self.inner.write().await.state = SessionState::Anonymous;
            return Ok(SessionState::Anonymous);
        };

        self.inner.write().await.state = SessionState::Initializing;
        info!("Restoring persisted session");

        match self.fetch_profile(&access).await {
            Ok(profile) => {
                let email = profile.email.clone();
                if !self.adopt_profile(profile).await? {
                    return Ok(SessionState::Anonymous);
                }
                info!(%email, "Session restored");
                self.emit(SessionEvent::SignedIn { email });
                Ok(SessionState::Authenticated)
            }
            Err(e) => {
                warn!(error = %e, "Profile fetch failed during initialization");
                let mut inner = self.inner.write().await;
                match record.user_email {
                    Some(email) => {
                        let role = record.user_role.map(Role::from);
                        inner.profile = Some(Profile::cached(email.clone(), role));
                        inner.state = SessionState::Degraded;
                        info!(%email, "Continuing with cached identity");
                        drop(inner);
                        self.emit(SessionEvent::Degraded { email });
                        Ok(SessionState::Degraded)
                    }
                    None => {
                        inner.profile = None;
                        inner.state = SessionState::Anonymous;
                        self.tokens.clear().await?;
                        info!("No cached identity, persisted session cleared");
                        Ok(SessionState::Anonymous)
                    }
                }
            }
        }
    }

    /// Creates an account. No session is established; the email must be
    /// verified first.
    pub async fn register(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<RegistrationResult> {
        let request = ApiRequest::post(&self.endpoints.register).body(json!({
            "email": email,
            "first_name": first_name,
            "last_name": last_name,
            "password": password,
            "confirm_password": confirm_password,
        }));
        let response = self.backend.send(&request, None).await?;
        info!(%email, "Registration accepted, awaiting email verification");
        response.json_or_default()
    }

    pub async fn verify_email(&self, email: &str, otp: &str) -> Result<VerificationResult> {
        let request = ApiRequest::post(&self.endpoints.verify_email).body(json!({
            "email": email,
            "otp": otp,
        }));
        let response = self
            .backend
            .send(&request, None)
            .await
            .map_err(ClientError::into_invalid_otp)?;
        info!(%email, "Email verified");
        response.json_or_default()
    }

    pub async fn resend_otp(&self, email: &str) -> Result<()> {
        let request = ApiRequest::post(&self.endpoints.resend_otp).body(json!({ "email": email }));
        self.backend.send(&request, None).await?;
        debug!(%email, "Verification code resent");
        Ok(())
    }

    /// Exchanges credentials for a token pair and loads the profile.
    ///
    /// Nothing is persisted until the profile fetch succeeds, so a failure
    /// leaves the session untouched.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Profile> {
        let request = ApiRequest::post(&self.endpoints.login).body(json!({
            "email": email,
            "password": password,
        }));
        let pair: TokenPair = self
            .backend
            .send(&request, None)
            .await
            .map_err(ClientError::into_authentication)?
            .json()?;

        let profile = self.fetch_profile(&pair.access).await?;

        {
            let mut inner = self.inner.write().await;
            let record = TokenRecord {
                access_token: Some(pair.access),
                refresh_token: Some(pair.refresh),
                user_email: Some(profile.email.clone()),
                user_role: Some(profile.role.as_str().to_string()),
            };
            self.tokens.save(&record).await?;
            inner.profile = Some(profile.clone());
            inner.state = SessionState::Authenticated;
        }

        info!(email = %profile.email, role = %profile.role, "Signed in");
        self.emit(SessionEvent::SignedIn {
            email: profile.email.clone(),
        });
        Ok(profile)
    }

    /// Tells the backend to invalidate the refresh token, then clears all
    /// local state regardless of how that went.
    pub async fn log_out(&self) -> Result<()> {
        match self.tokens.load().await {
            Ok(TokenRecord {
                access_token: Some(access),
                refresh_token: Some(refresh),
                ..
            }) => {
                let request =
                    ApiRequest::post(&self.endpoints.logout).body(json!({ "refresh": refresh }));
                if let Err(e) = self.backend.send(&request, Some(&access)).await {
                    warn!(error = %e, "Server-side logout failed, clearing local session anyway");
                }
            }
            Ok(_) => debug!("No token pair to invalidate server-side"),
            Err(e) => warn!(error = %e, "Could not read tokens before logout"),
        }

        let cleared = self.clear_local().await;
        info!("Signed out");
        self.emit(SessionEvent::SignedOut);
        cleared
    }

    /// Fetches the profile and makes it the session's profile.
    pub async fn get_profile(&self) -> Result<Profile> {
        let token = self.require_token().await?;
        let profile = self.fetch_profile(&token).await?;
        self.adopt_profile(profile.clone()).await?;
        Ok(profile)
    }

    pub async fn refresh_profile(&self) -> Result<Profile> {
        self.get_profile().await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile> {
        let token = self.require_token().await?;
        let request = ApiRequest::patch(&self.endpoints.profile).json(update)?;
        let profile: Profile = self.backend.send(&request, Some(&token)).await?.json()?;
        self.adopt_profile(profile.clone()).await?;
        info!(email = %profile.email, "Profile updated");
        Ok(profile)
    }

    pub async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<Acknowledgement> {
        let token = self.require_token().await?;
        let request = ApiRequest::post(&self.endpoints.change_password).body(json!({
            "old_password": old_password,
            "new_password": new_password,
            "confirm_password": confirm_password,
        }));
        let response = self.backend.send(&request, Some(&token)).await?;
        self.confirm_token().await;
        info!("Password changed");
        response.json_or_default()
    }

    /// Persists a renewed access token (and a rotated refresh token, if any).
    ///
    /// Returns `false` without writing when the session was cleared while the
    /// refresh was in flight.
    pub(crate) async fn install_refreshed(&self, access: String, refresh: Option<String>) -> Result<bool> {
        let inner = self.inner.write().await;
        let mut record = self.tokens.load().await?;
        if record.access_token.is_none() {
            debug!("Session cleared during refresh, dropping renewed token");
            return Ok(false);
        }
        record.access_token = Some(access);
        if refresh.is_some() {
            record.refresh_token = refresh;
        }
        self.tokens.save(&record).await?;
        drop(inner);

        debug!("Access token renewed");
        self.emit(SessionEvent::TokenRefreshed);
        Ok(true)
    }

    /// Tears the session down after an unrecoverable authorization failure
    /// and asks the host to send the user to login.
    pub(crate) async fn terminate(&self, reason: TerminationReason) -> Result<()> {
        let cleared = self.clear_local().await;
        warn!(?reason, "Session terminated");
        self.emit(SessionEvent::LoginRequired { reason });
        cleared
    }

    /// Records that the backend accepted the current access token.
    ///
    /// A degraded session only becomes authenticated once the real profile
    /// replaces the cached stand-in; if that reload fails it stays degraded
    /// and the next accepted request tries again.
    pub(crate) async fn confirm_token(&self) {
        if self.inner.read().await.state != SessionState::Degraded {
            return;
        }
        let token = match self.access_token().await {
            Ok(Some(token)) => token,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "Could not read access token to leave degraded mode");
                return;
            }
        };

        match self.fetch_profile(&token).await {
            Ok(profile) => match self.adopt_profile(profile).await {
                Ok(true) => info!("Access token accepted, leaving degraded mode"),
                Ok(false) => {}
                Err(e) => warn!(error = %e, "Could not store reloaded profile"),
            },
            Err(e) => warn!(error = %e, "Profile reload failed, staying in degraded mode"),
        }
    }

    async fn require_token(&self) -> Result<String> {
        self.access_token().await?.ok_or(ClientError::NotAuthenticated)
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<Profile> {
        let request = ApiRequest::get(&self.endpoints.profile);
        self.backend.send(&request, Some(access_token)).await?.json()
    }

    /// Stores a backend-confirmed profile and resyncs the cached identity.
    ///
    /// Returns `false` without writing when the session was cleared while the
    /// profile was loading.
    async fn adopt_profile(&self, profile: Profile) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let mut record = self.tokens.load().await?;
        if record.access_token.is_none() {
            debug!("Session cleared while the profile was loading, not adopting it");
            inner.profile = None;
            inner.state = SessionState::Anonymous;
            return Ok(false);
        }
        record.user_email = Some(profile.email.clone());
        record.user_role = Some(profile.role.as_str().to_string());
        self.tokens.save(&record).await?;
        inner.profile = Some(profile);
        inner.state = SessionState::Authenticated;
        Ok(true)
    }

    /// In-memory state is cleared first so a storage failure cannot leave
    /// the session looking signed in.
    async fn clear_local(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.profile = None;
        inner.state = SessionState::Anonymous;
        self.tokens.clear().await
    }

    fn emit(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}
