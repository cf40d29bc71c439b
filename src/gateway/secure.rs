use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::backend::{ApiRequest, ApiResponse, Backend};
use crate::auth::{SessionStore, TerminationReason};
use crate::error::ClientError;
use crate::Result;

#[derive(Debug, Deserialize)]
struct RefreshedTokens {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

/// Outcome of handling a `401` before the single retry.
enum Recovery {
    Retry(String),
    GiveUp(ClientError),
}

/// Authenticated request gateway.
///
/// Attaches the session's current access token to every request and, on a
/// `401`, refreshes the token once and replays the request once. Refreshes
/// are serialized: a request that hits `401` while another refresh is in
/// flight waits for it and retries with its result instead of refreshing
/// again.
pub struct AuthGateway {
    backend: Backend,
    session: Arc<SessionStore>,
    refresh_path: String,
    refresh_lock: Mutex<()>,
}

impl AuthGateway {
    pub fn new(backend: Backend, session: Arc<SessionStore>, refresh_path: impl Into<String>) -> Self {
        Self {
            backend,
            session,
            refresh_path: refresh_path.into(),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let sent_with = self.session.access_token().await?;

        match self.backend.send(&request, sent_with.as_deref()).await {
            Ok(response) => {
                if sent_with.is_some() {
                    self.session.confirm_token().await;
                }
                Ok(response)
            }
            Err(err) if err.is_authorization_failure() => {
                debug!(path = %request.path(), "Access token rejected");
                match self.recover(sent_with, err).await? {
                    Recovery::Retry(token) => {
                        let response = self.backend.send(&request, Some(&token)).await?;
                        self.session.confirm_token().await;
                        Ok(response)
                    }
                    Recovery::GiveUp(err) => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Sends `request` and decodes the response body.
    pub async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.send(request).await?.json()
    }

    /// Sends `request`, ignoring any response body.
    pub async fn execute(&self, request: ApiRequest) -> Result<()> {
        self.send(request).await.map(|_| ())
    }

    async fn recover(&self, sent_with: Option<String>, original: ClientError) -> Result<Recovery> {
        let _guard = self.refresh_lock.lock().await;
        let record = self.session.tokens().await?;

        match (record.access_token, sent_with) {
            (Some(current), sent) if sent.as_deref() != Some(current.as_str()) => {
                debug!("Access token already renewed, retrying with it");
                Ok(Recovery::Retry(current))
            }
            (None, Some(_)) => {
                debug!("Session ended while the request was in flight");
                Ok(Recovery::GiveUp(original))
            }
            _ => match record.refresh_token {
                None => {
                    info!("No refresh token, ending session");
                    self.end_session(TerminationReason::NoRefreshToken).await;
                    Ok(Recovery::GiveUp(original))
                }
                Some(refresh) => match self.refresh(&refresh).await {
                    Ok(tokens) => {
                        let access = tokens.access.clone();
                        if self.session.install_refreshed(tokens.access, tokens.refresh).await? {
                            Ok(Recovery::Retry(access))
                        } else {
                            Ok(Recovery::GiveUp(original))
                        }
                    }
                    Err(e) => {
                        info!(error = %e, "Token refresh failed, ending session");
                        self.end_session(TerminationReason::RefreshFailed).await;
                        Ok(Recovery::GiveUp(e))
                    }
                },
            },
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens> {
        let request = ApiRequest::post(&self.refresh_path).body(json!({ "refresh": refresh_token }));
        self.backend.send(&request, None).await?.json()
    }

    async fn end_session(&self, reason: TerminationReason) {
        if let Err(e) = self.session.terminate(reason).await {
            error!(error = %e, "Failed to clear persisted session");
        }
    }
}
