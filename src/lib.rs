pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod storage;

use std::sync::Arc;

pub use error::{ClientError, ErrorKind, FieldErrors};
pub type Result<T> = std::result::Result<T, ClientError>;
pub use config::Settings;

pub use api::{CampaignsApi, DonationsApi, Profile, Role, UsersApi, VolunteersApi};
pub use auth::{Session, SessionEvent, SessionState, SessionStore, TerminationReason};
pub use gateway::{ApiRequest, ApiResponse, AuthGateway, Backend};
pub use storage::{FileTokenStore, MemoryTokenStore, TokenRecord, TokenStore};

/// Session context shared by everything that talks to the backend.
///
/// Created once at application start; owns the session store and the
/// gateway built on it. Cloning shares the same session.
#[derive(Clone)]
pub struct NgoClient {
    pub config: Arc<Settings>,
    session: Arc<SessionStore>,
    gateway: Arc<AuthGateway>,
}

impl NgoClient {
    /// Builds the client with the token store named in `config.storage`.
    pub fn new(config: Settings) -> Result<Self> {
        let tokens = storage::build_store(&config.storage)?;
        Self::with_store(config, tokens)
    }

    pub fn with_store(config: Settings, tokens: Arc<dyn TokenStore>) -> Result<Self> {
        let backend = Backend::new(&config.api.base_url)?;
        let session = Arc::new(SessionStore::new(
            backend.clone(),
            config.endpoints.clone(),
            tokens,
        ));
        let gateway = Arc::new(AuthGateway::new(
            backend,
            session.clone(),
            config.endpoints.refresh_token.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            session,
            gateway,
        })
    }

    /// Builds the client and restores any persisted session.
    pub async fn start(config: Settings) -> Result<Self> {
        let client = Self::new(config)?;
        client.session.initialize().await?;
        Ok(client)
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn gateway(&self) -> &Arc<AuthGateway> {
        &self.gateway
    }

    pub fn campaigns(&self) -> CampaignsApi<'_> {
        CampaignsApi::new(&self.gateway, &self.config.endpoints.campaigns)
    }

    pub fn donations(&self) -> DonationsApi<'_> {
        DonationsApi::new(&self.gateway, &self.config.endpoints.my_donations)
    }

    pub fn volunteers(&self) -> VolunteersApi<'_> {
        VolunteersApi::new(&self.gateway, &self.config.endpoints.volunteer)
    }

    pub fn users(&self) -> UsersApi<'_> {
        UsersApi::new(&self.gateway, &self.config.endpoints.admin_users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_clone_shares_session() {
        let config = Settings::for_base_url("http://127.0.0.1:9").expect("Failed to load test config");
        let client = NgoClient::new(config).expect("Failed to build client");
        let cloned = client.clone();

        assert!(Arc::ptr_eq(&client.config, &cloned.config));
        assert!(Arc::ptr_eq(client.session(), cloned.session()));
        assert!(Arc::ptr_eq(client.gateway().session(), client.session()));
    }

    #[test]
    fn test_client_rejects_bad_base_url() {
        let config = Settings::for_base_url("::not-a-url::").expect("Failed to load test config");
        match NgoClient::new(config) {
            Err(e) => assert_eq!(e.kind(), ErrorKind::Config),
            Ok(_) => panic!("expected a configuration error"),
        }
    }

    #[tokio::test]
    async fn test_start_without_tokens_is_anonymous() {
        let config = Settings::for_base_url("http://127.0.0.1:9").expect("Failed to load test config");
        let client = NgoClient::start(config).await.expect("Failed to start client");
        assert_eq!(client.session().state().await, SessionState::Anonymous);
    }
}
