use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use config::builder::DefaultState;
use directories::ProjectDirs;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const SESSION_FILE: &str = "session.json";

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
}

/// Backend paths, relative to `api.base_url`.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EndpointsConfig {
    pub login: String,
    pub refresh_token: String,
    pub register: String,
    pub verify_email: String,
    pub resend_otp: String,
    pub logout: String,
    pub profile: String,
    pub change_password: String,
    pub my_donations: String,
    pub campaigns: String,
    pub volunteer: String,
    pub admin_users: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            login: "/api/user/token/".into(),
            refresh_token: "/api/user/token/refresh/".into(),
            register: "/api/user/register/".into(),
            verify_email: "/api/user/verify-email/".into(),
            resend_otp: "/api/user/resend-otp/".into(),
            logout: "/api/user/logout/".into(),
            profile: "/api/user/profile/".into(),
            change_password: "/api/user/change-password/".into(),
            my_donations: "/api/user/profile/donations/".into(),
            campaigns: "/api/projects/campaigns/".into(),
            volunteer: "/api/volunteer/".into(),
            admin_users: "/api/user/admin/users/".into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    /// Token file location: the configured path, or `session.json` in the
    /// platform data directory.
    pub fn resolved_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        ProjectDirs::from("org", "NGOConnect", "ngoconnect")
            .map(|dirs| dirs.data_dir().join(SESSION_FILE))
            .ok_or_else(|| ConfigError::Message("no home directory for token storage".into()))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub environment: String,
    pub api: ApiConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("environment", "development")?
        .set_default("api.base_url", DEFAULT_BASE_URL)
}

fn environment() -> Environment {
    // E.g., `NGO_API__BASE_URL=https://api.example.org` sets `Settings.api.base_url`
    Environment::with_prefix("ngo")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(environment())
            .build()?
            .try_deserialize()
    }

    /// Loads an explicit config file instead of the `config/` directory.
    /// Environment variables still take precedence.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        defaults()?
            .add_source(File::from(path))
            .add_source(environment())
            .build()?
            .try_deserialize()
    }

    /// Defaults only, pointed at `base_url` with in-memory token storage.
    /// Reads neither files nor the environment.
    pub fn for_base_url(base_url: &str) -> Result<Self, ConfigError> {
        defaults()?
            .set_override("environment", "test")?
            .set_override("api.base_url", base_url)?
            .set_override("storage.backend", "memory")?
            .build()?
            .try_deserialize()
    }
}
