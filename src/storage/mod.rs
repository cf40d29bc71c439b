//! Durable token storage
//!
//! Holds the four persisted session slots. Only the session store writes
//! here; everything else reads through it.

mod file;
mod memory;

pub use file::FileTokenStore;
pub use memory::MemoryTokenStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{StorageBackend, StorageConfig};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    AccessToken,
    RefreshToken,
    UserEmail,
    UserRole,
}

impl StorageKey {
    pub const ALL: [StorageKey; 4] = [
        StorageKey::AccessToken,
        StorageKey::RefreshToken,
        StorageKey::UserEmail,
        StorageKey::UserRole,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::AccessToken => "access_token",
            StorageKey::RefreshToken => "refresh_token",
            StorageKey::UserEmail => "user_email",
            StorageKey::UserRole => "user_role",
        }
    }
}

/// Snapshot of all persisted slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_role: Option<String>,
}

impl TokenRecord {
    pub fn get(&self, key: StorageKey) -> Option<&str> {
        match key {
            StorageKey::AccessToken => self.access_token.as_deref(),
            StorageKey::RefreshToken => self.refresh_token.as_deref(),
            StorageKey::UserEmail => self.user_email.as_deref(),
            StorageKey::UserRole => self.user_role.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        StorageKey::ALL.iter().all(|key| self.get(*key).is_none())
    }
}

/// Durable key-value area for the session slots.
///
/// `save` replaces the whole record and `clear` empties every slot at once;
/// there is no per-slot removal.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self) -> Result<TokenRecord>;

    async fn save(&self, record: &TokenRecord) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

pub fn build_store(config: &StorageConfig) -> Result<Arc<dyn TokenStore>> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryTokenStore::new())),
        StorageBackend::File => Ok(Arc::new(FileTokenStore::new(config.resolved_path()?))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_slots() {
        assert!(TokenRecord::default().is_empty());

        let record = TokenRecord {
            access_token: Some("T1".into()),
            user_role: Some("donor".into()),
            ..Default::default()
        };
        assert_eq!(record.get(StorageKey::AccessToken), Some("T1"));
        assert_eq!(record.get(StorageKey::RefreshToken), None);
        assert!(!record.is_empty());
    }

    #[test]
    fn test_record_uses_slot_names_on_disk() {
        let record = TokenRecord {
            access_token: Some("T1".into()),
            refresh_token: Some("R1".into()),
            user_email: Some("a@b.com".into()),
            user_role: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        for key in [StorageKey::AccessToken, StorageKey::RefreshToken, StorageKey::UserEmail] {
            assert!(json.get(key.as_str()).is_some(), "missing {}", key.as_str());
        }
        assert!(json.get(StorageKey::UserRole.as_str()).is_none());
    }
}
