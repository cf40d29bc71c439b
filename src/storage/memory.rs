use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{TokenRecord, TokenStore};
use crate::Result;

/// Process-lifetime store, for tests and `storage.backend = "memory"`.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    record: RwLock<TokenRecord>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: TokenRecord) -> Self {
        Self {
            record: RwLock::new(record),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<TokenRecord> {
        Ok(self.record.read().await.clone())
    }

    async fn save(&self, record: &TokenRecord) -> Result<()> {
        *self.record.write().await = record.clone();
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.record.write().await = TokenRecord::default();
        Ok(())
    }
}
