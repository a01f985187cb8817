use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{PromoteError, Result};

/// A stored status value and when it expires
#[derive(Debug, Clone, PartialEq)]
pub struct StoredValue {
    pub value: Value,
    pub expiration: Option<DateTime<Utc>>,
}

/// Keyed status persistence with per-record retention
#[async_trait]
pub trait StatusStore: Send + Sync + Debug {
    async fn get(&self, hash: &str) -> Result<Option<StoredValue>>;

    async fn put(&self, hash: &str, value: Value, ttl: Duration) -> Result<()>;

    async fn delete(&self, hash: &str) -> Result<()>;
}

/// Process-local status store; expired records read as absent
#[derive(Debug, Clone, Default)]
pub struct InMemoryStatusStore {
    records: Arc<DashMap<String, StoredValue>>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn get(&self, hash: &str) -> Result<Option<StoredValue>> {
        let now = Utc::now();
        let expired = match self.records.get(hash) {
            None => return Ok(None),
            Some(record) => match record.expiration {
                Some(expiration) if expiration <= now => true,
                _ => return Ok(Some(record.clone())),
            },
        };
        if expired {
            self.records.remove(hash);
        }
        Ok(None)
    }

    async fn put(&self, hash: &str, value: Value, ttl: Duration) -> Result<()> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| PromoteError::Storage(format!("invalid status ttl: {e}")))?;
        self.records.insert(
            hash.to_string(),
            StoredValue {
                value,
                expiration: Some(Utc::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, hash: &str) -> Result<()> {
        self.records.remove(hash);
        Ok(())
    }
}
