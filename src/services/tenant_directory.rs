use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Row};
use tokio::sync::RwLock;

use crate::database::models::Tenant;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Malformed tenant record: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Lookup of registered tenants, consulted by the request boundary before a
/// tenant identity is bound.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn find(&self, key: &str) -> Result<Option<Tenant>, DirectoryError>;
}

#[derive(Default)]
pub struct MemoryTenantDirectory {
    tenants: RwLock<HashMap<String, Tenant>>,
}

impl MemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, tenant: Tenant) {
        self.tenants.write().await.insert(tenant.key(), tenant);
    }
}

#[async_trait]
impl TenantDirectory for MemoryTenantDirectory {
    async fn find(&self, key: &str) -> Result<Option<Tenant>, DirectoryError> {
        Ok(self.tenants.read().await.get(key).cloned())
    }
}

/// Reads the system `tenant` table
pub struct PgTenantDirectory {
    pool: PgPool,
}

impl PgTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantDirectory for PgTenantDirectory {
    async fn find(&self, key: &str) -> Result<Option<Tenant>, DirectoryError> {
        let row = sqlx::query(
            r#"SELECT row_to_json(t) AS row FROM (SELECT * FROM "tenant" WHERE "id"::text = $1) t"#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let value: Value = row.try_get("row")?;
                Ok(Some(serde_json::from_value(value)?))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{EntityStatus, TenantType};

    #[tokio::test]
    async fn memory_directory_finds_registered_tenants() {
        let directory = MemoryTenantDirectory::new();
        let mut tenant = Tenant::new("Globex", TenantType::Paid);
        tenant.status = EntityStatus::Suspended;
        let key = tenant.key();
        directory.register(tenant).await;

        let found = directory.find(&key).await.unwrap().unwrap();
        assert!(!found.is_active());
        assert!(directory.find("unknown").await.unwrap().is_none());
    }
}
