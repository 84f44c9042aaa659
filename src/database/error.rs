use thiserror::Error;

use crate::tenant::TenantError;

/// Errors from tenant-scoped data access
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Tenant(#[from] TenantError),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl StoreError {
    pub fn tenant_error(&self) -> Option<&TenantError> {
        match self {
            StoreError::Tenant(e) => Some(e),
            _ => None,
        }
    }
}
