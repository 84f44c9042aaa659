use thiserror::Error;

/// Errors raised while resolving or enforcing the acting tenant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TenantError {
    /// No tenant id is bound and system mode is not active
    #[error("No tenant ID found in current context")]
    MissingTenantIdentity,

    /// A write or delete targeted a row owned by another tenant
    #[error("Tenant isolation violation on {entity}")]
    TenantIsolationViolation { entity: &'static str },
}

impl TenantError {
    pub fn violation(entity: &'static str) -> Self {
        TenantError::TenantIsolationViolation { entity }
    }
}
