use serde::{Deserialize, Serialize};

use super::error::TenantError;

/// Tenant key reported when system mode is active, and the owner stamped on
/// rows created while no tenant is bound.
pub const SYSTEM_TENANT: &str = "system";

/// Which tenant, or system-admin, is acting for the current unit of work.
///
/// The tenant id and the system flag are independent bindings. When the system
/// flag is set it wins: the identity resolves to [`SYSTEM_TENANT`] even if a
/// tenant id is also recorded (kept for audit logging only).
///
/// `user` names the authenticated principal, if any. It never affects scoping
/// and is only stamped into `created_by` / `updated_by`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantIdentity {
    tenant_id: Option<String>,
    system: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<String>,
}

impl TenantIdentity {
    /// Identity acting as a concrete tenant
    pub fn tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            system: false,
            user: None,
        }
    }

    /// Identity acting in system-admin mode
    pub fn system() -> Self {
        Self {
            tenant_id: None,
            system: true,
            user: None,
        }
    }

    /// Nothing bound
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_system(mut self, system: bool) -> Self {
        self.system = system;
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn is_system(&self) -> bool {
        self.system
    }

    pub fn has_tenant(&self) -> bool {
        self.tenant_id.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.tenant_id.is_none() && !self.system
    }

    /// Resolve the effective tenant key.
    pub fn resolve(&self) -> Result<&str, TenantError> {
        if self.system {
            return Ok(SYSTEM_TENANT);
        }
        self.tenant_id
            .as_deref()
            .ok_or(TenantError::MissingTenantIdentity)
    }
}
