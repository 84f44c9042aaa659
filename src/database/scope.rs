use serde_json::Value;

use crate::tenant::{TenantContext, TenantError, TenantIdentity, SYSTEM_TENANT};

use super::quote_identifier;

/// Scoping predicate for one data operation:
/// `row.tenant_id == acting tenant OR system mode`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// System mode, every row is visible
    All,
    /// Only rows owned by this tenant are visible
    Tenant(String),
}

impl Scope {
    /// Build the predicate from whatever the tenant context holds right now.
    pub fn current() -> Result<Self, TenantError> {
        Self::from_identity(&TenantContext::snapshot())
    }

    pub fn from_identity(identity: &TenantIdentity) -> Result<Self, TenantError> {
        let tenant = identity.resolve()?;
        if identity.is_system() {
            Ok(Scope::All)
        } else {
            Ok(Scope::Tenant(tenant.to_owned()))
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Scope::All)
    }

    /// Resolved tenant key; `"system"` in system mode
    pub fn acting_tenant(&self) -> &str {
        match self {
            Scope::All => SYSTEM_TENANT,
            Scope::Tenant(tenant) => tenant,
        }
    }

    /// Whether a row owned by `owner` satisfies the predicate
    pub fn admits(&self, owner: Option<&str>) -> bool {
        match self {
            Scope::All => true,
            Scope::Tenant(tenant) => owner == Some(tenant.as_str()),
        }
    }

    /// Render the predicate as a SQL condition whose parameters start at
    /// `$param_index`.
    pub fn to_sql(&self, column: &str, param_index: usize) -> (String, Vec<Value>) {
        match self {
            Scope::All => ("1=1".to_string(), vec![]),
            Scope::Tenant(tenant) => (
                format!("{} = ${}", quote_identifier(column), param_index),
                vec![Value::String(tenant.clone())],
            ),
        }
    }
}
