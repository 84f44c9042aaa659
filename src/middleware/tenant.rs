use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::{info, warn, Instrument};

use crate::error::ApiError;
use crate::services::TenantDirectory;
use crate::tenant::{TenantContext, TenantIdentity};

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const SYSTEM_HEADER: &str = "x-system-context";
pub const USER_HEADER: &str = "x-user-id";

/// Already-authenticated caller, inserted as a request extension by the
/// authentication layer in front of this middleware.
#[derive(Clone, Debug, Default)]
pub struct Principal {
    pub tenant_id: Option<String>,
    pub system: bool,
    pub user: Option<String>,
}

impl Principal {
    pub fn identity(&self) -> TenantIdentity {
        let mut identity = TenantIdentity::empty().with_system(self.system);
        if let Some(tenant_id) = &self.tenant_id {
            identity = identity.with_tenant_id(tenant_id.clone());
        }
        if let Some(user) = &self.user {
            identity = identity.with_user(user.clone());
        }
        identity
    }
}

/// Settings for the tenant boundary
#[derive(Clone, Default)]
pub struct BoundaryState {
    /// When set, only tenants registered as ACTIVE may be bound
    pub directory: Option<Arc<dyn TenantDirectory>>,
    pub trust_identity_headers: bool,
    pub audit: bool,
}

/// Establish the tenant context for one request and run the rest of the
/// request inside it. The context is dropped when the handler finishes,
/// fails or the connection is cancelled.
pub async fn tenant_context_middleware(
    State(boundary): State<BoundaryState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = resolve_identity(&boundary, &request)?;

    if let (Some(directory), Some(key)) = (&boundary.directory, identity.tenant_id()) {
        if !identity.is_system() {
            match directory.find(key).await? {
                Some(tenant) if tenant.is_active() => {}
                _ => {
                    warn!("Tenant validation failed: tenant '{}' not found or inactive", key);
                    return Err(ApiError::forbidden("Tenant is not active or does not exist"));
                }
            }
        }
    }

    let span = tracing::info_span!(
        "tenant_scope",
        tenant = identity.tenant_id().unwrap_or("-"),
        system = identity.is_system(),
        user = identity.user().unwrap_or("-")
    );
    if boundary.audit {
        info!(parent: &span, method = %request.method(), path = %request.uri().path(), "tenant context established");
    }

    let response = TenantContext::scope(identity, next.run(request))
        .instrument(span)
        .await;
    Ok(response)
}

fn resolve_identity(boundary: &BoundaryState, request: &Request) -> Result<TenantIdentity, ApiError> {
    if let Some(principal) = request.extensions().get::<Principal>() {
        return Ok(principal.identity());
    }
    if boundary.trust_identity_headers {
        return identity_from_headers(request.headers());
    }
    Ok(TenantIdentity::empty())
}

fn identity_from_headers(headers: &HeaderMap) -> Result<TenantIdentity, ApiError> {
    let mut identity = TenantIdentity::empty();

    if let Some(value) = headers.get(TENANT_HEADER) {
        let tenant_id = value
            .to_str()
            .map_err(|_| ApiError::bad_request("Invalid X-Tenant-Id header"))?
            .trim();
        if !tenant_id.is_empty() {
            identity = identity.with_tenant_id(tenant_id);
        }
    }

    if let Some(value) = headers.get(SYSTEM_HEADER) {
        let system = match value.to_str().map(str::trim) {
            Ok("true") | Ok("1") => true,
            Ok("false") | Ok("0") => false,
            _ => return Err(ApiError::bad_request("Invalid X-System-Context header")),
        };
        identity = identity.with_system(system);
    }

    if let Some(value) = headers.get(USER_HEADER) {
        let user = value
            .to_str()
            .map_err(|_| ApiError::bad_request("Invalid X-User-Id header"))?
            .trim();
        if !user.is_empty() {
            identity = identity.with_user(user);
        }
    }

    Ok(identity)
}
