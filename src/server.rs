use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{config, SecurityConfig};
use crate::database::{models::User, TenantScopedStore};
use crate::handlers;
use crate::middleware::{tenant_context_middleware, BoundaryState};

/// Shared handler state. Stores are stateless and cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub users: TenantScopedStore<User>,
    pub check_database: bool,
}

pub fn app(state: AppState, boundary: BoundaryState) -> Router {
    let mut router = Router::new()
        // Public
        .route("/health", get(handlers::health::health))
        // Tenant-scoped API
        .merge(api_routes(boundary))
        .layer(cors_layer(&config().security));

    if config().api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state)
}

fn api_routes(boundary: BoundaryState) -> Router<AppState> {
    use handlers::users;

    Router::new()
        .route("/api/users", get(users::list).post(users::save))
        .route("/api/users/count", get(users::count))
        .route("/api/users/:id", get(users::show).delete(users::delete))
        .route_layer(from_fn_with_state(boundary, tenant_context_middleware))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
