use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use support_core::config;
use support_core::database::{models::User, DatabaseManager, PgBackend, TenantScopedStore};
use support_core::middleware::BoundaryState;
use support_core::server::{app, AppState};
use support_core::services::{PgTenantDirectory, TenantDirectory};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, APP_ENV, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::config();
    tracing::info!("Starting support-core in {:?} mode", config.environment);
    if support_core::is_production!() && config.security.trust_identity_headers {
        tracing::warn!("identity headers are trusted in production; the gateway must strip client-supplied values");
    }

    let pool = DatabaseManager::pool().await.context("failed to connect to database")?;

    let directory: Option<Arc<dyn TenantDirectory>> = if config.tenancy.enforce_active_tenants {
        Some(Arc::new(PgTenantDirectory::new(pool.clone())))
    } else {
        None
    };

    let state = AppState {
        users: TenantScopedStore::new(PgBackend::<User>::new(pool)?),
        check_database: true,
    };
    let boundary = BoundaryState {
        directory,
        trust_identity_headers: config.security.trust_identity_headers,
        audit: config.security.enable_audit_logging,
    };

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("support-core listening on http://{}", bind_addr);

    axum::serve(listener, app(state, boundary))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    DatabaseManager::close().await;
    Ok(())
}
