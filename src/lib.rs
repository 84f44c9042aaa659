pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod server;
pub mod services;
pub mod tenant;

pub use database::{EntityBackend, EntityMeta, Scope, StoreError, TenantAwareEntity, TenantScopedStore};
pub use tenant::{TenantContext, TenantError, TenantIdentity};
