// handlers/mod.rs - every route below /api runs inside a tenant scope
// established by middleware::tenant_context_middleware.
pub mod health;
pub mod users;
