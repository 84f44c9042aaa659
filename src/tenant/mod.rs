pub mod context;
pub mod error;
pub mod identity;

pub use context::{ContextGuard, TenantContext};
pub use error::TenantError;
pub use identity::{TenantIdentity, SYSTEM_TENANT};
