pub mod tenant;
pub mod user;

pub use tenant::{EntityStatus, Tenant, TenantType};
pub use user::{User, UserKind};
