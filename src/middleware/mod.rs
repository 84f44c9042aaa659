pub mod response;
pub mod tenant;

pub use response::{ApiResponse, ApiResult};
pub use tenant::{tenant_context_middleware, BoundaryState, Principal, SYSTEM_HEADER, TENANT_HEADER, USER_HEADER};
