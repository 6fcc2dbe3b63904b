pub mod auth;
pub mod cookies;
pub mod response;
pub mod tenant;

pub use auth::{admin_session, dashboard_session, gwi_session, SessionToken};
pub use response::{ApiResponse, ApiResult};
pub use tenant::resolve_tenant;
