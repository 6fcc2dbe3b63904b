pub mod permission;
pub mod principal;
pub mod session;
pub mod token;

pub use permission::{admin_can, org_role_can, Authorize};
pub use principal::{AdminPrincipal, AdminRole, EndUser, OrgRole, Principal};
pub use session::{AuthError, IssuedSession, SessionResolver};
