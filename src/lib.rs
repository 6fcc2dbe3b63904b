//! Authorization and tenancy core shared by the customer dashboard, the
//! platform admin portal and the GWI data-operations portal.
//!
//! Every request goes through the same chain: session lookup for the portal,
//! tenant resolution for organization-scoped routes, then a capability check.

pub mod app;
pub mod audit;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod features;
pub mod handlers;
pub mod middleware;
pub mod tenant;
pub mod types;

pub use app::{router, AppState};
pub use error::ApiError;
pub use types::{Portal, PrincipalKind};
