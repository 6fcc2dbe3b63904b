// handlers/mod.rs - one module per portal
//
// Dashboard → end users, session via `sessionToken`, most routes tenant-scoped
// Admin     → platform staff, session via `adminToken`, `super:*` capabilities
// GWI       → data operations staff, session via `gwiToken`, `gwi:*` capabilities

pub mod admin;
pub mod dashboard;
pub mod gwi;

use axum::response::{AppendHeaders, IntoResponse};
use serde::Deserialize;

use crate::app::AppState;
use crate::auth::{AdminPrincipal, Authorize, Principal};
use crate::error::ApiError;
use crate::middleware::cookies::{removal_cookie, set_cookie};
use crate::middleware::SessionToken;
use crate::tenant::TenantContext;
use crate::types::Portal;

/// `?limit=` for audit listings; clamped by the store
#[derive(Debug, Default, Deserialize)]
pub struct AuditParams {
    pub limit: Option<i64>,
    pub actor_id: Option<uuid::Uuid>,
    pub organization_id: Option<uuid::Uuid>,
}

/// The caller's membership must hold `capability` in the current organization
pub fn require_member_capability(tenant: &TenantContext, capability: &str) -> Result<(), ApiError> {
    if tenant.membership.can(capability) {
        return Ok(());
    }
    tracing::info!(
        user_id = %tenant.membership.user_id,
        organization_id = %tenant.organization.id,
        role = %tenant.membership.role,
        capability,
        "capability denied"
    );
    Err(ApiError::forbidden(format!("Missing capability '{}'", capability)))
}

/// The caller must be staff on `portal` and hold `capability`
pub fn require_staff_capability<'p>(
    principal: &'p Principal,
    portal: Portal,
    capability: &str,
) -> Result<&'p AdminPrincipal, ApiError> {
    let admin = match (portal, principal) {
        (Portal::Admin, Principal::SuperAdmin(admin)) | (Portal::Gwi, Principal::GwiAdmin(admin)) => admin,
        _ => return Err(ApiError::forbidden("Not a staff session for this portal")),
    };
    if admin.can(capability) {
        return Ok(admin);
    }
    tracing::info!(admin_id = %admin.id, role = %admin.role, portal = %portal, capability, "capability denied");
    Err(ApiError::forbidden(format!("Missing capability '{}'", capability)))
}

/// Path ids are parsed by hand so a malformed id still gets the JSON error body
pub fn parse_id(field: &str, value: &str) -> Result<uuid::Uuid, ApiError> {
    uuid::Uuid::parse_str(value.trim()).map_err(|_| ApiError::invalid_field(field, "expected a UUID"))
}

/// Shared logout: drop the stored session and expire the portal cookie
pub async fn end_session(
    state: &AppState,
    portal: Portal,
    token: Option<SessionToken>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(SessionToken(token)) = token {
        state.sessions().revoke(portal, &token).await?;
    }
    let cookie = removal_cookie(state.config.session.cookie_name(portal));
    Ok((
        AppendHeaders([set_cookie(&cookie)]),
        axum::Json(serde_json::json!({ "logged_out": true })),
    ))
}
