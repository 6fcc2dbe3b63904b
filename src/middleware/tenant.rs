use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::auth::Principal;
use crate::config::{CURRENT_ORG_COOKIE, ORGANIZATION_HEADER};
use crate::error::ApiError;

use super::cookies::read_cookie;

/// Resolve the organization a dashboard request acts on and inject the
/// resulting `TenantContext`. Must run after `dashboard_session`.
pub async fn resolve_tenant(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<Principal>()
        .and_then(Principal::as_end_user)
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let requested = request
        .headers()
        .get(ORGANIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let hint = read_cookie(request.headers(), CURRENT_ORG_COOKIE);

    let tenant = state
        .tenants()
        .resolve_org(&user, requested.as_deref(), hint.as_deref())
        .await?;

    tracing::debug!(
        user_id = %user.id,
        organization_id = %tenant.organization.id,
        role = %tenant.membership.role,
        "tenant context resolved"
    );

    request.extensions_mut().insert(tenant);
    Ok(next.run(request).await)
}
