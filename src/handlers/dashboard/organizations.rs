use axum::{
    extract::{Path, Query, State},
    response::{AppendHeaders, IntoResponse},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::{permission::org_role_capabilities, Principal};
use crate::config::{CURRENT_ORG_COOKIE, PREFERENCE_COOKIE_MAX_AGE_DAYS};
use crate::error::ApiError;
use crate::features::FeatureDecision;
use crate::handlers::require_member_capability;
use crate::middleware::cookies::{preference_cookie, set_cookie};
use crate::middleware::{ApiResponse, ApiResult};
use crate::tenant::TenantContext;

use super::end_user;

/// GET /api/organizations - organizations the user belongs to, fallback order
pub async fn organizations_list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Vec<TenantContext>> {
    let user = end_user(&principal)?;
    let organizations = state.tenants().list_organizations(user).await?;
    Ok(ApiResponse::success(organizations))
}

#[derive(Debug, Deserialize)]
pub struct SwitchOrganizationRequest {
    pub organization_id: String,
}

/// PUT /api/organizations/current - switch organization.
/// Membership is checked strictly before the `currentOrgId` cookie is written.
pub async fn organization_switch(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<SwitchOrganizationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = end_user(&principal)?;
    let tenant = state
        .tenants()
        .resolve_org(user, Some(&body.organization_id), None)
        .await?;

    let cookie = preference_cookie(
        CURRENT_ORG_COOKIE,
        &tenant.organization.id.to_string(),
        PREFERENCE_COOKIE_MAX_AGE_DAYS,
        state.config.security.secure_cookies,
    );
    tracing::info!(user_id = %user.id, organization_id = %tenant.organization.id, "organization switched");

    Ok((AppendHeaders([set_cookie(&cookie)]), Json(tenant)))
}

#[derive(Debug, Serialize)]
pub struct CurrentOrganization {
    #[serde(flatten)]
    pub tenant: TenantContext,
    pub capabilities: Vec<&'static str>,
}

/// GET /api/organizations/current - resolved organization, role and capabilities
pub async fn organization_current(Extension(tenant): Extension<TenantContext>) -> ApiResult<CurrentOrganization> {
    require_member_capability(&tenant, "org:read")?;
    let capabilities = org_role_capabilities(tenant.membership.role);
    Ok(ApiResponse::success(CurrentOrganization { tenant, capabilities }))
}

#[derive(Debug, Deserialize)]
pub struct FeatureUsageParams {
    pub usage: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct FeatureCheck {
    #[serde(flatten)]
    pub decision: FeatureDecision,
    /// Present when the caller passed `?usage=N`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permitted: Option<bool>,
}

/// GET /api/organizations/current/features/:key - gate decision for the current organization
pub async fn feature_get(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(key): Path<String>,
    Query(params): Query<FeatureUsageParams>,
) -> ApiResult<FeatureCheck> {
    require_member_capability(&tenant, "features:read")?;
    let decision = state.features().resolve(&tenant.organization, &key).await?;
    let permitted = params.usage.map(|usage| decision.permits(usage));
    Ok(ApiResponse::success(FeatureCheck { decision, permitted }))
}
