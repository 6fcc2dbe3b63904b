use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app::AppState;
use crate::audit::AuditEvent;
use crate::auth::Principal;
use crate::database::models::{FeatureLimit, FeatureOverride};
use crate::database::FeatureStore;
use crate::error::ApiError;
use crate::features::FeatureDecision;
use crate::handlers::{parse_id, require_staff_capability};
use crate::middleware::{ApiResponse, ApiResult};
use crate::types::Portal;

use super::load_organization;

#[derive(Debug, Serialize)]
pub struct FeatureStatus {
    pub decision: FeatureDecision,
    #[serde(rename = "override")]
    pub feature_override: Option<FeatureOverride>,
}

/// GET /api/admin/organizations/:id/features/:key - decision plus the raw override
pub async fn feature_get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((id, key)): Path<(String, String)>,
) -> ApiResult<FeatureStatus> {
    require_staff_capability(&principal, Portal::Admin, "super:features:read")?;
    let organization = load_organization(&state, parse_id("id", &id)?).await?;

    let decision = state.features().resolve(&organization, &key).await?;
    let feature_override = state.store.find_override(organization.id, &key).await?;
    Ok(ApiResponse::success(FeatureStatus {
        decision,
        feature_override,
    }))
}

/// Omitted `enabled` keeps enablement on the plan/default chain;
/// `unbounded: true` wins over `limit`.
#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub unbounded: bool,
}

impl OverrideRequest {
    fn limit(&self) -> Option<FeatureLimit> {
        if self.unbounded {
            Some(FeatureLimit::Unbounded)
        } else {
            self.limit.map(FeatureLimit::Limited)
        }
    }
}

/// PUT /api/admin/organizations/:id/features/:key - create or replace an override
pub async fn feature_override_set(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((id, key)): Path<(String, String)>,
    Json(body): Json<OverrideRequest>,
) -> ApiResult<FeatureOverride> {
    let admin = require_staff_capability(&principal, Portal::Admin, "super:features:write")?;
    let organization = load_organization(&state, parse_id("id", &id)?).await?;

    if body.enabled.is_none() && body.limit().is_none() {
        return Err(ApiError::bad_request("Override must set 'enabled', 'limit' or 'unbounded'"));
    }

    let feature_override = state
        .features()
        .set_override(organization.id, &key, body.enabled, body.limit(), Some(admin.id))
        .await?;

    state
        .audit()
        .record(
            AuditEvent::new(Portal::Admin, admin.id, "feature.override_set", "feature")
                .organization(organization.id)
                .resource(key.clone())
                .details(json!({ "enabled": body.enabled, "limit": body.limit() })),
        )
        .await?;

    Ok(ApiResponse::success(feature_override))
}

/// DELETE /api/admin/organizations/:id/features/:key - back to plan/default resolution
pub async fn feature_override_clear(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((id, key)): Path<(String, String)>,
) -> ApiResult<()> {
    let admin = require_staff_capability(&principal, Portal::Admin, "super:features:write")?;
    let organization = load_organization(&state, parse_id("id", &id)?).await?;

    if !state.features().clear_override(organization.id, &key).await? {
        return Err(ApiError::not_found(format!("No override for '{}'", key)));
    }

    state
        .audit()
        .record(
            AuditEvent::new(Portal::Admin, admin.id, "feature.override_cleared", "feature")
                .organization(organization.id)
                .resource(key),
        )
        .await?;

    Ok(ApiResponse::<()>::no_content())
}
