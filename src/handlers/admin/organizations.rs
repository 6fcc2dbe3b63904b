use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::app::AppState;
use crate::audit::AuditEvent;
use crate::auth::Principal;
use crate::database::models::{Organization, PlanTier};
use crate::database::OrganizationStore;
use crate::error::ApiError;
use crate::handlers::{parse_id, require_staff_capability};
use crate::middleware::{ApiResponse, ApiResult};
use crate::types::Portal;

use super::load_organization;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 500;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/admin/organizations - active organizations by slug
pub async fn organizations_list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<ListParams>,
) -> ApiResult<Vec<Organization>> {
    require_staff_capability(&principal, Portal::Admin, "super:organizations:read")?;

    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = params.offset.unwrap_or(0).max(0);
    let organizations = state.store.list_organizations(limit, offset).await?;
    Ok(ApiResponse::success(organizations))
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrganizationRequest {
    pub plan_tier: String,
}

/// PATCH /api/admin/organizations/:id - change the plan tier
pub async fn organization_update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<UpdateOrganizationRequest>,
) -> ApiResult<Organization> {
    let admin = require_staff_capability(&principal, Portal::Admin, "super:organizations:write")?;
    let id = parse_id("id", &id)?;
    let plan_tier: PlanTier = body
        .plan_tier
        .parse()
        .map_err(|e: crate::types::ParseEnumError| ApiError::invalid_field("plan_tier", e.to_string()))?;

    let before = load_organization(&state, id).await?;
    let updated = state
        .store
        .update_plan_tier(id, plan_tier)
        .await?
        .ok_or_else(|| ApiError::not_found("Organization not found"))?;

    state
        .audit()
        .record(
            AuditEvent::new(Portal::Admin, admin.id, "organization.plan_changed", "organization")
                .organization(id)
                .resource(id.to_string())
                .details(json!({ "from": before.plan_tier, "to": plan_tier })),
        )
        .await?;

    Ok(ApiResponse::success(updated))
}
