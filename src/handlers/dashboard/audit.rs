use axum::{
    extract::{Query, State},
    Extension,
};

use crate::app::AppState;
use crate::database::models::AuditLogEntry;
use crate::database::AuditQuery;
use crate::handlers::{require_member_capability, AuditParams};
use crate::middleware::{ApiResponse, ApiResult};
use crate::tenant::TenantContext;

/// GET /api/organizations/current/audit - trail for the current organization only
pub async fn audit_list(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Query(params): Query<AuditParams>,
) -> ApiResult<Vec<AuditLogEntry>> {
    require_member_capability(&tenant, "audit:read")?;

    let query = AuditQuery {
        portal: None,
        organization_id: Some(tenant.organization.id),
        actor_id: params.actor_id,
        limit: params.limit.unwrap_or(AuditQuery::DEFAULT_LIMIT),
    };
    let entries = state.audit().list(&query).await?;
    Ok(ApiResponse::success(entries))
}
