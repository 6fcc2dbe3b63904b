use axum::{
    extract::{Query, State},
    Extension,
};

use crate::app::AppState;
use crate::auth::Principal;
use crate::database::models::AuditLogEntry;
use crate::database::AuditQuery;
use crate::handlers::{require_staff_capability, AuditParams};
use crate::middleware::{ApiResponse, ApiResult};
use crate::types::Portal;

/// GET /api/gwi/audit - entries written through the GWI portal
pub async fn audit_list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<AuditParams>,
) -> ApiResult<Vec<AuditLogEntry>> {
    require_staff_capability(&principal, Portal::Gwi, "gwi:audit:read")?;

    let query = AuditQuery {
        portal: Some(Portal::Gwi),
        organization_id: params.organization_id,
        actor_id: params.actor_id,
        limit: params.limit.unwrap_or(AuditQuery::DEFAULT_LIMIT),
    };
    let entries = state.audit().list(&query).await?;
    Ok(ApiResponse::success(entries))
}
