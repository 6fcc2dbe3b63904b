use axum::{extract::State, response::IntoResponse, Extension};

use crate::app::AppState;
use crate::auth::{AdminPrincipal, Principal};
use crate::error::ApiError;
use crate::handlers::end_session;
use crate::middleware::{ApiResponse, ApiResult, SessionToken};
use crate::types::Portal;

/// GET /api/admin/me
pub async fn me(Extension(principal): Extension<Principal>) -> ApiResult<AdminPrincipal> {
    match principal {
        Principal::SuperAdmin(admin) => Ok(ApiResponse::success(admin)),
        _ => Err(ApiError::forbidden("Not an admin portal session")),
    }
}

/// POST /api/admin/logout
pub async fn logout(
    State(state): State<AppState>,
    token: Option<Extension<SessionToken>>,
) -> Result<impl IntoResponse, ApiError> {
    end_session(&state, Portal::Admin, token.map(|Extension(t)| t)).await
}
