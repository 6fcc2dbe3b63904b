use axum::{extract::State, response::IntoResponse, Extension};

use crate::app::AppState;
use crate::auth::{AdminPrincipal, Principal};
use crate::error::ApiError;
use crate::handlers::end_session;
use crate::middleware::{ApiResponse, ApiResult, SessionToken};
use crate::types::Portal;

/// GET /api/gwi/me
pub async fn me(Extension(principal): Extension<Principal>) -> ApiResult<AdminPrincipal> {
    match principal {
        Principal::GwiAdmin(admin) => Ok(ApiResponse::success(admin)),
        _ => Err(ApiError::forbidden("Not a GWI portal session")),
    }
}

/// POST /api/gwi/logout
pub async fn logout(
    State(state): State<AppState>,
    token: Option<Extension<SessionToken>>,
) -> Result<impl IntoResponse, ApiError> {
    end_session(&state, Portal::Gwi, token.map(|Extension(t)| t)).await
}
