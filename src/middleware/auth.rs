use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::error::ApiError;
use crate::types::Portal;

use super::cookies::read_cookie;

/// Raw session token the request was authenticated with, kept for logout
#[derive(Clone, Debug)]
pub struct SessionToken(pub String);

/// Customer dashboard: `sessionToken` cookie
pub async fn dashboard_session(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authenticate(Portal::Dashboard, state, request, next).await
}

/// Platform admin portal: `adminToken` cookie
pub async fn admin_session(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authenticate(Portal::Admin, state, request, next).await
}

/// GWI data-operations portal: `gwiToken` cookie
pub async fn gwi_session(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authenticate(Portal::Gwi, state, request, next).await
}

/// Resolve the portal's session and inject the freshly loaded principal.
/// Only the portal's own cookie is consulted, so an `adminToken` presented
/// to the GWI portal is simply absent there.
async fn authenticate(
    portal: Portal,
    state: AppState,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(portal, &state, request.headers());

    let principal = state
        .sessions()
        .resolve(portal, token.as_deref())
        .await
        .map_err(|e| {
            tracing::debug!(portal = %portal, path = %request.uri().path(), "authentication failed: {}", e);
            ApiError::from(e)
        })?;

    request.extensions_mut().insert(principal);
    if let Some(token) = token {
        request.extensions_mut().insert(SessionToken(token));
    }

    Ok(next.run(request).await)
}

/// Portal cookie first, then `Authorization: Bearer` for non-browser callers
fn extract_token(portal: Portal, state: &AppState, headers: &HeaderMap) -> Option<String> {
    read_cookie(headers, state.config.session.cookie_name(portal)).or_else(|| bearer_token(headers))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
