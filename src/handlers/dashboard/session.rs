use axum::{
    extract::State,
    response::{AppendHeaders, IntoResponse},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::{EndUser, Principal};
use crate::config::{LOCALE_COOKIE, PREFERENCE_COOKIE_MAX_AGE_DAYS};
use crate::error::ApiError;
use crate::handlers::end_session;
use crate::middleware::cookies::{preference_cookie, set_cookie};
use crate::middleware::{ApiResponse, ApiResult, SessionToken};
use crate::tenant::TenantContext;
use crate::types::Portal;

use super::end_user;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: EndUser,
    pub organizations: Vec<TenantContext>,
}

/// GET /api/me - current user and every organization they can act on
pub async fn me(State(state): State<AppState>, Extension(principal): Extension<Principal>) -> ApiResult<MeResponse> {
    let user = end_user(&principal)?;
    let organizations = state.tenants().list_organizations(user).await?;
    Ok(ApiResponse::success(MeResponse {
        user: user.clone(),
        organizations,
    }))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    token: Option<Extension<SessionToken>>,
) -> Result<impl IntoResponse, ApiError> {
    end_session(&state, Portal::Dashboard, token.map(|Extension(t)| t)).await
}

#[derive(Debug, Deserialize)]
pub struct LocaleRequest {
    pub locale: String,
}

/// PUT /api/preferences/locale - persists the UI language in a cookie
pub async fn locale_set(
    State(state): State<AppState>,
    Json(body): Json<LocaleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let locale = body.locale.trim();
    if !is_valid_locale(locale) {
        return Err(ApiError::invalid_field("locale", "expected a language tag such as 'en' or 'pt-BR'"));
    }

    let cookie = preference_cookie(
        LOCALE_COOKIE,
        locale,
        PREFERENCE_COOKIE_MAX_AGE_DAYS,
        state.config.security.secure_cookies,
    );
    Ok((
        AppendHeaders([set_cookie(&cookie)]),
        Json(serde_json::json!({ "locale": locale })),
    ))
}

/// BCP 47-ish: 2-3 letter language, optional alphanumeric subtags
fn is_valid_locale(locale: &str) -> bool {
    let mut parts = locale.split(['-', '_']);
    let language_ok = parts
        .next()
        .is_some_and(|l| (2..=3).contains(&l.len()) && l.chars().all(|c| c.is_ascii_alphabetic()));
    language_ok
        && parts.all(|p| (2..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphanumeric()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_tags() {
        assert!(is_valid_locale("en"));
        assert!(is_valid_locale("pt-BR"));
        assert!(is_valid_locale("zh_Hant"));
        assert!(!is_valid_locale(""));
        assert!(!is_valid_locale("english"));
        assert!(!is_valid_locale("en-"));
        assert!(!is_valid_locale("en;path=/"));
    }
}
