use axum::{
    body::{Body, Bytes},
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, Method},
    response::Response,
    Extension,
};
use serde_json::json;
use url::Url;

use crate::app::AppState;
use crate::audit::AuditEvent;
use crate::auth::Principal;
use crate::error::ApiError;
use crate::handlers::require_staff_capability;
use crate::types::Portal;

/// Request headers passed through to the upstream API
const FORWARDED_HEADERS: [header::HeaderName; 3] = [header::ACCEPT, header::CONTENT_TYPE, header::ACCEPT_LANGUAGE];

/// ANY /api/gwi/proxy/*path - forward to `GWI_API_BASE_URL`.
/// Reads need `gwi:datasources:read`, anything else `gwi:datasources:write`.
pub async fn proxy(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let is_read = is_read_method(&method);
    let capability = if is_read {
        "gwi:datasources:read"
    } else {
        "gwi:datasources:write"
    };
    let admin = require_staff_capability(&principal, Portal::Gwi, capability)?;

    let base = state
        .config
        .gwi
        .api_base_url
        .as_deref()
        .ok_or_else(|| ApiError::service_unavailable("GWI API is not configured"))?;
    let target = upstream_url(base, &path, query.as_deref())?;

    let mut request = state.http.request(method.clone(), target.clone());
    for name in FORWARDED_HEADERS {
        if let Some(value) = headers.get(&name) {
            request = request.header(name, value.clone());
        }
    }
    request = request.header("x-gwi-actor-id", admin.id.to_string());

    let upstream = request.body(body).send().await.map_err(|e| {
        tracing::error!(url = %target, "GWI upstream request failed: {}", e);
        ApiError::bad_gateway("GWI API unavailable")
    })?;

    let status = upstream.status();
    let content_type = upstream.headers().get(header::CONTENT_TYPE).cloned();
    let bytes = upstream.bytes().await.map_err(|e| {
        tracing::error!(url = %target, "GWI upstream response unreadable: {}", e);
        ApiError::bad_gateway("GWI API returned an unreadable response")
    })?;

    tracing::debug!(method = %method, path = %path, status = status.as_u16(), "GWI proxy");

    if !is_read && status.is_success() {
        state
            .audit()
            .record(
                AuditEvent::new(Portal::Gwi, admin.id, "gwi.datasource_write", "gwi_api")
                    .resource(path.clone())
                    .details(json!({ "method": method.as_str(), "status": status.as_u16() })),
            )
            .await?;
    }

    let mut response = Response::builder().status(status);
    if let Some(content_type) = content_type {
        response = response.header(header::CONTENT_TYPE, content_type);
    }
    response.body(Body::from(bytes)).map_err(|e| {
        tracing::error!("Failed to build proxy response: {}", e);
        ApiError::internal_server_error("Failed to build proxy response")
    })
}

fn is_read_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Join `path` under `base` without letting it escape the base path.
/// Each segment is pushed as an opaque, percent-encoded path segment.
fn upstream_url(base: &str, path: &str, query: Option<&str>) -> Result<Url, ApiError> {
    let misconfigured = |detail: &dyn std::fmt::Display| {
        tracing::error!("Invalid GWI API URL: {}", detail);
        ApiError::internal_server_error("GWI API is misconfigured")
    };

    let mut url = Url::parse(base).map_err(|e| misconfigured(&e))?;
    let base_path = url.path().trim_end_matches('/').to_string();

    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| misconfigured(&"base URL cannot carry a path"))?;
        segments.pop_if_empty();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(ApiError::bad_request("Invalid proxy path"));
            }
            segments.push(segment);
        }
    }

    let joined = url.path();
    if joined != base_path && !joined.starts_with(&format!("{}/", base_path)) {
        tracing::warn!(path = %path, "GWI proxy path escaped the base path");
        return Err(ApiError::bad_request("Invalid proxy path"));
    }

    url.set_query(query.filter(|q| !q.is_empty()));
    Ok(url)
}
