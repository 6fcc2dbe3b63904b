use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Json},
    routing::{any, get, patch, post, put},
    Router,
};
use serde_json::json;
use sqlx::PgPool;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::audit::AuditLog;
use crate::auth::SessionResolver;
use crate::config::{AppConfig, SecurityConfig, ORGANIZATION_HEADER};
use crate::database::{DatabaseManager, Store};
use crate::features::FeatureGate;
use crate::handlers::{admin, dashboard, gwi};
use crate::middleware::{admin_session, dashboard_session, gwi_session, resolve_tenant};
use crate::tenant::TenantResolver;

/// Shared by every handler and middleware
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub http: reqwest::Client,
    /// Present when backed by Postgres, used by `/health`
    pub pool: Option<PgPool>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: AppConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.gwi.request_timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self {
            store,
            config: Arc::new(config),
            http,
            pool: None,
        }
    }

    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn sessions(&self) -> SessionResolver<'_, dyn Store> {
        SessionResolver::new(self.store.as_ref(), &self.config.session)
    }

    pub fn tenants(&self) -> TenantResolver<'_, dyn Store> {
        TenantResolver::new(self.store.as_ref())
    }

    pub fn features(&self) -> FeatureGate<'_, dyn Store> {
        FeatureGate::new(self.store.as_ref(), &self.config.features)
    }

    pub fn audit(&self) -> AuditLog<'_, dyn Store> {
        AuditLog::new(self.store.as_ref())
    }
}

pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .merge(dashboard_routes(&state))
        .merge(dashboard_tenant_routes(&state))
        .merge(admin_routes(&state))
        .merge(gwi_routes(&state))
        .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes));

    if state.config.security.enable_cors {
        app = app.layer(cors_layer(&state.config.security));
    }
    if state.config.api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }

    app.with_state(state)
}

/// Dashboard routes that need a session but no organization
fn dashboard_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/me", get(dashboard::me))
        .route("/api/auth/logout", post(dashboard::logout))
        .route("/api/organizations", get(dashboard::organizations_list))
        .route("/api/organizations/current", put(dashboard::organization_switch))
        .route("/api/preferences/locale", put(dashboard::locale_set))
        .route_layer(from_fn_with_state(state.clone(), dashboard_session))
}

/// Dashboard routes scoped to the resolved organization
fn dashboard_tenant_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/organizations/current", get(dashboard::organization_current))
        .route(
            "/api/organizations/current/features/:key",
            get(dashboard::feature_get),
        )
        .route("/api/organizations/current/members", get(dashboard::members_list))
        .route(
            "/api/organizations/current/members/:user_id",
            patch(dashboard::member_update).delete(dashboard::member_remove),
        )
        .route("/api/organizations/current/audit", get(dashboard::audit_list))
        // Layers run bottom-up: session first, then tenant
        .route_layer(from_fn_with_state(state.clone(), resolve_tenant))
        .route_layer(from_fn_with_state(state.clone(), dashboard_session))
}

fn admin_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/admin/me", get(admin::me))
        .route("/api/admin/logout", post(admin::logout))
        .route("/api/admin/organizations", get(admin::organizations_list))
        .route("/api/admin/organizations/:id", patch(admin::organization_update))
        .route(
            "/api/admin/organizations/:id/features/:key",
            get(admin::feature_get)
                .put(admin::feature_override_set)
                .delete(admin::feature_override_clear),
        )
        .route("/api/admin/audit", get(admin::audit_list))
        .route_layer(from_fn_with_state(state.clone(), admin_session))
}

fn gwi_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/gwi/me", get(gwi::me))
        .route("/api/gwi/logout", post(gwi::logout))
        .route("/api/gwi/audit", get(gwi::audit_list))
        .route("/api/gwi/proxy/*path", any(gwi::proxy))
        .route_layer(from_fn_with_state(state.clone(), gwi_session))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter(|o| o.as_str() != "*")
        .filter_map(|o| o.parse().ok())
        .collect();

    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    // Session cookies need credentialed CORS, which needs explicit origins
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(ORGANIZATION_HEADER),
        ])
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    let Some(pool) = state.pool.as_ref() else {
        return (
            StatusCode::OK,
            Json(json!({ "status": "ok", "timestamp": now, "database": "memory" })),
        );
    };

    match DatabaseManager::health_check(pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "timestamp": now, "database": "ok" })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "timestamp": now, "error": "database unavailable" })),
            )
        }
    }
}
