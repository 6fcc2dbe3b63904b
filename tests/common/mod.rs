#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use portal_api::auth::{AdminRole, OrgRole, SessionResolver};
use portal_api::config::AppConfig;
use portal_api::database::models::{AdminAccount, Membership, Organization, PlanTier, UserAccount};
use portal_api::database::{MemoryStore, Store};
use portal_api::features::FeatureCatalog;
use portal_api::{router, AppState, Portal};

/// In-process application over a fresh in-memory store
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub config: AppConfig,
    pub router: Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// Every `Set-Cookie` header value
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        Self::with_config(AppConfig::development()).await
    }

    pub async fn with_config(mut config: AppConfig) -> Result<Self> {
        config.api.enable_request_logging = false;
        let store = Arc::new(MemoryStore::new());
        let catalog = FeatureCatalog::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config/features.yaml"))?;
        catalog.seed(store.as_ref()).await?;

        let dyn_store: Arc<dyn Store> = store.clone();
        let router = router(AppState::new(dyn_store, config.clone()));
        Ok(Self { store, config, router })
    }

    pub async fn user(&self, email: &str) -> UserAccount {
        let user = UserAccount {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: None,
            is_active: true,
            created_at: Utc::now(),
        };
        self.store.insert_user(user.clone()).await;
        user
    }

    pub async fn admin(&self, role: AdminRole, permissions: &[&str]) -> AdminAccount {
        let admin = AdminAccount {
            id: Uuid::new_v4(),
            email: format!("{}@staff.test", Uuid::new_v4().simple()),
            role,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            is_active: true,
            created_at: Utc::now(),
        };
        self.store.insert_admin(admin.clone()).await;
        admin
    }

    pub async fn organization(&self, slug: &str, plan_tier: PlanTier, parent_id: Option<Uuid>) -> Organization {
        let now = Utc::now();
        let organization = Organization {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            name: slug.to_uppercase(),
            plan_tier,
            parent_id,
            settings: serde_json::json!({}),
            created_at: now,
            updated_at: now,
            archived_at: None,
        };
        self.store.insert_organization(organization.clone()).await;
        organization
    }

    pub async fn member(&self, user_id: Uuid, organization_id: Uuid, role: OrgRole, joined_at: DateTime<Utc>) {
        self.store
            .insert_membership(Membership {
                user_id,
                organization_id,
                role,
                joined_at,
            })
            .await;
    }

    /// Issue a session and return the raw token
    pub async fn login(&self, portal: Portal, principal_id: Uuid) -> Result<String> {
        let issued = SessionResolver::new(self.store.as_ref(), &self.config.session)
            .issue(portal, principal_id)
            .await?;
        Ok(issued.token)
    }

    /// `Cookie` header value for a portal session
    pub fn session_cookie(&self, portal: Portal, token: &str) -> String {
        format!("{}={}", self.config.session.cookie_name(portal), token)
    }

    pub async fn send(&self, request: Request<Body>) -> Result<TestResponse> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok(TestResponse { status, headers, body })
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Result<TestResponse> {
        self.send(request(Method::GET, path, cookie, None)?).await
    }

    pub async fn send_json(&self, method: Method, path: &str, cookie: Option<&str>, body: Value) -> Result<TestResponse> {
        self.send(request(method, path, cookie, Some(body))?).await
    }
}

pub fn request(method: Method, path: &str, cookie: Option<&str>, body: Option<Value>) -> Result<Request<Body>> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => builder.body(Body::empty())?,
    };
    Ok(request)
}

pub fn day(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}
