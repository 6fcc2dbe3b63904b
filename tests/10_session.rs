mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;

use common::TestApp;
use portal_api::auth::AdminRole;
use portal_api::Portal;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let app = TestApp::new().await?;
    let res = app.get("/health", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn missing_or_unknown_token_is_unauthorized() -> Result<()> {
    let app = TestApp::new().await?;

    let res = app.get("/api/me", None).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert!(res.body["error"].is_string());

    let res = app.get("/api/me", Some("sessionToken=not-a-real-token")).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn dashboard_session_resolves_end_user() -> Result<()> {
    let app = TestApp::new().await?;
    let user = app.user("ada@example.com").await;
    let token = app.login(Portal::Dashboard, user.id).await?;

    let res = app.get("/api/me", Some(&app.session_cookie(Portal::Dashboard, &token))).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["user"]["email"], "ada@example.com");
    assert_eq!(res.body["organizations"], json!([]));
    Ok(())
}

#[tokio::test]
async fn admin_token_is_not_accepted_by_gwi_portal() -> Result<()> {
    let app = TestApp::new().await?;
    let admin = app.admin(AdminRole::SuperAdmin, &[]).await;
    let token = app.login(Portal::Admin, admin.id).await?;

    let res = app.get("/api/admin/me", Some(&app.session_cookie(Portal::Admin, &token))).await?;
    assert_eq!(res.status, StatusCode::OK);

    // Same token under the GWI cookie name: sessions are portal-scoped
    let res = app.get("/api/gwi/me", Some(&app.session_cookie(Portal::Gwi, &token))).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    // And the adminToken cookie itself means nothing to the GWI portal
    let res = app.get("/api/gwi/me", Some(&app.session_cookie(Portal::Admin, &token))).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn bearer_header_is_accepted() -> Result<()> {
    let app = TestApp::new().await?;
    let admin = app.admin(AdminRole::GwiAnalyst, &[]).await;
    let token = app.login(Portal::Gwi, admin.id).await?;

    let request = axum::http::Request::builder()
        .uri("/api/gwi/me")
        .header("authorization", format!("Bearer {}", token))
        .body(axum::body::Body::empty())?;
    let res = app.send(request).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["role"], "GWI_ANALYST");
    Ok(())
}

#[tokio::test]
async fn deactivated_admin_is_rejected_on_next_request() -> Result<()> {
    let app = TestApp::new().await?;
    let admin = app.admin(AdminRole::Admin, &[]).await;
    let cookie = app.session_cookie(Portal::Admin, &app.login(Portal::Admin, admin.id).await?);

    assert_eq!(app.get("/api/admin/me", Some(&cookie)).await?.status, StatusCode::OK);

    app.store.set_admin_active(admin.id, false).await;
    let res = app.get("/api/admin/me", Some(&cookie)).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn permission_changes_apply_without_new_session() -> Result<()> {
    let app = TestApp::new().await?;
    let admin = app.admin(AdminRole::Support, &[]).await;
    let cookie = app.session_cookie(Portal::Admin, &app.login(Portal::Admin, admin.id).await?);

    // Support has no audit access
    let res = app.get("/api/admin/audit", Some(&cookie)).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    app.store
        .set_admin_permissions(admin.id, vec!["super:*".to_string()])
        .await;
    let res = app.get("/api/admin/audit", Some(&cookie)).await?;
    assert_eq!(res.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn logout_revokes_session_and_expires_cookie() -> Result<()> {
    let app = TestApp::new().await?;
    let user = app.user("bo@example.com").await;
    let cookie = app.session_cookie(Portal::Dashboard, &app.login(Portal::Dashboard, user.id).await?);

    let res = app
        .send_json(Method::POST, "/api/auth/logout", Some(&cookie), json!({}))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res
        .set_cookies()
        .iter()
        .any(|c| c.starts_with("sessionToken=") && c.contains("Max-Age=0")));

    let res = app.get("/api/me", Some(&cookie)).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    Ok(())
}
