mod common;

use anyhow::Result;
use axum::http::{header, Method, Request, StatusCode};
use axum::body::Body;
use chrono::Utc;
use serde_json::json;

use common::{day, TestApp};
use portal_api::auth::OrgRole;
use portal_api::database::models::PlanTier;
use portal_api::Portal;

fn with_org_header(path: &str, cookie: &str, organization_id: &str) -> Result<Request<Body>> {
    Ok(Request::builder()
        .uri(path)
        .header(header::COOKIE, cookie)
        .header("x-organization-id", organization_id)
        .body(Body::empty())?)
}

#[tokio::test]
async fn falls_back_to_earliest_membership() -> Result<()> {
    let app = TestApp::new().await?;
    let user = app.user("u@example.com").await;
    let org_a = app.organization("org-a", PlanTier::Free, None).await;
    let org_b = app.organization("org-b", PlanTier::Pro, None).await;
    app.member(user.id, org_b.id, OrgRole::Member, day(2024, 2, 1)).await;
    app.member(user.id, org_a.id, OrgRole::Member, day(2024, 1, 1)).await;

    let cookie = app.session_cookie(Portal::Dashboard, &app.login(Portal::Dashboard, user.id).await?);
    let res = app.get("/api/organizations/current", Some(&cookie)).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["organization"]["slug"], "org-a");
    Ok(())
}

#[tokio::test]
async fn equal_join_dates_pick_lower_organization_id() -> Result<()> {
    let app = TestApp::new().await?;
    let user = app.user("u@example.com").await;
    let first = app.organization("first", PlanTier::Free, None).await;
    let second = app.organization("second", PlanTier::Free, None).await;
    let joined = day(2024, 5, 1);
    app.member(user.id, first.id, OrgRole::Member, joined).await;
    app.member(user.id, second.id, OrgRole::Member, joined).await;

    let expected = first.id.min(second.id);
    let cookie = app.session_cookie(Portal::Dashboard, &app.login(Portal::Dashboard, user.id).await?);
    for _ in 0..3 {
        let res = app.get("/api/organizations/current", Some(&cookie)).await?;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["organization"]["id"], json!(expected));
    }

    let res = app.get("/api/organizations", Some(&cookie)).await?;
    assert_eq!(res.body[0]["organization"]["id"], json!(expected));
    Ok(())
}

#[tokio::test]
async fn explicit_request_without_membership_is_forbidden() -> Result<()> {
    let app = TestApp::new().await?;
    let user = app.user("u@example.com").await;
    let mine = app.organization("mine", PlanTier::Free, None).await;
    let theirs = app.organization("theirs", PlanTier::Free, None).await;
    app.member(user.id, mine.id, OrgRole::Owner, day(2024, 1, 1)).await;

    let cookie = app.session_cookie(Portal::Dashboard, &app.login(Portal::Dashboard, user.id).await?);
    let res = app
        .send(with_org_header("/api/organizations/current", &cookie, &theirs.id.to_string())?)
        .await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert!(res.body["error"].is_string());

    let res = app
        .send(with_org_header("/api/organizations/current", &cookie, "not-a-uuid")?)
        .await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn stale_cookie_hint_falls_through() -> Result<()> {
    let app = TestApp::new().await?;
    let user = app.user("u@example.com").await;
    let mine = app.organization("mine", PlanTier::Free, None).await;
    let former = app.organization("former", PlanTier::Free, None).await;
    app.member(user.id, mine.id, OrgRole::Member, day(2024, 1, 1)).await;

    let token = app.login(Portal::Dashboard, user.id).await?;
    let cookie = format!(
        "{}; currentOrgId={}",
        app.session_cookie(Portal::Dashboard, &token),
        former.id
    );
    let res = app.get("/api/organizations/current", Some(&cookie)).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["organization"]["id"], json!(mine.id));
    Ok(())
}

#[tokio::test]
async fn cookie_hint_selects_among_memberships() -> Result<()> {
    let app = TestApp::new().await?;
    let user = app.user("u@example.com").await;
    let first = app.organization("first", PlanTier::Free, None).await;
    let second = app.organization("second", PlanTier::Free, None).await;
    app.member(user.id, first.id, OrgRole::Member, day(2024, 1, 1)).await;
    app.member(user.id, second.id, OrgRole::Admin, day(2024, 3, 1)).await;

    let token = app.login(Portal::Dashboard, user.id).await?;
    let cookie = format!(
        "{}; currentOrgId={}",
        app.session_cookie(Portal::Dashboard, &token),
        second.id
    );
    let res = app.get("/api/organizations/current", Some(&cookie)).await?;
    assert_eq!(res.body["organization"]["slug"], "second");
    assert_eq!(res.body["membership"]["role"], "ADMIN");
    assert!(res.body["capabilities"]
        .as_array()
        .is_some_and(|caps| caps.contains(&json!("members:update"))));
    Ok(())
}

#[tokio::test]
async fn user_without_organizations_gets_not_found() -> Result<()> {
    let app = TestApp::new().await?;
    let user = app.user("lonely@example.com").await;
    let cookie = app.session_cookie(Portal::Dashboard, &app.login(Portal::Dashboard, user.id).await?);

    let res = app.get("/api/organizations/current", Some(&cookie)).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn archived_organization_is_skipped_and_not_found_when_requested() -> Result<()> {
    let app = TestApp::new().await?;
    let user = app.user("u@example.com").await;
    let archived = app.organization("archived", PlanTier::Free, None).await;
    let active = app.organization("active", PlanTier::Free, None).await;
    app.member(user.id, archived.id, OrgRole::Owner, day(2023, 1, 1)).await;
    app.member(user.id, active.id, OrgRole::Member, day(2024, 1, 1)).await;
    app.store.archive_organization(archived.id, Utc::now()).await;

    let cookie = app.session_cookie(Portal::Dashboard, &app.login(Portal::Dashboard, user.id).await?);
    let res = app.get("/api/organizations/current", Some(&cookie)).await?;
    assert_eq!(res.body["organization"]["slug"], "active");

    let res = app
        .send(with_org_header("/api/organizations/current", &cookie, &archived.id.to_string())?)
        .await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn switching_organization_sets_cookie_only_for_members() -> Result<()> {
    let app = TestApp::new().await?;
    let user = app.user("u@example.com").await;
    let mine = app.organization("mine", PlanTier::Free, None).await;
    let theirs = app.organization("theirs", PlanTier::Free, None).await;
    app.member(user.id, mine.id, OrgRole::Member, day(2024, 1, 1)).await;

    let cookie = app.session_cookie(Portal::Dashboard, &app.login(Portal::Dashboard, user.id).await?);

    let res = app
        .send_json(
            Method::PUT,
            "/api/organizations/current",
            Some(&cookie),
            json!({ "organization_id": mine.id }),
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    let expected = format!("currentOrgId={}", mine.id);
    assert!(res.set_cookies().iter().any(|c| c.starts_with(&expected)));

    let res = app
        .send_json(
            Method::PUT,
            "/api/organizations/current",
            Some(&cookie),
            json!({ "organization_id": theirs.id }),
        )
        .await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert!(res.set_cookies().is_empty());
    Ok(())
}
