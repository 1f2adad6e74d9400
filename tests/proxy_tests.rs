//! Reverse proxy and global search integration tests against mock upstreams.

mod common;

use std::time::Duration;

use axum::http::{Method, StatusCode};
use common::{spawn_app_with, tenant_host, TestApp};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn app_with_projects(projects: &MockServer) -> TestApp {
    spawn_app_with(
        &[
            ("UPSTREAM_PROJECTS_URL", &projects.uri()),
            ("UPSTREAM_PROJECTS_SEARCH", "true"),
            // Nothing listens on port 1
            ("UPSTREAM_BILLING_URL", "http://127.0.0.1:1"),
        ],
        None,
    )
    .await
}

#[tokio::test]
async fn test_proxy_injects_identity_and_strips_spoofed_headers() {
    let projects = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/items"))
        .and(query_param("page", "2"))
        .and(header("x-tenant-slug", "acme"))
        .and(header("x-user-role", "admin"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "items": [1, 2, 3] }))
                .insert_header("x-upstream", "projects"),
        )
        .expect(1)
        .mount(&projects)
        .await;

    let app = app_with_projects(&projects).await;
    let (tenant, token) = app.create_tenant("acme").await;

    let mut req = common::request(
        Method::GET,
        &tenant_host("acme"),
        "/api/projects/v1/items?page=2",
        Some(&token),
        None,
    );
    req.headers_mut().insert("x-tenant-id", "spoofed".parse().unwrap());
    req.headers_mut().insert("x-user-id", "intruder".parse().unwrap());
    req.headers_mut().insert("x-forwarded-for", "203.0.113.7".parse().unwrap());
    let res = app.send(req).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["items"], json!([1, 2, 3]));
    assert_eq!(res.headers["x-upstream"], "projects");

    let received = projects.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let headers = &received[0].headers;
    assert_eq!(headers["x-tenant-id"], tenant["id"].as_str().unwrap());
    assert_eq!(headers["x-tenant-database"], "tenant_acme");
    assert_ne!(headers["x-user-id"], "intruder");
    assert_eq!(headers["x-forwarded-host"], tenant_host("acme").as_str());
    assert_eq!(headers["x-forwarded-proto"], "http");
    assert_eq!(headers["x-forwarded-for"], "203.0.113.7");
    assert!(headers.get("x-request-id").is_some());
    assert!(headers.get("authorization").is_some());
}

#[tokio::test]
async fn test_proxy_passes_body_and_status_through() {
    let projects = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tasks"))
        .and(body_json(json!({ "title": "Ship it" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "task-1" })))
        .mount(&projects)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/tasks/task-1"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({ "reason": "locked" })))
        .mount(&projects)
        .await;

    let app = app_with_projects(&projects).await;
    let (_, token) = app.create_tenant("acme").await;

    let res = app
        .call(
            Method::POST,
            &tenant_host("acme"),
            "/api/projects/tasks",
            Some(&token),
            Some(json!({ "title": "Ship it" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["id"], "task-1");

    // Upstream errors are relayed untouched
    let res = app
        .call(Method::DELETE, &tenant_host("acme"), "/api/projects/tasks/task-1", Some(&token), None)
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.body["reason"], "locked");
}

#[tokio::test]
async fn test_proxied_bodies_are_not_size_limited() {
    let projects = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/uploads"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&projects)
        .await;

    let app = spawn_app_with(
        &[("UPSTREAM_PROJECTS_URL", &projects.uri()), ("MAX_BODY_BYTES", "1024")],
        None,
    )
    .await;
    let (_, token) = app.create_tenant("acme").await;

    let res = app
        .call(
            Method::POST,
            &tenant_host("acme"),
            "/api/projects/uploads",
            Some(&token),
            Some(json!({ "blob": "x".repeat(8192) })),
        )
        .await;
    assert_eq!(res.status, StatusCode::ACCEPTED);

    let received = projects.received_requests().await.unwrap();
    assert!(received[0].body.len() > 8192);
}

#[tokio::test]
async fn test_proxy_service_root() {
    let projects = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "service": "projects" })))
        .mount(&projects)
        .await;

    let app = app_with_projects(&projects).await;
    let (_, token) = app.create_tenant("acme").await;

    let res = app
        .call(Method::GET, &tenant_host("acme"), "/api/projects", Some(&token), None)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["service"], "projects");
}

#[tokio::test]
async fn test_unknown_service_is_404() {
    let projects = MockServer::start().await;
    let app = app_with_projects(&projects).await;
    let (_, token) = app.create_tenant("acme").await;

    let res = app
        .call(Method::GET, &tenant_host("acme"), "/api/payroll/runs", Some(&token), None)
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.error_code(), "SERVICE_NOT_FOUND");
}

#[tokio::test]
async fn test_dead_upstream_is_502() {
    let projects = MockServer::start().await;
    let app = app_with_projects(&projects).await;
    let (_, token) = app.create_tenant("acme").await;

    let res = app
        .call(Method::GET, &tenant_host("acme"), "/api/billing/invoices", Some(&token), None)
        .await;
    assert_eq!(res.status, StatusCode::BAD_GATEWAY);
    assert_eq!(res.error_code(), "UPSTREAM_UNAVAILABLE");
}

#[tokio::test]
async fn test_slow_upstream_is_504() {
    let projects = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&projects)
        .await;

    let app = spawn_app_with(
        &[("UPSTREAM_PROJECTS_URL", &projects.uri())],
        Some(Duration::from_millis(300)),
    )
    .await;
    let (_, token) = app.create_tenant("acme").await;

    let res = app
        .call(Method::GET, &tenant_host("acme"), "/api/projects/slow", Some(&token), None)
        .await;
    assert_eq!(res.status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(res.error_code(), "UPSTREAM_TIMEOUT");
}

#[tokio::test]
async fn test_proxy_requires_tenant_user() {
    let projects = MockServer::start().await;
    let app = app_with_projects(&projects).await;
    app.create_tenant("acme").await;

    let res = app
        .call(Method::GET, &tenant_host("acme"), "/api/projects/v1/items", None, None)
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert!(projects.received_requests().await.unwrap().is_empty());
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_search_aggregates_and_survives_failing_upstream() {
    let projects = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "alpha"))
        .and(header("x-tenant-slug", "acme"))
        .and(header("x-forwarded-host", tenant_host("acme").as_str()))
        .and(header("x-forwarded-proto", "http"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "id": "p1", "name": "Alpha rollout" }]
        })))
        .mount(&projects)
        .await;

    let broken = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&broken)
        .await;

    let app = spawn_app_with(
        &[
            ("UPSTREAM_PROJECTS_URL", &projects.uri()),
            ("UPSTREAM_PROJECTS_SEARCH", "true"),
            ("UPSTREAM_ASSESSMENTS_URL", &broken.uri()),
            ("UPSTREAM_ASSESSMENTS_SEARCH", "true"),
        ],
        None,
    )
    .await;
    let (_, token) = app.create_tenant("acme").await;
    app.create_employee("acme", &token, "alpha.smith@acme.test", "employee", None)
        .await;

    let res = app
        .call(Method::GET, &tenant_host("acme"), "/api/search?q=alpha", Some(&token), None)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["query"], "alpha");
    assert_eq!(res.body["results"]["projects"][0]["id"], "p1");
    assert_eq!(res.body["results"]["users"].as_array().unwrap().len(), 1);
    assert!(res.body["results"].get("assessments").is_none());
    assert!(res.body["errors"]["assessments"].is_string());
}

#[tokio::test]
async fn test_search_rejects_empty_query() {
    let projects = MockServer::start().await;
    let app = app_with_projects(&projects).await;
    let (_, token) = app.create_tenant("acme").await;

    let res = app
        .call(Method::GET, &tenant_host("acme"), "/api/search?q=%20", Some(&token), None)
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}
