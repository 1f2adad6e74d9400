//! Shared helpers for integration tests.
//!
//! Every test builds the full router over in-memory databases and drives it
//! with `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use officegate::config::Config;
use officegate::{api, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const ROOT: &str = "example.com";
pub const ROOT_EMAIL: &str = "root@example.com";
pub const ROOT_PASSWORD: &str = "root-password";
pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

/// Response status, headers and JSON body (`Null` when empty or not JSON).
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn error_code(&self) -> &str {
        self.body["error"]["code"].as_str().unwrap_or_default()
    }
}

/// Build the application with the given extra environment.
pub async fn spawn_app_with(vars: &[(&str, &str)], proxy_timeout: Option<Duration>) -> TestApp {
    let mut env: HashMap<String, String> = [
        ("JWT_SECRET", "integration-secret"),
        ("JWT_ISSUER", "officegate-test"),
        ("DATABASE_PATH", ":memory:"),
        ("ROOT_DOMAIN", ROOT),
        ("BCRYPT_COST", "4"),
        ("PLATFORM_ADMIN_EMAIL", ROOT_EMAIL),
        ("PLATFORM_ADMIN_PASSWORD", ROOT_PASSWORD),
    ]
    .into_iter()
    .chain(vars.iter().copied())
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    env.entry("PROXY_TIMEOUT_SECS".into()).or_insert_with(|| "5".into());

    let mut config = Config::from_map(&env);
    config.database.tenant_data_dir = None;
    if let Some(timeout) = proxy_timeout {
        config.gateway.proxy_timeout = timeout;
    }

    let state = AppState::from_config(config).await.expect("state");
    TestApp {
        router: api::router(state.clone()),
        state,
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(&[], None).await
}

pub fn tenant_host(slug: &str) -> String {
    format!("{}.{}", slug, ROOT)
}

pub fn request(
    method: Method,
    host: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri).header(header::HOST, host);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse { status, headers, body }
    }

    pub async fn call(
        &self,
        method: Method,
        host: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        self.send(request(method, host, uri, token, body)).await
    }

    pub async fn login(&self, host: &str, email: &str, password: &str) -> String {
        let res = self
            .call(
                Method::POST,
                host,
                "/auth/login",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "login failed: {}", res.body);
        res.body["token"].as_str().unwrap().to_string()
    }

    pub async fn platform_token(&self) -> String {
        self.login(ROOT, ROOT_EMAIL, ROOT_PASSWORD).await
    }

    /// Provision a tenant and return its JSON plus a token for its admin.
    pub async fn create_tenant(&self, slug: &str) -> (Value, String) {
        let token = self.platform_token().await;
        let admin_email = format!("admin@{}.test", slug);
        let res = self
            .call(
                Method::POST,
                ROOT,
                "/console/tenants",
                Some(&token),
                Some(json!({
                    "slug": slug,
                    "name": format!("{} Inc", slug),
                    "admin_email": admin_email,
                    "admin_password": PASSWORD,
                })),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "create tenant failed: {}", res.body);

        let admin_token = self.login(&tenant_host(slug), &admin_email, PASSWORD).await;
        (res.body["tenant"].clone(), admin_token)
    }

    /// Create an employee through the API and return its id.
    pub async fn create_employee(
        &self,
        slug: &str,
        admin_token: &str,
        email: &str,
        role: &str,
        manager_id: Option<&str>,
    ) -> String {
        let res = self
            .call(
                Method::POST,
                &tenant_host(slug),
                "/api/employees",
                Some(admin_token),
                Some(json!({
                    "email": email,
                    "display_name": email.split('@').next().unwrap(),
                    "password": PASSWORD,
                    "role": role,
                    "manager_id": manager_id,
                })),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "create employee failed: {}", res.body);
        res.body["id"].as_str().unwrap().to_string()
    }
}
