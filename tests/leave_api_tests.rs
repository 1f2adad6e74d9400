//! Leave API integration tests: policy, request lifecycle and balances over HTTP.

mod common;

use axum::body::Body;
use axum::http::{header, Method, StatusCode};
use common::{spawn_app, tenant_host, TestApp, PASSWORD};
use serde_json::{json, Value};

struct Office {
    app: TestApp,
    host: String,
    admin: String,
    manager: String,
    alice: String,
    alice_id: String,
    bob: String,
    leave_type_id: String,
}

/// Tenant with an admin, a manager, Alice reporting to the manager, Bob
/// reporting to nobody, and a 12-day annual leave type.
async fn office() -> Office {
    let app = spawn_app().await;
    let (_, admin) = app.create_tenant("acme").await;
    let host = tenant_host("acme");

    let manager_id = app
        .create_employee("acme", &admin, "mgr@acme.test", "manager", None)
        .await;
    let alice_id = app
        .create_employee("acme", &admin, "alice@acme.test", "employee", Some(&manager_id))
        .await;
    app.create_employee("acme", &admin, "bob@acme.test", "employee", None)
        .await;

    let res = app
        .call(
            Method::POST,
            &host,
            "/api/leave/types",
            Some(&admin),
            Some(json!({
                "code": "AL",
                "name": "Annual Leave",
                "annual_allowance": 12,
                "carry_forward_max": 5,
            })),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    let leave_type_id = res.body["id"].as_str().unwrap().to_string();

    let manager = app.login(&host, "mgr@acme.test", PASSWORD).await;
    let alice = app.login(&host, "alice@acme.test", PASSWORD).await;
    let bob = app.login(&host, "bob@acme.test", PASSWORD).await;

    Office {
        app,
        host,
        admin,
        manager,
        alice,
        alice_id,
        bob,
        leave_type_id,
    }
}

impl Office {
    async fn call(&self, method: Method, uri: &str, token: &str, body: Option<Value>) -> common::TestResponse {
        self.app.call(method, &self.host, uri, Some(token), body).await
    }

    async fn alice_balance(&self) -> Value {
        let res = self
            .call(Method::GET, "/api/leave/balances?year=2026", &self.alice, None)
            .await;
        assert_eq!(res.status, StatusCode::OK);
        let balances = res.body.as_array().unwrap();
        assert_eq!(balances.len(), 1);
        balances[0].clone()
    }
}

#[tokio::test]
async fn test_request_lifecycle() {
    let o = office().await;

    // Wednesday 2026-03-04 is a public holiday
    let res = o
        .call(
            Method::POST,
            "/api/leave/holidays",
            &o.admin,
            Some(json!({ "date": "2026-03-04", "name": "Founders Day" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);

    let application = json!({
        "leave_type_id": o.leave_type_id,
        "start_date": "2026-02-28",
        "end_date": "2026-03-06",
        "reason": "Trip",
    });

    let res = o
        .call(Method::POST, "/api/leave/preview", &o.alice, Some(application.clone()))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["days"], 4.0);
    assert_eq!(
        res.body["dates"],
        json!(["2026-03-02", "2026-03-03", "2026-03-05", "2026-03-06"])
    );
    assert_eq!(res.body["sufficient"], true);

    let res = o
        .call(Method::POST, "/api/leave/requests", &o.alice, Some(application.clone()))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["status"], "pending");
    let id = res.body["id"].as_str().unwrap().to_string();

    let balance = o.alice_balance().await;
    assert_eq!(balance["pending"], 4.0);
    assert_eq!(balance["available"], 8.0);

    // Overlapping request
    let res = o
        .call(Method::POST, "/api/leave/requests", &o.alice, Some(application))
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);

    // Nobody approves their own request, and Bob is not Alice's manager
    let approve = format!("/api/leave/requests/{}/approve", id);
    let res = o.call(Method::POST, &approve, &o.alice, None).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    let res = o.call(Method::POST, &approve, &o.bob, None).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = o
        .call(Method::POST, &approve, &o.manager, Some(json!({ "note": "Enjoy" })))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "approved");
    assert_eq!(res.body["review_note"], "Enjoy");

    let res = o.call(Method::POST, &approve, &o.manager, None).await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.error_code(), "INVALID_TRANSITION");

    let balance = o.alice_balance().await;
    assert_eq!(balance["pending"], 0.0);
    assert_eq!(balance["used"], 4.0);

    // Give back Thursday and Friday
    let res = o
        .call(
            Method::POST,
            &format!("/api/leave/requests/{}/partial-cancel", id),
            &o.alice,
            Some(json!({ "start_date": "2026-03-05", "end_date": "2026-03-06" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["status"], "partially_cancelled");
    assert_eq!(res.body["days"], 2.0);
    assert_eq!(res.body["cancelled_days"], 2.0);
    assert_eq!(res.body["cancellations"].as_array().unwrap().len(), 1);

    let balance = o.alice_balance().await;
    assert_eq!(balance["used"], 2.0);
    assert_eq!(balance["available"], 10.0);

    let res = o
        .call(Method::POST, &format!("/api/leave/requests/{}/cancel", id), &o.alice, None)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "cancelled");
    assert_eq!(o.alice_balance().await["available"], 12.0);
}

#[tokio::test]
async fn test_reject_restores_pending() {
    let o = office().await;

    let res = o
        .call(
            Method::POST,
            "/api/leave/requests",
            &o.alice,
            Some(json!({
                "leave_type_id": o.leave_type_id,
                "start_date": "2026-06-01",
                "end_date": "2026-06-01",
                "half_day": "first_half",
            })),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["days"], 0.5);
    let id = res.body["id"].as_str().unwrap().to_string();

    let res = o
        .call(Method::POST, &format!("/api/leave/requests/{}/reject", id), &o.admin, None)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "rejected");

    let balance = o.alice_balance().await;
    assert_eq!(balance["pending"], 0.0);
    assert_eq!(balance["available"], 12.0);
}

#[tokio::test]
async fn test_request_visibility() {
    let o = office().await;

    let res = o
        .call(
            Method::POST,
            "/api/leave/requests",
            &o.alice,
            Some(json!({
                "leave_type_id": o.leave_type_id,
                "start_date": "2026-07-06",
                "end_date": "2026-07-07",
            })),
        )
        .await;
    let id = res.body["id"].as_str().unwrap().to_string();
    let uri = format!("/api/leave/requests/{}", id);

    assert_eq!(o.call(Method::GET, &uri, &o.alice, None).await.status, StatusCode::OK);
    assert_eq!(o.call(Method::GET, &uri, &o.manager, None).await.status, StatusCode::OK);
    assert_eq!(o.call(Method::GET, &uri, &o.admin, None).await.status, StatusCode::OK);
    assert_eq!(o.call(Method::GET, &uri, &o.bob, None).await.status, StatusCode::FORBIDDEN);

    let res = o.call(Method::GET, "/api/leave/requests", &o.manager, None).await;
    assert_eq!(res.body.as_array().unwrap().len(), 1);

    let res = o.call(Method::GET, "/api/leave/requests", &o.bob, None).await;
    assert!(res.body.as_array().unwrap().is_empty());

    let res = o
        .call(Method::GET, &format!("/api/leave/requests?employee_id={}", o.alice_id), &o.bob, None)
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = o
        .call(Method::GET, "/api/leave/requests?status=pending", &o.admin, None)
        .await;
    assert_eq!(res.body.as_array().unwrap().len(), 1);

    let res = o
        .call(Method::GET, "/api/leave/requests?status=someday", &o.admin, None)
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_working_week_configuration() {
    let o = office().await;

    let res = o.call(Method::GET, "/api/leave/working-days", &o.alice, None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["configured"], true);
    let days = res.body["days"].as_array().unwrap();
    assert_eq!(days.len(), 7);
    assert_eq!(days[5]["is_working"], false);

    let six_days = json!({ "days": [{ "weekday": 5, "is_working": true }] });
    let res = o
        .call(Method::PUT, "/api/leave/working-days", &o.alice, Some(six_days.clone()))
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = o
        .call(Method::PUT, "/api/leave/working-days", &o.admin, Some(six_days))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["days"][5]["is_working"], true);
    assert_eq!(res.body["days"][6]["is_working"], false);

    // Saturday now counts
    let res = o
        .call(
            Method::POST,
            "/api/leave/preview",
            &o.alice,
            Some(json!({
                "leave_type_id": o.leave_type_id,
                "start_date": "2026-03-06",
                "end_date": "2026-03-09",
            })),
        )
        .await;
    assert_eq!(res.body["days"], 3.0);

    let res = o
        .call(
            Method::PUT,
            "/api/leave/working-days",
            &o.admin,
            Some(json!({ "days": [{ "weekday": 9, "is_working": true }] })),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_optional_holiday_opt_in() {
    let o = office().await;

    let res = o
        .call(
            Method::POST,
            "/api/leave/holidays",
            &o.admin,
            Some(json!({ "date": "2026-11-09", "name": "Festival", "holiday_type": "optional" })),
        )
        .await;
    let optional_id = res.body["id"].as_str().unwrap().to_string();
    let res = o
        .call(
            Method::POST,
            "/api/leave/holidays",
            &o.admin,
            Some(json!({ "date": "2026-12-25", "name": "Christmas" })),
        )
        .await;
    let public_id = res.body["id"].as_str().unwrap().to_string();

    let res = o.call(Method::GET, "/api/leave/holidays?year=2026", &o.alice, None).await;
    assert_eq!(res.body.as_array().unwrap().len(), 2);
    let res = o.call(Method::GET, "/api/leave/holidays?year=2027", &o.alice, None).await;
    assert!(res.body.as_array().unwrap().is_empty());

    let preview = json!({
        "leave_type_id": o.leave_type_id,
        "start_date": "2026-11-09",
        "end_date": "2026-11-10",
    });
    let res = o
        .call(Method::POST, "/api/leave/preview", &o.alice, Some(preview.clone()))
        .await;
    assert_eq!(res.body["days"], 2.0);

    let opt_in = format!("/api/leave/holidays/{}/opt-in", optional_id);
    let res = o.call(Method::POST, &opt_in, &o.alice, None).await;
    assert_eq!(res.status, StatusCode::OK);

    let res = o
        .call(Method::POST, "/api/leave/preview", &o.alice, Some(preview.clone()))
        .await;
    assert_eq!(res.body["days"], 1.0);

    let res = o
        .call(Method::POST, &format!("/api/leave/holidays/{}/opt-in", public_id), &o.alice, None)
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = o.call(Method::DELETE, &opt_in, &o.alice, None).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    let res = o.call(Method::DELETE, &opt_in, &o.alice, None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = o
        .call(Method::DELETE, &format!("/api/leave/holidays/{}", public_id), &o.alice, None)
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    let res = o
        .call(Method::DELETE, &format!("/api/leave/holidays/{}", public_id), &o.admin, None)
        .await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_adjustment_and_carry_forward() {
    let o = office().await;

    // Touch the 2026 balance
    let res = o
        .call(
            Method::POST,
            "/api/leave/requests",
            &o.alice,
            Some(json!({
                "leave_type_id": o.leave_type_id,
                "start_date": "2026-09-07",
                "end_date": "2026-09-08",
            })),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);

    let adjust = |delta: f64| {
        json!({
            "employee_id": o.alice_id,
            "leave_type_id": o.leave_type_id,
            "year": 2026,
            "delta": delta,
            "reason": "Overtime",
        })
    };

    let res = o
        .call(Method::POST, "/api/leave/balances/adjust", &o.alice, Some(adjust(5.0)))
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = o
        .call(Method::POST, "/api/leave/balances/adjust", &o.admin, Some(adjust(1.5)))
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["balance"]["available"], 11.5);
    assert_eq!(res.body["adjustment"]["delta"], 1.5);

    let res = o
        .call(Method::POST, "/api/leave/balances/adjust", &o.admin, Some(adjust(-20.0)))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error_code(), "INSUFFICIENT_BALANCE");

    let res = o
        .call(
            Method::POST,
            "/api/leave/balances/carry-forward",
            &o.admin,
            Some(json!({ "from_year": 2026 })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["to_year"], 2027);
    assert_eq!(res.body["updated"], 1);

    let res = o
        .call(Method::GET, "/api/leave/balances?year=2027", &o.alice, None)
        .await;
    let balances = res.body.as_array().unwrap();
    assert_eq!(balances.len(), 1);
    assert_eq!(balances[0]["carry_forward"], 5.0);
    assert_eq!(balances[0]["available"], 17.0);
}

#[tokio::test]
async fn test_partial_cancel_after_holiday_added_refunds_everything() {
    let o = office().await;

    // Monday 2026-05-04 to Friday 2026-05-08
    let res = o
        .call(
            Method::POST,
            "/api/leave/requests",
            &o.alice,
            Some(json!({
                "leave_type_id": o.leave_type_id,
                "start_date": "2026-05-04",
                "end_date": "2026-05-08",
            })),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let id = res.body["id"].as_str().unwrap().to_string();
    let res = o
        .call(Method::POST, &format!("/api/leave/requests/{}/approve", id), &o.manager, None)
        .await;
    assert_eq!(res.status, StatusCode::OK);

    // Declared after approval
    let res = o
        .call(
            Method::POST,
            "/api/leave/holidays",
            &o.admin,
            Some(json!({ "date": "2026-05-06", "name": "Founders Day" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);

    let partial = format!("/api/leave/requests/{}/partial-cancel", id);
    let res = o
        .call(
            Method::POST,
            &partial,
            &o.alice,
            Some(json!({ "start_date": "2026-05-04", "end_date": "2026-05-06" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["days"], 2.0);
    assert_eq!(o.alice_balance().await["used"], 2.0);

    let res = o
        .call(
            Method::POST,
            &partial,
            &o.alice,
            Some(json!({ "start_date": "2026-05-07", "end_date": "2026-05-08" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["status"], "cancelled");
    assert_eq!(res.body["cancelled_days"], 5.0);

    let balance = o.alice_balance().await;
    assert_eq!(balance["used"], 0.0);
    assert_eq!(balance["available"], 12.0);
}

#[tokio::test]
async fn test_malformed_bodies_use_error_envelope() {
    let o = office().await;

    let res = o
        .call(
            Method::POST,
            "/api/leave/requests",
            &o.alice,
            Some(json!({
                "leave_type_id": o.leave_type_id,
                "start_date": "not-a-date",
                "end_date": "2026-05-08",
            })),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error_code(), "VALIDATION_ERROR");

    let res = o
        .call(Method::POST, "/api/leave/types", &o.admin, Some(json!({ "code": "SL" })))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error_code(), "VALIDATION_ERROR");

    let mut req = common::request(Method::POST, &o.host, "/api/leave/holidays", Some(&o.admin), None);
    req.headers_mut()
        .insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
    *req.body_mut() = Body::from("{\"date\": ");
    let res = o.app.send(req).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error_code(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_balance_years_out_of_range_are_rejected() {
    let o = office().await;

    let res = o
        .call(
            Method::POST,
            "/api/leave/balances/carry-forward",
            &o.admin,
            Some(json!({ "from_year": i64::MAX })),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error_code(), "VALIDATION_ERROR");

    for (year, delta) in [(0, 1.0), (2026, 0.25)] {
        let res = o
            .call(
                Method::POST,
                "/api/leave/balances/adjust",
                &o.admin,
                Some(json!({
                    "employee_id": o.alice_id,
                    "leave_type_id": o.leave_type_id,
                    "year": year,
                    "delta": delta,
                    "reason": "Correction",
                })),
            )
            .await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "year {} delta {}", year, delta);
    }
}
