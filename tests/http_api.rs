mod common;

use std::net::SocketAddr;

use actix_web::http::StatusCode;
use actix_web::{App, test, web::Data};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Value, json};

use common::*;
use sitecrew::auth::jwt::issue_token;
use sitecrew::config::Config;
use sitecrew::model::role::Role;
use sitecrew::routes;

const SECRET: &str = "test-secret";

fn config() -> Config {
    Config {
        database_url: "mysql://unused".into(),
        jwt_secret: SECRET.into(),
        server_addr: "127.0.0.1:0".into(),
        api_prefix: "/api".into(),
        rate_scan_per_min: 600,
        rate_protected_per_min: 6000,
        min_match_score: 80,
        min_scan_quality: 60,
        reference_cache_ttl_secs: 300,
        log_dir: "logs".into(),
        log_level: tracing::Level::INFO,
    }
}

fn bearer(role: Role) -> (&'static str, String) {
    let token = issue_token(1, "tester", role, SECRET, 600).unwrap();
    ("Authorization", format!("Bearer {token}"))
}

fn hours(v: &Value) -> Decimal {
    v.as_str().unwrap().parse().unwrap()
}

fn peer() -> SocketAddr {
    "127.0.0.1:40000".parse().unwrap()
}

macro_rules! app {
    ($h:expr) => {{
        let config = config();
        test::init_service(
            App::new()
                .app_data(Data::new(config.clone()))
                .app_data(Data::new($h.attendance))
                .app_data(Data::new($h.payroll))
                .app_data(Data::new($h.payment))
                .configure(move |cfg| routes::configure(cfg, &config)),
        )
        .await
    }};
}

#[actix_web::test]
async fn scan_then_read_back_over_http() {
    let h = harness();
    let clock = h.clock.clone();
    let app = app!(h);

    let req = test::TestRequest::post()
        .uri("/api/attendance/scan")
        .peer_addr(peer())
        .insert_header(bearer(Role::Device))
        .set_json(json!({
            "worker_id": 1,
            "site_id": SITE,
            "device_id": DEVICE,
            "scan": { "template_data": TEMPLATE_DATA, "quality": 90 }
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["action"], "check-in");
    assert_eq!(body["record"]["status"], "PRESENT");
    let id = body["record"]["id"].as_u64().unwrap();

    clock.set(at(15, 17, 0));
    let req = test::TestRequest::post()
        .uri("/api/attendance/scan")
        .peer_addr(peer())
        .insert_header(bearer(Role::Device))
        .set_json(json!({
            "worker_id": 1,
            "site_id": SITE,
            "device_id": DEVICE,
            "scan": { "template_data": TEMPLATE_DATA, "quality": 90 }
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["action"], "check-out");
    assert_eq!(hours(&body["record"]["total_hours"]), dec!(9));
    assert_eq!(body["record"]["status"], "OVERTIME");

    let req = test::TestRequest::get()
        .uri(&format!("/api/attendance/{id}"))
        .peer_addr(peer())
        .insert_header(bearer(Role::Hr))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(hours(&body["overtime_hours"]), dec!(1));
}

#[actix_web::test]
async fn roles_and_tokens_are_enforced() {
    let h = harness();
    let app = app!(h);

    let req = test::TestRequest::get()
        .uri("/api/payroll")
        .peer_addr(peer())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/api/payroll")
        .peer_addr(peer())
        .insert_header(("Authorization", "Bearer not-a-jwt"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/attendance/check-in")
        .peer_addr(peer())
        .insert_header(bearer(Role::Device))
        .set_json(json!({ "worker_id": 1, "site_id": SITE }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri("/api/payroll")
        .peer_addr(peer())
        .insert_header(bearer(Role::Hr))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn domain_errors_map_to_status_codes() {
    let h = harness();
    let app = app!(h);

    let req = test::TestRequest::post()
        .uri("/api/attendance/check-out")
        .peer_addr(peer())
        .insert_header(bearer(Role::SiteSupervisor))
        .set_json(json!({ "worker_id": 1, "site_id": SITE }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "PRECONDITION_FAILED");

    let req = test::TestRequest::post()
        .uri("/api/attendance/check-in")
        .peer_addr(peer())
        .insert_header(bearer(Role::SiteSupervisor))
        .set_json(json!({ "worker_id": 99, "site_id": SITE }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/api/payroll/calculate")
        .peer_addr(peer())
        .insert_header(bearer(Role::Hr))
        .set_json(json!({
            "site_id": SITE,
            "pay_period_start": "2024-01-31",
            "pay_period_end": "2024-01-01",
            "pay_period_type": "MONTHLY"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "INVALID");
}

#[actix_web::test]
async fn payroll_calculation_records_the_caller() {
    let h = harness();
    let app = app!(h);

    let req = test::TestRequest::post()
        .uri("/api/payroll/calculate")
        .peer_addr(peer())
        .insert_header(bearer(Role::Hr))
        .set_json(json!({
            "site_id": SITE,
            "pay_period_start": "2024-01-01",
            "pay_period_end": "2024-01-31",
            "pay_period_type": "MONTHLY"
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["summary"]["successful"], 1);
    assert_eq!(body["records"][0]["calculated_by"], "tester");
    assert_eq!(body["records"][0]["payment_status"], "PENDING");
}
