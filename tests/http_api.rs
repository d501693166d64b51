//! HTTP surface: routing, identity headers, response envelope and
//! conditional reads end to end.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use adspace_api::events::EventSender;
use adspace_api::AppState;

use common::{seed_site, setup, TestApp};

fn router(app: &TestApp) -> axum::Router {
    let (tx, _rx) = mpsc::channel(16);
    let state = AppState {
        db: app.db.clone(),
        config: app.config.clone(),
        event_sender: EventSender::new(tx),
        services: app.services.clone(),
    };
    adspace_api::app_router().with_state(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

#[tokio::test]
async fn status_endpoint_reports_ok() {
    let app = setup().await;
    let response = router(&app)
        .oneshot(Request::get("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["status"], json!("ok"));
}

#[tokio::test]
async fn quote_endpoint_computes_the_worked_example() {
    let app = setup().await;
    let payload = json!({
        "base_monthly_rate": "10000",
        "start_date": "2025-01-01",
        "end_date": "2025-04-01",
        "printing_charge": "500",
        "mounting_charge": "500",
        "discount": "0"
    });

    let response = router(&app)
        .oneshot(
            Request::post("/api/v1/pricing/quote")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["months"], json!(3));
    assert_eq!(body["data"]["total_minor_units"], json!(4_206_700));
}

#[tokio::test]
async fn protected_endpoints_require_identity_headers() {
    let app = setup().await;
    let response = router(&app)
        .oneshot(
            Request::post("/api/v1/bookings")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["error"], json!("Unauthorized"));
}

#[tokio::test]
async fn site_reads_honor_if_modified_since() {
    let app = setup().await;
    let site = seed_site(&app, Uuid::new_v4(), 10_000).await;
    let uri = format!("/api/v1/sites/{}", site.id);

    let first = router(&app)
        .oneshot(Request::get(uri.as_str()).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let last_modified = first
        .headers()
        .get(header::LAST_MODIFIED)
        .expect("last-modified")
        .to_str()
        .unwrap()
        .to_string();
    assert!(first.headers().contains_key(header::CACHE_CONTROL));

    let second = router(&app)
        .oneshot(
            Request::get(uri.as_str())
                .header(header::IF_MODIFIED_SINCE, last_modified.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::NOT_MODIFIED);
    let bytes = axum::body::to_bytes(second.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn admin_gate_protects_reconciliation() {
    let app = setup().await;
    let response = router(&app)
        .oneshot(
            Request::post("/api/v1/sites/reconcile")
                .header("x-user-id", Uuid::new_v4().to_string())
                .header("x-user-role", "vendor")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router(&app)
        .oneshot(
            Request::post("/api/v1/sites/reconcile")
                .header("x-user-id", Uuid::new_v4().to_string())
                .header("x-user-role", "admin")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["examined"], json!(0));
}
