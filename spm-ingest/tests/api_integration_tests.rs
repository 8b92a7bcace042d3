//! Integration tests for spm-ingest HTTP endpoints

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use helpers::{create_test_db, services_csv};

const BOUNDARY: &str = "spm-test-boundary";

/// Test helper: router over a fresh temp-file database
async fn create_test_app() -> (tempfile::TempDir, axum::Router, sqlx::SqlitePool) {
    let (dir, pool) = create_test_db().await;
    let app = spm_ingest::build_router(spm_ingest::AppState::new(pool.clone()));
    (dir, app, pool)
}

fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: text/csv\r\n\r\n",
                BOUNDARY, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn discover_request(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/uploads/discover")
        .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(multipart_body(fields, file)))
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (_dir, app, _pool) = create_test_app().await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "spm-ingest");
}

#[tokio::test]
async fn test_discover_confirm_round_trip() {
    let (_dir, app, _pool) = create_test_app().await;
    let csv = services_csv(&[("Atlanta", "Main St", "Jane Doe")]);

    let response = app
        .clone()
        .oneshot(discover_request(
            &[("file_kind", "services"), ("report_date", "2024-03-01")],
            Some(("services.csv", csv.as_slice())),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let discovery = body_json(response).await;
    let session_id = discovery["sessionId"].as_str().unwrap().to_string();
    assert_eq!(discovery["discoveredMarkets"][0]["name"], "Atlanta");
    assert_eq!(discovery["discoveredMarkets"][0]["action"], "create");
    assert_eq!(discovery["discoveredAdvisors"][0]["action"], "create_user");
    assert!(discovery["existingMarkets"].as_array().unwrap().is_empty());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/uploads/sessions/{}", session_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let session = body_json(response).await;
    assert_eq!(session["status"], "pending_review");
    assert_eq!(session["rawData"]["kind"], "services");

    let confirm_uri = format!("/uploads/sessions/{}/confirm", session_id);
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &confirm_uri,
            json!({ "advisors": { "Jane Doe": { "action": "create", "externalId": "E-100" } } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let summary = body_json(response).await;
    assert_eq!(summary["processedCount"], 1);
    assert!(summary["storeMappings"]["Atlanta:Main St"].is_i64());

    let response = app
        .clone()
        .oneshot(json_request("POST", &confirm_uri, json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let error = body_json(response).await;
    assert_eq!(error["error"]["code"], "NOT_PENDING_REVIEW");

    let response = app
        .oneshot(json_request("POST", &format!("/uploads/sessions/{}/cancel", session_id), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["cancelled"], false);
}

#[tokio::test]
async fn test_discover_rejects_bad_requests() {
    let (_dir, app, pool) = create_test_app().await;
    let csv = services_csv(&[("Atlanta", "Main St", "Jane Doe")]);

    let no_file = app
        .clone()
        .oneshot(discover_request(&[("file_kind", "services"), ("report_date", "2024-03-01")], None))
        .await
        .unwrap();
    assert_eq!(no_file.status(), StatusCode::BAD_REQUEST);

    let no_date = app
        .clone()
        .oneshot(discover_request(&[("file_kind", "services")], Some(("services.csv", csv.as_slice()))))
        .await
        .unwrap();
    assert_eq!(no_date.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(no_date).await["error"]["message"]
        .as_str()
        .unwrap()
        .contains("report date"));

    let wrong_kind = app
        .oneshot(discover_request(
            &[
                ("file_kind", "services"),
                ("expected_kind", "operations"),
                ("report_date", "2024-03-01"),
            ],
            Some(("services.csv", csv.as_slice())),
        ))
        .await
        .unwrap();
    assert_eq!(wrong_kind.status(), StatusCode::BAD_REQUEST);

    assert_eq!(helpers::count(&pool, "upload_sessions").await, 0);
}

#[tokio::test]
async fn test_session_listing_and_unknown_ids() {
    let (_dir, app, pool) = create_test_app().await;
    helpers::discover_csv(
        &pool,
        spm_ingest::models::UploadKind::Services,
        &services_csv(&[("Atlanta", "Main St", "Jane Doe")]),
    )
    .await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/uploads/sessions?status=pending_review&limit=10")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let list = body_json(response).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["fileType"], "services");

    let bad_status = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/uploads/sessions?status=archived")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(bad_status.status(), StatusCode::BAD_REQUEST);

    let missing = uuid::Uuid::new_v4();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/uploads/sessions/{}", missing))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(json_request("POST", &format!("/uploads/sessions/{}/cancel", missing), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
