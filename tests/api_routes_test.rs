mod common;

use axum::http::{header, Method, StatusCode};
use common::{body_bytes, body_json, body_text, TestApp};
use forwarder_api::entities::{LookupKind, PartyRole};
use serde_json::json;
use uuid::Uuid;

async fn create_shipment(app: &TestApp, client_id: Uuid, staff: Option<&str>) -> serde_json::Value {
    let response = app
        .request(
            Method::POST,
            "/api/v1/shipments",
            Some(json!({
                "client_id": client_id,
                "etd": "2024-03-05",
                "eta": "2024-03-08",
                "pieces": 3,
                "mawb": "157-12345675"
            })),
            staff,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

#[tokio::test]
async fn shipment_crud_over_http() {
    let app = TestApp::new().await;
    let staff = app.staff("nazanin").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/parties",
            Some(json!({ "role": "customer", "name": "Aria Trading" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let client = body_json(response).await["data"].clone();
    let client_id: Uuid = serde_json::from_value(client["id"].clone()).unwrap();

    let shipment = create_shipment(&app, client_id, Some("Nazanin")).await;
    assert_eq!(shipment["reference"], "240305001");
    assert_eq!(shipment["transit_time"], 3);
    assert_eq!(shipment["sp_id"], json!(staff.id));
    let id = shipment["id"].as_str().unwrap().to_string();

    let response = app
        .request(Method::GET, "/api/v1/shipments?search=aria&per_page=10", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_json(response).await;
    assert_eq!(page["data"]["total"], 1);
    assert_eq!(page["data"]["per_page"], 10);
    assert_eq!(page["data"]["items"][0]["id"], id.as_str());

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/shipments/{id}/confirmation"),
            Some(json!({ "confirmed": true })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let confirmed = body_json(response).await;
    assert_eq!(confirmed["data"]["confirmed_at"], "2024-03-05T09:30:00");

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/shipments/{id}"),
            Some(json!({ "client_id": client_id, "reference": "999999999" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request(Method::DELETE, &format!("/api/v1/shipments/{id}"), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .request(Method::GET, &format!("/api/v1/shipments/{id}"), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let error = body_json(response).await;
    assert!(error["request_id"].is_string());
}

#[tokio::test]
async fn documents_are_served_as_attachments() {
    let app = TestApp::new().await;
    let client = app.party(PartyRole::Customer, "Aria Trading").await;
    let shipment = create_shipment(&app, client.id, None).await;
    let id = shipment["id"].as_str().unwrap();

    let response = app
        .request(Method::GET, &format!("/api/v1/shipments/{id}/manifest"), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("240305001"));
    let manifest = body_text(response).await;
    assert_eq!(manifest.lines().count(), 4);

    let response = app
        .request(Method::GET, "/api/v1/shipments/export", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv; charset=utf-8");
    let csv = body_text(response).await;
    assert!(csv.starts_with("id,reference,client,"));
    assert!(csv.contains("240305001"));

    let response = app
        .request(Method::GET, &format!("/api/v1/shipments/{id}/invoice"), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let invoice = body_json(response).await;
    assert_eq!(invoice["data"]["reference"], "240305001");
    assert_eq!(invoice["data"]["client"], "Aria Trading");
}

#[tokio::test]
async fn import_endpoint_reports_and_rejects() {
    let app = TestApp::new().await;
    let csv = "client,pol\nAria Trading,IKA\n";

    let response = app
        .request_text(Method::POST, "/api/v1/shipments/import?dry_run=true", csv, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let report = body_json(response).await;
    assert_eq!(report["data"]["dry_run"], true);
    assert_eq!(report["data"]["committed"], false);
    assert_eq!(report["data"]["totals"]["new"], 1);

    let response = app
        .request_text(
            Method::POST,
            "/api/v1/shipments/import",
            "client,eta\nAria Trading,31/31/2024\n",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let error = body_json(response).await;
    assert_eq!(error["details"]["rows"][0]["column"], "eta");

    let response = app
        .request_text(Method::POST, "/api/v1/shipments/import", csv, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["committed"], true);
}

#[tokio::test]
async fn spreadsheet_export_feeds_spreadsheet_import() {
    let app = TestApp::new().await;
    let client = app.party(PartyRole::Customer, "Aria Trading").await;
    create_shipment(&app, client.id, None).await;

    let response = app
        .request(Method::GET, "/api/v1/shipments/export?format=xlsx", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains(".xlsx"));
    let workbook = body_bytes(response).await;
    assert!(workbook.starts_with(b"PK"));

    let response = app
        .request_bytes(
            Method::POST,
            "/api/v1/shipments/import",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            workbook,
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let report = body_json(response).await;
    assert_eq!(report["data"]["committed"], true);
    assert_eq!(report["data"]["totals"]["new"], 0);
    assert_eq!(report["data"]["totals"]["update"], 1);

    let response = app
        .request_bytes(
            Method::POST,
            "/api/v1/shipments/import",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            b"client,pol\nAria Trading,IKA\n".to_vec(),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn comments_need_a_known_staff_user() {
    let app = TestApp::new().await;
    app.staff("bahar").await;
    let client = app.party(PartyRole::Customer, "Aria Trading").await;
    let shipment = create_shipment(&app, client.id, None).await;
    let uri = format!("/api/v1/shipments/{}/comments", shipment["id"].as_str().unwrap());

    let response = app
        .request(Method::POST, &uri, Some(json!({ "text": "Awaiting AWB" })), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(
            Method::POST,
            &uri,
            Some(json!({ "text": "Awaiting AWB" })),
            Some("bahar"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["data"]["author_name"], "bahar");

    let response = app.request(Method::GET, &uri, None, None).await;
    let comments = body_json(response).await;
    assert_eq!(comments["data"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn lookup_delete_reports_removed_shipments() {
    let app = TestApp::new().await;
    let client = app.party(PartyRole::Customer, "Aria Trading").await;
    let term = app.lookup(LookupKind::Term, "EXW").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/shipments",
            Some(json!({ "client_id": client.id, "term_id": term.id })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .request(Method::DELETE, &format!("/api/v1/lookups/{}", term.id), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["shipments_deleted"], 1);
}

#[tokio::test]
async fn login_events_are_accepted_without_waiting() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login-events",
            Some(json!({ "username": "nazanin" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = app.request(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["checks"]["database"], "healthy");
}
