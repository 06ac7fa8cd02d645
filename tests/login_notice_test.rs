mod common;

use std::{sync::Arc, time::Duration};

use common::TestApp;
use forwarder_api::services::{notifications::HttpSmsGateway, staff_users::StaffUserDraft};
use serde_json::Value;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

const MANAGER: &str = "+989120000000";

async fn app_with_gateway(server: &MockServer) -> TestApp {
    let gateway = HttpSmsGateway::new(
        format!("{}/send", server.uri()),
        "test-key",
        "FORWARDER",
        Duration::from_secs(5),
    )
    .expect("gateway client");
    TestApp::with_gateway(Arc::new(gateway), Some(MANAGER)).await
}

#[tokio::test]
async fn login_notice_reaches_user_and_manager() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let app = app_with_gateway(&server).await;
    let mut draft = StaffUserDraft::with_username("nazanin");
    draft.phone = Some("+989121111111".into());
    app.services().staff_users.create(draft).await.unwrap();

    let notice = app
        .services()
        .login_notifier
        .notify("  Nazanin ")
        .await
        .expect("notice");
    assert_eq!(notice.recipients, ["+989121111111", MANAGER]);
    assert_eq!(notice.delivered, 2);

    let requests = server.received_requests().await.unwrap();
    let first: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(first["to"], "+989121111111");
    assert_eq!(first["sender"], "FORWARDER");
    assert_eq!(
        first["message"],
        "Admin login detected:\nUser: nazanin\nTime: 2024-03-05 09:30:00"
    );
}

#[tokio::test]
async fn unknown_users_are_texted_at_their_username() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let app = app_with_gateway(&server).await;
    let notice = app
        .services()
        .login_notifier
        .notify("09121234567")
        .await
        .unwrap();
    assert_eq!(notice.recipients, ["09121234567", MANAGER]);
}

#[tokio::test]
async fn gateway_failures_do_not_fail_the_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let app = app_with_gateway(&server).await;
    let notice = app
        .services()
        .login_notifier
        .notify("nazanin")
        .await
        .expect("failures are logged, not returned");
    assert_eq!(notice.delivered, 0);
    assert_eq!(notice.recipients.len(), 2);
}
