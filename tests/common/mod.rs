#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    Router,
};
use chrono::{NaiveDate, NaiveDateTime};
use forwarder_api::{
    config::AppConfig,
    db,
    entities::{lookup_entry, party, staff_user, LookupKind, PartyRole},
    handlers::{common::STAFF_USER_HEADER, AppServices},
    services::{
        clock::FixedClock,
        lookups::LookupDraft,
        notifications::{NoopSmsGateway, SmsGateway},
        parties::PartyDraft,
        staff_users::StaffUserDraft,
    },
    AppState,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

/// 2024-03-05 09:30 business time unless a test moves the clock.
pub fn business_time(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|day| day.and_hms_opt(h, min, 0))
        .expect("valid business time")
}

/// Application state over a throwaway SQLite file with a pinned clock.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub clock: Arc<FixedClock>,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_gateway(Arc::new(NoopSmsGateway), None).await
    }

    pub async fn with_gateway(gateway: Arc<dyn SmsGateway>, manager_phone: Option<&str>) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("forwarder_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.cors_allow_any_origin = true;
        // A single connection keeps SQLite writers strictly serialized.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.sms.manager_phone = manager_phone.map(str::to_string);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let clock = Arc::new(FixedClock::new(business_time(2024, 3, 5, 9, 30)));
        let state = AppState::new(Arc::new(pool), cfg, clock.clone(), gateway);
        let router = forwarder_api::build_router(state.clone()).expect("router");

        Self {
            router,
            state,
            clock,
            _dir: dir,
        }
    }

    pub fn services(&self) -> &AppServices {
        &self.state.services
    }

    /// JSON request, optionally on behalf of a staff user.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        staff_user: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(username) = staff_user {
            builder = builder.header(STAFF_USER_HEADER, username);
        }
        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };
        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Plain-text request, used for CSV uploads.
    pub async fn request_text(
        &self,
        method: Method,
        uri: &str,
        body: &str,
        staff_user: Option<&str>,
    ) -> axum::response::Response {
        self.request_bytes(method, uri, "text/csv", body.as_bytes().to_vec(), staff_user)
            .await
    }

    pub async fn request_bytes(
        &self,
        method: Method,
        uri: &str,
        content_type: &str,
        body: Vec<u8>,
        staff_user: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", content_type);
        if let Some(username) = staff_user {
            builder = builder.header(STAFF_USER_HEADER, username);
        }
        let request = builder
            .body(Body::from(body))
            .expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn staff(&self, username: &str) -> staff_user::Model {
        self.services()
            .staff_users
            .create(StaffUserDraft::with_username(username))
            .await
            .expect("staff user")
    }

    pub async fn party(&self, role: PartyRole, name: &str) -> party::Model {
        self.services()
            .parties
            .create(PartyDraft::named(role, name))
            .await
            .expect("party")
    }

    pub async fn lookup(&self, kind: LookupKind, data: &str) -> lookup_entry::Model {
        self.services()
            .lookups
            .create(LookupDraft::named(kind, data))
            .await
            .expect("lookup")
    }
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body")
        .to_vec()
}

pub async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}
