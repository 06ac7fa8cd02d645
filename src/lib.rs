//! Forwarder API library
//!
//! Back-office service for an air freight forwarder: shipment records and
//! their parties, consoles, charges, manifest and invoice documents, and
//! bulk CSV exchange.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::HeaderValue,
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use services::{clock::Clock, notifications::SmsGateway};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};
use utoipa::ToSchema;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        clock: Arc<dyn Clock>,
        sms_gateway: Arc<dyn SmsGateway>,
    ) -> Self {
        let services = handlers::AppServices::new(
            db.clone(),
            clock.clone(),
            sms_gateway,
            config.sms.manager_phone.clone(),
        );
        Self {
            db,
            config,
            services,
            clock,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, page: u64, per_page: u64, total: u64) -> Self {
        let total_pages = if per_page == 0 {
            0
        } else {
            total.div_ceil(per_page)
        };
        Self {
            items,
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Routes mounted under `/api/v1`.
pub fn api_v1_routes() -> Router<AppState> {
    use handlers::{
        auth, charges, comments, consoles, documents, lookups, parties, shipments, staff_users,
    };

    let reference_data = Router::new()
        .route(
            "/staff-users",
            get(staff_users::list_staff_users).post(staff_users::create_staff_user),
        )
        .route(
            "/staff-users/:id",
            get(staff_users::get_staff_user)
                .put(staff_users::update_staff_user)
                .delete(staff_users::delete_staff_user),
        )
        .route(
            "/parties",
            get(parties::list_parties).post(parties::create_party),
        )
        .route(
            "/parties/:id",
            get(parties::get_party)
                .put(parties::update_party)
                .delete(parties::delete_party),
        )
        .route(
            "/lookups",
            get(lookups::list_lookups).post(lookups::create_lookup),
        )
        .route(
            "/lookups/:id",
            get(lookups::get_lookup)
                .put(lookups::update_lookup)
                .delete(lookups::delete_lookup),
        )
        .route(
            "/consoles",
            get(consoles::list_consoles).post(consoles::create_console),
        )
        .route(
            "/consoles/:id",
            get(consoles::get_console).delete(consoles::delete_console),
        );

    // Static segments win over `:id` in the router, so export/import are
    // safe next to the per-shipment routes.
    let shipment_routes = Router::new()
        .route(
            "/shipments",
            get(shipments::list_shipments).post(shipments::create_shipment),
        )
        .route("/shipments/export", get(documents::export_shipments))
        .route("/shipments/import", post(documents::import_shipments))
        .route(
            "/shipments/:id",
            get(shipments::get_shipment)
                .put(shipments::update_shipment)
                .delete(shipments::delete_shipment),
        )
        .route(
            "/shipments/:id/confirmation",
            put(shipments::set_confirmation),
        )
        .route(
            "/shipments/:id/operators",
            get(shipments::list_operators).put(shipments::set_operators),
        )
        .route(
            "/shipments/:id/charges",
            get(charges::list_charges).post(charges::create_charge),
        )
        .route(
            "/shipments/:id/charges/:charge_id",
            put(charges::update_charge).delete(charges::delete_charge),
        )
        .route(
            "/shipments/:id/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/shipments/:id/comments/:comment_id",
            axum::routing::delete(comments::delete_comment),
        )
        .route("/shipments/:id/manifest", get(documents::download_manifest))
        .route("/shipments/:id/invoice", get(documents::get_invoice));

    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .route("/auth/login-events", post(auth::record_login))
        .merge(reference_data)
        .merge(shipment_routes)
}

/// CORS policy from configuration. Errors when a non-development
/// deployment has neither explicit origins nor the permissive opt-in.
pub fn cors_layer(cfg: &config::AppConfig) -> anyhow::Result<CorsLayer> {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    if let Some(origins) = configured_origins {
        Ok(CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any))
    } else if cfg.should_allow_permissive_cors() {
        ::tracing::info!("Using permissive CORS because explicit origins were not configured");
        Ok(CorsLayer::permissive())
    } else {
        anyhow::bail!(
            "Missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true"
        )
    }
}

/// Full HTTP application: versioned API, Swagger UI and the middleware stack.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let cors = cors_layer(&state.config)?;
    let body_limit = state.config.max_body_size;

    Ok(Router::<AppState>::new()
        .route("/", get(|| async { "forwarder-api up" }))
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        .layer(DefaultBodyLimit::max(body_limit))
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(cors)
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state))
}

async fn api_status(State(state): State<AppState>) -> ApiResult<Value> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "forwarder-api",
        "environment": state.config.environment,
        "business_time": state.clock.now_local().format("%Y-%m-%dT%H:%M:%S").to_string(),
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(State(state): State<AppState>) -> ApiResult<Value> {
    let db_status = match db::check_connection(&state.db).await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
            "sms_gateway": if state.config.sms.is_enabled() { "configured" } else { "disabled" },
        },
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-err"), async {
                ApiResponse::<()>::error("oops".into())
            })
            .await;

        assert!(!response.success);
        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
    }

    #[test]
    fn total_pages_round_up() {
        let page = PaginatedResponse::new(vec![1, 2, 3], 1, 50, 101);
        assert_eq!(page.total_pages, 3);
        assert_eq!(PaginatedResponse::<u8>::new(vec![], 1, 50, 0).total_pages, 0);
    }

    #[test]
    fn production_without_origins_has_no_cors_policy() {
        let cfg = config::AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            8080,
            "production".into(),
        );
        assert!(cors_layer(&cfg).is_err());

        let mut cfg = cfg;
        cfg.cors_allowed_origins = Some("https://ops.example.com".into());
        assert!(cors_layer(&cfg).is_ok());
    }
}
