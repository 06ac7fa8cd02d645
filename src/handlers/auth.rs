use super::common::validate_input;
use crate::{errors::ServiceError, ApiResponse, AppState};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{info_span, warn, Instrument};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginEventRequest {
    #[validate(length(min = 1, max = 150))]
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginEventAccepted {
    pub username: String,
}

/// Records a successful staff login and texts the login notice in the
/// background. The response does not wait for the SMS gateway.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login-events",
    request_body = LoginEventRequest,
    responses(
        (status = 202, description = "Login notice queued", body = ApiResponse<LoginEventAccepted>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn record_login(
    State(state): State<AppState>,
    Json(payload): Json<LoginEventRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;

    let notifier = state.services.login_notifier.clone();
    let username = payload.username.clone();
    let span = info_span!("login_notice", username = %username);
    tokio::spawn(
        async move {
            if let Err(err) = notifier.notify(&username).await {
                warn!(error = %err, "login notice not sent");
            }
        }
        .instrument(span),
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(LoginEventAccepted {
            username: payload.username,
        })),
    )
        .into_response())
}
