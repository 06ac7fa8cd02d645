use super::common::{created_response, no_content_response, validate_input, ActingUser};
use crate::{entities::shipment_comment, errors::ServiceError, ApiResponse, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    response::{Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommentResponse {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub text: String,
    pub author_id: Option<Uuid>,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<shipment_comment::Model> for CommentResponse {
    fn from(m: shipment_comment::Model) -> Self {
        Self {
            id: m.id,
            shipment_id: m.shipment_id,
            text: m.text,
            author_id: m.author_id,
            author_name: m.author_name,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CommentRequest {
    #[validate(length(min = 1, max = 4000))]
    pub text: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/shipments/{id}/comments",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    responses(
        (status = 200, description = "Comments, oldest first", body = ApiResponse<Vec<CommentResponse>>),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "comments"
)]
pub async fn list_comments(
    State(state): State<AppState>,
    Path(shipment_id): Path<Uuid>,
) -> ApiResult<Vec<CommentResponse>> {
    let comments = state.services.comments.list(shipment_id).await?;
    Ok(Json(ApiResponse::success(
        comments.into_iter().map(CommentResponse::from).collect(),
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/shipments/{id}/comments",
    params(
        ("id" = Uuid, Path, description = "Shipment ID"),
        ("x-staff-user" = String, Header, description = "Username of the commenting staff member")
    ),
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Comment added", body = ApiResponse<CommentResponse>),
        (status = 401, description = "No active staff user on the request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "comments"
)]
pub async fn create_comment(
    State(state): State<AppState>,
    Path(shipment_id): Path<Uuid>,
    acting: ActingUser,
    Json(payload): Json<CommentRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let comment = state
        .services
        .comments
        .create(shipment_id, acting.id(), &payload.text)
        .await?;
    Ok(created_response(CommentResponse::from(comment)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/shipments/{id}/comments/{comment_id}",
    params(
        ("id" = Uuid, Path, description = "Shipment ID"),
        ("comment_id" = Uuid, Path, description = "Comment ID")
    ),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 404, description = "Comment not found on this shipment", body = crate::errors::ErrorResponse)
    ),
    tag = "comments"
)]
pub async fn delete_comment(
    State(state): State<AppState>,
    Path((shipment_id, comment_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ServiceError> {
    state
        .services
        .comments
        .delete(shipment_id, comment_id)
        .await?;
    Ok(no_content_response())
}
