use super::common::{created_response, no_content_response, validate_input, PaginationParams};
use crate::{entities::console, errors::ServiceError, ApiResponse, ApiResult, AppState, PaginatedResponse};
use axum::{
    extract::{Path, Query, State},
    response::{Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConsoleResponse {
    pub id: Uuid,
    #[schema(example = "CON-42")]
    pub code: String,
    pub created_at: DateTime<Utc>,
}

impl From<console::Model> for ConsoleResponse {
    fn from(model: console::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateConsoleRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/consoles",
    params(PaginationParams),
    responses(
        (status = 200, description = "Consoles listed, newest first", body = ApiResponse<PaginatedResponse<ConsoleResponse>>)
    ),
    tag = "consoles"
)]
pub async fn list_consoles(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<PaginatedResponse<ConsoleResponse>> {
    let (page, per_page) = pagination.bounded();
    let (consoles, total) = state.services.consoles.list(page, per_page).await?;

    let items = consoles.into_iter().map(ConsoleResponse::from).collect();
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, page, per_page, total,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/consoles/{id}",
    params(("id" = Uuid, Path, description = "Console ID")),
    responses(
        (status = 200, description = "Console fetched", body = ApiResponse<ConsoleResponse>),
        (status = 404, description = "Console not found", body = crate::errors::ErrorResponse)
    ),
    tag = "consoles"
)]
pub async fn get_console(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ConsoleResponse> {
    let console = state.services.consoles.get(id).await?;
    Ok(Json(ApiResponse::success(console.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/consoles",
    request_body = CreateConsoleRequest,
    responses(
        (status = 201, description = "Console created", body = ApiResponse<ConsoleResponse>),
        (status = 409, description = "Code already used", body = crate::errors::ErrorResponse)
    ),
    tag = "consoles"
)]
pub async fn create_console(
    State(state): State<AppState>,
    Json(payload): Json<CreateConsoleRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let console = state.services.consoles.create(&payload.code).await?;
    Ok(created_response(ConsoleResponse::from(console)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/consoles/{id}",
    params(("id" = Uuid, Path, description = "Console ID")),
    responses(
        (status = 204, description = "Console deleted; member shipments are detached"),
        (status = 404, description = "Console not found", body = crate::errors::ErrorResponse)
    ),
    tag = "consoles"
)]
pub async fn delete_console(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.consoles.delete(id).await?;
    Ok(no_content_response())
}
