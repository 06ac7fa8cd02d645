use super::common::{created_response, no_content_response, validate_input, PaginationParams};
use crate::{
    entities::staff_user,
    errors::ServiceError,
    services::staff_users::StaffUserDraft,
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::{Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StaffUserListQuery {
    pub search: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StaffUserResponse {
    pub id: Uuid,
    /// Login name, stored lower-case
    #[schema(example = "mhossein")]
    pub username: String,
    pub full_name: Option<String>,
    /// Destination for login notices; the username is used when absent
    pub phone: Option<String>,
    pub is_agent: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<staff_user::Model> for StaffUserResponse {
    fn from(model: staff_user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            full_name: model.full_name,
            phone: model.phone,
            is_agent: model.is_agent,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct StaffUserRequest {
    #[validate(length(min = 1, max = 150))]
    #[schema(example = "mhossein")]
    pub username: String,
    #[validate(length(max = 255))]
    pub full_name: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_agent: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl From<StaffUserRequest> for StaffUserDraft {
    fn from(req: StaffUserRequest) -> Self {
        Self {
            username: req.username,
            full_name: req.full_name,
            phone: req.phone,
            is_agent: req.is_agent,
            is_active: req.is_active,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/staff-users",
    params(PaginationParams, StaffUserListQuery),
    responses(
        (status = 200, description = "Staff users listed", body = ApiResponse<PaginatedResponse<StaffUserResponse>>)
    ),
    tag = "staff-users"
)]
pub async fn list_staff_users(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(query): Query<StaffUserListQuery>,
) -> ApiResult<PaginatedResponse<StaffUserResponse>> {
    let (page, per_page) = pagination.bounded();
    let (users, total) = state
        .services
        .staff_users
        .list(query.search, page, per_page)
        .await?;

    let items = users.into_iter().map(StaffUserResponse::from).collect();
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, page, per_page, total,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/staff-users/{id}",
    params(("id" = Uuid, Path, description = "Staff user ID")),
    responses(
        (status = 200, description = "Staff user fetched", body = ApiResponse<StaffUserResponse>),
        (status = 404, description = "Staff user not found", body = crate::errors::ErrorResponse)
    ),
    tag = "staff-users"
)]
pub async fn get_staff_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StaffUserResponse> {
    let user = state.services.staff_users.get(id).await?;
    Ok(Json(ApiResponse::success(user.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/staff-users",
    request_body = StaffUserRequest,
    responses(
        (status = 201, description = "Staff user created", body = ApiResponse<StaffUserResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Username taken", body = crate::errors::ErrorResponse)
    ),
    tag = "staff-users"
)]
pub async fn create_staff_user(
    State(state): State<AppState>,
    Json(payload): Json<StaffUserRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let user = state.services.staff_users.create(payload.into()).await?;
    Ok(created_response(StaffUserResponse::from(user)))
}

#[utoipa::path(
    put,
    path = "/api/v1/staff-users/{id}",
    params(("id" = Uuid, Path, description = "Staff user ID")),
    request_body = StaffUserRequest,
    responses(
        (status = 200, description = "Staff user updated", body = ApiResponse<StaffUserResponse>),
        (status = 404, description = "Staff user not found", body = crate::errors::ErrorResponse)
    ),
    tag = "staff-users"
)]
pub async fn update_staff_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StaffUserRequest>,
) -> ApiResult<StaffUserResponse> {
    validate_input(&payload)?;
    let user = state.services.staff_users.update(id, payload.into()).await?;
    Ok(Json(ApiResponse::success(user.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/staff-users/{id}",
    params(("id" = Uuid, Path, description = "Staff user ID")),
    responses(
        (status = 204, description = "Staff user deleted; their shipments lose the responsible staff link"),
        (status = 404, description = "Staff user not found", body = crate::errors::ErrorResponse)
    ),
    tag = "staff-users"
)]
pub async fn delete_staff_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.staff_users.delete(id).await?;
    Ok(no_content_response())
}
