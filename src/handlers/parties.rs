use super::common::{created_response, no_content_response, validate_input, PaginationParams};
use crate::{
    entities::{party, PartyRole},
    errors::ServiceError,
    services::parties::{PartyDraft, PartyFilter},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::{Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PartyListQuery {
    /// Only parties playing this role
    pub role: Option<PartyRole>,
    /// Matches name, national id or code
    pub search: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "5f0e8400-e29b-41d4-a716-446655440000",
    "role": "carrier",
    "name": "Qatar Airways",
    "national_id": null,
    "code": "QR",
    "phone": null,
    "email": "cargo@example.com",
    "address": null,
    "city": "Doha",
    "country": "QA",
    "created_at": "2024-03-05T10:30:00Z",
    "updated_at": "2024-03-05T10:30:00Z"
}))]
pub struct PartyResponse {
    pub id: Uuid,
    pub role: PartyRole,
    pub name: String,
    pub national_id: Option<String>,
    /// Carrier code printed on manifests
    pub code: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<party::Model> for PartyResponse {
    fn from(model: party::Model) -> Self {
        Self {
            id: model.id,
            role: model.role,
            name: model.name,
            national_id: model.national_id,
            code: model.code,
            phone: model.phone,
            email: model.email,
            address: model.address,
            city: model.city,
            country: model.country,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PartyRequest {
    /// Fixed once the party exists
    pub role: PartyRole,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 64))]
    pub national_id: Option<String>,
    #[validate(length(max = 16))]
    pub code: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub address: Option<String>,
    #[validate(length(max = 128))]
    pub city: Option<String>,
    #[validate(length(max = 128))]
    pub country: Option<String>,
}

impl From<PartyRequest> for PartyDraft {
    fn from(req: PartyRequest) -> Self {
        Self {
            role: req.role,
            name: req.name,
            national_id: req.national_id,
            code: req.code,
            phone: req.phone,
            email: req.email,
            address: req.address,
            city: req.city,
            country: req.country,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/parties",
    params(PaginationParams, PartyListQuery),
    responses(
        (status = 200, description = "Parties listed", body = ApiResponse<PaginatedResponse<PartyResponse>>)
    ),
    tag = "parties"
)]
pub async fn list_parties(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(query): Query<PartyListQuery>,
) -> ApiResult<PaginatedResponse<PartyResponse>> {
    let (page, per_page) = pagination.bounded();
    let filter = PartyFilter {
        role: query.role,
        search: query.search,
    };
    let (parties, total) = state.services.parties.list(filter, page, per_page).await?;

    let items = parties.into_iter().map(PartyResponse::from).collect();
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, page, per_page, total,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/parties/{id}",
    params(("id" = Uuid, Path, description = "Party ID")),
    responses(
        (status = 200, description = "Party fetched", body = ApiResponse<PartyResponse>),
        (status = 404, description = "Party not found", body = crate::errors::ErrorResponse)
    ),
    tag = "parties"
)]
pub async fn get_party(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<PartyResponse> {
    let party = state.services.parties.get(id).await?;
    Ok(Json(ApiResponse::success(party.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/parties",
    request_body = PartyRequest,
    responses(
        (status = 201, description = "Party created", body = ApiResponse<PartyResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "A party with this role and name exists", body = crate::errors::ErrorResponse)
    ),
    tag = "parties"
)]
pub async fn create_party(
    State(state): State<AppState>,
    Json(payload): Json<PartyRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let party = state.services.parties.create(payload.into()).await?;
    Ok(created_response(PartyResponse::from(party)))
}

#[utoipa::path(
    put,
    path = "/api/v1/parties/{id}",
    params(("id" = Uuid, Path, description = "Party ID")),
    request_body = PartyRequest,
    responses(
        (status = 200, description = "Party updated", body = ApiResponse<PartyResponse>),
        (status = 400, description = "Role change or invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Party not found", body = crate::errors::ErrorResponse)
    ),
    tag = "parties"
)]
pub async fn update_party(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PartyRequest>,
) -> ApiResult<PartyResponse> {
    validate_input(&payload)?;
    let party = state.services.parties.update(id, payload.into()).await?;
    Ok(Json(ApiResponse::success(party.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/parties/{id}",
    params(("id" = Uuid, Path, description = "Party ID")),
    responses(
        (status = 204, description = "Party deleted"),
        (status = 404, description = "Party not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Party is still referenced by shipments", body = crate::errors::ErrorResponse)
    ),
    tag = "parties"
)]
pub async fn delete_party(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.parties.delete(id).await?;
    Ok(no_content_response())
}
