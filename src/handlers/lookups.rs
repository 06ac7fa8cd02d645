use super::common::{created_response, validate_input, PaginationParams};
use crate::{
    entities::{lookup_entry, LookupKind},
    errors::ServiceError,
    services::lookups::{LookupDraft, LookupFilter},
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
pub struct LookupListQuery {
    pub kind: Option<LookupKind>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LookupResponse {
    pub id: Uuid,
    pub kind: LookupKind,
    #[schema(example = "Tehran IKA")]
    pub data: String,
    pub country_name: Option<String>,
    pub country_abbr: Option<String>,
    /// IATA code printed on manifests; never set on terms
    #[schema(example = "IKA")]
    pub airport_abbr: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<lookup_entry::Model> for LookupResponse {
    fn from(model: lookup_entry::Model) -> Self {
        Self {
            id: model.id,
            kind: model.kind,
            data: model.data,
            country_name: model.country_name,
            country_abbr: model.country_abbr,
            airport_abbr: model.airport_abbr,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LookupRequest {
    /// Fixed once the entry exists
    pub kind: LookupKind,
    #[validate(length(min = 1, max = 255))]
    pub data: String,
    #[validate(length(max = 128))]
    pub country_name: Option<String>,
    #[validate(length(max = 8))]
    pub country_abbr: Option<String>,
    #[validate(length(max = 8))]
    pub airport_abbr: Option<String>,
}

impl From<LookupRequest> for LookupDraft {
    fn from(req: LookupRequest) -> Self {
        Self {
            kind: req.kind,
            data: req.data,
            country_name: req.country_name,
            country_abbr: req.country_abbr,
            airport_abbr: req.airport_abbr,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LookupDeleted {
    pub id: Uuid,
    /// Shipments removed together with the entry
    pub shipments_deleted: u64,
}

#[utoipa::path(
    get,
    path = "/api/v1/lookups",
    params(PaginationParams, LookupListQuery),
    responses(
        (status = 200, description = "Lookup entries listed", body = ApiResponse<PaginatedResponse<LookupResponse>>)
    ),
    tag = "lookups"
)]
pub async fn list_lookups(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(query): Query<LookupListQuery>,
) -> ApiResult<PaginatedResponse<LookupResponse>> {
    let (page, per_page) = pagination.bounded();
    let filter = LookupFilter {
        kind: query.kind,
        search: query.search,
    };
    let (entries, total) = state.services.lookups.list(filter, page, per_page).await?;

    let items = entries.into_iter().map(LookupResponse::from).collect();
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, page, per_page, total,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/lookups/{id}",
    params(("id" = Uuid, Path, description = "Lookup entry ID")),
    responses(
        (status = 200, description = "Lookup entry fetched", body = ApiResponse<LookupResponse>),
        (status = 404, description = "Lookup entry not found", body = crate::errors::ErrorResponse)
    ),
    tag = "lookups"
)]
pub async fn get_lookup(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<LookupResponse> {
    let entry = state.services.lookups.get(id).await?;
    Ok(Json(ApiResponse::success(entry.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/lookups",
    request_body = LookupRequest,
    responses(
        (status = 201, description = "Lookup entry created", body = ApiResponse<LookupResponse>),
        (status = 409, description = "Entry already exists", body = crate::errors::ErrorResponse)
    ),
    tag = "lookups"
)]
pub async fn create_lookup(
    State(state): State<AppState>,
    Json(payload): Json<LookupRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let entry = state.services.lookups.create(payload.into()).await?;
    Ok(created_response(LookupResponse::from(entry)))
}

#[utoipa::path(
    put,
    path = "/api/v1/lookups/{id}",
    params(("id" = Uuid, Path, description = "Lookup entry ID")),
    request_body = LookupRequest,
    responses(
        (status = 200, description = "Lookup entry updated", body = ApiResponse<LookupResponse>),
        (status = 404, description = "Lookup entry not found", body = crate::errors::ErrorResponse)
    ),
    tag = "lookups"
)]
pub async fn update_lookup(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LookupRequest>,
) -> ApiResult<LookupResponse> {
    validate_input(&payload)?;
    let entry = state.services.lookups.update(id, payload.into()).await?;
    Ok(Json(ApiResponse::success(entry.into())))
}

/// Deleting an entry also deletes every shipment routed through it.
#[utoipa::path(
    delete,
    path = "/api/v1/lookups/{id}",
    params(("id" = Uuid, Path, description = "Lookup entry ID")),
    responses(
        (status = 200, description = "Lookup entry and its shipments deleted", body = ApiResponse<LookupDeleted>),
        (status = 404, description = "Lookup entry not found", body = crate::errors::ErrorResponse)
    ),
    tag = "lookups"
)]
pub async fn delete_lookup(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<LookupDeleted> {
    let shipments_deleted = state.services.lookups.delete(id).await?;
    Ok(Json(ApiResponse::success(LookupDeleted {
        id,
        shipments_deleted,
    })))
}
