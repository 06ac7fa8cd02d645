use super::common::{created_response, no_content_response, validate_input};
use crate::{
    entities::{charge, ChargePayer},
    errors::ServiceError,
    services::charges::ChargeDraft,
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, State},
    response::{Json, Response},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChargeResponse {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub currency: String,
    pub payer: ChargePayer,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<charge::Model> for ChargeResponse {
    fn from(m: charge::Model) -> Self {
        Self {
            id: m.id,
            shipment_id: m.shipment_id,
            description: m.description,
            amount: m.amount,
            currency: m.currency,
            payer: m.payer,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChargeRequest {
    #[validate(length(min = 1, max = 255))]
    pub description: String,
    pub amount: Decimal,
    /// ISO currency code, e.g. `USD`
    #[validate(length(equal = 3))]
    pub currency: String,
    #[serde(default)]
    pub payer: ChargePayer,
}

impl From<ChargeRequest> for ChargeDraft {
    fn from(r: ChargeRequest) -> Self {
        Self {
            description: r.description,
            amount: r.amount,
            currency: r.currency,
            payer: r.payer,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/shipments/{id}/charges",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    responses(
        (status = 200, description = "Charge lines, oldest first", body = ApiResponse<Vec<ChargeResponse>>),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "charges"
)]
pub async fn list_charges(
    State(state): State<AppState>,
    Path(shipment_id): Path<Uuid>,
) -> ApiResult<Vec<ChargeResponse>> {
    let charges = state.services.charges.list(shipment_id).await?;
    Ok(Json(ApiResponse::success(
        charges.into_iter().map(ChargeResponse::from).collect(),
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/shipments/{id}/charges",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    request_body = ChargeRequest,
    responses(
        (status = 201, description = "Charge added", body = ApiResponse<ChargeResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "charges"
)]
pub async fn create_charge(
    State(state): State<AppState>,
    Path(shipment_id): Path<Uuid>,
    Json(payload): Json<ChargeRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let charge = state
        .services
        .charges
        .create(shipment_id, payload.into())
        .await?;
    Ok(created_response(ChargeResponse::from(charge)))
}

#[utoipa::path(
    put,
    path = "/api/v1/shipments/{id}/charges/{charge_id}",
    params(
        ("id" = Uuid, Path, description = "Shipment ID"),
        ("charge_id" = Uuid, Path, description = "Charge ID")
    ),
    request_body = ChargeRequest,
    responses(
        (status = 200, description = "Charge updated", body = ApiResponse<ChargeResponse>),
        (status = 404, description = "Charge not found on this shipment", body = crate::errors::ErrorResponse)
    ),
    tag = "charges"
)]
pub async fn update_charge(
    State(state): State<AppState>,
    Path((shipment_id, charge_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ChargeRequest>,
) -> ApiResult<ChargeResponse> {
    validate_input(&payload)?;
    let charge = state
        .services
        .charges
        .update(shipment_id, charge_id, payload.into())
        .await?;
    Ok(Json(ApiResponse::success(charge.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/shipments/{id}/charges/{charge_id}",
    params(
        ("id" = Uuid, Path, description = "Shipment ID"),
        ("charge_id" = Uuid, Path, description = "Charge ID")
    ),
    responses(
        (status = 204, description = "Charge deleted"),
        (status = 404, description = "Charge not found on this shipment", body = crate::errors::ErrorResponse)
    ),
    tag = "charges"
)]
pub async fn delete_charge(
    State(state): State<AppState>,
    Path((shipment_id, charge_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ServiceError> {
    state
        .services
        .charges
        .delete(shipment_id, charge_id)
        .await?;
    Ok(no_content_response())
}
