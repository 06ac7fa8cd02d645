use super::{
    common::{created_response, no_content_response, validate_input, ActingUser, PaginationParams},
    staff_users::StaffUserResponse,
};
use crate::{
    entities::{shipment, Priority, TransportMode},
    errors::ServiceError,
    services::shipments::{ShipmentDraft, ShipmentFilter},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::{Json, Response},
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ShipmentListQuery {
    pub confirmed: Option<bool>,
    pub inq_replied: Option<bool>,
    pub client_id: Option<Uuid>,
    pub carrier_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub console_id: Option<Uuid>,
    pub pol_id: Option<Uuid>,
    pub pod_id: Option<Uuid>,
    pub term_id: Option<Uuid>,
    pub priority: Option<Priority>,
    /// Responsible staff member
    pub sp_id: Option<Uuid>,
    /// Earliest ETA, inclusive
    pub eta_from: Option<NaiveDate>,
    /// Latest ETA, inclusive
    pub eta_to: Option<NaiveDate>,
    /// Matches reference, air waybills, party names and the staff username
    pub search: Option<String>,
}

impl From<ShipmentListQuery> for ShipmentFilter {
    fn from(q: ShipmentListQuery) -> Self {
        Self {
            confirmed: q.confirmed,
            inq_replied: q.inq_replied,
            client_id: q.client_id,
            carrier_id: q.carrier_id,
            agent_id: q.agent_id,
            console_id: q.console_id,
            pol_id: q.pol_id,
            pod_id: q.pod_id,
            term_id: q.term_id,
            priority: q.priority,
            sp_id: q.sp_id,
            eta_from: q.eta_from,
            eta_to: q.eta_to,
            search: q.search,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "990e8400-e29b-41d4-a716-446655440000",
    "reference": "240305001",
    "priority": "green",
    "client_id": "5f0e8400-e29b-41d4-a716-446655440000",
    "mode": "air",
    "mawb": "157-12345675",
    "etd": "2024-03-05",
    "eta": "2024-03-07",
    "transit_time": 2,
    "confirmed": true,
    "confirmed_at": "2024-03-05T09:12:44",
    "total_charges": "1450.5"
}))]
pub struct ShipmentResponse {
    pub id: Uuid,
    /// `YYMMDDNNN`, allocated on creation and never changed
    pub reference: String,
    pub priority: Priority,
    pub client_id: Uuid,
    pub sp_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub carrier_id: Option<Uuid>,
    pub shipper_id: Option<Uuid>,
    pub consignee_id: Option<Uuid>,
    pub hawb_shipper_id: Option<Uuid>,
    pub hawb_consignee_id: Option<Uuid>,
    pub pol_id: Option<Uuid>,
    pub pod_id: Option<Uuid>,
    pub term_id: Option<Uuid>,
    pub via: Option<String>,
    pub mode: TransportMode,
    pub mawb: Option<String>,
    pub hawb: Option<String>,
    pub first_master: Option<String>,
    pub first_house: Option<String>,
    pub flight_no: Option<String>,
    pub manifest_no: Option<String>,
    pub etdw: Option<NaiveDate>,
    pub etd: Option<NaiveDate>,
    pub eta: Option<NaiveDate>,
    /// Days from ETD to ETA
    pub transit_time: Option<i32>,
    pub pieces: Option<i32>,
    pub gross_weight: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub chargeable_weight: Option<Decimal>,
    pub first_gross_weight: Option<Decimal>,
    pub first_chargeable_weight: Option<Decimal>,
    pub commodity: Option<String>,
    pub hs_code: Option<String>,
    pub console_id: Option<Uuid>,
    pub inq_replied: bool,
    pub confirmed: bool,
    /// Business-local time of the first confirmation
    pub confirmed_at: Option<NaiveDateTime>,
    pub currency: Option<String>,
    pub freight_charge: Option<Decimal>,
    pub handling_charge: Option<Decimal>,
    pub extra_charges: Option<Decimal>,
    pub total_charges: Option<Decimal>,
    pub invoice_deadline: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<shipment::Model> for ShipmentResponse {
    fn from(m: shipment::Model) -> Self {
        Self {
            id: m.id,
            reference: m.reference,
            priority: m.priority,
            client_id: m.client_id,
            sp_id: m.sp_id,
            agent_id: m.agent_id,
            carrier_id: m.carrier_id,
            shipper_id: m.shipper_id,
            consignee_id: m.consignee_id,
            hawb_shipper_id: m.hawb_shipper_id,
            hawb_consignee_id: m.hawb_consignee_id,
            pol_id: m.pol_id,
            pod_id: m.pod_id,
            term_id: m.term_id,
            via: m.via,
            mode: m.mode,
            mawb: m.mawb,
            hawb: m.hawb,
            first_master: m.first_master,
            first_house: m.first_house,
            flight_no: m.flight_no,
            manifest_no: m.manifest_no,
            etdw: m.etdw,
            etd: m.etd,
            eta: m.eta,
            transit_time: m.transit_time,
            pieces: m.pieces,
            gross_weight: m.gross_weight,
            volume: m.volume,
            chargeable_weight: m.chargeable_weight,
            first_gross_weight: m.first_gross_weight,
            first_chargeable_weight: m.first_chargeable_weight,
            commodity: m.commodity,
            hs_code: m.hs_code,
            console_id: m.console_id,
            inq_replied: m.inq_replied,
            confirmed: m.confirmed,
            confirmed_at: m.confirmed_at,
            currency: m.currency,
            freight_charge: m.freight_charge,
            handling_charge: m.handling_charge,
            extra_charges: m.extra_charges,
            total_charges: m.total_charges,
            invoice_deadline: m.invoice_deadline,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("must_not_be_negative"));
    }
    Ok(())
}

/// Writable shipment fields. On update the whole record is replaced.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "client_id": "5f0e8400-e29b-41d4-a716-446655440000",
    "priority": "yellow",
    "mode": "air",
    "mawb": "157-12345675",
    "etd": "2024-03-05",
    "eta": "2024-03-07",
    "pieces": 12,
    "gross_weight": "120.5",
    "freight_charge": "1200",
    "handling_charge": "250.5"
}))]
pub struct ShipmentRequest {
    /// Explicit reference for new shipments; allocated when omitted.
    /// Must match the stored reference on update.
    #[validate(length(min = 1, max = 32))]
    pub reference: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    pub client_id: Uuid,
    /// Defaults to the acting staff user
    pub sp_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub carrier_id: Option<Uuid>,
    pub shipper_id: Option<Uuid>,
    pub consignee_id: Option<Uuid>,
    pub hawb_shipper_id: Option<Uuid>,
    pub hawb_consignee_id: Option<Uuid>,
    pub pol_id: Option<Uuid>,
    pub pod_id: Option<Uuid>,
    pub term_id: Option<Uuid>,
    #[validate(length(max = 255))]
    pub via: Option<String>,
    #[serde(default)]
    pub mode: TransportMode,
    #[validate(length(max = 64))]
    pub mawb: Option<String>,
    #[validate(length(max = 64))]
    pub hawb: Option<String>,
    #[validate(length(max = 64))]
    pub first_master: Option<String>,
    #[validate(length(max = 64))]
    pub first_house: Option<String>,
    #[validate(length(max = 32))]
    pub flight_no: Option<String>,
    #[validate(length(max = 64))]
    pub manifest_no: Option<String>,
    pub etdw: Option<NaiveDate>,
    pub etd: Option<NaiveDate>,
    pub eta: Option<NaiveDate>,
    #[validate(range(min = 0))]
    pub pieces: Option<i32>,
    #[validate(custom = "non_negative")]
    pub gross_weight: Option<Decimal>,
    #[validate(custom = "non_negative")]
    pub volume: Option<Decimal>,
    #[validate(custom = "non_negative")]
    pub chargeable_weight: Option<Decimal>,
    #[validate(custom = "non_negative")]
    pub first_gross_weight: Option<Decimal>,
    #[validate(custom = "non_negative")]
    pub first_chargeable_weight: Option<Decimal>,
    pub commodity: Option<String>,
    #[validate(length(max = 32))]
    pub hs_code: Option<String>,
    pub console_id: Option<Uuid>,
    #[serde(default)]
    pub inq_replied: bool,
    #[serde(default)]
    pub confirmed: bool,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub freight_charge: Option<Decimal>,
    pub handling_charge: Option<Decimal>,
    pub extra_charges: Option<Decimal>,
    pub invoice_deadline: Option<NaiveDate>,
}

impl From<ShipmentRequest> for ShipmentDraft {
    fn from(r: ShipmentRequest) -> Self {
        Self {
            priority: r.priority,
            client_id: r.client_id,
            sp_id: r.sp_id,
            agent_id: r.agent_id,
            carrier_id: r.carrier_id,
            shipper_id: r.shipper_id,
            consignee_id: r.consignee_id,
            hawb_shipper_id: r.hawb_shipper_id,
            hawb_consignee_id: r.hawb_consignee_id,
            pol_id: r.pol_id,
            pod_id: r.pod_id,
            term_id: r.term_id,
            via: r.via,
            mode: r.mode,
            mawb: r.mawb,
            hawb: r.hawb,
            first_master: r.first_master,
            first_house: r.first_house,
            flight_no: r.flight_no,
            manifest_no: r.manifest_no,
            etdw: r.etdw,
            etd: r.etd,
            eta: r.eta,
            pieces: r.pieces,
            gross_weight: r.gross_weight,
            volume: r.volume,
            chargeable_weight: r.chargeable_weight,
            first_gross_weight: r.first_gross_weight,
            first_chargeable_weight: r.first_chargeable_weight,
            commodity: r.commodity,
            hs_code: r.hs_code,
            console_id: r.console_id,
            inq_replied: r.inq_replied,
            confirmed: r.confirmed,
            currency: r.currency.map(|c| c.to_uppercase()),
            freight_charge: r.freight_charge,
            handling_charge: r.handling_charge,
            extra_charges: r.extra_charges,
            invoice_deadline: r.invoice_deadline,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmationRequest {
    pub confirmed: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OperatorsRequest {
    /// Replaces the current set
    pub staff_user_ids: Vec<Uuid>,
}

#[utoipa::path(
    get,
    path = "/api/v1/shipments",
    params(PaginationParams, ShipmentListQuery),
    responses(
        (status = 200, description = "Shipments listed, newest first", body = ApiResponse<PaginatedResponse<ShipmentResponse>>)
    ),
    tag = "shipments"
)]
pub async fn list_shipments(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(query): Query<ShipmentListQuery>,
) -> ApiResult<PaginatedResponse<ShipmentResponse>> {
    let (page, per_page) = pagination.bounded();
    let (records, total) = state
        .services
        .shipments
        .list(query.into(), page, per_page)
        .await?;

    let items = records.into_iter().map(ShipmentResponse::from).collect();
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, page, per_page, total,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/shipments/{id}",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    responses(
        (status = 200, description = "Shipment fetched", body = ApiResponse<ShipmentResponse>),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn get_shipment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ShipmentResponse> {
    let shipment = state.services.shipments.get(id).await?;
    Ok(Json(ApiResponse::success(shipment.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/shipments",
    request_body = ShipmentRequest,
    responses(
        (status = 201, description = "Shipment created", body = ApiResponse<ShipmentResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Reference already in use", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn create_shipment(
    State(state): State<AppState>,
    acting: ActingUser,
    Json(payload): Json<ShipmentRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;

    let service = &state.services.shipments;
    let ctx = service.context(acting.id());
    let reference = payload.reference.clone();
    let shipment = service.create(payload.into(), reference, &ctx).await?;

    Ok(created_response(ShipmentResponse::from(shipment)))
}

#[utoipa::path(
    put,
    path = "/api/v1/shipments/{id}",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    request_body = ShipmentRequest,
    responses(
        (status = 200, description = "Shipment updated", body = ApiResponse<ShipmentResponse>),
        (status = 400, description = "Invalid request or reference change", body = crate::errors::ErrorResponse),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn update_shipment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    acting: ActingUser,
    Json(payload): Json<ShipmentRequest>,
) -> ApiResult<ShipmentResponse> {
    validate_input(&payload)?;

    let service = &state.services.shipments;
    if let Some(reference) = payload.reference.as_deref().map(str::trim) {
        let current = service.get(id).await?;
        if reference != current.reference {
            return Err(ServiceError::ValidationError(format!(
                "reference {} cannot be changed",
                current.reference
            )));
        }
    }

    let ctx = service.context(acting.id());
    let shipment = service.update(id, payload.into(), &ctx).await?;
    Ok(Json(ApiResponse::success(shipment.into())))
}

#[utoipa::path(
    put,
    path = "/api/v1/shipments/{id}/confirmation",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    request_body = ConfirmationRequest,
    responses(
        (status = 200, description = "Confirmation flag saved", body = ApiResponse<ShipmentResponse>),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn set_confirmation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    acting: ActingUser,
    Json(payload): Json<ConfirmationRequest>,
) -> ApiResult<ShipmentResponse> {
    let service = &state.services.shipments;
    let ctx = service.context(acting.id());
    let shipment = service
        .set_confirmation(id, payload.confirmed, &ctx)
        .await?;
    Ok(Json(ApiResponse::success(shipment.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/shipments/{id}",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    responses(
        (status = 204, description = "Shipment deleted with its charges and comments"),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn delete_shipment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.shipments.delete(id).await?;
    Ok(no_content_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/shipments/{id}/operators",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    responses(
        (status = 200, description = "Operating staff", body = ApiResponse<Vec<StaffUserResponse>>),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn list_operators(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<StaffUserResponse>> {
    let users = state.services.shipments.operators(id).await?;
    Ok(Json(ApiResponse::success(
        users.into_iter().map(StaffUserResponse::from).collect(),
    )))
}

#[utoipa::path(
    put,
    path = "/api/v1/shipments/{id}/operators",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    request_body = OperatorsRequest,
    responses(
        (status = 200, description = "Operating staff replaced", body = ApiResponse<Vec<StaffUserResponse>>),
        (status = 400, description = "Unknown staff user", body = crate::errors::ErrorResponse),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn set_operators(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<OperatorsRequest>,
) -> ApiResult<Vec<StaffUserResponse>> {
    let users = state
        .services
        .shipments
        .set_operators(id, payload.staff_user_ids)
        .await?;
    Ok(Json(ApiResponse::success(
        users.into_iter().map(StaffUserResponse::from).collect(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request() -> ShipmentRequest {
        serde_json::from_value(json!({
            "client_id": Uuid::new_v4(),
            "pieces": 3,
            "gross_weight": "12.5",
            "currency": "usd"
        }))
        .unwrap()
    }

    #[test]
    fn omitted_fields_take_defaults() {
        let req = request();
        assert_eq!(req.priority, Priority::Green);
        assert_eq!(req.mode, TransportMode::Air);
        assert!(!req.confirmed);
        assert!(req.validate().is_ok());

        let draft = ShipmentDraft::from(req);
        assert_eq!(draft.currency.as_deref(), Some("USD"));
        assert_eq!(draft.gross_weight, Some(dec!(12.5)));
    }

    #[test]
    fn negative_weights_and_counts_are_rejected() {
        let mut req = request();
        req.gross_weight = Some(dec!(-1));
        assert!(req.validate().is_err());

        let mut req = request();
        req.pieces = Some(-2);
        assert!(req.validate().is_err());
    }
}
