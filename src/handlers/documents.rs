//! File-shaped endpoints: manifest, invoice, CSV/XLSX export and import.

use super::common::{attachment_response, ActingUser};
use crate::{
    errors::ServiceError,
    services::{
        import::{ImportOptions, ImportReport},
        invoice::InvoiceDocument,
        manifest::manifest_file_name,
        spreadsheet::XLSX_CONTENT_TYPE,
    },
    ApiResponse, ApiResult, AppState,
};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::{Json, Response},
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";
const MANIFEST_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ImportQuery {
    /// Validate and report without keeping anything
    #[serde(default)]
    pub dry_run: bool,
    /// Keep the valid rows even when others are rejected
    #[serde(default)]
    pub skip_invalid_rows: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Xlsx,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExportQuery {
    /// `csv` (default) or `xlsx`
    #[serde(default)]
    pub format: ExportFormat,
}

impl From<ImportQuery> for ImportOptions {
    fn from(q: ImportQuery) -> Self {
        Self {
            dry_run: q.dry_run,
            skip_invalid_rows: q.skip_invalid_rows,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/shipments/{id}/manifest",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    responses(
        (status = 200, description = "Four-row manifest text", content_type = "text/plain", body = String),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "documents"
)]
pub async fn download_manifest(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let (reference, text) = state.services.manifests.render(id).await?;
    Ok(attachment_response(
        MANIFEST_CONTENT_TYPE,
        &manifest_file_name(&reference),
        text,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/shipments/{id}/invoice",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    responses(
        (status = 200, description = "Invoice view of the shipment", body = ApiResponse<InvoiceDocument>),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "documents"
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<InvoiceDocument> {
    let invoice = state.services.invoices.invoice(id).await?;
    Ok(Json(ApiResponse::success(invoice)))
}

#[utoipa::path(
    get,
    path = "/api/v1/shipments/export",
    params(ExportQuery),
    responses(
        (status = 200, description = "Every shipment as CSV or XLSX, ordered by reference", content_type = "text/csv", body = String)
    ),
    tag = "documents"
)]
pub async fn export_shipments(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ServiceError> {
    let exports = &state.services.exports;
    match query.format {
        ExportFormat::Csv => {
            let (file_name, body) = exports.export().await?;
            Ok(attachment_response(CSV_CONTENT_TYPE, &file_name, body))
        }
        ExportFormat::Xlsx => {
            let (file_name, workbook) = exports.export_xlsx().await?;
            Ok(attachment_response(XLSX_CONTENT_TYPE, &file_name, workbook))
        }
    }
}

fn is_xlsx(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with(XLSX_CONTENT_TYPE))
}

#[utoipa::path(
    post,
    path = "/api/v1/shipments/import",
    params(ImportQuery),
    request_body(content = String, content_type = "text/csv", description = "CSV with a header row, or an XLSX workbook sent with the spreadsheet content type"),
    responses(
        (status = 200, description = "Import report", body = ApiResponse<ImportReport>),
        (status = 400, description = "Malformed file or header", body = crate::errors::ErrorResponse),
        (status = 422, description = "Rows rejected, nothing kept", body = crate::errors::ErrorResponse)
    ),
    tag = "documents"
)]
pub async fn import_shipments(
    State(state): State<AppState>,
    Query(query): Query<ImportQuery>,
    acting: ActingUser,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<ImportReport> {
    let imports = &state.services.imports;
    let report = if is_xlsx(&headers) {
        imports
            .import_xlsx(&body, query.into(), acting.id())
            .await?
    } else {
        let text = std::str::from_utf8(&body)
            .map_err(|_| ServiceError::BadRequest("CSV uploads must be UTF-8 text".into()))?;
        imports.import_csv(text, query.into(), acting.id()).await?
    };
    Ok(Json(ApiResponse::success(report)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn spreadsheet_uploads_are_recognised_by_content_type() {
        let mut headers = HeaderMap::new();
        assert!(!is_xlsx(&headers));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv"));
        assert!(!is_xlsx(&headers));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(XLSX_CONTENT_TYPE));
        assert!(is_xlsx(&headers));
    }

    #[test]
    fn export_format_defaults_to_csv() {
        let query: ExportQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.format, ExportFormat::Csv);
        let query: ExportQuery = serde_json::from_str(r#"{"format":"xlsx"}"#).unwrap();
        assert_eq!(query.format, ExportFormat::Xlsx);
    }
}
