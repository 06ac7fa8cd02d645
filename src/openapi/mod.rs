use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Forwarder API",
        version = "0.1.0",
        description = r#"
# Forwarder Back Office API

Shipment records for an air freight forwarder, with the reference data they
point at and the documents produced from them.

## Features

- **Shipments**: `YYMMDDNNN` references allocated per business day, derived
  transit time, total charges and confirmation stamp
- **Reference data**: staff users, parties by role, POL/POD/term lookups, consoles
- **Charges and comments** per shipment
- **Documents**: four-row cargo manifest, invoice view
- **Bulk exchange**: CSV or XLSX export and import with get-or-create of referenced names

## Acting user

Requests that record who did something (creating shipments, comments,
imports) read the staff username from the `X-Staff-User` header.

## Error Handling

Errors share one envelope:

```json
{
  "error": "Not Found",
  "message": "Not found: Shipment 550e8400-e29b-41d4-a716-446655440000 not found",
  "request_id": "req-abc123xyz",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

## Pagination

List endpoints take `page` (default 1) and `per_page` (default 50, max 200).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "shipments", description = "Shipment records"),
        (name = "charges", description = "Charge lines of a shipment"),
        (name = "comments", description = "Shipment comments"),
        (name = "documents", description = "Manifest, invoice and CSV exchange"),
        (name = "parties", description = "Clients, carriers, agents, shippers and consignees"),
        (name = "lookups", description = "Ports of loading and discharge, delivery terms"),
        (name = "consoles", description = "Consolidation codes"),
        (name = "staff-users", description = "Back-office staff"),
        (name = "auth", description = "Login events")
    ),
    paths(
        // Shipments
        crate::handlers::shipments::list_shipments,
        crate::handlers::shipments::get_shipment,
        crate::handlers::shipments::create_shipment,
        crate::handlers::shipments::update_shipment,
        crate::handlers::shipments::set_confirmation,
        crate::handlers::shipments::delete_shipment,
        crate::handlers::shipments::list_operators,
        crate::handlers::shipments::set_operators,

        // Charges & comments
        crate::handlers::charges::list_charges,
        crate::handlers::charges::create_charge,
        crate::handlers::charges::update_charge,
        crate::handlers::charges::delete_charge,
        crate::handlers::comments::list_comments,
        crate::handlers::comments::create_comment,
        crate::handlers::comments::delete_comment,

        // Documents
        crate::handlers::documents::download_manifest,
        crate::handlers::documents::get_invoice,
        crate::handlers::documents::export_shipments,
        crate::handlers::documents::import_shipments,

        // Reference data
        crate::handlers::parties::list_parties,
        crate::handlers::parties::get_party,
        crate::handlers::parties::create_party,
        crate::handlers::parties::update_party,
        crate::handlers::parties::delete_party,
        crate::handlers::lookups::list_lookups,
        crate::handlers::lookups::get_lookup,
        crate::handlers::lookups::create_lookup,
        crate::handlers::lookups::update_lookup,
        crate::handlers::lookups::delete_lookup,
        crate::handlers::consoles::list_consoles,
        crate::handlers::consoles::get_console,
        crate::handlers::consoles::create_console,
        crate::handlers::consoles::delete_console,
        crate::handlers::staff_users::list_staff_users,
        crate::handlers::staff_users::get_staff_user,
        crate::handlers::staff_users::create_staff_user,
        crate::handlers::staff_users::update_staff_user,
        crate::handlers::staff_users::delete_staff_user,

        // Auth
        crate::handlers::auth::record_login,
    ),
    components(
        schemas(
            crate::entities::Priority,
            crate::entities::TransportMode,
            crate::entities::PartyRole,
            crate::entities::LookupKind,
            crate::entities::ChargePayer,

            crate::handlers::shipments::ShipmentResponse,
            crate::handlers::shipments::ShipmentRequest,
            crate::handlers::shipments::ConfirmationRequest,
            crate::handlers::shipments::OperatorsRequest,
            crate::handlers::charges::ChargeResponse,
            crate::handlers::charges::ChargeRequest,
            crate::handlers::comments::CommentResponse,
            crate::handlers::comments::CommentRequest,
            crate::handlers::parties::PartyResponse,
            crate::handlers::parties::PartyRequest,
            crate::handlers::lookups::LookupResponse,
            crate::handlers::lookups::LookupRequest,
            crate::handlers::lookups::LookupDeleted,
            crate::handlers::consoles::ConsoleResponse,
            crate::handlers::consoles::CreateConsoleRequest,
            crate::handlers::staff_users::StaffUserResponse,
            crate::handlers::staff_users::StaffUserRequest,
            crate::handlers::auth::LoginEventRequest,
            crate::handlers::auth::LoginEventAccepted,

            crate::handlers::documents::ExportFormat,
            crate::services::invoice::InvoiceDocument,
            crate::services::invoice::InvoiceLine,
            crate::services::invoice::CurrencyTotal,
            crate::services::import::ImportReport,
            crate::services::import::ImportRowReport,
            crate::services::import::ImportTotals,
            crate::services::import::CreatedRelations,
            crate::services::import::RowOutcome,

            // Error types
            crate::errors::ErrorResponse,
            crate::errors::ImportRowError
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_shipment_and_document_paths() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Forwarder API"));
        assert!(json.contains("/api/v1/shipments/{id}/manifest"));
        assert!(json.contains("/api/v1/shipments/import"));
        assert!(json.contains("ImportReport"));
    }
}
