//! Bulk shipment import from CSV or XLSX.
//!
//! Related records named in a row (parties, staff, lookup entries and
//! consoles) are resolved by their natural key and created on first sight.
//! The whole file runs in one transaction and every row in its own
//! savepoint, so a rejected row leaves nothing behind.

use crate::{
    db::DbPool,
    entities::{shipment, LookupKind, PartyRole, Priority, TransportMode},
    errors::{ImportRowError, ServiceError},
};
use chrono::{NaiveDate, NaiveDateTime};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    clock::Clock,
    consoles,
    csv::parse_records,
    derived::SaveContext,
    export::{COLUMNS, CONFIRMED_AT_FORMAT, DATE_FORMATS},
    lookups, parties,
    reference::ReferenceAllocator,
    shipments::{insert_model, update_model, ShipmentDraft},
    spreadsheet,
    staff_users,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    /// Validate and report without keeping anything.
    #[serde(default)]
    pub dry_run: bool,
    /// Commit the valid rows even when others were rejected.
    #[serde(default)]
    pub skip_invalid_rows: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RowOutcome {
    New,
    Update,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ImportRowReport {
    pub row: usize,
    pub outcome: RowOutcome,
    pub shipment_id: Option<Uuid>,
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ImportRowError>,
}

/// Related records inserted while resolving names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CreatedRelations {
    pub parties: u64,
    pub lookups: u64,
    pub consoles: u64,
    pub staff_users: u64,
}

impl CreatedRelations {
    fn absorb(&mut self, other: CreatedRelations) {
        self.parties += other.parties;
        self.lookups += other.lookups;
        self.consoles += other.consoles;
        self.staff_users += other.staff_users;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ImportTotals {
    pub new: u64,
    pub update: u64,
    pub error: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ImportReport {
    pub dry_run: bool,
    /// True when the changes were kept.
    pub committed: bool,
    pub totals: ImportTotals,
    pub created: CreatedRelations,
    pub rows: Vec<ImportRowReport>,
}

impl ImportReport {
    fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            committed: false,
            totals: ImportTotals::default(),
            created: CreatedRelations::default(),
            rows: Vec::new(),
        }
    }

    fn saved(&mut self, row: usize, outcome: RowOutcome, shipment: &shipment::Model) {
        match outcome {
            RowOutcome::New => self.totals.new += 1,
            RowOutcome::Update => self.totals.update += 1,
            RowOutcome::Error => self.totals.error += 1,
        }
        self.rows.push(ImportRowReport {
            row,
            outcome,
            shipment_id: Some(shipment.id),
            reference: Some(shipment.reference.clone()),
            errors: Vec::new(),
        });
    }

    fn rejected(&mut self, row: usize, errors: Vec<ImportRowError>) {
        self.totals.error += 1;
        self.rows.push(ImportRowReport {
            row,
            outcome: RowOutcome::Error,
            shipment_id: None,
            reference: None,
            errors,
        });
    }
}

pub fn parse_date(raw: &str) -> Result<Option<NaiveDate>, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .map(Some)
        .ok_or_else(|| {
            format!(
                "date '{value}' matches none of the accepted formats: {}",
                DATE_FORMATS.join(", ")
            )
        })
}

/// `2024.03.05 14:30:00` or a bare `2024.03.05` (midnight).
pub fn parse_confirmed_at(raw: &str) -> Result<Option<NaiveDateTime>, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }
    if let Ok(at) = NaiveDateTime::parse_from_str(value, CONFIRMED_AT_FORMAT) {
        return Ok(Some(at));
    }
    NaiveDate::parse_from_str(value, "%Y.%m.%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(Some)
        .ok_or_else(|| {
            format!("timestamp '{value}' must look like {CONFIRMED_AT_FORMAT} or %Y.%m.%d")
        })
}

pub fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Ok(true),
        "" | "0" | "false" | "no" | "n" => Ok(false),
        other => Err(format!("'{other}' is not a yes/no value")),
    }
}

pub fn parse_decimal(raw: &str) -> Result<Option<Decimal>, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }
    Decimal::from_str(value)
        .map(Some)
        .map_err(|_| format!("'{value}' is not a number"))
}

fn parse_pieces(raw: &str) -> Result<Option<i32>, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }
    match value.parse::<i32>() {
        Ok(n) if n >= 0 => Ok(Some(n)),
        _ => Err(format!("'{value}' is not a whole, non-negative count")),
    }
}

fn parse_choice<T: FromStr + Default>(raw: &str, allowed: &str) -> Result<T, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(T::default());
    }
    T::from_str(value).map_err(|_| format!("'{value}' must be one of {allowed}"))
}

fn text(raw: &str) -> Option<String> {
    let value = raw.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Recognised columns of the header row, by position.
struct Header {
    columns: Vec<Option<&'static str>>,
}

impl Header {
    fn parse(record: &[String]) -> Result<Self, ServiceError> {
        let columns: Vec<Option<&'static str>> = record
            .iter()
            .map(|name| {
                let key = name.trim().to_lowercase();
                COLUMNS.iter().copied().find(|c| *c == key)
            })
            .collect();

        if columns.iter().all(Option::is_none) {
            return Err(ServiceError::BadRequest(
                "header row names none of the recognised columns".into(),
            ));
        }
        for (name, column) in record.iter().zip(&columns) {
            if column.is_none() {
                warn!(column = %name, "ignoring unrecognised import column");
            }
        }
        Ok(Self { columns })
    }

    fn cells<'r>(&self, record: &'r [String]) -> Vec<(&'static str, &'r str)> {
        self.columns
            .iter()
            .enumerate()
            .filter_map(|(i, column)| {
                column.map(|c| (c, record.get(i).map(String::as_str).unwrap_or("")))
            })
            .collect()
    }
}

enum CellFailure {
    Invalid(String),
    Fatal(ServiceError),
}

impl From<String> for CellFailure {
    fn from(message: String) -> Self {
        CellFailure::Invalid(message)
    }
}

impl From<ServiceError> for CellFailure {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::DatabaseError(_) => CellFailure::Fatal(err),
            other => CellFailure::Invalid(other.to_string()),
        }
    }
}

#[derive(Default)]
struct RowState {
    has_client: bool,
    confirmed_at: Option<NaiveDateTime>,
    pol_airport: Option<String>,
    pod_airport: Option<String>,
    created: CreatedRelations,
}

impl RowState {
    async fn party<C>(
        &mut self,
        db: &C,
        role: PartyRole,
        name: &str,
    ) -> Result<Option<Uuid>, ServiceError>
    where
        C: ConnectionTrait,
    {
        if name.is_empty() {
            return Ok(None);
        }
        let (party, created) = parties::get_or_create(db, role, name).await?;
        self.created.parties += u64::from(created);
        Ok(Some(party.id))
    }

    async fn lookup<C>(
        &mut self,
        db: &C,
        kind: LookupKind,
        data: &str,
    ) -> Result<Option<Uuid>, ServiceError>
    where
        C: ConnectionTrait,
    {
        if data.is_empty() {
            return Ok(None);
        }
        let (entry, created) = lookups::get_or_create(db, kind, data).await?;
        self.created.lookups += u64::from(created);
        Ok(Some(entry.id))
    }

    async fn console<C>(&mut self, db: &C, code: &str) -> Result<Option<Uuid>, ServiceError>
    where
        C: ConnectionTrait,
    {
        if code.is_empty() {
            return Ok(None);
        }
        let (console, created) = consoles::get_or_create(db, code).await?;
        self.created.consoles += u64::from(created);
        Ok(Some(console.id))
    }

    async fn staff<C>(&mut self, db: &C, username: &str) -> Result<Option<Uuid>, ServiceError>
    where
        C: ConnectionTrait,
    {
        if username.is_empty() {
            return Ok(None);
        }
        let (user, created) = staff_users::get_or_create(db, username).await?;
        self.created.staff_users += u64::from(created);
        Ok(Some(user.id))
    }

    /// Writes one cell onto `draft`.
    async fn apply<C>(
        &mut self,
        db: &C,
        draft: &mut ShipmentDraft,
        column: &str,
        value: &str,
    ) -> Result<(), CellFailure>
    where
        C: ConnectionTrait,
    {
        match column {
            "client" => match self.party(db, PartyRole::Customer, value).await? {
                Some(id) => {
                    draft.client_id = id;
                    self.has_client = true;
                }
                None => return Err(CellFailure::Invalid("client must not be empty".into())),
            },
            "sp" => draft.sp_id = self.staff(db, value).await?,
            "carrier" => draft.carrier_id = self.party(db, PartyRole::Carrier, value).await?,
            "agent" => draft.agent_id = self.party(db, PartyRole::Agent, value).await?,
            "shipper" => draft.shipper_id = self.party(db, PartyRole::Shipper, value).await?,
            "consignee" => {
                draft.consignee_id = self.party(db, PartyRole::Consignee, value).await?
            }
            "hawb_shipper" => {
                draft.hawb_shipper_id = self.party(db, PartyRole::Shipper, value).await?
            }
            "hawb_consignee" => {
                draft.hawb_consignee_id = self.party(db, PartyRole::Consignee, value).await?
            }
            "pol" => draft.pol_id = self.lookup(db, LookupKind::Pol, value).await?,
            "pod" => draft.pod_id = self.lookup(db, LookupKind::Pod, value).await?,
            "term" => draft.term_id = self.lookup(db, LookupKind::Term, value).await?,
            "console" => draft.console_id = self.console(db, value).await?,
            "pol_airport" => self.pol_airport = text(value),
            "pod_airport" => self.pod_airport = text(value),

            "priority" => {
                draft.priority = parse_choice::<Priority>(value, "green, yellow, red")?
            }
            "mode" => draft.mode = parse_choice::<TransportMode>(value, "air, sea, land")?,
            "inq_replied" => draft.inq_replied = parse_bool(value)?,
            "confirmed" => draft.confirmed = parse_bool(value)?,
            "confirmed_at" => self.confirmed_at = parse_confirmed_at(value)?,

            "via" => draft.via = text(value),
            "mawb" => draft.mawb = text(value),
            "hawb" => draft.hawb = text(value),
            "first_master" => draft.first_master = text(value),
            "first_house" => draft.first_house = text(value),
            "flight_no" => draft.flight_no = text(value),
            "manifest_no" => draft.manifest_no = text(value),
            "commodity" => draft.commodity = text(value),
            "hs_code" => draft.hs_code = text(value),
            "currency" => draft.currency = text(value),

            "etdw" => draft.etdw = parse_date(value)?,
            "etd" => draft.etd = parse_date(value)?,
            "eta" => draft.eta = parse_date(value)?,
            "invoice_deadline" => draft.invoice_deadline = parse_date(value)?,

            "pieces" => draft.pieces = parse_pieces(value)?,
            "gross_weight" => draft.gross_weight = parse_decimal(value)?,
            "volume" => draft.volume = parse_decimal(value)?,
            "chargeable_weight" => draft.chargeable_weight = parse_decimal(value)?,
            "first_gross_weight" => draft.first_gross_weight = parse_decimal(value)?,
            "first_chargeable_weight" => draft.first_chargeable_weight = parse_decimal(value)?,
            "freight_charge" => draft.freight_charge = parse_decimal(value)?,
            "handling_charge" => draft.handling_charge = parse_decimal(value)?,
            "extra_charges" => draft.extra_charges = parse_decimal(value)?,

            // id and reference locate the row; transit_time and total_charges are derived
            _ => {}
        }
        Ok(())
    }
}

enum RowResult {
    Saved {
        outcome: RowOutcome,
        shipment: shipment::Model,
        created: CreatedRelations,
    },
    Rejected(Vec<ImportRowError>),
}

/// Matches the row to an existing shipment by id, then by reference.
async fn locate<C>(
    db: &C,
    id: Option<Uuid>,
    reference: Option<&str>,
) -> Result<Option<shipment::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    if let Some(id) = id {
        let found = shipment::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        if found.is_some() {
            return Ok(found);
        }
    }
    match reference {
        Some(reference) => shipment::Entity::find()
            .filter(shipment::Column::Reference.eq(reference))
            .one(db)
            .await
            .map_err(ServiceError::db_error),
        None => Ok(None),
    }
}

async fn import_row<C>(
    db: &C,
    allocator: &ReferenceAllocator,
    ctx: &SaveContext,
    row: usize,
    cells: &[(&'static str, &str)],
) -> Result<RowResult, ServiceError>
where
    C: ConnectionTrait,
{
    let mut errors = Vec::new();
    let value = |name: &str| {
        cells
            .iter()
            .find(|(column, _)| *column == name)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    };

    let explicit_id = match value("id") {
        Some(raw) => match Uuid::parse_str(raw) {
            Ok(id) => Some(id),
            Err(_) => {
                errors.push(ImportRowError::new(row, "id", raw, "not a valid UUID"));
                None
            }
        },
        None => None,
    };
    let reference = value("reference").map(str::to_string);
    let existing = locate(db, explicit_id, reference.as_deref()).await?;

    let mut draft = existing
        .as_ref()
        .map(ShipmentDraft::from)
        .unwrap_or_else(|| ShipmentDraft::new(Uuid::nil()));
    let mut state = RowState {
        has_client: existing.is_some(),
        ..RowState::default()
    };

    for &(column, raw) in cells {
        match state.apply(db, &mut draft, column, raw.trim()).await {
            Ok(()) => {}
            Err(CellFailure::Invalid(message)) => {
                errors.push(ImportRowError::new(row, column, raw, message))
            }
            Err(CellFailure::Fatal(err)) => return Err(err),
        }
    }
    if !state.has_client {
        errors.push(ImportRowError::new(
            row,
            "client",
            "",
            "a client is required for new shipments",
        ));
    }
    if !errors.is_empty() {
        return Ok(RowResult::Rejected(errors));
    }

    // airport codes only complete ports that lack one
    for (port, airport) in [
        (draft.pol_id, state.pol_airport.as_deref()),
        (draft.pod_id, state.pod_airport.as_deref()),
    ] {
        if let (Some(id), Some(abbr)) = (port, airport) {
            lookups::fill_airport(db, id, abbr).await?;
        }
    }

    let (outcome, saved) = match existing {
        Some(mut model) => {
            draft.apply_to(&mut model);
            if model.confirmed_at.is_none() {
                model.confirmed_at = state.confirmed_at;
            }
            (RowOutcome::Update, update_model(db, model, ctx).await)
        }
        None => {
            let reference = match reference {
                Some(reference) => reference,
                None => allocator.allocate(db, ctx.now_local.date()).await?,
            };
            let mut model = draft.into_model(reference);
            if let Some(id) = explicit_id {
                model.id = id;
            }
            model.confirmed_at = state.confirmed_at;
            (RowOutcome::New, insert_model(db, model, ctx).await)
        }
    };

    match saved {
        Ok(shipment) => Ok(RowResult::Saved {
            outcome,
            shipment,
            created: state.created,
        }),
        Err(err @ ServiceError::DatabaseError(_)) => Err(err),
        Err(err) => Ok(RowResult::Rejected(vec![ImportRowError::new(
            row,
            "reference",
            reference_hint(cells),
            err.to_string(),
        )])),
    }
}

fn reference_hint(cells: &[(&'static str, &str)]) -> String {
    cells
        .iter()
        .find(|(column, _)| *column == "reference")
        .map(|(_, v)| v.trim().to_string())
        .unwrap_or_default()
}

#[derive(Clone)]
pub struct ImportService {
    db_pool: Arc<DbPool>,
    clock: Arc<dyn Clock>,
    allocator: Arc<ReferenceAllocator>,
}

impl ImportService {
    pub fn new(
        db_pool: Arc<DbPool>,
        clock: Arc<dyn Clock>,
        allocator: Arc<ReferenceAllocator>,
    ) -> Self {
        Self {
            db_pool,
            clock,
            allocator,
        }
    }

    /// Imports `text` as CSV.
    ///
    /// With rejected rows and without `skip_invalid_rows`, nothing is kept
    /// and the row errors come back as [`ServiceError::ImportRejected`].
    /// A dry run always reports and never keeps anything.
    #[instrument(skip(self, text), fields(bytes = text.len()))]
    pub async fn import_csv(
        &self,
        text: &str,
        options: ImportOptions,
        acting_user: Option<Uuid>,
    ) -> Result<ImportReport, ServiceError> {
        self.import_records(parse_records(text)?, options, acting_user)
            .await
    }

    /// Imports the first worksheet of an XLSX workbook, with the same rules
    /// as [`ImportService::import_csv`].
    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    pub async fn import_xlsx(
        &self,
        bytes: &[u8],
        options: ImportOptions,
        acting_user: Option<Uuid>,
    ) -> Result<ImportReport, ServiceError> {
        self.import_records(spreadsheet::read_records(bytes)?, options, acting_user)
            .await
    }

    async fn import_records(
        &self,
        records: Vec<Vec<String>>,
        options: ImportOptions,
        acting_user: Option<Uuid>,
    ) -> Result<ImportReport, ServiceError> {
        let mut records = records.into_iter();
        let header = records
            .next()
            .ok_or_else(|| ServiceError::BadRequest("the import file is empty".into()))?;
        let header = Header::parse(&header)?;
        let ctx = SaveContext::new(acting_user, self.clock.now_local());

        // new rows may allocate references
        let _guard = self.allocator.lock().await;
        let txn = self.db_pool.begin().await.map_err(ServiceError::db_error)?;

        let mut report = ImportReport::new(options.dry_run);
        let mut rejected = Vec::new();
        for (index, record) in records.enumerate() {
            let row = index + 1;
            let cells = header.cells(&record);
            let savepoint = txn.begin().await.map_err(ServiceError::db_error)?;

            match import_row(&savepoint, &self.allocator, &ctx, row, &cells).await? {
                RowResult::Saved {
                    outcome,
                    shipment,
                    created,
                } => {
                    savepoint.commit().await.map_err(ServiceError::db_error)?;
                    report.created.absorb(created);
                    report.saved(row, outcome, &shipment);
                }
                RowResult::Rejected(errors) => {
                    savepoint.rollback().await.map_err(ServiceError::db_error)?;
                    rejected.extend(errors.iter().cloned());
                    report.rejected(row, errors);
                }
            }
        }

        counter!("forwarder.imports.rows", report.totals.new, "outcome" => "new");
        counter!("forwarder.imports.rows", report.totals.update, "outcome" => "update");
        counter!("forwarder.imports.rows", report.totals.error, "outcome" => "error");

        if options.dry_run {
            txn.rollback().await.map_err(ServiceError::db_error)?;
        } else if !rejected.is_empty() && !options.skip_invalid_rows {
            txn.rollback().await.map_err(ServiceError::db_error)?;
            warn!(errors = rejected.len(), "import rejected");
            return Err(ServiceError::ImportRejected(rejected));
        } else {
            txn.commit().await.map_err(ServiceError::db_error)?;
            report.committed = true;
        }

        info!(
            new = report.totals.new,
            update = report.totals.update,
            error = report.totals.error,
            dry_run = options.dry_run,
            committed = report.committed,
            "import finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case("2024-03-05")]
    #[case("2024.03.05")]
    #[case("2024/03/05")]
    #[case("05/03/2024")]
    #[case(" 2024-03-05 ")]
    fn every_date_layout_is_accepted(#[case] raw: &str) {
        assert_eq!(parse_date(raw), Ok(NaiveDate::from_ymd_opt(2024, 3, 5)));
    }

    #[test]
    fn unparseable_date_lists_the_formats() {
        let message = parse_date("March 5th").unwrap_err();
        assert!(message.contains("March 5th"));
        assert!(message.contains("%d/%m/%Y"));
        assert_eq!(parse_date(""), Ok(None));
    }

    #[test]
    fn confirmed_at_takes_timestamp_or_date() {
        let at = parse_confirmed_at("2024.03.05 14:30:00").unwrap().unwrap();
        assert_eq!(at.format("%H:%M").to_string(), "14:30");
        let midnight = parse_confirmed_at("2024.03.05").unwrap().unwrap();
        assert_eq!(midnight.format("%H:%M:%S").to_string(), "00:00:00");
        assert!(parse_confirmed_at("2024-03-05T14:30").is_err());
    }

    #[rstest]
    #[case("1", true)]
    #[case("TRUE", true)]
    #[case("yes", true)]
    #[case("Y", true)]
    #[case("0", false)]
    #[case("false", false)]
    #[case("No", false)]
    #[case("n", false)]
    #[case("", false)]
    fn booleans(#[case] raw: &str, #[case] expected: bool) {
        assert_eq!(parse_bool(raw), Ok(expected));
    }

    #[test]
    fn junk_boolean_is_rejected() {
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn decimals_and_counts() {
        assert_eq!(parse_decimal("120.50"), Ok(Some(dec!(120.50))));
        assert_eq!(parse_decimal(" "), Ok(None));
        assert!(parse_decimal("12kg").is_err());
        assert_eq!(parse_pieces("12"), Ok(Some(12)));
        assert!(parse_pieces("-1").is_err());
        assert!(parse_pieces("1.5").is_err());
    }

    #[test]
    fn choices_fall_back_to_default_when_empty() {
        assert_eq!(parse_choice::<Priority>("", "x"), Ok(Priority::Green));
        assert_eq!(parse_choice::<Priority>("RED", "x"), Ok(Priority::Red));
        assert!(parse_choice::<TransportMode>("rail", "air, sea, land").is_err());
    }

    #[test]
    fn header_is_case_insensitive_and_ignores_unknown_columns() {
        let header = Header::parse(&[
            " Reference ".to_string(),
            "notes".to_string(),
            "ETD".to_string(),
        ])
        .unwrap();
        let record = vec!["240305001".to_string(), "ignored".to_string()];
        let cells = header.cells(&record);
        assert_eq!(cells, vec![("reference", "240305001"), ("etd", "")]);
    }

    #[test]
    fn header_without_known_columns_is_rejected() {
        assert!(matches!(
            Header::parse(&["foo".to_string(), "bar".to_string()]),
            Err(ServiceError::BadRequest(_))
        ));
    }
}
