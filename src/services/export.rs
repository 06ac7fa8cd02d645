//! Export of every shipment as CSV or XLSX, in the column layout import
//! accepts.

use crate::{
    db::DbPool,
    entities::{console, lookup_entry, party, shipment, staff_user},
    errors::ServiceError,
};
use chrono::{NaiveDate, NaiveDateTime};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{EntityTrait, QueryOrder};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{clock::Clock, csv::write_record, manifest::plain_decimal, spreadsheet::write_workbook};

/// Column order of exported files. Import matches the same names.
pub const COLUMNS: [&str; 46] = [
    "id",
    "reference",
    "client",
    "sp",
    "priority",
    "mode",
    "inq_replied",
    "confirmed",
    "confirmed_at",
    "via",
    "carrier",
    "agent",
    "console",
    "mawb",
    "hawb",
    "first_master",
    "first_house",
    "flight_no",
    "etdw",
    "etd",
    "eta",
    "transit_time",
    "pol",
    "pod",
    "term",
    "pieces",
    "gross_weight",
    "volume",
    "chargeable_weight",
    "first_gross_weight",
    "first_chargeable_weight",
    "currency",
    "freight_charge",
    "handling_charge",
    "extra_charges",
    "total_charges",
    "commodity",
    "hs_code",
    "shipper",
    "consignee",
    "hawb_shipper",
    "hawb_consignee",
    "manifest_no",
    "invoice_deadline",
    "pol_airport",
    "pod_airport",
];

/// Accepted date layouts, tried in order. Export writes the first.
pub const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y.%m.%d", "%Y/%m/%d", "%d/%m/%Y"];

pub const CONFIRMED_AT_FORMAT: &str = "%Y.%m.%d %H:%M:%S";

fn date_cell(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format(DATE_FORMATS[0]).to_string())
        .unwrap_or_default()
}

fn datetime_cell(at: Option<NaiveDateTime>) -> String {
    at.map(|t| t.format(CONFIRMED_AT_FORMAT).to_string())
        .unwrap_or_default()
}

fn decimal_cell(value: Option<Decimal>) -> String {
    value.map(plain_decimal).unwrap_or_default()
}

fn bool_cell(value: bool) -> String {
    let cell = if value { "1" } else { "0" };
    cell.to_string()
}

fn text_cell(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

/// Id-to-label maps for every relation a row refers to.
#[derive(Debug, Default)]
struct Labels {
    parties: HashMap<Uuid, String>,
    lookups: HashMap<Uuid, String>,
    consoles: HashMap<Uuid, String>,
    staff: HashMap<Uuid, String>,
    airports: HashMap<Uuid, String>,
}

impl Labels {
    fn of(map: &HashMap<Uuid, String>, id: Option<Uuid>) -> String {
        id.and_then(|id| map.get(&id).cloned()).unwrap_or_default()
    }

    fn party(&self, id: Option<Uuid>) -> String {
        Self::of(&self.parties, id)
    }

    fn lookup(&self, id: Option<Uuid>) -> String {
        Self::of(&self.lookups, id)
    }
}

fn shipment_record(s: &shipment::Model, labels: &Labels) -> Vec<String> {
    vec![
        s.id.to_string(),
        s.reference.clone(),
        labels.party(Some(s.client_id)),
        Labels::of(&labels.staff, s.sp_id),
        s.priority.to_string(),
        s.mode.to_string(),
        bool_cell(s.inq_replied),
        bool_cell(s.confirmed),
        datetime_cell(s.confirmed_at),
        text_cell(&s.via),
        labels.party(s.carrier_id),
        labels.party(s.agent_id),
        Labels::of(&labels.consoles, s.console_id),
        text_cell(&s.mawb),
        text_cell(&s.hawb),
        text_cell(&s.first_master),
        text_cell(&s.first_house),
        text_cell(&s.flight_no),
        date_cell(s.etdw),
        date_cell(s.etd),
        date_cell(s.eta),
        s.transit_time.map(|t| t.to_string()).unwrap_or_default(),
        labels.lookup(s.pol_id),
        labels.lookup(s.pod_id),
        labels.lookup(s.term_id),
        s.pieces.map(|p| p.to_string()).unwrap_or_default(),
        decimal_cell(s.gross_weight),
        decimal_cell(s.volume),
        decimal_cell(s.chargeable_weight),
        decimal_cell(s.first_gross_weight),
        decimal_cell(s.first_chargeable_weight),
        text_cell(&s.currency),
        decimal_cell(s.freight_charge),
        decimal_cell(s.handling_charge),
        decimal_cell(s.extra_charges),
        decimal_cell(s.total_charges),
        text_cell(&s.commodity),
        text_cell(&s.hs_code),
        labels.party(s.shipper_id),
        labels.party(s.consignee_id),
        labels.party(s.hawb_shipper_id),
        labels.party(s.hawb_consignee_id),
        text_cell(&s.manifest_no),
        date_cell(s.invoice_deadline),
        Labels::of(&labels.airports, s.pol_id),
        Labels::of(&labels.airports, s.pod_id),
    ]
}

/// `shipments_20240305.csv`
pub fn export_file_name(day: NaiveDate) -> String {
    format!("shipments_{}.csv", day.format("%Y%m%d"))
}

/// `shipments_20240305.xlsx`
pub fn workbook_file_name(day: NaiveDate) -> String {
    format!("shipments_{}.xlsx", day.format("%Y%m%d"))
}

#[derive(Clone)]
pub struct ExportService {
    db_pool: Arc<DbPool>,
    clock: Arc<dyn Clock>,
}

impl ExportService {
    pub fn new(db_pool: Arc<DbPool>, clock: Arc<dyn Clock>) -> Self {
        Self { db_pool, clock }
    }

    /// One record per shipment, ordered by reference.
    async fn records(&self) -> Result<Vec<Vec<String>>, ServiceError> {
        let db = &*self.db_pool;
        let shipments = shipment::Entity::find()
            .order_by_asc(shipment::Column::Reference)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let entries = lookup_entry::Entity::find()
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let labels = Labels {
            parties: party::Entity::find()
                .all(db)
                .await
                .map_err(ServiceError::db_error)?
                .into_iter()
                .map(|p| (p.id, p.name))
                .collect(),
            lookups: entries.iter().map(|e| (e.id, e.data.clone())).collect(),
            airports: entries
                .iter()
                .filter_map(|e| e.airport_abbr.clone().map(|abbr| (e.id, abbr)))
                .collect(),
            consoles: console::Entity::find()
                .all(db)
                .await
                .map_err(ServiceError::db_error)?
                .into_iter()
                .map(|c| (c.id, c.code))
                .collect(),
            staff: staff_user::Entity::find()
                .all(db)
                .await
                .map_err(ServiceError::db_error)?
                .into_iter()
                .map(|u| (u.id, u.username))
                .collect(),
        };

        counter!("forwarder.exports.rows", shipments.len() as u64);
        Ok(shipments
            .iter()
            .map(|s| shipment_record(s, &labels))
            .collect())
    }

    /// Returns the download file name and the CSV body.
    #[instrument(skip(self))]
    pub async fn export(&self) -> Result<(String, String), ServiceError> {
        let records = self.records().await?;

        let mut body = write_record(&COLUMNS);
        for record in &records {
            body.push('\n');
            body.push_str(&write_record(record));
        }
        body.push('\n');

        info!(rows = records.len(), format = "csv", "shipments exported");
        Ok((export_file_name(self.clock.today()), body))
    }

    /// Returns the download file name and the XLSX workbook bytes.
    #[instrument(skip(self))]
    pub async fn export_xlsx(&self) -> Result<(String, Vec<u8>), ServiceError> {
        let records = self.records().await?;
        let workbook = write_workbook(&COLUMNS, &records)?;

        info!(rows = records.len(), format = "xlsx", "shipments exported");
        Ok((workbook_file_name(self.clock.today()), workbook))
    }
}
