//! Four-row customs manifest for a single shipment.

use crate::{
    db::DbPool,
    entities::{console, lookup_entry, party, shipment},
    errors::ServiceError,
};
use chrono::NaiveDate;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, EntityTrait};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::{csv::quote_field, shipments};

/// A shipment with the related rows the manifest reads. Any relation may be
/// absent; its fields then render empty.
#[derive(Debug, Clone, Default)]
pub struct ManifestContext {
    pub shipment: Option<shipment::Model>,
    pub carrier: Option<party::Model>,
    pub shipper: Option<party::Model>,
    pub consignee: Option<party::Model>,
    pub hawb_shipper: Option<party::Model>,
    pub hawb_consignee: Option<party::Model>,
    pub pol: Option<lookup_entry::Model>,
    pub pod: Option<lookup_entry::Model>,
    pub console: Option<console::Model>,
}

impl ManifestContext {
    /// Resolves every relation of `shipment` the manifest needs.
    pub async fn load<C>(db: &C, shipment: shipment::Model) -> Result<Self, ServiceError>
    where
        C: ConnectionTrait,
    {
        Ok(Self {
            carrier: load_party(db, shipment.carrier_id).await?,
            shipper: load_party(db, shipment.shipper_id).await?,
            consignee: load_party(db, shipment.consignee_id).await?,
            hawb_shipper: load_party(db, shipment.hawb_shipper_id).await?,
            hawb_consignee: load_party(db, shipment.hawb_consignee_id).await?,
            pol: load_lookup(db, shipment.pol_id).await?,
            pod: load_lookup(db, shipment.pod_id).await?,
            console: match shipment.console_id {
                Some(id) => console::Entity::find_by_id(id)
                    .one(db)
                    .await
                    .map_err(ServiceError::db_error)?,
                None => None,
            },
            shipment: Some(shipment),
        })
    }

    fn text(&self, pick: impl Fn(&shipment::Model) -> Option<&String>) -> String {
        self.shipment
            .as_ref()
            .and_then(pick)
            .cloned()
            .unwrap_or_default()
    }

    fn date(&self, pick: impl Fn(&shipment::Model) -> Option<NaiveDate>) -> String {
        self.shipment
            .as_ref()
            .and_then(pick)
            .map(manifest_date)
            .unwrap_or_default()
    }

    fn number(&self, pick: impl Fn(&shipment::Model) -> Option<Decimal>) -> String {
        self.shipment
            .as_ref()
            .and_then(pick)
            .map(plain_decimal)
            .unwrap_or_default()
    }

    fn pieces(&self) -> String {
        self.shipment
            .as_ref()
            .and_then(|s| s.pieces)
            .map(|p| p.to_string())
            .unwrap_or_default()
    }
}

async fn load_party<C>(db: &C, id: Option<Uuid>) -> Result<Option<party::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    match id {
        Some(id) => party::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error),
        None => Ok(None),
    }
}

async fn load_lookup<C>(
    db: &C,
    id: Option<Uuid>,
) -> Result<Option<lookup_entry::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    match id {
        Some(id) => lookup_entry::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error),
        None => Ok(None),
    }
}

/// `05MAR2024`
pub fn manifest_date(date: NaiveDate) -> String {
    date.format("%d%b%Y").to_string().to_uppercase()
}

/// Plain notation without trailing zeros.
pub fn plain_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

fn party_name(p: &Option<party::Model>) -> String {
    p.as_ref().map(|p| p.name.clone()).unwrap_or_default()
}

fn party_national_id(p: &Option<party::Model>) -> String {
    p.as_ref()
        .and_then(|p| p.national_id.clone())
        .unwrap_or_default()
}

fn airport(entry: &Option<lookup_entry::Model>) -> String {
    entry
        .as_ref()
        .and_then(|e| e.airport_abbr.clone())
        .unwrap_or_default()
}

/// The four manifest rows as plain field lists.
pub fn manifest_rows(ctx: &ManifestContext) -> [Vec<String>; 4] {
    let mawb = ctx.text(|s| s.mawb.as_ref());
    let hawb = ctx.text(|s| s.hawb.as_ref());
    let pieces = ctx.pieces();
    let gross_weight = ctx.number(|s| s.gross_weight);
    let pol = airport(&ctx.pol);
    let pod = airport(&ctx.pod);
    let etd = ctx.date(|s| s.etd);

    let voyage = vec![
        "VOY".to_string(),
        ctx.carrier
            .as_ref()
            .and_then(|c| c.code.clone())
            .unwrap_or_default(),
        ctx.text(|s| s.flight_no.as_ref()),
        etd.clone(),
        ctx.date(|s| s.eta),
        pol.clone(),
        pod.clone(),
        ctx.text(|s| s.manifest_no.as_ref()),
        "0".to_string(),
        String::new(),
    ];

    let bill_of_lading = vec![
        "BOL".to_string(),
        mawb.clone(),
        hawb.clone(),
        party_name(&ctx.hawb_shipper),
        party_national_id(&ctx.hawb_shipper),
        party_name(&ctx.hawb_consignee),
        party_national_id(&ctx.hawb_consignee),
        pol,
        pod,
        pieces.clone(),
        gross_weight.clone(),
        "KG".to_string(),
        etd,
        "1".to_string(),
        "N".to_string(),
        String::new(),
    ];

    let container = vec![
        "CNT".to_string(),
        mawb.clone(),
        hawb,
        "LOOSE".to_string(),
        String::new(),
        pieces.clone(),
        gross_weight,
        ctx.number(|s| s.volume),
        "0".to_string(),
        "0".to_string(),
    ];

    let consolidation = vec![
        "CSL".to_string(),
        mawb,
        ctx.console
            .as_ref()
            .map(|c| c.code.clone())
            .unwrap_or_default(),
        party_name(&ctx.shipper),
        party_national_id(&ctx.shipper),
        party_name(&ctx.consignee),
        party_national_id(&ctx.consignee),
        ctx.text(|s| s.commodity.as_ref()),
        ctx.text(|s| s.hs_code.as_ref()),
        pieces,
        ctx.number(|s| s.chargeable_weight),
        "N".to_string(),
    ];

    [voyage, bill_of_lading, container, consolidation]
}

/// Line breaks inside a field become single spaces.
fn single_line(field: &str) -> String {
    field.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

/// Renders the manifest text: four fully quoted rows, no trailing newline.
pub fn render_manifest(ctx: &ManifestContext) -> String {
    manifest_rows(ctx)
        .iter()
        .map(|row| {
            row.iter()
                .map(|f| quote_field(&single_line(f)))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// File name offered for download.
pub fn manifest_file_name(reference: &str) -> String {
    format!("Manifest_{reference}.txt")
}

#[derive(Clone)]
pub struct ManifestService {
    db_pool: Arc<DbPool>,
}

impl ManifestService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Returns the shipment reference and the manifest text.
    #[instrument(skip(self))]
    pub async fn render(&self, shipment_id: Uuid) -> Result<(String, String), ServiceError> {
        let db = &*self.db_pool;
        let shipment = shipments::find(db, shipment_id).await?;
        let reference = shipment.reference.clone();
        let ctx = ManifestContext::load(db, shipment).await?;

        counter!("forwarder.manifests.rendered", 1);
        Ok((reference, render_manifest(&ctx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{LookupKind, PartyRole};
    use crate::services::derived::tests::blank_shipment;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn named_party(role: PartyRole, name: &str, national_id: Option<&str>) -> party::Model {
        party::Model {
            id: Uuid::new_v4(),
            role,
            name: name.into(),
            national_id: national_id.map(String::from),
            code: None,
            phone: None,
            email: None,
            address: None,
            city: None,
            country: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn airport_entry(kind: LookupKind, abbr: &str) -> lookup_entry::Model {
        lookup_entry::Model {
            id: Uuid::new_v4(),
            kind,
            data: abbr.to_lowercase(),
            country_name: None,
            country_abbr: None,
            airport_abbr: Some(abbr.into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn dates_are_day_month_year_upper_case() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(manifest_date(d), "05MAR2024");
    }

    #[test]
    fn decimals_drop_trailing_zeros() {
        assert_eq!(plain_decimal(dec!(120.50)), "120.5");
        assert_eq!(plain_decimal(dec!(12.000)), "12");
        assert_eq!(plain_decimal(dec!(0.25)), "0.25");
    }

    #[test]
    fn empty_context_still_renders_four_rows() {
        let text = render_manifest(&ManifestContext::default());
        let lines: Vec<&str> = text.split('\n').collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], r#""VOY","","","","","","","","0","""#);
        assert_eq!(
            lines[3],
            r#""CSL","","","","","","","","","","","N""#
        );
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn row_widths_are_fixed() {
        let widths: Vec<usize> = manifest_rows(&ManifestContext::default())
            .iter()
            .map(Vec::len)
            .collect();
        assert_eq!(widths, vec![10, 16, 10, 12]);
    }

    #[test]
    fn fixture_renders_byte_for_byte() {
        let mut shipment = blank_shipment();
        shipment.mawb = Some("157-12345675".into());
        shipment.hawb = Some("HX001".into());
        shipment.flight_no = Some("QR8212".into());
        shipment.manifest_no = Some("M-77".into());
        shipment.etd = NaiveDate::from_ymd_opt(2024, 3, 5);
        shipment.eta = NaiveDate::from_ymd_opt(2024, 3, 7);
        shipment.pieces = Some(12);
        shipment.gross_weight = Some(dec!(120.50));
        shipment.volume = Some(dec!(1.200));
        shipment.chargeable_weight = Some(dec!(200.00));
        shipment.commodity = Some("Spare parts, \"engine\"".into());
        shipment.hs_code = Some("8409.91".into());

        let mut carrier = named_party(PartyRole::Carrier, "Qatar Airways", None);
        carrier.code = Some("QR".into());

        let ctx = ManifestContext {
            shipment: Some(shipment),
            carrier: Some(carrier),
            shipper: Some(named_party(PartyRole::Shipper, "Master Shipper", Some("MS-1"))),
            consignee: Some(named_party(PartyRole::Consignee, "Master Consignee", None)),
            hawb_shipper: Some(named_party(PartyRole::Shipper, "House Shipper", Some("HS-9"))),
            hawb_consignee: Some(named_party(
                PartyRole::Consignee,
                "House Consignee",
                Some("HC-3"),
            )),
            pol: Some(airport_entry(LookupKind::Pol, "IKA")),
            pod: Some(airport_entry(LookupKind::Pod, "DXB")),
            console: Some(console::Model {
                id: Uuid::new_v4(),
                code: "CON-42".into(),
                created_at: Utc::now(),
            }),
        };

        let expected = concat!(
            r#""VOY","QR","QR8212","05MAR2024","07MAR2024","IKA","DXB","M-77","0","""#,
            "\n",
            r#""BOL","157-12345675","HX001","House Shipper","HS-9","House Consignee","HC-3","IKA","DXB","12","120.5","KG","05MAR2024","1","N","""#,
            "\n",
            r#""CNT","157-12345675","HX001","LOOSE","","12","120.5","1.2","0","0""#,
            "\n",
            r#""CSL","157-12345675","CON-42","Master Shipper","MS-1","Master Consignee","","Spare parts, ""engine""","8409.91","12","200","N""#,
        );
        assert_eq!(render_manifest(&ctx), expected);
    }

    #[test]
    fn multi_line_fields_keep_four_lines() {
        let mut shipment = blank_shipment();
        shipment.commodity = Some("Spare parts\r\nengine\nblocks".into());
        shipment.manifest_no = Some("M-1\r".into());
        let ctx = ManifestContext {
            shipment: Some(shipment),
            ..ManifestContext::default()
        };

        let text = render_manifest(&ctx);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(!text.contains('\r'));
        assert!(lines[0].contains(r#""M-1 ""#));
        assert!(lines[3].contains(r#""Spare parts engine blocks""#));
    }

    #[test]
    fn file_name_carries_reference() {
        assert_eq!(manifest_file_name("240305001"), "Manifest_240305001.txt");
    }
}
