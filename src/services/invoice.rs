use crate::{
    db::DbPool,
    entities::{charge, lookup_entry, party, ChargePayer},
    errors::ServiceError,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{clock::Clock, shipments};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InvoiceLine {
    pub description: String,
    pub amount: Decimal,
    pub currency: String,
    pub payer: ChargePayer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CurrencyTotal {
    pub currency: String,
    pub amount: Decimal,
}

/// Read-only billing view of a shipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InvoiceDocument {
    pub shipment_id: Uuid,
    pub reference: String,
    pub client: Option<String>,
    pub carrier: Option<String>,
    pub pol: Option<String>,
    pub pod: Option<String>,
    pub term: Option<String>,
    pub mawb: Option<String>,
    pub hawb: Option<String>,
    pub pieces: Option<i32>,
    pub gross_weight: Option<Decimal>,
    pub chargeable_weight: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub currency: Option<String>,
    pub freight_charge: Option<Decimal>,
    pub handling_charge: Option<Decimal>,
    pub extra_charges: Option<Decimal>,
    pub total_charges: Option<Decimal>,
    pub lines: Vec<InvoiceLine>,
    /// Charge lines summed per currency, ordered by currency code.
    pub line_totals: Vec<CurrencyTotal>,
    pub invoice_deadline: Option<NaiveDate>,
    pub generated_at: DateTime<Utc>,
}

/// Sums `lines` per currency.
pub fn totals_by_currency(lines: &[InvoiceLine]) -> Vec<CurrencyTotal> {
    let mut sums: BTreeMap<&str, Decimal> = BTreeMap::new();
    for line in lines {
        *sums.entry(line.currency.as_str()).or_default() += line.amount;
    }
    sums.into_iter()
        .map(|(currency, amount)| CurrencyTotal {
            currency: currency.to_string(),
            amount,
        })
        .collect()
}

#[derive(Clone)]
pub struct InvoiceService {
    db_pool: Arc<DbPool>,
    clock: Arc<dyn Clock>,
}

impl InvoiceService {
    pub fn new(db_pool: Arc<DbPool>, clock: Arc<dyn Clock>) -> Self {
        Self { db_pool, clock }
    }

    #[instrument(skip(self))]
    pub async fn invoice(&self, shipment_id: Uuid) -> Result<InvoiceDocument, ServiceError> {
        let db = &*self.db_pool;
        let shipment = shipments::find(db, shipment_id).await?;

        let lines: Vec<InvoiceLine> = charge::Entity::find()
            .filter(charge::Column::ShipmentId.eq(shipment_id))
            .order_by_asc(charge::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|c| InvoiceLine {
                description: c.description,
                amount: c.amount,
                currency: c.currency,
                payer: c.payer,
            })
            .collect();
        let line_totals = totals_by_currency(&lines);

        Ok(InvoiceDocument {
            shipment_id,
            client: party_name(db, Some(shipment.client_id)).await?,
            carrier: party_name(db, shipment.carrier_id).await?,
            pol: lookup_data(db, shipment.pol_id).await?,
            pod: lookup_data(db, shipment.pod_id).await?,
            term: lookup_data(db, shipment.term_id).await?,
            reference: shipment.reference,
            mawb: shipment.mawb,
            hawb: shipment.hawb,
            pieces: shipment.pieces,
            gross_weight: shipment.gross_weight,
            chargeable_weight: shipment.chargeable_weight,
            volume: shipment.volume,
            currency: shipment.currency,
            freight_charge: shipment.freight_charge,
            handling_charge: shipment.handling_charge,
            extra_charges: shipment.extra_charges,
            total_charges: shipment.total_charges,
            lines,
            line_totals,
            invoice_deadline: shipment.invoice_deadline,
            generated_at: self.clock.now_utc(),
        })
    }
}

async fn party_name<C>(db: &C, id: Option<Uuid>) -> Result<Option<String>, ServiceError>
where
    C: ConnectionTrait,
{
    let Some(id) = id else { return Ok(None) };
    Ok(party::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
        .map(|p| p.name))
}

async fn lookup_data<C>(db: &C, id: Option<Uuid>) -> Result<Option<String>, ServiceError>
where
    C: ConnectionTrait,
{
    let Some(id) = id else { return Ok(None) };
    Ok(lookup_entry::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
        .map(|e| e.data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(currency: &str, amount: Decimal) -> InvoiceLine {
        InvoiceLine {
            description: "fee".into(),
            amount,
            currency: currency.into(),
            payer: ChargePayer::Client,
        }
    }

    #[test]
    fn totals_group_per_currency_in_code_order() {
        let totals = totals_by_currency(&[
            line("USD", dec!(10.50)),
            line("EUR", dec!(3)),
            line("USD", dec!(4.50)),
        ]);
        assert_eq!(
            totals,
            vec![
                CurrencyTotal {
                    currency: "EUR".into(),
                    amount: dec!(3)
                },
                CurrencyTotal {
                    currency: "USD".into(),
                    amount: dec!(15.00)
                },
            ]
        );
    }

    #[test]
    fn no_lines_no_totals() {
        assert!(totals_by_currency(&[]).is_empty());
    }
}
