//! Allocation of `YYMMDDNNN` shipment references.

use crate::entities::shipment;
use crate::errors::ServiceError;
use chrono::NaiveDate;
use metrics::counter;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, QueryFilter, QuerySelect,
};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

const SEQUENCE_WIDTH: usize = 3;

/// Date prefix shared by every reference allocated on `day`.
pub fn reference_prefix(day: NaiveDate) -> String {
    day.format("%y%m%d").to_string()
}

/// Sequence number of `reference` when it has the allocator's shape: the
/// prefix followed by at least three ASCII digits.
pub fn sequence_number(prefix: &str, reference: &str) -> Option<u32> {
    reference
        .strip_prefix(prefix)
        .filter(|suffix| suffix.len() >= SEQUENCE_WIDTH)
        .filter(|suffix| suffix.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse::<u32>().ok())
}

/// Next reference after `latest` within `prefix`.
///
/// A missing or non-numeric suffix starts the sequence over at `001`.
pub fn next_in_sequence(prefix: &str, latest: Option<&str>) -> String {
    let next = latest
        .and_then(|reference| sequence_number(prefix, reference))
        .map(|n| n + 1)
        .unwrap_or(1);
    format!("{prefix}{next:0width$}", width = SEQUENCE_WIDTH)
}

/// Serialises reference allocation.
///
/// Callers hold the guard from [`ReferenceAllocator::lock`] until the
/// transaction that inserts the new shipment commits. On Postgres the day's
/// references are additionally read with `FOR UPDATE`.
#[derive(Debug, Default)]
pub struct ReferenceAllocator {
    gate: Mutex<()>,
}

impl ReferenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    /// Computes the next free reference for `day` inside `txn`.
    pub async fn allocate<C>(&self, txn: &C, day: NaiveDate) -> Result<String, ServiceError>
    where
        C: ConnectionTrait,
    {
        let prefix = reference_prefix(day);

        // Highest by number, not by string: `2403051000` follows `240305999`,
        // and hand-entered references such as `240305X` carry no sequence.
        let mut query = shipment::Entity::find()
            .select_only()
            .column(shipment::Column::Reference)
            .filter(shipment::Column::Reference.starts_with(prefix.as_str()));
        if txn.get_database_backend() == DbBackend::Postgres {
            query = query.lock_exclusive();
        }

        let references: Vec<String> = query
            .into_tuple()
            .all(txn)
            .await
            .map_err(ServiceError::db_error)?;
        let latest = references
            .iter()
            .filter_map(|r| sequence_number(&prefix, r).map(|n| (n, r.as_str())))
            .max_by_key(|(n, _)| *n)
            .map(|(_, r)| r);
        let reference = next_in_sequence(&prefix, latest);

        debug!(%reference, "allocated shipment reference");
        counter!("forwarder.references.allocated", 1);
        Ok(reference)
    }
}
