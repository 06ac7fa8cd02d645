use crate::{
    db::DbPool,
    entities::{charge, lookup_entry, shipment, shipment_comment, shipment_operator, LookupKind},
    errors::ServiceError,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::non_blank;

/// Writable fields of a port or term entry.
#[derive(Debug, Clone)]
pub struct LookupDraft {
    pub kind: LookupKind,
    pub data: String,
    pub country_name: Option<String>,
    pub country_abbr: Option<String>,
    pub airport_abbr: Option<String>,
}

impl LookupDraft {
    pub fn named(kind: LookupKind, data: impl Into<String>) -> Self {
        Self {
            kind,
            data: data.into(),
            country_name: None,
            country_abbr: None,
            airport_abbr: None,
        }
    }

    fn normalized(self) -> Result<Self, ServiceError> {
        let data = self.data.trim().to_string();
        if data.is_empty() {
            return Err(ServiceError::ValidationError(
                "lookup value must not be blank".into(),
            ));
        }
        let airport_abbr = match self.kind {
            LookupKind::Term => None,
            LookupKind::Pol | LookupKind::Pod => non_blank(self.airport_abbr),
        };
        Ok(Self {
            data,
            country_name: non_blank(self.country_name),
            country_abbr: non_blank(self.country_abbr),
            airport_abbr,
            ..self
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct LookupFilter {
    pub kind: Option<LookupKind>,
    pub search: Option<String>,
}

/// Ports of loading/discharge and trade terms.
#[derive(Clone)]
pub struct LookupService {
    db_pool: Arc<DbPool>,
}

impl LookupService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn create(&self, draft: LookupDraft) -> Result<lookup_entry::Model, ServiceError> {
        let draft = draft.normalized()?;
        let db = &*self.db_pool;

        if find_by_data(db, draft.kind, &draft.data).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "{} '{}' already exists",
                draft.kind, draft.data
            )));
        }
        insert(db, draft).await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<lookup_entry::Model, ServiceError> {
        lookup_entry::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Lookup entry", id))
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: LookupFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<lookup_entry::Model>, u64), ServiceError> {
        let db = &*self.db_pool;
        let mut query = lookup_entry::Entity::find();

        if let Some(kind) = filter.kind {
            query = query.filter(lookup_entry::Column::Kind.eq(kind));
        }
        if let Some(term) = non_blank(filter.search) {
            query = query.filter(
                Condition::any()
                    .add(lookup_entry::Column::Data.contains(term.as_str()))
                    .add(lookup_entry::Column::AirportAbbr.contains(term.as_str()))
                    .add(lookup_entry::Column::CountryName.contains(term.as_str())),
            );
        }

        let paginator = query
            .order_by_asc(lookup_entry::Column::Kind)
            .order_by_asc(lookup_entry::Column::Data)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let entries = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((entries, total))
    }

    #[instrument(skip(self))]
    pub async fn update(
        &self,
        id: Uuid,
        draft: LookupDraft,
    ) -> Result<lookup_entry::Model, ServiceError> {
        let draft = draft.normalized()?;
        let db = &*self.db_pool;
        let existing = self.get(id).await?;

        if existing.kind != draft.kind {
            return Err(ServiceError::ValidationError(format!(
                "lookup kind cannot change from {} to {}",
                existing.kind, draft.kind
            )));
        }
        if let Some(other) = find_by_data(db, draft.kind, &draft.data).await? {
            if other.id != id {
                return Err(ServiceError::Conflict(format!(
                    "{} '{}' already exists",
                    draft.kind, draft.data
                )));
            }
        }

        let mut active = existing.into_active_model();
        active.data = Set(draft.data);
        active.country_name = Set(draft.country_name);
        active.country_abbr = Set(draft.country_abbr);
        active.airport_abbr = Set(draft.airport_abbr);
        active.update(db).await.map_err(ServiceError::from_write)
    }

    /// Deletes the entry and every shipment routed through it.
    /// Returns the number of shipments removed.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<u64, ServiceError> {
        self.get(id).await?;

        let txn = self.db_pool.begin().await.map_err(ServiceError::db_error)?;

        let shipment_ids: Vec<Uuid> = shipment::Entity::find()
            .select_only()
            .column(shipment::Column::Id)
            .filter(
                Condition::any()
                    .add(shipment::Column::PolId.eq(id))
                    .add(shipment::Column::PodId.eq(id))
                    .add(shipment::Column::TermId.eq(id)),
            )
            .into_tuple()
            .all(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        let removed = delete_shipments(&txn, &shipment_ids).await?;

        lookup_entry::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        if removed > 0 {
            warn!(lookup_id = %id, removed, "lookup deletion removed shipments");
        } else {
            info!(lookup_id = %id, "lookup entry deleted");
        }
        Ok(removed)
    }
}

/// Removes shipments together with their charges, comments and operator links.
pub(crate) async fn delete_shipments<C>(db: &C, ids: &[Uuid]) -> Result<u64, ServiceError>
where
    C: ConnectionTrait,
{
    if ids.is_empty() {
        return Ok(0);
    }

    charge::Entity::delete_many()
        .filter(charge::Column::ShipmentId.is_in(ids.iter().copied()))
        .exec(db)
        .await
        .map_err(ServiceError::db_error)?;
    shipment_comment::Entity::delete_many()
        .filter(shipment_comment::Column::ShipmentId.is_in(ids.iter().copied()))
        .exec(db)
        .await
        .map_err(ServiceError::db_error)?;
    shipment_operator::Entity::delete_many()
        .filter(shipment_operator::Column::ShipmentId.is_in(ids.iter().copied()))
        .exec(db)
        .await
        .map_err(ServiceError::db_error)?;

    let result = shipment::Entity::delete_many()
        .filter(shipment::Column::Id.is_in(ids.iter().copied()))
        .exec(db)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(result.rows_affected)
}

async fn find_by_data<C>(
    db: &C,
    kind: LookupKind,
    data: &str,
) -> Result<Option<lookup_entry::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    lookup_entry::Entity::find()
        .filter(lookup_entry::Column::Kind.eq(kind))
        .filter(lookup_entry::Column::Data.eq(data))
        .one(db)
        .await
        .map_err(ServiceError::db_error)
}

async fn insert<C>(db: &C, draft: LookupDraft) -> Result<lookup_entry::Model, ServiceError>
where
    C: ConnectionTrait,
{
    lookup_entry::ActiveModel {
        id: Set(Uuid::new_v4()),
        kind: Set(draft.kind),
        data: Set(draft.data),
        country_name: Set(draft.country_name),
        country_abbr: Set(draft.country_abbr),
        airport_abbr: Set(draft.airport_abbr),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(ServiceError::from_write)
}

/// Finds the `kind` entry whose value is `data` (trimmed), creating it if absent.
pub async fn get_or_create<C>(
    db: &C,
    kind: LookupKind,
    data: &str,
) -> Result<(lookup_entry::Model, bool), ServiceError>
where
    C: ConnectionTrait,
{
    let draft = LookupDraft::named(kind, data).normalized()?;
    if let Some(existing) = find_by_data(db, kind, &draft.data).await? {
        return Ok((existing, false));
    }
    Ok((insert(db, draft).await?, true))
}

/// Sets the airport code of port `id` when it has none yet. Returns whether
/// the entry changed.
pub async fn fill_airport<C>(db: &C, id: Uuid, airport_abbr: &str) -> Result<bool, ServiceError>
where
    C: ConnectionTrait,
{
    let abbr = airport_abbr.trim();
    let entry = lookup_entry::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::not_found("Lookup entry", id))?;
    if abbr.is_empty() || entry.kind == LookupKind::Term || entry.airport_abbr.is_some() {
        return Ok(false);
    }

    let mut active = entry.into_active_model();
    active.airport_abbr = Set(Some(abbr.to_string()));
    active.update(db).await.map_err(ServiceError::from_write)?;
    Ok(true)
}

/// Fails unless `id` names an entry of `kind`.
pub async fn ensure_kind<C>(
    db: &C,
    id: Uuid,
    kind: LookupKind,
    field: &str,
) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let found = lookup_entry::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(ServiceError::db_error)?;
    match found {
        Some(entry) if entry.kind == kind => Ok(()),
        Some(entry) => Err(ServiceError::ValidationError(format!(
            "{field} must reference a {kind} entry, but {id} is a {}",
            entry.kind
        ))),
        None => Err(ServiceError::ValidationError(format!(
            "{field}: lookup entry {id} does not exist"
        ))),
    }
}
