use crate::{
    db::DbPool,
    entities::{party, shipment, PartyRole},
    errors::ServiceError,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::non_blank;

/// Writable fields of a party.
#[derive(Debug, Clone)]
pub struct PartyDraft {
    pub role: PartyRole,
    pub name: String,
    pub national_id: Option<String>,
    pub code: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl PartyDraft {
    pub fn named(role: PartyRole, name: impl Into<String>) -> Self {
        Self {
            role,
            name: name.into(),
            national_id: None,
            code: None,
            phone: None,
            email: None,
            address: None,
            city: None,
            country: None,
        }
    }

    fn normalized(self) -> Result<Self, ServiceError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::ValidationError(
                "party name must not be blank".into(),
            ));
        }
        Ok(Self {
            name,
            national_id: non_blank(self.national_id),
            code: non_blank(self.code),
            phone: non_blank(self.phone),
            email: non_blank(self.email),
            address: non_blank(self.address),
            city: non_blank(self.city),
            country: non_blank(self.country),
            ..self
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PartyFilter {
    pub role: Option<PartyRole>,
    pub search: Option<String>,
}

/// Customers, shippers, consignees, carriers and agents.
#[derive(Clone)]
pub struct PartyService {
    db_pool: Arc<DbPool>,
}

impl PartyService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn create(&self, draft: PartyDraft) -> Result<party::Model, ServiceError> {
        let draft = draft.normalized()?;
        let db = &*self.db_pool;

        if find_by_name(db, draft.role, &draft.name).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "{} '{}' already exists",
                draft.role, draft.name
            )));
        }

        let model = insert(db, draft).await?;
        info!(party_id = %model.id, role = %model.role, "party created");
        Ok(model)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<party::Model, ServiceError> {
        party::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Party", id))
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: PartyFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<party::Model>, u64), ServiceError> {
        let db = &*self.db_pool;
        let mut query = party::Entity::find();

        if let Some(role) = filter.role {
            query = query.filter(party::Column::Role.eq(role));
        }
        if let Some(term) = non_blank(filter.search) {
            query = query.filter(
                Condition::any()
                    .add(party::Column::Name.contains(term.as_str()))
                    .add(party::Column::NationalId.contains(term.as_str()))
                    .add(party::Column::Code.contains(term.as_str())),
            );
        }

        let paginator = query
            .order_by_asc(party::Column::Role)
            .order_by_asc(party::Column::Name)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let parties = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((parties, total))
    }

    /// Updates contact details. The role of an existing party is fixed.
    #[instrument(skip(self))]
    pub async fn update(&self, id: Uuid, draft: PartyDraft) -> Result<party::Model, ServiceError> {
        let draft = draft.normalized()?;
        let db = &*self.db_pool;
        let existing = self.get(id).await?;

        if existing.role != draft.role {
            return Err(ServiceError::ValidationError(format!(
                "party role cannot change from {} to {}",
                existing.role, draft.role
            )));
        }
        if let Some(other) = find_by_name(db, draft.role, &draft.name).await? {
            if other.id != id {
                return Err(ServiceError::Conflict(format!(
                    "{} '{}' already exists",
                    draft.role, draft.name
                )));
            }
        }

        let mut active = existing.into_active_model();
        active.name = Set(draft.name);
        active.national_id = Set(draft.national_id);
        active.code = Set(draft.code);
        active.phone = Set(draft.phone);
        active.email = Set(draft.email);
        active.address = Set(draft.address);
        active.city = Set(draft.city);
        active.country = Set(draft.country);

        active.update(db).await.map_err(ServiceError::from_write)
    }

    /// Deletes a party that no shipment refers to.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let existing = self.get(id).await?;

        let referencing = shipment::Entity::find()
            .filter(references_party(id))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        if referencing > 0 {
            return Err(ServiceError::ConstraintViolation(format!(
                "{} '{}' is referenced by {} shipment(s)",
                existing.role, existing.name, referencing
            )));
        }

        party::Entity::delete_by_id(id)
            .exec(db)
            .await
            .map_err(ServiceError::from_write)?;
        info!(party_id = %id, "party deleted");
        Ok(())
    }
}

/// Matches shipments naming `party_id` in any party column.
fn references_party(party_id: Uuid) -> Condition {
    Condition::any()
        .add(shipment::Column::ClientId.eq(party_id))
        .add(shipment::Column::ShipperId.eq(party_id))
        .add(shipment::Column::ConsigneeId.eq(party_id))
        .add(shipment::Column::HawbShipperId.eq(party_id))
        .add(shipment::Column::HawbConsigneeId.eq(party_id))
        .add(shipment::Column::CarrierId.eq(party_id))
        .add(shipment::Column::AgentId.eq(party_id))
}

async fn find_by_name<C>(
    db: &C,
    role: PartyRole,
    name: &str,
) -> Result<Option<party::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    party::Entity::find()
        .filter(party::Column::Role.eq(role))
        .filter(party::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(ServiceError::db_error)
}

async fn insert<C>(db: &C, draft: PartyDraft) -> Result<party::Model, ServiceError>
where
    C: ConnectionTrait,
{
    party::ActiveModel {
        id: Set(Uuid::new_v4()),
        role: Set(draft.role),
        name: Set(draft.name),
        national_id: Set(draft.national_id),
        code: Set(draft.code),
        phone: Set(draft.phone),
        email: Set(draft.email),
        address: Set(draft.address),
        city: Set(draft.city),
        country: Set(draft.country),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(ServiceError::from_write)
}

/// Finds the party of `role` called `name` (trimmed), creating it if absent.
/// The flag is true when a new row was inserted.
pub async fn get_or_create<C>(
    db: &C,
    role: PartyRole,
    name: &str,
) -> Result<(party::Model, bool), ServiceError>
where
    C: ConnectionTrait,
{
    let draft = PartyDraft::named(role, name).normalized()?;
    if let Some(existing) = find_by_name(db, role, &draft.name).await? {
        return Ok((existing, false));
    }
    Ok((insert(db, draft).await?, true))
}

/// Fails unless `id` names a party playing `role`.
pub async fn ensure_role<C>(
    db: &C,
    id: Uuid,
    role: PartyRole,
    field: &str,
) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let found = party::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(ServiceError::db_error)?;
    match found {
        Some(p) if p.role == role => Ok(()),
        Some(p) => Err(ServiceError::ValidationError(format!(
            "{field} must reference a {role}, but party {id} is a {}",
            p.role
        ))),
        None => Err(ServiceError::ValidationError(format!(
            "{field}: party {id} does not exist"
        ))),
    }
}
