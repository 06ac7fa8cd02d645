use crate::{
    db::DbPool,
    entities::{shipment, shipment_operator, staff_user},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::non_blank;

#[derive(Debug, Clone)]
pub struct StaffUserDraft {
    pub username: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub is_agent: bool,
    pub is_active: bool,
}

impl StaffUserDraft {
    pub fn with_username(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            full_name: None,
            phone: None,
            is_agent: false,
            is_active: true,
        }
    }

    fn normalized(self) -> Result<Self, ServiceError> {
        let username = staff_user::normalize_username(&self.username);
        if username.is_empty() {
            return Err(ServiceError::ValidationError(
                "username must not be blank".into(),
            ));
        }
        Ok(Self {
            username,
            full_name: non_blank(self.full_name),
            phone: non_blank(self.phone),
            ..self
        })
    }
}

/// Back-office staff accounts.
#[derive(Clone)]
pub struct StaffUserService {
    db_pool: Arc<DbPool>,
}

impl StaffUserService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn create(&self, draft: StaffUserDraft) -> Result<staff_user::Model, ServiceError> {
        let draft = draft.normalized()?;
        let db = &*self.db_pool;
        if find_by_username(db, &draft.username).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "staff user '{}' already exists",
                draft.username
            )));
        }
        let model = insert(db, draft).await?;
        info!(staff_user_id = %model.id, "staff user created");
        Ok(model)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<staff_user::Model, ServiceError> {
        staff_user::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Staff user", id))
    }

    /// Looks a user up by username, compared case-insensitively.
    #[instrument(skip(self))]
    pub async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<staff_user::Model>, ServiceError> {
        find_by_username(&*self.db_pool, &staff_user::normalize_username(username)).await
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        search: Option<String>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<staff_user::Model>, u64), ServiceError> {
        let mut query = staff_user::Entity::find();
        if let Some(term) = non_blank(search) {
            query = query.filter(
                Condition::any()
                    .add(staff_user::Column::Username.contains(term.to_lowercase().as_str()))
                    .add(staff_user::Column::FullName.contains(term.as_str())),
            );
        }

        let paginator = query
            .order_by_asc(staff_user::Column::Username)
            .paginate(&*self.db_pool, per_page);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let users = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;
        Ok((users, total))
    }

    #[instrument(skip(self))]
    pub async fn update(
        &self,
        id: Uuid,
        draft: StaffUserDraft,
    ) -> Result<staff_user::Model, ServiceError> {
        let draft = draft.normalized()?;
        let db = &*self.db_pool;
        let existing = self.get(id).await?;

        if let Some(other) = find_by_username(db, &draft.username).await? {
            if other.id != id {
                return Err(ServiceError::Conflict(format!(
                    "staff user '{}' already exists",
                    draft.username
                )));
            }
        }

        let mut active = existing.into_active_model();
        active.username = Set(draft.username);
        active.full_name = Set(draft.full_name);
        active.phone = Set(draft.phone);
        active.is_agent = Set(draft.is_agent);
        active.is_active = Set(draft.is_active);
        active.update(db).await.map_err(ServiceError::from_write)
    }

    /// Deletes the user, clearing them as responsible staff and operator.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.get(id).await?;
        let txn = self.db_pool.begin().await.map_err(ServiceError::db_error)?;

        shipment::Entity::update_many()
            .col_expr(shipment::Column::SpId, Expr::value(Option::<Uuid>::None))
            .col_expr(shipment::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(shipment::Column::SpId.eq(id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        shipment_operator::Entity::delete_many()
            .filter(shipment_operator::Column::StaffUserId.eq(id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        staff_user::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;
        info!(staff_user_id = %id, "staff user deleted");
        Ok(())
    }
}

async fn find_by_username<C>(
    db: &C,
    username: &str,
) -> Result<Option<staff_user::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    staff_user::Entity::find()
        .filter(staff_user::Column::Username.eq(username))
        .one(db)
        .await
        .map_err(ServiceError::db_error)
}

async fn insert<C>(db: &C, draft: StaffUserDraft) -> Result<staff_user::Model, ServiceError>
where
    C: ConnectionTrait,
{
    staff_user::ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(draft.username),
        full_name: Set(draft.full_name),
        phone: Set(draft.phone),
        is_agent: Set(draft.is_agent),
        is_active: Set(draft.is_active),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(ServiceError::from_write)
}

/// Finds the user with the case-folded `username`, creating an active
/// account if absent.
pub async fn get_or_create<C>(
    db: &C,
    username: &str,
) -> Result<(staff_user::Model, bool), ServiceError>
where
    C: ConnectionTrait,
{
    let draft = StaffUserDraft::with_username(username).normalized()?;
    if let Some(existing) = find_by_username(db, &draft.username).await? {
        return Ok((existing, false));
    }
    Ok((insert(db, draft).await?, true))
}
