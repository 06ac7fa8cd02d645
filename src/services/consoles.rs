use crate::{
    db::DbPool,
    entities::{console, shipment},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Consolidation batches.
#[derive(Clone)]
pub struct ConsoleService {
    db_pool: Arc<DbPool>,
}

impl ConsoleService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn create(&self, code: &str) -> Result<console::Model, ServiceError> {
        let code = normalize_code(code)?;
        let db = &*self.db_pool;
        if find_by_code(db, &code).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "console '{}' already exists",
                code
            )));
        }
        insert(db, code).await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<console::Model, ServiceError> {
        console::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Console", id))
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<console::Model>, u64), ServiceError> {
        let paginator = console::Entity::find()
            .order_by_desc(console::Column::CreatedAt)
            .paginate(&*self.db_pool, per_page);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let consoles = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;
        Ok((consoles, total))
    }

    /// Deletes the console; member shipments stay, detached.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.get(id).await?;
        let txn = self.db_pool.begin().await.map_err(ServiceError::db_error)?;

        let detached = shipment::Entity::update_many()
            .col_expr(shipment::Column::ConsoleId, Expr::value(Option::<Uuid>::None))
            .col_expr(shipment::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(shipment::Column::ConsoleId.eq(id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        console::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(console_id = %id, detached = detached.rows_affected, "console deleted");
        Ok(())
    }
}

fn normalize_code(code: &str) -> Result<String, ServiceError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(ServiceError::ValidationError(
            "console code must not be blank".into(),
        ));
    }
    Ok(code.to_string())
}

async fn find_by_code<C>(db: &C, code: &str) -> Result<Option<console::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    console::Entity::find()
        .filter(console::Column::Code.eq(code))
        .one(db)
        .await
        .map_err(ServiceError::db_error)
}

async fn insert<C>(db: &C, code: String) -> Result<console::Model, ServiceError>
where
    C: ConnectionTrait,
{
    console::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(code),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .map_err(ServiceError::from_write)
}

/// Finds the console called `code` (trimmed), creating it if absent.
pub async fn get_or_create<C>(db: &C, code: &str) -> Result<(console::Model, bool), ServiceError>
where
    C: ConnectionTrait,
{
    let code = normalize_code(code)?;
    if let Some(existing) = find_by_code(db, &code).await? {
        return Ok((existing, false));
    }
    Ok((insert(db, code).await?, true))
}
