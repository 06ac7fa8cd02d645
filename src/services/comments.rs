use crate::{
    db::DbPool,
    entities::{shipment_comment, staff_user},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::shipments;

/// Append-only notes on a shipment.
#[derive(Clone)]
pub struct CommentService {
    db_pool: Arc<DbPool>,
}

impl CommentService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Comments of a shipment, oldest first.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        shipment_id: Uuid,
    ) -> Result<Vec<shipment_comment::Model>, ServiceError> {
        let db = &*self.db_pool;
        shipments::find(db, shipment_id).await?;

        shipment_comment::Entity::find()
            .filter(shipment_comment::Column::ShipmentId.eq(shipment_id))
            .order_by_asc(shipment_comment::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Adds a comment authored by `author`.
    #[instrument(skip(self, text))]
    pub async fn create(
        &self,
        shipment_id: Uuid,
        author: Option<Uuid>,
        text: &str,
    ) -> Result<shipment_comment::Model, ServiceError> {
        let db = &*self.db_pool;
        let author_id = author.ok_or_else(|| {
            ServiceError::Unauthorized("commenting requires a signed-in staff user".into())
        })?;
        let author = staff_user::Entity::find_by_id(author_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::Unauthorized(format!("unknown staff user {author_id}")))?;

        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::ValidationError(
                "comment text must not be blank".into(),
            ));
        }
        shipments::find(db, shipment_id).await?;

        let saved = shipment_comment::ActiveModel {
            id: Set(Uuid::new_v4()),
            shipment_id: Set(shipment_id),
            text: Set(text.to_string()),
            author_id: Set(Some(author.id)),
            author_name: Set(author_name(&author)),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await
        .map_err(ServiceError::from_write)?;

        info!(comment_id = %saved.id, shipment_id = %shipment_id, "comment added");
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, shipment_id: Uuid, comment_id: Uuid) -> Result<(), ServiceError> {
        let result = shipment_comment::Entity::delete_many()
            .filter(shipment_comment::Column::Id.eq(comment_id))
            .filter(shipment_comment::Column::ShipmentId.eq(shipment_id))
            .exec(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("Comment", comment_id));
        }
        Ok(())
    }
}

/// Display name kept on the comment so it survives the author's deletion.
fn author_name(author: &staff_user::Model) -> String {
    author
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(&author.username)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staff(full_name: Option<&str>) -> staff_user::Model {
        staff_user::Model {
            id: Uuid::new_v4(),
            username: "mhossein".into(),
            full_name: full_name.map(String::from),
            phone: None,
            is_agent: false,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn author_name_prefers_full_name() {
        assert_eq!(author_name(&staff(Some("Maryam Hosseini"))), "Maryam Hosseini");
        assert_eq!(author_name(&staff(Some("  "))), "mhossein");
        assert_eq!(author_name(&staff(None)), "mhossein");
    }
}
