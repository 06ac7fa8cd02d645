use crate::{
    db::DbPool,
    entities::{charge, ChargePayer},
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::shipments;

#[derive(Debug, Clone, PartialEq)]
pub struct ChargeDraft {
    pub description: String,
    pub amount: Decimal,
    pub currency: String,
    pub payer: ChargePayer,
}

impl ChargeDraft {
    fn normalized(self) -> Result<Self, ServiceError> {
        let description = self.description.trim().to_string();
        if description.is_empty() {
            return Err(ServiceError::ValidationError(
                "description must not be blank".into(),
            ));
        }
        let currency = self.currency.trim().to_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ServiceError::ValidationError(format!(
                "currency '{currency}' must be a three-letter code"
            )));
        }
        Ok(Self {
            description,
            currency,
            ..self
        })
    }
}

/// Itemised charge lines attached to a shipment.
#[derive(Clone)]
pub struct ChargeService {
    db_pool: Arc<DbPool>,
}

impl ChargeService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, shipment_id: Uuid) -> Result<Vec<charge::Model>, ServiceError> {
        let db = &*self.db_pool;
        shipments::find(db, shipment_id).await?;

        charge::Entity::find()
            .filter(charge::Column::ShipmentId.eq(shipment_id))
            .order_by_asc(charge::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self, draft))]
    pub async fn create(
        &self,
        shipment_id: Uuid,
        draft: ChargeDraft,
    ) -> Result<charge::Model, ServiceError> {
        let db = &*self.db_pool;
        shipments::find(db, shipment_id).await?;
        let draft = draft.normalized()?;

        let now = Utc::now();
        let saved = charge::ActiveModel {
            id: Set(Uuid::new_v4()),
            shipment_id: Set(shipment_id),
            description: Set(draft.description),
            amount: Set(draft.amount),
            currency: Set(draft.currency),
            payer: Set(draft.payer),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .map_err(ServiceError::from_write)?;

        info!(charge_id = %saved.id, shipment_id = %shipment_id, "charge added");
        Ok(saved)
    }

    #[instrument(skip(self, draft))]
    pub async fn update(
        &self,
        shipment_id: Uuid,
        charge_id: Uuid,
        draft: ChargeDraft,
    ) -> Result<charge::Model, ServiceError> {
        let db = &*self.db_pool;
        let existing = self.find_line(shipment_id, charge_id).await?;
        let draft = draft.normalized()?;

        let mut active: charge::ActiveModel = existing.into();
        active.description = Set(draft.description);
        active.amount = Set(draft.amount);
        active.currency = Set(draft.currency);
        active.payer = Set(draft.payer);
        active.update(db).await.map_err(ServiceError::from_write)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, shipment_id: Uuid, charge_id: Uuid) -> Result<(), ServiceError> {
        self.find_line(shipment_id, charge_id).await?;
        charge::Entity::delete_by_id(charge_id)
            .exec(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(())
    }

    async fn find_line(
        &self,
        shipment_id: Uuid,
        charge_id: Uuid,
    ) -> Result<charge::Model, ServiceError> {
        charge::Entity::find_by_id(charge_id)
            .filter(charge::Column::ShipmentId.eq(shipment_id))
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Charge", charge_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn draft(currency: &str) -> ChargeDraft {
        ChargeDraft {
            description: "  Airport handling ".into(),
            amount: dec!(45.00),
            currency: currency.into(),
            payer: ChargePayer::Client,
        }
    }

    #[test]
    fn currency_is_upper_cased_and_description_trimmed() {
        let normalized = draft(" usd ").normalized().unwrap();
        assert_eq!(normalized.currency, "USD");
        assert_eq!(normalized.description, "Airport handling");
    }

    #[test]
    fn malformed_currency_is_rejected() {
        assert!(matches!(
            draft("US").normalized(),
            Err(ServiceError::ValidationError(_))
        ));
        assert!(matches!(
            draft("U5D").normalized(),
            Err(ServiceError::ValidationError(_))
        ));
    }
}
