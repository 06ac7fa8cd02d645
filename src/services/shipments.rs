use crate::{
    db::DbPool,
    entities::{
        console, party, shipment, shipment_operator, staff_user, LookupKind, PartyRole, Priority,
        TransportMode,
    },
    errors::ServiceError,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, QueryTrait, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    clock::Clock,
    derived::{apply_derived_fields, SaveContext},
    lookups, non_blank, parties,
    reference::ReferenceAllocator,
};

/// Client-writable fields of a shipment.
///
/// `reference`, `transit_time`, `total_charges` and `confirmed_at` are
/// maintained by the service and never taken from here.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipmentDraft {
    pub priority: Priority,
    pub client_id: Uuid,
    pub sp_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub carrier_id: Option<Uuid>,
    pub shipper_id: Option<Uuid>,
    pub consignee_id: Option<Uuid>,
    pub hawb_shipper_id: Option<Uuid>,
    pub hawb_consignee_id: Option<Uuid>,
    pub pol_id: Option<Uuid>,
    pub pod_id: Option<Uuid>,
    pub term_id: Option<Uuid>,
    pub via: Option<String>,
    pub mode: TransportMode,
    pub mawb: Option<String>,
    pub hawb: Option<String>,
    pub first_master: Option<String>,
    pub first_house: Option<String>,
    pub flight_no: Option<String>,
    pub manifest_no: Option<String>,
    pub etdw: Option<NaiveDate>,
    pub etd: Option<NaiveDate>,
    pub eta: Option<NaiveDate>,
    pub pieces: Option<i32>,
    pub gross_weight: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub chargeable_weight: Option<Decimal>,
    pub first_gross_weight: Option<Decimal>,
    pub first_chargeable_weight: Option<Decimal>,
    pub commodity: Option<String>,
    pub hs_code: Option<String>,
    pub console_id: Option<Uuid>,
    pub inq_replied: bool,
    pub confirmed: bool,
    pub currency: Option<String>,
    pub freight_charge: Option<Decimal>,
    pub handling_charge: Option<Decimal>,
    pub extra_charges: Option<Decimal>,
    pub invoice_deadline: Option<NaiveDate>,
}

impl ShipmentDraft {
    /// A draft carrying only the mandatory client.
    pub fn new(client_id: Uuid) -> Self {
        Self {
            priority: Priority::default(),
            client_id,
            sp_id: None,
            agent_id: None,
            carrier_id: None,
            shipper_id: None,
            consignee_id: None,
            hawb_shipper_id: None,
            hawb_consignee_id: None,
            pol_id: None,
            pod_id: None,
            term_id: None,
            via: None,
            mode: TransportMode::default(),
            mawb: None,
            hawb: None,
            first_master: None,
            first_house: None,
            flight_no: None,
            manifest_no: None,
            etdw: None,
            etd: None,
            eta: None,
            pieces: None,
            gross_weight: None,
            volume: None,
            chargeable_weight: None,
            first_gross_weight: None,
            first_chargeable_weight: None,
            commodity: None,
            hs_code: None,
            console_id: None,
            inq_replied: false,
            confirmed: false,
            currency: None,
            freight_charge: None,
            handling_charge: None,
            extra_charges: None,
            invoice_deadline: None,
        }
    }

    /// Copies every writable field onto `model`.
    pub fn apply_to(self, model: &mut shipment::Model) {
        model.priority = self.priority;
        model.client_id = self.client_id;
        model.sp_id = self.sp_id;
        model.agent_id = self.agent_id;
        model.carrier_id = self.carrier_id;
        model.shipper_id = self.shipper_id;
        model.consignee_id = self.consignee_id;
        model.hawb_shipper_id = self.hawb_shipper_id;
        model.hawb_consignee_id = self.hawb_consignee_id;
        model.pol_id = self.pol_id;
        model.pod_id = self.pod_id;
        model.term_id = self.term_id;
        model.via = non_blank(self.via);
        model.mode = self.mode;
        model.mawb = non_blank(self.mawb);
        model.hawb = non_blank(self.hawb);
        model.first_master = non_blank(self.first_master);
        model.first_house = non_blank(self.first_house);
        model.flight_no = non_blank(self.flight_no);
        model.manifest_no = non_blank(self.manifest_no);
        model.etdw = self.etdw;
        model.etd = self.etd;
        model.eta = self.eta;
        model.pieces = self.pieces;
        model.gross_weight = self.gross_weight;
        model.volume = self.volume;
        model.chargeable_weight = self.chargeable_weight;
        model.first_gross_weight = self.first_gross_weight;
        model.first_chargeable_weight = self.first_chargeable_weight;
        model.commodity = non_blank(self.commodity);
        model.hs_code = non_blank(self.hs_code);
        model.console_id = self.console_id;
        model.inq_replied = self.inq_replied;
        model.confirmed = self.confirmed;
        model.currency = non_blank(self.currency);
        model.freight_charge = self.freight_charge;
        model.handling_charge = self.handling_charge;
        model.extra_charges = self.extra_charges;
        model.invoice_deadline = self.invoice_deadline;
    }

    /// A fresh, unsaved model carrying this draft and `reference`.
    pub fn into_model(self, reference: String) -> shipment::Model {
        let now = Utc::now();
        let mut model = shipment::Model {
            id: Uuid::new_v4(),
            reference,
            priority: Priority::default(),
            client_id: self.client_id,
            sp_id: None,
            agent_id: None,
            carrier_id: None,
            shipper_id: None,
            consignee_id: None,
            hawb_shipper_id: None,
            hawb_consignee_id: None,
            pol_id: None,
            pod_id: None,
            term_id: None,
            via: None,
            mode: TransportMode::default(),
            mawb: None,
            hawb: None,
            first_master: None,
            first_house: None,
            flight_no: None,
            manifest_no: None,
            etdw: None,
            etd: None,
            eta: None,
            transit_time: None,
            pieces: None,
            gross_weight: None,
            volume: None,
            chargeable_weight: None,
            first_gross_weight: None,
            first_chargeable_weight: None,
            commodity: None,
            hs_code: None,
            console_id: None,
            inq_replied: false,
            confirmed: false,
            confirmed_at: None,
            currency: None,
            freight_charge: None,
            handling_charge: None,
            extra_charges: None,
            total_charges: None,
            invoice_deadline: None,
            created_at: now,
            updated_at: now,
        };
        self.apply_to(&mut model);
        model
    }
}

impl From<&shipment::Model> for ShipmentDraft {
    fn from(model: &shipment::Model) -> Self {
        Self {
            priority: model.priority,
            client_id: model.client_id,
            sp_id: model.sp_id,
            agent_id: model.agent_id,
            carrier_id: model.carrier_id,
            shipper_id: model.shipper_id,
            consignee_id: model.consignee_id,
            hawb_shipper_id: model.hawb_shipper_id,
            hawb_consignee_id: model.hawb_consignee_id,
            pol_id: model.pol_id,
            pod_id: model.pod_id,
            term_id: model.term_id,
            via: model.via.clone(),
            mode: model.mode,
            mawb: model.mawb.clone(),
            hawb: model.hawb.clone(),
            first_master: model.first_master.clone(),
            first_house: model.first_house.clone(),
            flight_no: model.flight_no.clone(),
            manifest_no: model.manifest_no.clone(),
            etdw: model.etdw,
            etd: model.etd,
            eta: model.eta,
            pieces: model.pieces,
            gross_weight: model.gross_weight,
            volume: model.volume,
            chargeable_weight: model.chargeable_weight,
            first_gross_weight: model.first_gross_weight,
            first_chargeable_weight: model.first_chargeable_weight,
            commodity: model.commodity.clone(),
            hs_code: model.hs_code.clone(),
            console_id: model.console_id,
            inq_replied: model.inq_replied,
            confirmed: model.confirmed,
            currency: model.currency.clone(),
            freight_charge: model.freight_charge,
            handling_charge: model.handling_charge,
            extra_charges: model.extra_charges,
            invoice_deadline: model.invoice_deadline,
        }
    }
}

/// Filters accepted by the shipment list.
#[derive(Debug, Clone, Default)]
pub struct ShipmentFilter {
    pub confirmed: Option<bool>,
    pub inq_replied: Option<bool>,
    pub client_id: Option<Uuid>,
    pub carrier_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub console_id: Option<Uuid>,
    pub pol_id: Option<Uuid>,
    pub pod_id: Option<Uuid>,
    pub term_id: Option<Uuid>,
    pub priority: Option<Priority>,
    pub sp_id: Option<Uuid>,
    pub eta_from: Option<NaiveDate>,
    pub eta_to: Option<NaiveDate>,
    pub search: Option<String>,
}

impl ShipmentFilter {
    fn condition(self) -> Condition {
        let mut cond = Condition::all();

        if let Some(v) = self.confirmed {
            cond = cond.add(shipment::Column::Confirmed.eq(v));
        }
        if let Some(v) = self.inq_replied {
            cond = cond.add(shipment::Column::InqReplied.eq(v));
        }
        let id_filters = [
            (shipment::Column::ClientId, self.client_id),
            (shipment::Column::CarrierId, self.carrier_id),
            (shipment::Column::AgentId, self.agent_id),
            (shipment::Column::ConsoleId, self.console_id),
            (shipment::Column::PolId, self.pol_id),
            (shipment::Column::PodId, self.pod_id),
            (shipment::Column::TermId, self.term_id),
            (shipment::Column::SpId, self.sp_id),
        ];
        for (column, value) in id_filters {
            if let Some(id) = value {
                cond = cond.add(column.eq(id));
            }
        }
        if let Some(p) = self.priority {
            cond = cond.add(shipment::Column::Priority.eq(p));
        }
        if let Some(from) = self.eta_from {
            cond = cond.add(shipment::Column::Eta.gte(from));
        }
        if let Some(to) = self.eta_to {
            cond = cond.add(shipment::Column::Eta.lte(to));
        }
        if let Some(term) = non_blank(self.search) {
            cond = cond.add(search_condition(&term));
        }

        cond
    }
}

/// Reference, air waybills, party names and responsible staff username.
fn search_condition(term: &str) -> Condition {
    let matching_parties = party::Entity::find()
        .select_only()
        .column(party::Column::Id)
        .filter(party::Column::Name.contains(term))
        .into_query();
    let matching_staff = staff_user::Entity::find()
        .select_only()
        .column(staff_user::Column::Id)
        .filter(staff_user::Column::Username.contains(term.to_lowercase().as_str()))
        .into_query();

    let mut cond = Condition::any()
        .add(shipment::Column::Reference.contains(term))
        .add(shipment::Column::Mawb.contains(term))
        .add(shipment::Column::Hawb.contains(term))
        .add(shipment::Column::SpId.in_subquery(matching_staff));
    for column in [
        shipment::Column::ClientId,
        shipment::Column::ShipperId,
        shipment::Column::ConsigneeId,
        shipment::Column::HawbShipperId,
        shipment::Column::HawbConsigneeId,
        shipment::Column::CarrierId,
    ] {
        cond = cond.add(column.in_subquery(matching_parties.clone()));
    }
    cond
}

/// Service for managing shipments
#[derive(Clone)]
pub struct ShipmentService {
    db_pool: Arc<DbPool>,
    clock: Arc<dyn Clock>,
    allocator: Arc<ReferenceAllocator>,
}

impl ShipmentService {
    /// Creates a new shipment service instance
    pub fn new(
        db_pool: Arc<DbPool>,
        clock: Arc<dyn Clock>,
        allocator: Arc<ReferenceAllocator>,
    ) -> Self {
        Self {
            db_pool,
            clock,
            allocator,
        }
    }

    /// Save context for `acting_user` stamped with the business clock.
    pub fn context(&self, acting_user: Option<Uuid>) -> SaveContext {
        SaveContext::new(acting_user, self.clock.now_local())
    }

    /// Creates a shipment, allocating a reference unless one is supplied.
    #[instrument(skip(self, draft))]
    pub async fn create(
        &self,
        draft: ShipmentDraft,
        reference: Option<String>,
        ctx: &SaveContext,
    ) -> Result<shipment::Model, ServiceError> {
        let db = &*self.db_pool;
        validate_links(db, &draft).await?;

        let _guard = self.allocator.lock().await;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let reference = match non_blank(reference) {
            Some(explicit) => {
                ensure_reference_unused(&txn, &explicit).await?;
                explicit
            }
            None => {
                self.allocator
                    .allocate(&txn, ctx.now_local.date())
                    .await?
            }
        };

        let saved = insert_model(&txn, draft.into_model(reference), ctx).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(shipment_id = %saved.id, reference = %saved.reference, "shipment created");
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<shipment::Model, ServiceError> {
        find(&*self.db_pool, id).await
    }

    #[instrument(skip(self))]
    pub async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<shipment::Model>, ServiceError> {
        shipment::Entity::find()
            .filter(shipment::Column::Reference.eq(reference.trim()))
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Lists shipments newest first
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: ShipmentFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<shipment::Model>, u64), ServiceError> {
        let paginator = shipment::Entity::find()
            .filter(filter.condition())
            .order_by_desc(shipment::Column::CreatedAt)
            .order_by_desc(shipment::Column::Reference)
            .paginate(&*self.db_pool, per_page);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let shipments = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((shipments, total))
    }

    /// Replaces every writable field. The reference never changes.
    #[instrument(skip(self, draft))]
    pub async fn update(
        &self,
        id: Uuid,
        draft: ShipmentDraft,
        ctx: &SaveContext,
    ) -> Result<shipment::Model, ServiceError> {
        let db = &*self.db_pool;
        let mut model = find(db, id).await?;
        validate_links(db, &draft).await?;

        draft.apply_to(&mut model);
        update_model(db, model, ctx).await
    }

    /// Flips the confirmation flag, stamping the first confirmation.
    #[instrument(skip(self))]
    pub async fn set_confirmation(
        &self,
        id: Uuid,
        confirmed: bool,
        ctx: &SaveContext,
    ) -> Result<shipment::Model, ServiceError> {
        let db = &*self.db_pool;
        let mut model = find(db, id).await?;
        model.confirmed = confirmed;
        update_model(db, model, ctx).await
    }

    /// Deletes a shipment with its charges, comments and operator links.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db_pool.begin().await.map_err(ServiceError::db_error)?;
        find(&txn, id).await?;
        lookups::delete_shipments(&txn, &[id]).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(shipment_id = %id, "shipment deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn operators(&self, id: Uuid) -> Result<Vec<staff_user::Model>, ServiceError> {
        let db = &*self.db_pool;
        find(db, id).await?;

        let ids: Vec<Uuid> = shipment_operator::Entity::find()
            .select_only()
            .column(shipment_operator::Column::StaffUserId)
            .filter(shipment_operator::Column::ShipmentId.eq(id))
            .into_tuple()
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        staff_user::Entity::find()
            .filter(staff_user::Column::Id.is_in(ids))
            .order_by_asc(staff_user::Column::Username)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Replaces the set of staff operating the shipment.
    #[instrument(skip(self))]
    pub async fn set_operators(
        &self,
        id: Uuid,
        staff_user_ids: Vec<Uuid>,
    ) -> Result<Vec<staff_user::Model>, ServiceError> {
        let mut wanted = staff_user_ids;
        wanted.sort();
        wanted.dedup();

        let txn = self.db_pool.begin().await.map_err(ServiceError::db_error)?;
        find(&txn, id).await?;

        let known = staff_user::Entity::find()
            .filter(staff_user::Column::Id.is_in(wanted.iter().copied()))
            .count(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if known != wanted.len() as u64 {
            return Err(ServiceError::ValidationError(
                "staff_user_ids contains unknown staff users".into(),
            ));
        }

        shipment_operator::Entity::delete_many()
            .filter(shipment_operator::Column::ShipmentId.eq(id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if !wanted.is_empty() {
            let rows = wanted
                .iter()
                .map(|staff_user_id| shipment_operator::ActiveModel {
                    shipment_id: Set(id),
                    staff_user_id: Set(*staff_user_id),
                });
            shipment_operator::Entity::insert_many(rows)
                .exec(&txn)
                .await
                .map_err(ServiceError::from_write)?;
        }
        txn.commit().await.map_err(ServiceError::db_error)?;

        self.operators(id).await
    }
}

pub(crate) async fn find<C>(db: &C, id: Uuid) -> Result<shipment::Model, ServiceError>
where
    C: ConnectionTrait,
{
    shipment::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::not_found("Shipment", id))
}

pub(crate) async fn ensure_reference_unused<C>(db: &C, reference: &str) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let taken = shipment::Entity::find()
        .filter(shipment::Column::Reference.eq(reference))
        .count(db)
        .await
        .map_err(ServiceError::db_error)?;
    if taken > 0 {
        return Err(ServiceError::Conflict(format!(
            "reference {reference} is already in use"
        )));
    }
    Ok(())
}

/// Checks every foreign key of `draft` points at a row of the right kind.
pub(crate) async fn validate_links<C>(db: &C, draft: &ShipmentDraft) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    parties::ensure_role(db, draft.client_id, PartyRole::Customer, "client_id").await?;

    let party_links = [
        (draft.shipper_id, PartyRole::Shipper, "shipper_id"),
        (draft.consignee_id, PartyRole::Consignee, "consignee_id"),
        (draft.hawb_shipper_id, PartyRole::Shipper, "hawb_shipper_id"),
        (
            draft.hawb_consignee_id,
            PartyRole::Consignee,
            "hawb_consignee_id",
        ),
        (draft.carrier_id, PartyRole::Carrier, "carrier_id"),
        (draft.agent_id, PartyRole::Agent, "agent_id"),
    ];
    for (id, role, field) in party_links {
        if let Some(id) = id {
            parties::ensure_role(db, id, role, field).await?;
        }
    }

    let lookup_links = [
        (draft.pol_id, LookupKind::Pol, "pol_id"),
        (draft.pod_id, LookupKind::Pod, "pod_id"),
        (draft.term_id, LookupKind::Term, "term_id"),
    ];
    for (id, kind, field) in lookup_links {
        if let Some(id) = id {
            lookups::ensure_kind(db, id, kind, field).await?;
        }
    }

    if let Some(console_id) = draft.console_id {
        let exists = console::Entity::find_by_id(console_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        if exists.is_none() {
            return Err(ServiceError::ValidationError(format!(
                "console_id: console {console_id} does not exist"
            )));
        }
    }
    if let Some(sp_id) = draft.sp_id {
        let exists = staff_user::Entity::find_by_id(sp_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        if exists.is_none() {
            return Err(ServiceError::ValidationError(format!(
                "sp_id: staff user {sp_id} does not exist"
            )));
        }
    }

    Ok(())
}

/// Inserts a new shipment after refreshing its derived fields.
pub(crate) async fn insert_model<C>(
    db: &C,
    mut model: shipment::Model,
    ctx: &SaveContext,
) -> Result<shipment::Model, ServiceError>
where
    C: ConnectionTrait,
{
    apply_derived_fields(&mut model, ctx);
    model
        .into_active_model()
        .reset_all()
        .insert(db)
        .await
        .map_err(ServiceError::from_write)
}

/// Writes an existing shipment back after refreshing its derived fields.
pub(crate) async fn update_model<C>(
    db: &C,
    mut model: shipment::Model,
    ctx: &SaveContext,
) -> Result<shipment::Model, ServiceError>
where
    C: ConnectionTrait,
{
    apply_derived_fields(&mut model, ctx);
    let mut active = model.into_active_model().reset_all();
    // the reference is fixed once assigned
    active.reference = sea_orm::ActiveValue::NotSet;
    active.update(db).await.map_err(ServiceError::from_write)
}
