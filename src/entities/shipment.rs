use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Handling priority shown as a coloured badge in the back office.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
    strum::EnumString,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Priority {
    #[default]
    #[sea_orm(string_value = "green")]
    Green,
    #[sea_orm(string_value = "yellow")]
    Yellow,
    #[sea_orm(string_value = "red")]
    Red,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
    strum::EnumString,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TransportMode {
    #[default]
    #[sea_orm(string_value = "air")]
    Air,
    #[sea_orm(string_value = "sea")]
    Sea,
    #[sea_orm(string_value = "land")]
    Land,
}

/// Shipment entity model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Human-readable `YYMMDDNNN` reference; immutable once assigned.
    #[sea_orm(unique)]
    pub reference: String,
    pub priority: Priority,

    pub client_id: Uuid,
    /// Responsible staff member ("S/P").
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
    /// Days between ETD and ETA; maintained by the service layer.
    pub transit_time: Option<i32>,

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
    /// Local wall-clock time of first confirmation; written once.
    pub confirmed_at: Option<NaiveDateTime>,

    pub currency: Option<String>,
    pub freight_charge: Option<Decimal>,
    pub handling_charge: Option<Decimal>,
    pub extra_charges: Option<Decimal>,
    pub total_charges: Option<Decimal>,
    pub invoice_deadline: Option<NaiveDate>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::party::Entity",
        from = "Column::ClientId",
        to = "super::party::Column::Id"
    )]
    Client,
    #[sea_orm(
        belongs_to = "super::staff_user::Entity",
        from = "Column::SpId",
        to = "super::staff_user::Column::Id",
        on_delete = "SetNull"
    )]
    ResponsibleStaff,
    #[sea_orm(
        belongs_to = "super::console::Entity",
        from = "Column::ConsoleId",
        to = "super::console::Column::Id",
        on_delete = "SetNull"
    )]
    Console,
    #[sea_orm(has_many = "super::charge::Entity")]
    Charges,
    #[sea_orm(has_many = "super::shipment_comment::Entity")]
    Comments,
}

impl Related<super::console::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Console.def()
    }
}

impl Related<super::charge::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Charges.def()
    }
}

impl Related<super::shipment_comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();
        if insert {
            active_model.created_at = Set(now);
        }
        active_model.updated_at = Set(now);
        Ok(active_model)
    }
}
