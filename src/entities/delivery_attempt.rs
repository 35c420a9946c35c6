use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status recorded by a single delivery attempt.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display, strum::EnumString, utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttemptStatus {
    #[sea_orm(string_value = "assigned")]
    Assigned,
    #[sea_orm(string_value = "out_for_delivery")]
    OutForDelivery,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// The `delivery_attempts` table: the append-only audit trail for delivery
/// status transitions. Rows are never mutated or deleted; attempt numbers
/// are sequential per COD record (UNIQUE(cod_record_id, attempt_number)).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "delivery_attempts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub cod_record_id: Uuid,
    pub attempt_number: i32,
    pub status: AttemptStatus,
    pub recorded_by: Uuid,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::cod_record::Entity",
        from = "Column::CodRecordId",
        to = "super::cod_record::Column::Id"
    )]
    CodRecord,
}

impl Related<super::cod_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CodRecord.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
