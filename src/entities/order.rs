use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Role;

/// Enum representing the possible statuses of an order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display, strum::EnumString, utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// Enum representing how the order is paid.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display, utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "prepaid")]
    Prepaid,
    #[sea_orm(string_value = "cash_on_delivery")]
    CashOnDelivery,
}

impl OrderStatus {
    /// Closed transition table for caller-driven status changes.
    ///
    /// The `delivered` edge is reserved for the delivery tracker
    /// (`mark_delivered`) and is never reachable through this guard.
    /// Customer ownership for the cancel edge is checked by the service.
    pub fn transition_allowed(self, next: OrderStatus, role: Role) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Pending, Processing) | (Processing, Shipped) => role.is_staff(),
            (Pending, Cancelled) => true,
            (Processing, Cancelled) => role.is_staff(),
            _ => false,
        }
    }

    /// Statuses past which line items become immutable.
    pub fn items_frozen(self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

/// The `orders` table. Orders are never hard-deleted; cancellation is a
/// status transition.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,

    /// Computed fields. Always recomputed from line items at write time,
    /// never trusted from client input.
    pub items_subtotal: Decimal,
    pub shipping_price: Decimal,
    pub tax_price: Decimal,
    pub total_price: Decimal,

    pub ship_name: String,
    pub ship_phone: String,
    pub ship_street: String,
    pub ship_city: String,
    pub ship_state: String,
    pub ship_postal_code: String,
    pub ship_country: String,

    pub special_instructions: Option<String>,

    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
    #[sea_orm(has_one = "super::cod_record::Entity")]
    CodRecord,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl Related<super::cod_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CodRecord.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
