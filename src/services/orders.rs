use crate::{
    auth::Actor,
    db::DbPool,
    entities::{
        cod_record,
        order::{self, Entity as OrderEntity, OrderStatus, PaymentMethod},
        order_item::{self, Entity as OrderItemEntity},
        product::{self, Entity as ProductEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Pricing parameters applied at order creation. Injected from
/// configuration, never hardcoded.
#[derive(Debug, Clone, Copy)]
pub struct PricingPolicy {
    pub tax_rate: Decimal,
    pub shipping_flat_rate: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ShippingAddress {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub phone: String,
    #[validate(length(min = 1))]
    pub street: String,
    #[validate(length(min = 1))]
    pub city: String,
    pub state: String,
    #[validate(length(min = 1))]
    pub postal_code: String,
    #[validate(length(min = 1))]
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
    pub size: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    pub line_items: Vec<CreateOrderItemRequest>,
    #[validate]
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub special_instructions: Option<String>,
    /// Staff may create an order on a customer's behalf; ignored for
    /// customer callers.
    pub customer_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub size: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub items_subtotal: Decimal,
    pub shipping_price: Decimal,
    pub tax_price: Decimal,
    pub total_price: Decimal,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

impl OrderResponse {
    fn from_models(order: order::Model, items: Vec<order_item::Model>) -> Self {
        Self {
            id: order.id,
            customer_id: order.customer_id,
            status: order.status,
            payment_method: order.payment_method,
            items_subtotal: order.items_subtotal,
            shipping_price: order.shipping_price,
            tax_price: order.tax_price,
            total_price: order.total_price,
            is_paid: order.is_paid,
            paid_at: order.paid_at,
            is_delivered: order.is_delivered,
            delivered_at: order.delivered_at,
            created_at: order.created_at,
            items: items
                .into_iter()
                .map(|item| OrderItemResponse {
                    id: item.id,
                    product_id: item.product_id,
                    product_name: item.product_name,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    line_total: item.line_total,
                    size: item.size,
                    color: item.color,
                })
                .collect(),
        }
    }
}

/// Computes order money fields from authoritative unit prices.
/// Client-supplied totals are never consulted.
pub fn compute_totals(
    lines: &[(Decimal, i32)],
    policy: &PricingPolicy,
) -> (Decimal, Decimal, Decimal, Decimal) {
    let subtotal: Decimal = lines
        .iter()
        .map(|(unit_price, quantity)| *unit_price * Decimal::from(*quantity))
        .sum();
    let tax = (subtotal * policy.tax_rate).round_dp(2);
    let shipping = policy.shipping_flat_rate;
    let total = subtotal + shipping + tax;
    (subtotal, shipping, tax, total)
}

/// Service owning order creation, totals, and the canonical order status.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
    pricing: PricingPolicy,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender, pricing: PricingPolicy) -> Self {
        Self {
            db_pool,
            event_sender,
            pricing,
        }
    }

    /// Creates a new order in status `pending`, decrementing stock for every
    /// line item inside one transaction. If any line item fails its stock
    /// precondition the whole creation rolls back. Orders paying by COD get
    /// their COD record opened in the same transaction.
    #[instrument(skip(self, request), fields(actor_id = %actor.id))]
    pub async fn create_order(
        &self,
        actor: Actor,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        if request.line_items.is_empty() {
            return Err(ServiceError::InvalidLineItems(
                "order must contain at least one line item".to_string(),
            ));
        }
        if let Some(bad) = request.line_items.iter().find(|item| item.quantity < 1) {
            return Err(ServiceError::InvalidLineItems(format!(
                "quantity {} for product {} is invalid",
                bad.quantity, bad.product_id
            )));
        }

        let customer_id = if actor.role.is_staff() {
            request.customer_id.unwrap_or(actor.id)
        } else {
            actor.id
        };

        let line_items = request.line_items.clone();
        let address = request.shipping_address.clone();
        let payment_method = request.payment_method;
        let special_instructions = request.special_instructions.clone();
        let pricing = self.pricing;

        let (order_model, item_models, cod) = self
            .db_pool
            .transaction::<_, (order::Model, Vec<order_item::Model>, Option<cod_record::Model>), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let now = Utc::now();
                        let order_id = Uuid::new_v4();

                        // Resolve products and apply the stock precondition
                        // before any row is written for this order.
                        let mut priced_lines = Vec::with_capacity(line_items.len());
                        for item in &line_items {
                            let product = ProductEntity::find_by_id(item.product_id)
                                .one(txn)
                                .await?
                                .ok_or_else(|| {
                                    ServiceError::InvalidLineItems(format!(
                                        "unknown product {}",
                                        item.product_id
                                    ))
                                })?;

                            let updated = ProductEntity::update_many()
                                .col_expr(
                                    product::Column::Stock,
                                    Expr::col(product::Column::Stock).sub(item.quantity),
                                )
                                .col_expr(product::Column::UpdatedAt, Expr::value(now))
                                .filter(product::Column::Id.eq(item.product_id))
                                .filter(product::Column::Stock.gte(item.quantity))
                                .exec(txn)
                                .await?;

                            if updated.rows_affected == 0 {
                                return Err(ServiceError::OutOfStock(format!(
                                    "product {} has insufficient stock for quantity {}",
                                    product.name, item.quantity
                                )));
                            }

                            priced_lines.push((product, item.clone()));
                        }

                        let lines: Vec<(Decimal, i32)> = priced_lines
                            .iter()
                            .map(|(product, item)| (product.unit_price, item.quantity))
                            .collect();
                        let (subtotal, shipping, tax, total) = compute_totals(&lines, &pricing);

                        let order_model = order::ActiveModel {
                            id: Set(order_id),
                            customer_id: Set(customer_id),
                            status: Set(OrderStatus::Pending),
                            payment_method: Set(payment_method),
                            items_subtotal: Set(subtotal),
                            shipping_price: Set(shipping),
                            tax_price: Set(tax),
                            total_price: Set(total),
                            ship_name: Set(address.name),
                            ship_phone: Set(address.phone),
                            ship_street: Set(address.street),
                            ship_city: Set(address.city),
                            ship_state: Set(address.state),
                            ship_postal_code: Set(address.postal_code),
                            ship_country: Set(address.country),
                            special_instructions: Set(special_instructions),
                            is_paid: Set(false),
                            paid_at: Set(None),
                            is_delivered: Set(false),
                            delivered_at: Set(None),
                            created_at: Set(now),
                            updated_at: Set(Some(now)),
                            version: Set(1),
                        }
                        .insert(txn)
                        .await?;

                        let mut item_models = Vec::with_capacity(priced_lines.len());
                        for (product, item) in priced_lines {
                            let line_total = product.unit_price * Decimal::from(item.quantity);
                            let saved = order_item::ActiveModel {
                                id: Set(Uuid::new_v4()),
                                order_id: Set(order_id),
                                product_id: Set(product.id),
                                product_name: Set(product.name),
                                quantity: Set(item.quantity),
                                unit_price: Set(product.unit_price),
                                line_total: Set(line_total),
                                size: Set(item.size),
                                color: Set(item.color),
                                created_at: Set(now),
                            }
                            .insert(txn)
                            .await?;
                            item_models.push(saved);
                        }

                        let cod = if payment_method == PaymentMethod::CashOnDelivery {
                            Some(crate::services::cod::open_cod_record(txn, &order_model).await?)
                        } else {
                            None
                        };

                        Ok((order_model, item_models, cod))
                    })
                },
            )
            .await
            .map_err(unwrap_txn_err)?;

        info!(
            order_id = %order_model.id,
            customer_id = %customer_id,
            total = %order_model.total_price,
            "Order created"
        );

        self.event_sender
            .send_or_log(Event::OrderCreated(order_model.id))
            .await;
        if let Some(cod) = &cod {
            self.event_sender
                .send_or_log(Event::CodRecordOpened {
                    cod_record_id: cod.id,
                    order_id: order_model.id,
                })
                .await;
        }

        Ok(OrderResponse::from_models(order_model, item_models))
    }

    /// Retrieves an order visible to the given actor. Existence is never
    /// leaked: a foreign order and a missing order both report `NotFound`.
    #[instrument(skip(self), fields(order_id = %order_id, actor_id = %actor.id))]
    pub async fn get_order(
        &self,
        actor: Actor,
        order_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;

        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .filter(|order| actor.role.is_staff() || order.customer_id == actor.id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;

        let items = order.find_related(OrderItemEntity).all(db).await?;

        Ok(OrderResponse::from_models(order, items))
    }

    /// Lists orders: staff see all, customers see their own.
    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn list_orders(
        &self,
        actor: Actor,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<OrderResponse>, u64), ServiceError> {
        let db = &*self.db_pool;

        let mut query = OrderEntity::find().order_by_desc(order::Column::CreatedAt);
        if !actor.role.is_staff() {
            query = query.filter(order::Column::CustomerId.eq(actor.id));
        }

        let paginator = query.paginate(db, limit);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        let mut responses = Vec::with_capacity(orders.len());
        for order in orders {
            let items = order.find_related(OrderItemEntity).all(db).await?;
            responses.push(OrderResponse::from_models(order, items));
        }

        Ok((responses, total))
    }

    /// Applies a caller-driven status transition, enforcing the closed
    /// transition table. The `delivered` edge is not reachable here.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %new_status, actor_id = %actor.id))]
    pub async fn transition_status(
        &self,
        actor: Actor,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderResponse, ServiceError> {
        let (updated, old_status) = self
            .db_pool
            .transaction::<_, (order::Model, OrderStatus), ServiceError>(move |txn| {
                Box::pin(async move {
                    let order = OrderEntity::find_by_id(order_id)
                        .one(txn)
                        .await?
                        .filter(|order| actor.role.is_staff() || order.customer_id == actor.id)
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Order {order_id} not found"))
                        })?;

                    let old_status = order.status;
                    if !old_status.transition_allowed(new_status, actor.role) {
                        return Err(ServiceError::InvalidTransition {
                            from: old_status.to_string(),
                            to: new_status.to_string(),
                        });
                    }

                    let version = order.version;
                    let mut active: order::ActiveModel = order.into();
                    active.status = Set(new_status);
                    active.updated_at = Set(Some(Utc::now()));
                    active.version = Set(version + 1);

                    let updated = active.update(txn).await?;
                    Ok((updated, old_status))
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        info!(
            order_id = %order_id,
            old_status = %old_status,
            new_status = %new_status,
            "Order status updated"
        );

        let event = if new_status == OrderStatus::Cancelled {
            Event::OrderCancelled(order_id)
        } else {
            Event::OrderStatusChanged {
                order_id,
                old_status: old_status.to_string(),
                new_status: new_status.to_string(),
            }
        };
        self.event_sender.send_or_log(event).await;

        let db = &*self.db_pool;
        let items = updated.find_related(OrderItemEntity).all(db).await?;
        Ok(OrderResponse::from_models(updated, items))
    }
}

/// Sets the paid flag on an order. Reserved for the COD ledger and external
/// payment confirmations; does not change order status.
pub(crate) async fn mark_paid<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<order::Model, ServiceError> {
    let order = OrderEntity::find_by_id(order_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;

    if order.is_paid {
        warn!(order_id = %order_id, "Order already marked paid");
        return Ok(order);
    }

    let version = order.version;
    let mut active: order::ActiveModel = order.into();
    active.is_paid = Set(true);
    active.paid_at = Set(Some(Utc::now()));
    active.updated_at = Set(Some(Utc::now()));
    active.version = Set(version + 1);

    Ok(active.update(conn).await?)
}

/// Sets the delivered flag and transitions the order to `delivered`.
/// Reserved for the delivery workflow tracker.
pub(crate) async fn mark_delivered<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<order::Model, ServiceError> {
    let order = OrderEntity::find_by_id(order_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;

    if order.status == OrderStatus::Cancelled {
        return Err(ServiceError::InvalidTransition {
            from: order.status.to_string(),
            to: OrderStatus::Delivered.to_string(),
        });
    }

    let version = order.version;
    let now = Utc::now();
    let mut active: order::ActiveModel = order.into();
    active.status = Set(OrderStatus::Delivered);
    active.is_delivered = Set(true);
    active.delivered_at = Set(Some(now));
    active.updated_at = Set(Some(now));
    active.version = Set(version + 1);

    Ok(active.update(conn).await?)
}

/// Flattens sea-orm's transaction error wrapper back into `ServiceError`.
pub(crate) fn unwrap_txn_err(err: TransactionError<ServiceError>) -> ServiceError {
    match err {
        TransactionError::Connection(db_err) => {
            error!(error = %db_err, "Transaction connection failure");
            ServiceError::DatabaseError(db_err)
        }
        TransactionError::Transaction(service_err) => service_err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn totals_are_recomputed_from_lines() {
        let policy = PricingPolicy {
            tax_rate: dec!(0.075),
            shipping_flat_rate: dec!(5.00),
        };
        let (subtotal, shipping, tax, total) =
            compute_totals(&[(dec!(10.00), 2)], &policy);
        assert_eq!(subtotal, dec!(20.00));
        assert_eq!(shipping, dec!(5.00));
        assert_eq!(tax, dec!(1.50));
        assert_eq!(total, dec!(26.50));
    }

    #[test]
    fn totals_sum_multiple_lines() {
        let policy = PricingPolicy {
            tax_rate: dec!(0),
            shipping_flat_rate: dec!(0),
        };
        let (subtotal, shipping, tax, total) =
            compute_totals(&[(dec!(3.25), 4), (dec!(1.00), 1)], &policy);
        assert_eq!(subtotal, dec!(14.00));
        assert_eq!(shipping, dec!(0));
        assert_eq!(tax, dec!(0));
        assert_eq!(total, subtotal);
    }

    #[test]
    fn tax_rounds_to_cents() {
        let policy = PricingPolicy {
            tax_rate: dec!(0.1),
            shipping_flat_rate: dec!(0),
        };
        let (_, _, tax, _) = compute_totals(&[(dec!(0.99), 1)], &policy);
        assert_eq!(tax, dec!(0.10));
    }
}
