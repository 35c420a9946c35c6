use crate::{
    auth::{Actor, Role},
    db::DbPool,
    entities::{
        cod_record::{self, CodDeliveryStatus, Entity as CodRecordEntity},
        order_item::{self, Entity as OrderItemEntity},
        product::{self, Entity as ProductEntity},
        return_entity::{self, Entity as ReturnEntity, ReturnStatus},
        return_item::{self, Entity as ReturnItemEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::orders::unwrap_txn_err,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateReturnItemRequest {
    pub order_item_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReturnRequest {
    pub cod_record_id: Uuid,
    pub reason: String,
    pub items: Vec<CreateReturnItemRequest>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReturnItemResponse {
    pub order_item_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReturnResponse {
    pub id: Uuid,
    pub cod_record_id: Uuid,
    pub reason: String,
    pub return_fee: Decimal,
    pub status: ReturnStatus,
    pub requested_by: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub items: Vec<ReturnItemResponse>,
}

impl ReturnResponse {
    fn from_models(ret: return_entity::Model, items: Vec<return_item::Model>) -> Self {
        Self {
            id: ret.id,
            cod_record_id: ret.cod_record_id,
            reason: ret.reason,
            return_fee: ret.return_fee,
            status: ret.status,
            requested_by: ret.requested_by,
            created_at: ret.created_at,
            items: items
                .into_iter()
                .map(|item| ReturnItemResponse {
                    order_item_id: item.order_item_id,
                    quantity: item.quantity,
                })
                .collect(),
        }
    }
}

/// Handles post-delivery returns: opening the return, restoring stock, and
/// closing the COD record.
#[derive(Clone)]
pub struct ReturnService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
    return_fee: Decimal,
}

impl ReturnService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender, return_fee: Decimal) -> Self {
        Self {
            db_pool,
            event_sender,
            return_fee,
        }
    }

    /// Opens a return against a COD record. Allowed for the assigned staff
    /// member, the order owner, or an admin. The record must be out for
    /// delivery or delivered. In one transaction the return is created
    /// `pending` with the configured fee, every returned quantity is added
    /// back to product stock, and the record's delivery status moves to
    /// `returned`, closing it to further workflow mutations.
    #[instrument(skip(self, request), fields(cod_record_id = %request.cod_record_id, actor_id = %actor.id))]
    pub async fn create_return(
        &self,
        actor: Actor,
        request: CreateReturnRequest,
    ) -> Result<ReturnResponse, ServiceError> {
        if request.items.is_empty() {
            return Err(ServiceError::EmptyReturn);
        }
        if let Some(bad) = request.items.iter().find(|item| item.quantity < 1) {
            return Err(ServiceError::ValidationError(format!(
                "return quantity {} for order item {} is invalid",
                bad.quantity, bad.order_item_id
            )));
        }
        // Each order item may appear once; duplicates would let the summed
        // quantity slip past the per-item ceiling and over-restore stock.
        let mut seen = HashSet::with_capacity(request.items.len());
        if let Some(dup) = request
            .items
            .iter()
            .find(|item| !seen.insert(item.order_item_id))
        {
            return Err(ServiceError::ValidationError(format!(
                "order item {} is listed more than once",
                dup.order_item_id
            )));
        }

        let return_fee = self.return_fee;
        let cod_record_id = request.cod_record_id;
        let reason = request.reason.clone();
        let items = request.items.clone();

        let (ret, saved_items) = self
            .db_pool
            .transaction::<_, (return_entity::Model, Vec<return_item::Model>), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let record = CodRecordEntity::find_by_id(cod_record_id)
                            .one(txn)
                            .await?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!(
                                    "COD record {cod_record_id} not found"
                                ))
                            })?;

                        let allowed = match actor.role {
                            Role::Admin => true,
                            Role::Delivery | Role::Employee => {
                                record.assigned_staff_id == Some(actor.id)
                            }
                            Role::Customer => record.customer_id == actor.id,
                        };
                        if !allowed {
                            // Foreign records read as missing.
                            return Err(ServiceError::NotFound(format!(
                                "COD record {cod_record_id} not found"
                            )));
                        }

                        if !record.delivery_status.return_eligible() {
                            return Err(ServiceError::InvalidReturnState(
                                record.delivery_status.to_string(),
                            ));
                        }

                        let order_items = OrderItemEntity::find()
                            .filter(order_item::Column::OrderId.eq(record.order_id))
                            .all(txn)
                            .await?;

                        let now = Utc::now();
                        let return_id = Uuid::new_v4();

                        let ret = return_entity::ActiveModel {
                            id: Set(return_id),
                            cod_record_id: Set(cod_record_id),
                            reason: Set(reason),
                            return_fee: Set(return_fee),
                            status: Set(ReturnStatus::Pending),
                            requested_by: Set(actor.id),
                            created_at: Set(now),
                            updated_at: Set(Some(now)),
                        }
                        .insert(txn)
                        .await?;

                        let mut saved_items = Vec::with_capacity(items.len());
                        for item in &items {
                            let order_item = order_items
                                .iter()
                                .find(|oi| oi.id == item.order_item_id)
                                .ok_or_else(|| {
                                    ServiceError::ValidationError(format!(
                                        "order item {} does not belong to this order",
                                        item.order_item_id
                                    ))
                                })?;

                            if item.quantity > order_item.quantity {
                                return Err(ServiceError::ValidationError(format!(
                                    "cannot return {} units of order item {}; only {} were ordered",
                                    item.quantity, item.order_item_id, order_item.quantity
                                )));
                            }

                            ProductEntity::update_many()
                                .col_expr(
                                    product::Column::Stock,
                                    Expr::col(product::Column::Stock).add(item.quantity),
                                )
                                .col_expr(product::Column::UpdatedAt, Expr::value(now))
                                .filter(product::Column::Id.eq(order_item.product_id))
                                .exec(txn)
                                .await?;

                            let saved = return_item::ActiveModel {
                                id: Set(Uuid::new_v4()),
                                return_id: Set(return_id),
                                order_item_id: Set(item.order_item_id),
                                quantity: Set(item.quantity),
                            }
                            .insert(txn)
                            .await?;
                            saved_items.push(saved);
                        }

                        let mut active: cod_record::ActiveModel = record.into();
                        active.delivery_status = Set(CodDeliveryStatus::Returned);
                        active.updated_at = Set(Some(now));
                        active.update(txn).await?;

                        Ok((ret, saved_items))
                    })
                },
            )
            .await
            .map_err(unwrap_txn_err)?;

        info!(
            return_id = %ret.id,
            cod_record_id = %cod_record_id,
            fee = %ret.return_fee,
            "Return opened"
        );

        self.event_sender
            .send_or_log(Event::ReturnOpened {
                return_id: ret.id,
                cod_record_id,
            })
            .await;

        Ok(ReturnResponse::from_models(ret, saved_items))
    }

    /// Moves a pending return to `approved`. Admin only.
    #[instrument(skip(self), fields(return_id = %return_id, actor_id = %actor.id))]
    pub async fn approve_return(
        &self,
        actor: Actor,
        return_id: Uuid,
    ) -> Result<ReturnResponse, ServiceError> {
        if !actor.role.is_admin() {
            return Err(ServiceError::Forbidden(
                "only admins may approve returns".to_string(),
            ));
        }

        let ret = self
            .set_status(return_id, ReturnStatus::Approved, move |current| match current {
                ReturnStatus::Pending => Ok(()),
                ReturnStatus::Completed => Err(ServiceError::AlreadyCompleted(return_id)),
                other => Err(ServiceError::InvalidReturnState(other.to_string())),
            })
            .await?;

        info!(return_id = %return_id, "Return approved");
        self.event_sender
            .send_or_log(Event::ReturnApproved(return_id))
            .await;

        Ok(ret)
    }

    /// Moves a pending or approved return to `completed`. Terminal: any
    /// later mutation fails `AlreadyCompleted`. Admin only.
    #[instrument(skip(self), fields(return_id = %return_id, actor_id = %actor.id))]
    pub async fn complete_return(
        &self,
        actor: Actor,
        return_id: Uuid,
    ) -> Result<ReturnResponse, ServiceError> {
        if !actor.role.is_admin() {
            return Err(ServiceError::Forbidden(
                "only admins may complete returns".to_string(),
            ));
        }

        let ret = self
            .set_status(return_id, ReturnStatus::Completed, move |current| match current {
                ReturnStatus::Pending | ReturnStatus::Approved => Ok(()),
                ReturnStatus::Completed => Err(ServiceError::AlreadyCompleted(return_id)),
            })
            .await?;

        info!(return_id = %return_id, "Return completed");
        self.event_sender
            .send_or_log(Event::ReturnCompleted(return_id))
            .await;

        Ok(ret)
    }

    async fn set_status(
        &self,
        return_id: Uuid,
        next: ReturnStatus,
        guard: impl Fn(ReturnStatus) -> Result<(), ServiceError> + Send + 'static,
    ) -> Result<ReturnResponse, ServiceError> {
        let ret = self
            .db_pool
            .transaction::<_, return_entity::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let ret = ReturnEntity::find_by_id(return_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Return {return_id} not found"))
                        })?;

                    guard(ret.status)?;

                    let mut active: return_entity::ActiveModel = ret.into();
                    active.status = Set(next);
                    active.updated_at = Set(Some(Utc::now()));
                    Ok(active.update(txn).await?)
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        let items = ret
            .find_related(ReturnItemEntity)
            .all(&*self.db_pool)
            .await?;
        Ok(ReturnResponse::from_models(ret, items))
    }

    /// Fetches a return visible to the actor: staff/admin, or the user who
    /// requested it.
    #[instrument(skip(self), fields(return_id = %return_id, actor_id = %actor.id))]
    pub async fn get_return(
        &self,
        actor: Actor,
        return_id: Uuid,
    ) -> Result<ReturnResponse, ServiceError> {
        let db = &*self.db_pool;
        let ret = ReturnEntity::find_by_id(return_id)
            .one(db)
            .await?
            .filter(|ret| actor.role.is_staff() || ret.requested_by == actor.id)
            .ok_or_else(|| ServiceError::NotFound(format!("Return {return_id} not found")))?;

        let items = ret.find_related(ReturnItemEntity).all(db).await?;
        Ok(ReturnResponse::from_models(ret, items))
    }

    /// Lists returns, newest first. Staff and admins only.
    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn list_returns(
        &self,
        actor: Actor,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<ReturnResponse>, u64), ServiceError> {
        if !actor.role.is_staff() {
            return Err(ServiceError::Forbidden(
                "only staff may list returns".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let paginator = ReturnEntity::find()
            .order_by_desc(return_entity::Column::CreatedAt)
            .paginate(db, limit);
        let total = paginator.num_items().await?;
        let returns = paginator.fetch_page(page.saturating_sub(1)).await?;

        let mut responses = Vec::with_capacity(returns.len());
        for ret in returns {
            let items = ret.find_related(ReturnItemEntity).all(db).await?;
            responses.push(ReturnResponse::from_models(ret, items));
        }

        Ok((responses, total))
    }
}
