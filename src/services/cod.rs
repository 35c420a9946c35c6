use crate::{
    auth::{Actor, Role},
    db::DbPool,
    entities::{
        cod_record::{self, CodDeliveryStatus, CodPaymentStatus, Entity as CodRecordEntity},
        delivery_attempt::AttemptStatus,
        order::{self, Entity as OrderEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::delivery::append_attempt,
    services::orders::{mark_paid, unwrap_txn_err},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct CodRecordResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub payment_status: CodPaymentStatus,
    pub delivery_status: CodDeliveryStatus,
    pub assigned_staff_id: Option<Uuid>,
    pub collected_amount: Option<Decimal>,
}

impl From<cod_record::Model> for CodRecordResponse {
    fn from(model: cod_record::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            customer_id: model.customer_id,
            payment_status: model.payment_status,
            delivery_status: model.delivery_status,
            assigned_staff_id: model.assigned_staff_id,
            collected_amount: model.collected_amount,
        }
    }
}

/// Aggregate COD counts. Derived at read time, never stored.
#[derive(Debug, Serialize, ToSchema)]
pub struct CodStatistics {
    pub total_records: u64,
    pub pending_payment: u64,
    pub collected: u64,
    pub returned: u64,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CodStatisticsFilter {
    /// Restrict counts to records assigned to this staff member.
    pub staff_id: Option<Uuid>,
}

/// Opens the COD record for a freshly created cash-on-delivery order.
/// Runs inside the order-creation transaction.
pub(crate) async fn open_cod_record<C: ConnectionTrait>(
    conn: &C,
    order: &order::Model,
) -> Result<cod_record::Model, ServiceError> {
    let now = Utc::now();
    let record = cod_record::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        customer_id: Set(order.customer_id),
        payment_status: Set(CodPaymentStatus::Pending),
        delivery_status: Set(CodDeliveryStatus::Pending),
        assigned_staff_id: Set(None),
        collected_amount: Set(None),
        created_at: Set(now),
        updated_at: Set(Some(now)),
    }
    .insert(conn)
    .await?;

    Ok(record)
}

/// Ledger for cash-on-delivery payment collection and reconciliation.
#[derive(Clone)]
pub struct CodLedgerService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl CodLedgerService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Records a cash collection against a COD record. The collected amount
    /// must match the order total exactly; a mismatch is reported and leaves
    /// the record untouched. On success the record moves to `collected`, a
    /// delivery attempt is appended, and the order is marked paid, all in
    /// one transaction. Collection happens at most once per record; a
    /// record that is no longer payment-pending is closed to the ledger.
    /// The delivery side stays with the tracker: a `delivered` status
    /// update is still required to close out delivery.
    #[instrument(skip(self, notes), fields(cod_record_id = %cod_record_id, actor_id = %actor.id))]
    pub async fn record_payment(
        &self,
        actor: Actor,
        cod_record_id: Uuid,
        collected_amount: Decimal,
        notes: Option<String>,
    ) -> Result<CodRecordResponse, ServiceError> {
        if !matches!(actor.role, Role::Delivery | Role::Admin) {
            return Err(ServiceError::Forbidden(
                "only delivery staff or admins may record COD payments".to_string(),
            ));
        }

        let (record, order_id, amount) = self
            .db_pool
            .transaction::<_, (cod_record::Model, Uuid, Decimal), ServiceError>(move |txn| {
                Box::pin(async move {
                    let record = CodRecordEntity::find_by_id(cod_record_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "COD record {cod_record_id} not found"
                            ))
                        })?;

                    if actor.role == Role::Delivery
                        && record.assigned_staff_id != Some(actor.id)
                    {
                        return Err(ServiceError::NotAssigned(cod_record_id));
                    }

                    if record.delivery_status.is_closed() {
                        return Err(ServiceError::RecordClosed(cod_record_id));
                    }

                    // Collected is a terminal payment state; the ledger
                    // accepts exactly one collection per record.
                    if record.payment_status != CodPaymentStatus::Pending {
                        return Err(ServiceError::RecordClosed(cod_record_id));
                    }

                    let order = OrderEntity::find_by_id(record.order_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Order {} not found", record.order_id))
                        })?;

                    // Reconciliation: exact match, no tolerance.
                    if collected_amount != order.total_price {
                        return Err(ServiceError::AmountMismatch {
                            collected: collected_amount.to_string(),
                            expected: order.total_price.to_string(),
                        });
                    }

                    append_attempt(
                        txn,
                        record.id,
                        AttemptStatus::Delivered,
                        actor.id,
                        notes.or_else(|| Some("payment collected".to_string())),
                    )
                    .await?;

                    let order_id = order.id;
                    mark_paid(txn, order_id).await?;

                    let mut active: cod_record::ActiveModel = record.into();
                    active.payment_status = Set(CodPaymentStatus::Collected);
                    active.collected_amount = Set(Some(collected_amount));
                    active.updated_at = Set(Some(Utc::now()));
                    let record = active.update(txn).await?;

                    Ok((record, order_id, collected_amount))
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        info!(
            cod_record_id = %record.id,
            order_id = %order_id,
            amount = %amount,
            "COD payment collected"
        );

        self.event_sender
            .send_or_log(Event::PaymentCollected {
                cod_record_id: record.id,
                order_id,
                amount,
            })
            .await;
        self.event_sender.send_or_log(Event::OrderPaid(order_id)).await;

        Ok(record.into())
    }

    /// Fetches a COD record visible to the actor: staff/admin, or the
    /// owning customer.
    #[instrument(skip(self), fields(cod_record_id = %cod_record_id, actor_id = %actor.id))]
    pub async fn get_record(
        &self,
        actor: Actor,
        cod_record_id: Uuid,
    ) -> Result<CodRecordResponse, ServiceError> {
        let db = &*self.db_pool;
        let record = CodRecordEntity::find_by_id(cod_record_id)
            .one(db)
            .await?
            .filter(|record| actor.role.is_staff() || record.customer_id == actor.id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("COD record {cod_record_id} not found"))
            })?;

        Ok(record.into())
    }

    /// Aggregates COD workflow counts. Admin only.
    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn get_statistics(
        &self,
        actor: Actor,
        filter: CodStatisticsFilter,
    ) -> Result<CodStatistics, ServiceError> {
        if !actor.role.is_admin() {
            return Err(ServiceError::Forbidden(
                "only admins may read COD statistics".to_string(),
            ));
        }

        let db = &*self.db_pool;

        let base = || {
            let mut query = CodRecordEntity::find();
            if let Some(staff_id) = filter.staff_id {
                query = query.filter(cod_record::Column::AssignedStaffId.eq(staff_id));
            }
            query
        };

        let total_records = base().count(db).await?;
        let pending_payment = base()
            .filter(cod_record::Column::PaymentStatus.eq(CodPaymentStatus::Pending))
            .count(db)
            .await?;
        let collected = base()
            .filter(cod_record::Column::PaymentStatus.eq(CodPaymentStatus::Collected))
            .count(db)
            .await?;
        let returned = base()
            .filter(cod_record::Column::DeliveryStatus.eq(CodDeliveryStatus::Returned))
            .count(db)
            .await?;

        Ok(CodStatistics {
            total_records,
            pending_payment,
            collected,
            returned,
        })
    }
}
