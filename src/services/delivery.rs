use crate::{
    auth::{Actor, Role},
    db::DbPool,
    entities::{
        cod_record::{self, CodDeliveryStatus, Entity as CodRecordEntity},
        delivery_attempt::{self, AttemptStatus, Entity as DeliveryAttemptEntity},
        user::Entity as UserEntity,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::orders::{mark_delivered, unwrap_txn_err},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct DeliveryAttemptResponse {
    pub id: Uuid,
    pub cod_record_id: Uuid,
    pub attempt_number: i32,
    pub status: AttemptStatus,
    pub recorded_by: Uuid,
    pub notes: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<delivery_attempt::Model> for DeliveryAttemptResponse {
    fn from(model: delivery_attempt::Model) -> Self {
        Self {
            id: model.id,
            cod_record_id: model.cod_record_id,
            attempt_number: model.attempt_number,
            status: model.status,
            recorded_by: model.recorded_by,
            notes: model.notes,
            created_at: model.created_at,
        }
    }
}

/// Appends the next delivery attempt for a COD record.
///
/// The next attempt number is read and inserted within the caller's
/// transaction, so concurrent writers on the same record serialize; the
/// UNIQUE(cod_record_id, attempt_number) index rejects any collision that
/// slips past the transaction isolation level.
pub(crate) async fn append_attempt<C: ConnectionTrait>(
    conn: &C,
    cod_record_id: Uuid,
    status: AttemptStatus,
    recorded_by: Uuid,
    notes: Option<String>,
) -> Result<delivery_attempt::Model, ServiceError> {
    let previous = DeliveryAttemptEntity::find()
        .filter(delivery_attempt::Column::CodRecordId.eq(cod_record_id))
        .order_by_desc(delivery_attempt::Column::AttemptNumber)
        .limit(1)
        .one(conn)
        .await?;

    let next_number = previous.map(|a| a.attempt_number).unwrap_or(0) + 1;

    let attempt = delivery_attempt::ActiveModel {
        id: Set(Uuid::new_v4()),
        cod_record_id: Set(cod_record_id),
        attempt_number: Set(next_number),
        status: Set(status),
        recorded_by: Set(recorded_by),
        notes: Set(notes),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await?;

    Ok(attempt)
}

/// Tracks staff assignment and the delivery attempt audit trail.
#[derive(Clone)]
pub struct DeliveryService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl DeliveryService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Bulk-assigns one delivery staff member to one or more COD records.
    /// Admin only; the whole assignment is one transaction, so a bad record
    /// id or a closed record fails the entire batch.
    #[instrument(skip(self), fields(staff_id = %staff_id, actor_id = %actor.id))]
    pub async fn assign_staff(
        &self,
        actor: Actor,
        cod_record_ids: Vec<Uuid>,
        staff_id: Uuid,
    ) -> Result<Vec<DeliveryAttemptResponse>, ServiceError> {
        if !actor.role.is_admin() {
            return Err(ServiceError::Forbidden(
                "only admins may assign delivery staff".to_string(),
            ));
        }
        if cod_record_ids.is_empty() {
            return Err(ServiceError::ValidationError(
                "at least one COD record id is required".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let staff = UserEntity::find_by_id(staff_id)
            .one(db)
            .await?
            .filter(|user| user.role == Role::Delivery.to_string())
            .ok_or(ServiceError::StaffNotFound(staff_id))?;

        let ids = cod_record_ids.clone();
        let attempts = self
            .db_pool
            .transaction::<_, Vec<delivery_attempt::Model>, ServiceError>(move |txn| {
                Box::pin(async move {
                    let mut attempts = Vec::with_capacity(ids.len());
                    for cod_record_id in ids {
                        let record = CodRecordEntity::find_by_id(cod_record_id)
                            .one(txn)
                            .await?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!(
                                    "COD record {cod_record_id} not found"
                                ))
                            })?;

                        if record.delivery_status.is_closed() {
                            return Err(ServiceError::RecordClosed(cod_record_id));
                        }

                        let mut active: cod_record::ActiveModel = record.into();
                        active.assigned_staff_id = Set(Some(staff_id));
                        active.delivery_status = Set(CodDeliveryStatus::Assigned);
                        active.updated_at = Set(Some(Utc::now()));
                        active.update(txn).await?;

                        let attempt = append_attempt(
                            txn,
                            cod_record_id,
                            AttemptStatus::Assigned,
                            actor.id,
                            None,
                        )
                        .await?;
                        attempts.push(attempt);
                    }
                    Ok(attempts)
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        info!(
            staff_id = %staff.id,
            records = cod_record_ids.len(),
            "Delivery staff assigned"
        );

        for cod_record_id in &cod_record_ids {
            self.event_sender
                .send_or_log(Event::StaffAssigned {
                    cod_record_id: *cod_record_id,
                    staff_id,
                })
                .await;
        }

        Ok(attempts.into_iter().map(Into::into).collect())
    }

    /// Records a delivery status change as a new attempt. Allowed for the
    /// assigned staff member or an admin. A `delivered` attempt also marks
    /// the owning order delivered, inside the same transaction.
    #[instrument(skip(self, notes), fields(cod_record_id = %cod_record_id, status = %new_status, actor_id = %actor.id))]
    pub async fn update_delivery_status(
        &self,
        actor: Actor,
        cod_record_id: Uuid,
        new_status: AttemptStatus,
        notes: Option<String>,
    ) -> Result<DeliveryAttemptResponse, ServiceError> {
        if !matches!(actor.role, Role::Delivery | Role::Admin) {
            return Err(ServiceError::Forbidden(
                "only delivery staff or admins may update delivery status".to_string(),
            ));
        }

        let (attempt, delivered_order_id) = self
            .db_pool
            .transaction::<_, (delivery_attempt::Model, Option<Uuid>), ServiceError>(
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

                        if actor.role == Role::Delivery
                            && record.assigned_staff_id != Some(actor.id)
                        {
                            return Err(ServiceError::NotAssigned(cod_record_id));
                        }

                        if record.delivery_status.is_closed() {
                            return Err(ServiceError::RecordClosed(cod_record_id));
                        }

                        let attempt =
                            append_attempt(txn, cod_record_id, new_status, actor.id, notes)
                                .await?;

                        // A failed attempt is audit-only; the record keeps
                        // its current delivery status.
                        let next_delivery_status = match new_status {
                            AttemptStatus::Assigned => Some(CodDeliveryStatus::Assigned),
                            AttemptStatus::OutForDelivery => {
                                Some(CodDeliveryStatus::OutForDelivery)
                            }
                            AttemptStatus::Delivered => Some(CodDeliveryStatus::Delivered),
                            AttemptStatus::Failed => None,
                        };

                        let order_id = record.order_id;
                        if let Some(status) = next_delivery_status {
                            let mut active: cod_record::ActiveModel = record.into();
                            active.delivery_status = Set(status);
                            active.updated_at = Set(Some(Utc::now()));
                            active.update(txn).await?;
                        }

                        let delivered_order_id = if new_status == AttemptStatus::Delivered {
                            mark_delivered(txn, order_id).await?;
                            Some(order_id)
                        } else {
                            None
                        };

                        Ok((attempt, delivered_order_id))
                    })
                },
            )
            .await
            .map_err(unwrap_txn_err)?;

        info!(
            cod_record_id = %cod_record_id,
            attempt_number = attempt.attempt_number,
            status = %new_status,
            "Delivery status recorded"
        );

        self.event_sender
            .send_or_log(Event::DeliveryStatusChanged {
                cod_record_id,
                attempt_number: attempt.attempt_number,
                status: new_status,
            })
            .await;
        if let Some(order_id) = delivered_order_id {
            self.event_sender
                .send_or_log(Event::OrderDelivered(order_id))
                .await;
        }

        Ok(attempt.into())
    }

    /// Returns the attempt audit trail for a record, ordered by attempt
    /// number. Visible to the assigned staff member or any admin/employee.
    #[instrument(skip(self), fields(cod_record_id = %cod_record_id, actor_id = %actor.id))]
    pub async fn list_attempts(
        &self,
        actor: Actor,
        cod_record_id: Uuid,
    ) -> Result<Vec<DeliveryAttemptResponse>, ServiceError> {
        let db = &*self.db_pool;

        let record = CodRecordEntity::find_by_id(cod_record_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("COD record {cod_record_id} not found"))
            })?;

        let allowed = match actor.role {
            Role::Admin | Role::Employee => true,
            Role::Delivery => record.assigned_staff_id == Some(actor.id),
            Role::Customer => record.customer_id == actor.id,
        };
        if !allowed {
            return Err(ServiceError::NotFound(format!(
                "COD record {cod_record_id} not found"
            )));
        }

        let attempts = DeliveryAttemptEntity::find()
            .filter(delivery_attempt::Column::CodRecordId.eq(cod_record_id))
            .order_by_asc(delivery_attempt::Column::AttemptNumber)
            .all(db)
            .await?;

        Ok(attempts.into_iter().map(Into::into).collect())
    }
}
