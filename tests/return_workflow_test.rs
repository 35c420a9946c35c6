//! End-to-end tests for the return workflow: eligibility, stock
//! restoration, record closure, and the return status lifecycle.

mod common;

use assert_matches::assert_matches;
use common::{order_request, TestApp};
use fulfillment_api::{
    auth::{Actor, Role},
    entities::{
        cod_record::{self, CodDeliveryStatus},
        delivery_attempt::AttemptStatus,
        order::PaymentMethod,
    },
    errors::ServiceError,
    services::orders::OrderResponse,
    services::returns::{CreateReturnItemRequest, CreateReturnRequest},
};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

struct ReturnFixture {
    app: TestApp,
    customer: Actor,
    admin: Actor,
    staff: Actor,
    product_id: Uuid,
    order: OrderResponse,
    record: cod_record::Model,
}

/// Drives a COD order to `out_for_delivery`, the earliest return-eligible
/// state.
async fn fixture(sku: &str) -> ReturnFixture {
    let app = TestApp::new().await;
    let product = app.seed_product(sku, dec!(10.00), 5).await;
    let customer = app.actor(Role::Customer);
    let admin = app.actor(Role::Admin);
    let staff = app.seed_user("Returns Courier", Role::Delivery).await;

    let order = app
        .state
        .services
        .orders
        .create_order(
            customer,
            order_request(product.id, 2, PaymentMethod::CashOnDelivery),
        )
        .await
        .expect("create COD order");

    let record = cod_record::Entity::find()
        .filter(cod_record::Column::OrderId.eq(order.id))
        .one(&*app.state.db)
        .await
        .expect("query cod record")
        .expect("cod record exists");

    app.state
        .services
        .delivery
        .assign_staff(admin, vec![record.id], staff.id)
        .await
        .expect("assign staff");
    app.state
        .services
        .delivery
        .update_delivery_status(staff, record.id, AttemptStatus::OutForDelivery, None)
        .await
        .expect("out for delivery");

    let record = cod_record::Entity::find_by_id(record.id)
        .one(&*app.state.db)
        .await
        .expect("reload record")
        .expect("record exists");

    ReturnFixture {
        app,
        customer,
        admin,
        staff,
        product_id: product.id,
        order,
        record,
    }
}

fn full_return_request(fx: &ReturnFixture) -> CreateReturnRequest {
    CreateReturnRequest {
        cod_record_id: fx.record.id,
        reason: "damaged in transit".to_string(),
        items: vec![CreateReturnItemRequest {
            order_item_id: fx.order.items[0].id,
            quantity: 2,
        }],
    }
}

#[tokio::test]
async fn return_restores_stock_and_closes_the_record() {
    let fx = fixture("RET-HAPPY").await;
    assert_eq!(fx.app.product(fx.product_id).await.stock, 3);

    let ret = fx
        .app
        .state
        .services
        .returns
        .create_return(fx.customer, full_return_request(&fx))
        .await
        .expect("create return");
    assert_eq!(ret.return_fee, dec!(10.00));
    assert_eq!(ret.items.len(), 1);
    assert_eq!(ret.items[0].quantity, 2);

    // Both units go back on the shelf.
    assert_eq!(fx.app.product(fx.product_id).await.stock, 5);

    let record = cod_record::Entity::find_by_id(fx.record.id)
        .one(&*fx.app.state.db)
        .await
        .expect("reload record")
        .expect("record exists");
    assert_eq!(record.delivery_status, CodDeliveryStatus::Returned);

    // The record is closed: neither collection nor further delivery
    // attempts are accepted.
    let err = fx
        .app
        .state
        .services
        .cod
        .record_payment(fx.staff, fx.record.id, fx.order.total_price, None)
        .await
        .expect_err("collection after return must fail");
    assert_matches!(err, ServiceError::RecordClosed(_));

    let err = fx
        .app
        .state
        .services
        .delivery
        .update_delivery_status(fx.staff, fx.record.id, AttemptStatus::Delivered, None)
        .await
        .expect_err("attempt after return must fail");
    assert_matches!(err, ServiceError::RecordClosed(_));
}

#[tokio::test]
async fn return_requires_an_eligible_delivery_state() {
    let app = TestApp::new().await;
    let product = app.seed_product("RET-EARLY", dec!(10.00), 5).await;
    let customer = app.actor(Role::Customer);

    let order = app
        .state
        .services
        .orders
        .create_order(
            customer,
            order_request(product.id, 1, PaymentMethod::CashOnDelivery),
        )
        .await
        .expect("create COD order");
    let record = cod_record::Entity::find()
        .filter(cod_record::Column::OrderId.eq(order.id))
        .one(&*app.state.db)
        .await
        .expect("query cod record")
        .expect("cod record exists");

    // Still pending assignment; nothing left the warehouse yet.
    let err = app
        .state
        .services
        .returns
        .create_return(
            customer,
            CreateReturnRequest {
                cod_record_id: record.id,
                reason: "changed my mind".to_string(),
                items: vec![CreateReturnItemRequest {
                    order_item_id: order.items[0].id,
                    quantity: 1,
                }],
            },
        )
        .await
        .expect_err("return before dispatch must fail");
    assert_matches!(err, ServiceError::InvalidReturnState(_));
}

#[tokio::test]
async fn empty_and_excessive_returns_are_rejected() {
    let fx = fixture("RET-ITEMS").await;

    let err = fx
        .app
        .state
        .services
        .returns
        .create_return(
            fx.customer,
            CreateReturnRequest {
                cod_record_id: fx.record.id,
                reason: "no items".to_string(),
                items: vec![],
            },
        )
        .await
        .expect_err("empty return must fail");
    assert_matches!(err, ServiceError::EmptyReturn);

    let err = fx
        .app
        .state
        .services
        .returns
        .create_return(
            fx.customer,
            CreateReturnRequest {
                cod_record_id: fx.record.id,
                reason: "too many".to_string(),
                items: vec![CreateReturnItemRequest {
                    order_item_id: fx.order.items[0].id,
                    quantity: 3,
                }],
            },
        )
        .await
        .expect_err("over-quantity return must fail");
    assert_matches!(err, ServiceError::ValidationError(_));

    // A failed attempt must not have touched stock or the record.
    assert_eq!(fx.app.product(fx.product_id).await.stock, 3);
    let record = cod_record::Entity::find_by_id(fx.record.id)
        .one(&*fx.app.state.db)
        .await
        .expect("reload record")
        .expect("record exists");
    assert_eq!(record.delivery_status, CodDeliveryStatus::OutForDelivery);
}

#[tokio::test]
async fn duplicate_return_items_cannot_over_restore_stock() {
    let fx = fixture("RET-DUP").await;
    assert_eq!(fx.app.product(fx.product_id).await.stock, 3);

    // The same order item listed twice would sum past the ordered quantity
    // if each entry were validated on its own.
    let err = fx
        .app
        .state
        .services
        .returns
        .create_return(
            fx.customer,
            CreateReturnRequest {
                cod_record_id: fx.record.id,
                reason: "listed twice".to_string(),
                items: vec![
                    CreateReturnItemRequest {
                        order_item_id: fx.order.items[0].id,
                        quantity: 2,
                    },
                    CreateReturnItemRequest {
                        order_item_id: fx.order.items[0].id,
                        quantity: 2,
                    },
                ],
            },
        )
        .await
        .expect_err("duplicate item entries must fail");
    assert_matches!(err, ServiceError::ValidationError(_));

    assert_eq!(fx.app.product(fx.product_id).await.stock, 3);
    let record = cod_record::Entity::find_by_id(fx.record.id)
        .one(&*fx.app.state.db)
        .await
        .expect("reload record")
        .expect("record exists");
    assert_eq!(record.delivery_status, CodDeliveryStatus::OutForDelivery);
}

#[tokio::test]
async fn strangers_cannot_open_returns() {
    let fx = fixture("RET-SCOPE").await;
    let stranger = fx.app.actor(Role::Customer);

    let err = fx
        .app
        .state
        .services
        .returns
        .create_return(
            stranger,
            CreateReturnRequest {
                cod_record_id: fx.record.id,
                reason: "not mine".to_string(),
                items: vec![CreateReturnItemRequest {
                    order_item_id: fx.order.items[0].id,
                    quantity: 1,
                }],
            },
        )
        .await
        .expect_err("foreign return must fail");
    // Existence is not leaked to strangers.
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn return_status_lifecycle_terminates_at_completed() {
    let fx = fixture("RET-LIFE").await;
    let ret = fx
        .app
        .state
        .services
        .returns
        .create_return(fx.customer, full_return_request(&fx))
        .await
        .expect("create return");

    // Only admins move returns along.
    let err = fx
        .app
        .state
        .services
        .returns
        .approve_return(fx.staff, ret.id)
        .await
        .expect_err("non-admin approval must fail");
    assert_matches!(err, ServiceError::Forbidden(_));

    let approved = fx
        .app
        .state
        .services
        .returns
        .approve_return(fx.admin, ret.id)
        .await
        .expect("approve return");
    assert_eq!(
        approved.status,
        fulfillment_api::entities::return_entity::ReturnStatus::Approved
    );

    // Approving twice is a conflict.
    let err = fx
        .app
        .state
        .services
        .returns
        .approve_return(fx.admin, ret.id)
        .await
        .expect_err("double approval must fail");
    assert_matches!(err, ServiceError::InvalidReturnState(_));

    let completed = fx
        .app
        .state
        .services
        .returns
        .complete_return(fx.admin, ret.id)
        .await
        .expect("complete return");
    assert_eq!(
        completed.status,
        fulfillment_api::entities::return_entity::ReturnStatus::Completed
    );

    // Completed is terminal for every mutation.
    let err = fx
        .app
        .state
        .services
        .returns
        .complete_return(fx.admin, ret.id)
        .await
        .expect_err("double completion must fail");
    assert_matches!(err, ServiceError::AlreadyCompleted(_));
    let err = fx
        .app
        .state
        .services
        .returns
        .approve_return(fx.admin, ret.id)
        .await
        .expect_err("approval after completion must fail");
    assert_matches!(err, ServiceError::AlreadyCompleted(_));
}

#[tokio::test]
async fn pending_returns_may_complete_directly() {
    let fx = fixture("RET-DIRECT").await;
    let ret = fx
        .app
        .state
        .services
        .returns
        .create_return(fx.customer, full_return_request(&fx))
        .await
        .expect("create return");

    let completed = fx
        .app
        .state
        .services
        .returns
        .complete_return(fx.admin, ret.id)
        .await
        .expect("complete pending return");
    assert_eq!(
        completed.status,
        fulfillment_api::entities::return_entity::ReturnStatus::Completed
    );
}

#[tokio::test]
async fn requester_and_staff_can_read_the_return() {
    let fx = fixture("RET-READ").await;
    let ret = fx
        .app
        .state
        .services
        .returns
        .create_return(fx.customer, full_return_request(&fx))
        .await
        .expect("create return");

    let seen = fx
        .app
        .state
        .services
        .returns
        .get_return(fx.customer, ret.id)
        .await
        .expect("requester read");
    assert_eq!(seen.id, ret.id);

    let seen = fx
        .app
        .state
        .services
        .returns
        .get_return(fx.staff, ret.id)
        .await
        .expect("staff read");
    assert_eq!(seen.id, ret.id);

    let err = fx
        .app
        .state
        .services
        .returns
        .get_return(fx.app.actor(Role::Customer), ret.id)
        .await
        .expect_err("stranger read must fail");
    assert_matches!(err, ServiceError::NotFound(_));

    let (returns, total) = fx
        .app
        .state
        .services
        .returns
        .list_returns(fx.admin, 1, 20)
        .await
        .expect("list returns");
    assert_eq!(total, 1);
    assert_eq!(returns.len(), 1);
}
