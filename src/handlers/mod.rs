//! HTTP handlers for the `/api/v1` surface.
//!
//! Handlers are thin: deserialize, hand the [`Actor`](crate::auth::Actor)
//! and payload to the owning service, and wrap the result in the response
//! envelope. All authorization decisions live in the services.

pub mod cod;
pub mod orders;
pub mod returns;

use std::sync::Arc;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    cod::CodLedgerService, delivery::DeliveryService, orders::OrderService,
    orders::PricingPolicy, returns::ReturnService,
};

/// Container for the service layer, shared via [`AppState`](crate::AppState).
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub cod: Arc<CodLedgerService>,
    pub delivery: Arc<DeliveryService>,
    pub returns: Arc<ReturnService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: EventSender,
        config: &crate::config::AppConfig,
    ) -> Self {
        let pricing = PricingPolicy {
            tax_rate: config.tax_rate,
            shipping_flat_rate: config.shipping_flat_rate,
        };
        Self {
            orders: Arc::new(OrderService::new(
                db_pool.clone(),
                event_sender.clone(),
                pricing,
            )),
            cod: Arc::new(CodLedgerService::new(db_pool.clone(), event_sender.clone())),
            delivery: Arc::new(DeliveryService::new(db_pool.clone(), event_sender.clone())),
            returns: Arc::new(ReturnService::new(
                db_pool,
                event_sender,
                config.return_fee_amount,
            )),
        }
    }
}
