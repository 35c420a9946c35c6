pub mod cod_record;
pub mod delivery_attempt;
pub mod order;
pub mod order_item;
pub mod product;
pub mod return_entity;
pub mod return_item;
pub mod user;
