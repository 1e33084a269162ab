//! Durable order state for the order service.
//!
//! This crate owns the persisted shape of an order (header, line items,
//! payment receipt) and the [`OrderRepository`] contract: every multi-row
//! write happens inside a single transaction, so an order's line items are
//! either fully visible or fully absent, never partial.

pub mod error;
pub mod memory;
pub mod order;
pub mod postgres;
pub mod repository;

pub use error::{Result, StoreError};
pub use memory::InMemoryOrderRepository;
pub use order::{
    LineItem, NewLineItem, NewOrder, Order, OrderPage, OrderStatus, OrderUpdate, OrderWithItems,
    Receipt,
};
pub use postgres::PostgresOrderRepository;
pub use repository::OrderRepository;
