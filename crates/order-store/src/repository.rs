//! Order repository contract.

use async_trait::async_trait;
use common::OrderId;

use crate::error::Result;
use crate::order::{
    NewLineItem, NewOrder, Order, OrderPage, OrderStatus, OrderUpdate, OrderWithItems, Receipt,
};

/// Durable order state.
///
/// Every operation that touches more than one row runs inside a single
/// transaction: all of its changes become visible together or not at all.
/// No ordering is guaranteed across concurrent calls touching the same
/// order; the last transaction to commit wins.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Writes a new order header and all of its line items together.
    ///
    /// The repository mints the order id, the per-item ids, the external
    /// charge reference, and the created/updated timestamps.
    async fn create_order(&self, order: NewOrder, items: Vec<NewLineItem>)
    -> Result<OrderWithItems>;

    /// Replaces the order's entire line item set and updates the header
    /// fields in the same transaction.
    ///
    /// This is a full replace, not a merge: callers submit the complete
    /// desired item set. Fails with [`StoreError::NotFound`] if the order
    /// does not exist.
    ///
    /// [`StoreError::NotFound`]: crate::StoreError::NotFound
    async fn replace_items(
        &self,
        order_id: OrderId,
        header: OrderUpdate,
        items: Vec<NewLineItem>,
    ) -> Result<OrderWithItems>;

    /// Point lookup of an order together with its line items.
    async fn find_by_id(&self, order_id: OrderId) -> Result<OrderWithItems>;

    /// Filtered, 1-indexed page of order headers.
    ///
    /// The status filter applies before counting and before paging;
    /// `last_page = ceil(total / page_size)`.
    async fn find_page(
        &self,
        status: Option<OrderStatus>,
        page: u32,
        page_size: u32,
    ) -> Result<OrderPage>;

    /// Sets the order status.
    ///
    /// When `status` equals the current status this is a no-op that returns
    /// the order unchanged without issuing a write.
    async fn update_status(&self, order_id: OrderId, status: OrderStatus) -> Result<Order>;

    /// Marks the order paid: sets `status=Paid`, `paid=true`, `paid_at=now`,
    /// stores the charge reference, and creates the associated receipt, all
    /// in one transaction.
    async fn mark_paid(
        &self,
        order_id: OrderId,
        charge_ref: &str,
        receipt_url: &str,
    ) -> Result<Order>;

    /// Fetches the payment receipt for an order, if one exists.
    async fn find_receipt(&self, order_id: OrderId) -> Result<Option<Receipt>>;
}
