use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{LineItemId, OrderId};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    LineItem, NewLineItem, NewOrder, Order, OrderPage, OrderStatus, OrderUpdate, OrderWithItems,
    Receipt, Result, StoreError,
    order::last_page,
    repository::OrderRepository,
};

#[derive(Default)]
struct State {
    // Insertion order doubles as the pagination order.
    orders: Vec<OrderWithItems>,
    receipts: HashMap<OrderId, Receipt>,
    fail_writes: bool,
}

/// In-memory order repository for testing and dev mode.
///
/// Provides the same contract as the PostgreSQL implementation, including
/// all-or-nothing writes.
#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    state: Arc<RwLock<State>>,
}

impl InMemoryOrderRepository {
    /// Creates a new empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures every subsequent write operation to fail, simulating a
    /// storage fault.
    pub async fn set_fail_writes(&self, fail: bool) {
        self.state.write().await.fail_writes = fail;
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

fn storage_fault() -> StoreError {
    StoreError::Database(sqlx::Error::PoolClosed)
}

fn build_items(items: &[NewLineItem]) -> Vec<LineItem> {
    items
        .iter()
        .map(|item| LineItem {
            id: LineItemId::new(),
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
        })
        .collect()
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create_order(
        &self,
        order: NewOrder,
        items: Vec<NewLineItem>,
    ) -> Result<OrderWithItems> {
        let mut state = self.state.write().await;
        if state.fail_writes {
            return Err(storage_fault());
        }

        let now = Utc::now();
        let stored = OrderWithItems {
            order: Order {
                id: OrderId::new(),
                user_id: order.user_id,
                client_id: order.client_id,
                total_amount: order.total_amount,
                total_items: order.total_items,
                status: order.status,
                paid: order.paid,
                paid_at: None,
                stripe_charge_id: Uuid::new_v4().to_string(),
                created_at: now,
                updated_at: now,
            },
            items: build_items(&items),
        };

        state.orders.push(stored.clone());
        Ok(stored)
    }

    async fn replace_items(
        &self,
        order_id: OrderId,
        header: OrderUpdate,
        items: Vec<NewLineItem>,
    ) -> Result<OrderWithItems> {
        let mut state = self.state.write().await;
        if state.fail_writes {
            return Err(storage_fault());
        }

        let stored = state
            .orders
            .iter_mut()
            .find(|o| o.order.id == order_id)
            .ok_or(StoreError::NotFound(order_id))?;

        stored.order.user_id = header.user_id;
        stored.order.client_id = header.client_id;
        stored.order.total_amount = header.total_amount;
        stored.order.total_items = header.total_items;
        stored.order.updated_at = Utc::now();
        stored.items = build_items(&items);

        Ok(stored.clone())
    }

    async fn find_by_id(&self, order_id: OrderId) -> Result<OrderWithItems> {
        let state = self.state.read().await;
        state
            .orders
            .iter()
            .find(|o| o.order.id == order_id)
            .cloned()
            .ok_or(StoreError::NotFound(order_id))
    }

    async fn find_page(
        &self,
        status: Option<OrderStatus>,
        page: u32,
        page_size: u32,
    ) -> Result<OrderPage> {
        let state = self.state.read().await;
        let filtered: Vec<&OrderWithItems> = state
            .orders
            .iter()
            .filter(|o| status.is_none_or(|s| o.order.status == s))
            .collect();

        let total = filtered.len() as u64;
        let start = (page.saturating_sub(1) as usize) * page_size as usize;
        let orders = filtered
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .map(|o| o.order.clone())
            .collect();

        Ok(OrderPage {
            orders,
            total,
            page,
            last_page: last_page(total, page_size),
        })
    }

    async fn update_status(&self, order_id: OrderId, status: OrderStatus) -> Result<Order> {
        let mut state = self.state.write().await;
        if state.fail_writes {
            return Err(storage_fault());
        }

        let stored = state
            .orders
            .iter_mut()
            .find(|o| o.order.id == order_id)
            .ok_or(StoreError::NotFound(order_id))?;

        if stored.order.status == status {
            return Ok(stored.order.clone());
        }

        stored.order.status = status;
        stored.order.updated_at = Utc::now();
        Ok(stored.order.clone())
    }

    async fn mark_paid(
        &self,
        order_id: OrderId,
        charge_ref: &str,
        receipt_url: &str,
    ) -> Result<Order> {
        let mut state = self.state.write().await;
        if state.fail_writes {
            return Err(storage_fault());
        }

        let now = Utc::now();
        let order = {
            let stored = state
                .orders
                .iter_mut()
                .find(|o| o.order.id == order_id)
                .ok_or(StoreError::NotFound(order_id))?;

            stored.order.status = OrderStatus::Paid;
            stored.order.paid = true;
            stored.order.paid_at = Some(now);
            stored.order.stripe_charge_id = charge_ref.to_string();
            stored.order.updated_at = now;
            stored.order.clone()
        };

        state.receipts.insert(
            order_id,
            Receipt {
                id: Uuid::new_v4(),
                order_id,
                receipt_url: receipt_url.to_string(),
                updated_at: now,
            },
        );

        Ok(order)
    }

    async fn find_receipt(&self, order_id: OrderId) -> Result<Option<Receipt>> {
        let state = self.state.read().await;
        Ok(state.receipts.get(&order_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ClientId, Money, ProductId, UserId};

    fn new_order(status: OrderStatus) -> NewOrder {
        NewOrder {
            user_id: UserId::new(1),
            client_id: ClientId::new(1),
            total_amount: Money::from_cents(2500),
            total_items: 3,
            status,
            paid: false,
        }
    }

    fn new_items() -> Vec<NewLineItem> {
        vec![
            NewLineItem {
                product_id: ProductId::new(1),
                quantity: 2,
                unit_price: Money::from_cents(1000),
            },
            NewLineItem {
                product_id: ProductId::new(2),
                quantity: 1,
                unit_price: Money::from_cents(500),
            },
        ]
    }

    #[tokio::test]
    async fn create_and_find_roundtrip() {
        let repo = InMemoryOrderRepository::new();

        let created = repo
            .create_order(new_order(OrderStatus::Pending), new_items())
            .await
            .unwrap();
        let found = repo.find_by_id(created.order.id).await.unwrap();

        assert_eq!(found, created);
        assert_eq!(found.items.len(), 2);
        assert_eq!(found.order.status, OrderStatus::Pending);
        assert!(!found.order.paid);
    }

    #[tokio::test]
    async fn find_missing_order_fails() {
        let repo = InMemoryOrderRepository::new();
        let result = repo.find_by_id(OrderId::new()).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn replace_items_is_a_full_replace() {
        let repo = InMemoryOrderRepository::new();
        let created = repo
            .create_order(new_order(OrderStatus::Pending), new_items())
            .await
            .unwrap();
        let old_item_ids: Vec<LineItemId> = created.items.iter().map(|i| i.id).collect();

        let update = OrderUpdate {
            user_id: UserId::new(2),
            client_id: ClientId::new(2),
            total_amount: Money::from_cents(500),
            total_items: 1,
        };
        let replacement = vec![NewLineItem {
            product_id: ProductId::new(2),
            quantity: 1,
            unit_price: Money::from_cents(500),
        }];

        let updated = repo
            .replace_items(created.order.id, update, replacement)
            .await
            .unwrap();

        assert_eq!(updated.items.len(), 1);
        assert_eq!(updated.items[0].product_id, ProductId::new(2));
        assert!(updated.items.iter().all(|i| !old_item_ids.contains(&i.id)));
        assert_eq!(updated.order.total_amount.cents(), 500);
        assert_eq!(updated.order.user_id, UserId::new(2));
    }

    #[tokio::test]
    async fn replace_items_missing_order_fails() {
        let repo = InMemoryOrderRepository::new();
        let update = OrderUpdate {
            user_id: UserId::new(1),
            client_id: ClientId::new(1),
            total_amount: Money::zero(),
            total_items: 0,
        };
        let result = repo.replace_items(OrderId::new(), update, vec![]).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn update_status_short_circuits_when_unchanged() {
        let repo = InMemoryOrderRepository::new();
        let created = repo
            .create_order(new_order(OrderStatus::Pending), new_items())
            .await
            .unwrap();

        let unchanged = repo
            .update_status(created.order.id, OrderStatus::Pending)
            .await
            .unwrap();
        assert_eq!(unchanged.updated_at, created.order.updated_at);

        let changed = repo
            .update_status(created.order.id, OrderStatus::Delivered)
            .await
            .unwrap();
        assert_eq!(changed.status, OrderStatus::Delivered);
        assert!(changed.updated_at >= created.order.updated_at);
    }

    #[tokio::test]
    async fn mark_paid_flips_flags_and_creates_receipt() {
        let repo = InMemoryOrderRepository::new();
        let created = repo
            .create_order(new_order(OrderStatus::Pending), new_items())
            .await
            .unwrap();

        let paid = repo
            .mark_paid(created.order.id, "ch_123", "https://receipts/1")
            .await
            .unwrap();

        assert_eq!(paid.status, OrderStatus::Paid);
        assert!(paid.paid);
        assert!(paid.paid_at.is_some());
        assert_eq!(paid.stripe_charge_id, "ch_123");

        let receipt = repo.find_receipt(created.order.id).await.unwrap().unwrap();
        assert_eq!(receipt.receipt_url, "https://receipts/1");
    }

    #[tokio::test]
    async fn find_page_filters_before_paging() {
        let repo = InMemoryOrderRepository::new();
        for _ in 0..25 {
            repo.create_order(new_order(OrderStatus::Pending), new_items())
                .await
                .unwrap();
        }
        for _ in 0..5 {
            repo.create_order(new_order(OrderStatus::Cancelled), new_items())
                .await
                .unwrap();
        }

        let page = repo
            .find_page(Some(OrderStatus::Pending), 2, 10)
            .await
            .unwrap();
        assert_eq!(page.orders.len(), 10);
        assert_eq!(page.total, 25);
        assert_eq!(page.page, 2);
        assert_eq!(page.last_page, 3);

        let all = repo.find_page(None, 1, 50).await.unwrap();
        assert_eq!(all.total, 30);
    }

    #[tokio::test]
    async fn failed_write_leaves_no_state() {
        let repo = InMemoryOrderRepository::new();
        repo.set_fail_writes(true).await;

        let result = repo
            .create_order(new_order(OrderStatus::Pending), new_items())
            .await;
        assert!(matches!(result, Err(StoreError::Database(_))));
        assert_eq!(repo.order_count().await, 0);
    }
}
