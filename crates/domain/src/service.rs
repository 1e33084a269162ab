//! Order lifecycle service.
//!
//! Orchestrates the create/update pipeline — validate products remotely,
//! aggregate totals locally, persist atomically — and owns the status
//! rules. Remote validation is a read-only precondition: it runs before the
//! store transaction begins, so a persistence failure needs no compensation
//! against the catalog.

use common::{ClientId, LineItemId, Money, OrderId, ProductId, UserId};
use order_store::{
    NewLineItem, NewOrder, Order, OrderPage, OrderRepository, OrderStatus, OrderUpdate,
    OrderWithItems,
};
use serde::Serialize;

use crate::catalog::{ProductCatalog, ValidatedProduct};
use crate::error::DomainError;
use crate::payments::{PaymentSession, PaymentSessionItem, PaymentSessionRequest, PaymentSessions};
use crate::pricing::{OrderTotals, RequestedItem, price_order};

/// A stored line item with its catalog display name attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedLineItem {
    pub id: LineItemId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
    pub product_name: String,
}

/// A stored order with display-enriched line items.
///
/// Enrichment attaches transient data for the response only; the stored
/// fields are never altered by it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedOrder {
    pub order: Order,
    pub items: Vec<EnrichedLineItem>,
}

/// Service for managing the order lifecycle.
///
/// Holds the order repository, the product catalog client, and the
/// payment-session collaborator by composition; storage connection
/// lifecycle stays inside the repository.
pub struct OrderService<R, C, P> {
    repo: R,
    catalog: C,
    payments: P,
}

impl<R, C, P> OrderService<R, C, P>
where
    R: OrderRepository,
    C: ProductCatalog,
    P: PaymentSessions,
{
    /// Creates a new lifecycle service over its collaborators.
    pub fn new(repo: R, catalog: C, payments: P) -> Self {
        Self {
            repo,
            catalog,
            payments,
        }
    }

    fn distinct_product_ids(items: &[RequestedItem]) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = Vec::with_capacity(items.len());
        for item in items {
            if !ids.contains(&item.product_id) {
                ids.push(item.product_id);
            }
        }
        ids
    }

    /// Validate → aggregate. Runs entirely before any persistence.
    async fn validate_and_price(
        &self,
        items: &[RequestedItem],
    ) -> Result<OrderTotals, DomainError> {
        let product_ids = Self::distinct_product_ids(items);
        let catalog = self.catalog.validate(&product_ids).await?;
        price_order(items, &catalog)
    }

    /// Creates a new order: validates products, computes totals, and writes
    /// the header plus all line items in one transaction.
    ///
    /// Not idempotent under retry — every call mints fresh identifiers.
    #[tracing::instrument(skip(self, items), fields(item_count = items.len()))]
    pub async fn create_order(
        &self,
        user_id: UserId,
        client_id: ClientId,
        items: Vec<RequestedItem>,
    ) -> Result<EnrichedOrder, DomainError> {
        let totals = self.validate_and_price(&items).await?;

        let header = NewOrder {
            user_id,
            client_id,
            total_amount: totals.total_amount,
            total_items: totals.total_items,
            status: OrderStatus::Pending,
            paid: false,
        };
        let new_items = totals
            .items
            .iter()
            .map(|item| NewLineItem {
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect();

        let stored = self.repo.create_order(header, new_items).await?;
        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(
            order_id = %stored.order.id,
            total_cents = stored.order.total_amount.cents(),
            total_items = stored.order.total_items,
            "order created"
        );

        Ok(enrich_from_totals(stored, &totals))
    }

    /// Replaces an order's entire item set, re-validating and re-pricing
    /// every line. Stale prices are never reused.
    #[tracing::instrument(skip(self, items), fields(item_count = items.len()))]
    pub async fn update_order(
        &self,
        order_id: OrderId,
        user_id: UserId,
        client_id: ClientId,
        items: Vec<RequestedItem>,
    ) -> Result<EnrichedOrder, DomainError> {
        let totals = self.validate_and_price(&items).await?;

        let header = OrderUpdate {
            user_id,
            client_id,
            total_amount: totals.total_amount,
            total_items: totals.total_items,
        };
        let new_items = totals
            .items
            .iter()
            .map(|item| NewLineItem {
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect();

        let stored = self.repo.replace_items(order_id, header, new_items).await?;
        metrics::counter!("orders_updated_total").increment(1);
        tracing::info!(order_id = %order_id, "order items replaced");

        Ok(enrich_from_totals(stored, &totals))
    }

    /// Loads an order and attaches current display names.
    ///
    /// The catalog is consulted for names only; persisted prices stay
    /// authoritative.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<EnrichedOrder, DomainError> {
        let stored = self.repo.find_by_id(order_id).await?;

        let product_ids: Vec<ProductId> = {
            let mut ids = Vec::with_capacity(stored.items.len());
            for item in &stored.items {
                if !ids.contains(&item.product_id) {
                    ids.push(item.product_id);
                }
            }
            ids
        };
        let catalog = self.catalog.validate(&product_ids).await?;

        Ok(enrich_from_catalog(stored, &catalog))
    }

    /// Filtered, paginated order listing. No enrichment.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        page: u32,
        page_size: u32,
    ) -> Result<OrderPage, DomainError> {
        Ok(self.repo.find_page(status, page, page_size).await?)
    }

    /// Transitions an order to a new status.
    ///
    /// `Paid` is rejected here: it carries payment side effects (receipt,
    /// charge reference) and is reachable only through
    /// [`confirm_payment`](Self::confirm_payment). Setting the current
    /// status again is an idempotent no-op.
    #[tracing::instrument(skip(self))]
    pub async fn change_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<EnrichedOrder, DomainError> {
        if status == OrderStatus::Paid {
            return Err(DomainError::StatusReserved(status));
        }

        let current = self.get_order(order_id).await?;
        if current.order.status == status {
            return Ok(current);
        }

        let updated = self.repo.update_status(order_id, status).await?;
        tracing::info!(
            order_id = %order_id,
            from = %current.order.status,
            to = %status,
            "order status changed"
        );

        Ok(EnrichedOrder {
            order: updated,
            items: current.items,
        })
    }

    /// Handles an inbound payment-confirmation event.
    ///
    /// There is no synchronous caller to report to; failures propagate to
    /// the event transport's own retry/dead-letter channel. Not naturally
    /// idempotent: a second confirmation for the same order fails on the
    /// receipt uniqueness.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_payment(
        &self,
        order_id: OrderId,
        charge_ref: &str,
        receipt_url: &str,
    ) -> Result<Order, DomainError> {
        let order = self.repo.mark_paid(order_id, charge_ref, receipt_url).await?;
        metrics::counter!("orders_paid_total").increment(1);
        tracing::info!(order_id = %order_id, charge = charge_ref, "order paid");

        Ok(order)
    }

    /// Opens a payment session for an enriched order.
    ///
    /// Kept at the collaborator boundary; the current inbound flow does not
    /// call it.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.order.id))]
    pub async fn create_payment_session(
        &self,
        order: &EnrichedOrder,
    ) -> Result<PaymentSession, DomainError> {
        let request = PaymentSessionRequest {
            order_id: order.order.id,
            currency: "usd".to_string(),
            items: order
                .items
                .iter()
                .map(|item| PaymentSessionItem {
                    name: item.product_name.clone(),
                    price: item.unit_price,
                    quantity: item.quantity,
                })
                .collect(),
        };

        Ok(self.payments.create_session(request).await?)
    }
}

// Enrichment never fails a completed write: a name absent from the lookup
// (a violated validation contract) falls back to an empty string.
fn enrich<F>(stored: OrderWithItems, name_of: F) -> EnrichedOrder
where
    F: Fn(ProductId) -> Option<String>,
{
    let items = stored
        .items
        .into_iter()
        .map(|item| EnrichedLineItem {
            id: item.id,
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            product_name: name_of(item.product_id).unwrap_or_default(),
        })
        .collect();

    EnrichedOrder {
        order: stored.order,
        items,
    }
}

fn enrich_from_totals(stored: OrderWithItems, totals: &OrderTotals) -> EnrichedOrder {
    enrich(stored, |id| {
        totals
            .items
            .iter()
            .find(|p| p.product_id == id)
            .map(|p| p.product_name.clone())
    })
}

fn enrich_from_catalog(stored: OrderWithItems, catalog: &[ValidatedProduct]) -> EnrichedOrder {
    enrich(stored, |id| {
        catalog.iter().find(|p| p.id == id).map(|p| p.name.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogError, InMemoryProductCatalog};
    use crate::payments::InMemoryPaymentSessions;
    use async_trait::async_trait;
    use order_store::InMemoryOrderRepository;

    type TestService = OrderService<
        InMemoryOrderRepository,
        InMemoryProductCatalog,
        InMemoryPaymentSessions,
    >;

    fn setup() -> (TestService, InMemoryOrderRepository, InMemoryProductCatalog) {
        let repo = InMemoryOrderRepository::new();
        let catalog = InMemoryProductCatalog::new();
        catalog.insert(ProductId::new(1), Money::from_dollars(10), "A");
        catalog.insert(ProductId::new(2), Money::from_dollars(5), "B");

        let service = OrderService::new(
            repo.clone(),
            catalog.clone(),
            InMemoryPaymentSessions::new(),
        );
        (service, repo, catalog)
    }

    fn two_lines() -> Vec<RequestedItem> {
        vec![
            RequestedItem {
                product_id: ProductId::new(1),
                quantity: 2,
            },
            RequestedItem {
                product_id: ProductId::new(2),
                quantity: 1,
            },
        ]
    }

    #[tokio::test]
    async fn create_order_computes_totals_from_catalog_prices() {
        let (service, _, _) = setup();

        let order = service
            .create_order(UserId::new(1), ClientId::new(1), two_lines())
            .await
            .unwrap();

        assert_eq!(order.order.total_amount, Money::from_dollars(25));
        assert_eq!(order.order.total_items, 3);
        assert_eq!(order.order.status, OrderStatus::Pending);
        assert!(!order.order.paid);
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].product_name, "A");
        assert_eq!(order.items[1].product_name, "B");
    }

    #[tokio::test]
    async fn create_then_get_returns_the_same_order() {
        let (service, _, _) = setup();

        let created = service
            .create_order(UserId::new(1), ClientId::new(1), two_lines())
            .await
            .unwrap();
        let fetched = service.get_order(created.order.id).await.unwrap();

        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn validation_failure_aborts_before_persistence() {
        let (service, repo, catalog) = setup();
        catalog.set_fail(true);

        let result = service
            .create_order(UserId::new(1), ClientId::new(1), two_lines())
            .await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(repo.order_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_product_aborts_before_persistence() {
        let (service, repo, _) = setup();

        let result = service
            .create_order(
                UserId::new(1),
                ClientId::new(1),
                vec![RequestedItem {
                    product_id: ProductId::new(99),
                    quantity: 1,
                }],
            )
            .await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(repo.order_count().await, 0);
    }

    // Catalog stub that answers with a fixed product list regardless of the
    // request, so the aggregator's own missing-product check is reachable.
    struct FixedCatalog(Vec<ValidatedProduct>);

    #[async_trait]
    impl ProductCatalog for FixedCatalog {
        async fn validate(
            &self,
            _product_ids: &[ProductId],
        ) -> Result<Vec<ValidatedProduct>, CatalogError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn product_missing_from_response_is_a_distinct_fault() {
        let repo = InMemoryOrderRepository::new();
        let catalog = FixedCatalog(vec![ValidatedProduct {
            id: ProductId::new(1),
            price: Money::from_dollars(10),
            name: "A".to_string(),
        }]);
        let service = OrderService::new(repo.clone(), catalog, InMemoryPaymentSessions::new());

        let result = service
            .create_order(UserId::new(1), ClientId::new(1), two_lines())
            .await;

        assert!(matches!(
            result,
            Err(DomainError::ProductNotFound { product_id }) if product_id == ProductId::new(2)
        ));
        assert_eq!(repo.order_count().await, 0);
    }

    #[tokio::test]
    async fn persistence_failure_surfaces_as_generic_fault() {
        let (service, repo, _) = setup();
        repo.set_fail_writes(true).await;

        let result = service
            .create_order(UserId::new(1), ClientId::new(1), two_lines())
            .await;

        assert!(matches!(result, Err(DomainError::Persistence(_))));
        assert_eq!(repo.order_count().await, 0);
    }

    #[tokio::test]
    async fn update_order_fully_replaces_items_and_reprices() {
        let (service, _, catalog) = setup();

        let created = service
            .create_order(UserId::new(1), ClientId::new(1), two_lines())
            .await
            .unwrap();

        // Price change between create and update must be picked up.
        catalog.insert(ProductId::new(2), Money::from_dollars(7), "B");

        let updated = service
            .update_order(
                created.order.id,
                UserId::new(1),
                ClientId::new(1),
                vec![RequestedItem {
                    product_id: ProductId::new(2),
                    quantity: 2,
                }],
            )
            .await
            .unwrap();

        assert_eq!(updated.order.id, created.order.id);
        assert_eq!(updated.items.len(), 1);
        assert_eq!(updated.items[0].product_id, ProductId::new(2));
        assert_eq!(updated.items[0].unit_price, Money::from_dollars(7));
        assert_eq!(updated.order.total_amount, Money::from_dollars(14));
        assert_eq!(updated.order.total_items, 2);

        let fetched = service.get_order(created.order.id).await.unwrap();
        assert_eq!(fetched.items.len(), 1);
        assert!(
            created
                .items
                .iter()
                .all(|old| fetched.items.iter().all(|new| new.id != old.id))
        );
    }

    #[tokio::test]
    async fn update_missing_order_fails_not_found() {
        let (service, _, _) = setup();

        let result = service
            .update_order(
                OrderId::new(),
                UserId::new(1),
                ClientId::new(1),
                two_lines(),
            )
            .await;

        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn get_order_keeps_persisted_prices_but_refreshes_names() {
        let (service, _, catalog) = setup();

        let created = service
            .create_order(UserId::new(1), ClientId::new(1), two_lines())
            .await
            .unwrap();

        catalog.insert(ProductId::new(1), Money::from_dollars(99), "A-renamed");

        let fetched = service.get_order(created.order.id).await.unwrap();

        assert_eq!(fetched.items[0].unit_price, Money::from_dollars(10));
        assert_eq!(fetched.items[0].product_name, "A-renamed");
        assert_eq!(fetched.order.total_amount, Money::from_dollars(25));
    }

    #[tokio::test]
    async fn change_status_same_value_is_a_noop() {
        let (service, _, _) = setup();

        let created = service
            .create_order(UserId::new(1), ClientId::new(1), two_lines())
            .await
            .unwrap();

        let unchanged = service
            .change_status(created.order.id, OrderStatus::Pending)
            .await
            .unwrap();

        assert_eq!(unchanged.order.updated_at, created.order.updated_at);
        assert_eq!(unchanged.order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn change_status_transitions_and_keeps_items() {
        let (service, _, _) = setup();

        let created = service
            .create_order(UserId::new(1), ClientId::new(1), two_lines())
            .await
            .unwrap();

        let delivered = service
            .change_status(created.order.id, OrderStatus::Delivered)
            .await
            .unwrap();

        assert_eq!(delivered.order.status, OrderStatus::Delivered);
        assert_eq!(delivered.items, created.items);
    }

    #[tokio::test]
    async fn change_status_rejects_paid() {
        let (service, repo, _) = setup();

        let created = service
            .create_order(UserId::new(1), ClientId::new(1), two_lines())
            .await
            .unwrap();

        let result = service
            .change_status(created.order.id, OrderStatus::Paid)
            .await;

        assert!(matches!(result, Err(DomainError::StatusReserved(_))));
        let stored = repo.find_by_id(created.order.id).await.unwrap();
        assert_eq!(stored.order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn confirm_payment_marks_paid_and_creates_receipt() {
        let (service, repo, _) = setup();

        let created = service
            .create_order(UserId::new(1), ClientId::new(1), two_lines())
            .await
            .unwrap();

        let paid = service
            .confirm_payment(created.order.id, "ch_99", "https://receipts/99")
            .await
            .unwrap();

        assert_eq!(paid.status, OrderStatus::Paid);
        assert!(paid.paid);
        assert!(paid.paid_at.is_some());
        assert_eq!(paid.stripe_charge_id, "ch_99");

        let receipt = repo.find_receipt(created.order.id).await.unwrap().unwrap();
        assert_eq!(receipt.receipt_url, "https://receipts/99");
    }

    #[tokio::test]
    async fn confirm_payment_missing_order_fails_not_found() {
        let (service, _, _) = setup();

        let result = service
            .confirm_payment(OrderId::new(), "ch_0", "https://x")
            .await;

        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn list_orders_pages_through_pending() {
        let (service, _, _) = setup();

        for _ in 0..25 {
            service
                .create_order(UserId::new(1), ClientId::new(1), two_lines())
                .await
                .unwrap();
        }

        let page = service
            .list_orders(Some(OrderStatus::Pending), 2, 10)
            .await
            .unwrap();

        assert_eq!(page.orders.len(), 10);
        assert_eq!(page.total, 25);
        assert_eq!(page.page, 2);
        assert_eq!(page.last_page, 3);
    }

    #[tokio::test]
    async fn duplicate_product_ids_validate_once() {
        let (service, _, catalog) = setup();

        service
            .create_order(
                UserId::new(1),
                ClientId::new(1),
                vec![
                    RequestedItem {
                        product_id: ProductId::new(1),
                        quantity: 1,
                    },
                    RequestedItem {
                        product_id: ProductId::new(1),
                        quantity: 2,
                    },
                ],
            )
            .await
            .unwrap();

        // One batch call for the whole request, duplicates collapsed.
        assert_eq!(catalog.call_count(), 1);
    }

    #[tokio::test]
    async fn payment_session_covers_every_line() {
        let (service, _, _) = setup();

        let created = service
            .create_order(UserId::new(1), ClientId::new(1), two_lines())
            .await
            .unwrap();

        let session = service.create_payment_session(&created).await.unwrap();
        assert_eq!(session.session_id, "SES-0001");
    }
}
