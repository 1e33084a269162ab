//! Persisted order model.

use chrono::{DateTime, Utc};
use common::{ClientId, LineItemId, Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The status of an order in its lifecycle.
///
/// `Paid` is reached only through the payment-confirmation path; the general
/// status-change operation never sets it (that rule lives in the lifecycle
/// service, the store itself accepts any transition).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order accepted, awaiting payment or fulfilment.
    #[default]
    Pending,

    /// Order handed over to the customer.
    Delivered,

    /// Order cancelled.
    Cancelled,

    /// Payment confirmed by the payment service.
    Paid,
}

impl OrderStatus {
    /// Returns the wire/storage form of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Paid => "PAID",
        }
    }

    /// Parses the storage form back into a status.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(OrderStatus::Pending),
            "DELIVERED" => Some(OrderStatus::Delivered),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            "PAID" => Some(OrderStatus::Paid),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order header as stored.
///
/// Invariant after every successful write: `total_amount` equals the sum of
/// `unit_price * quantity` over the order's current line items, and
/// `total_items` equals the sum of their quantities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub client_id: ClientId,
    pub total_amount: Money,
    pub total_items: u32,
    pub status: OrderStatus,
    pub paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    /// Opaque external charge reference. Minted at creation, overwritten by
    /// the payment-confirmation path.
    pub stripe_charge_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product+quantity+price entry owned by exactly one order.
///
/// The price is snapshotted at order-write time and never re-read from the
/// catalog afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// An order header together with its full line item set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<LineItem>,
}

/// Payment receipt, the one-to-one child of a paid order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: Uuid,
    pub order_id: OrderId,
    pub receipt_url: String,
    pub updated_at: DateTime<Utc>,
}

/// Header fields for a new order. Identifiers and timestamps are minted by
/// the repository.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub client_id: ClientId,
    pub total_amount: Money,
    pub total_items: u32,
    pub status: OrderStatus,
    pub paid: bool,
}

/// A line item to be written; the repository assigns its id.
#[derive(Debug, Clone)]
pub struct NewLineItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// Header fields replaced together with the line items on update.
#[derive(Debug, Clone)]
pub struct OrderUpdate {
    pub user_id: UserId,
    pub client_id: ClientId,
    pub total_amount: Money,
    pub total_items: u32,
}

/// One page of a filtered order listing. Entries are headers only.
#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: u64,
    pub page: u32,
    pub last_page: u32,
}

/// `ceil(total / page_size)` for 1-indexed pagination.
pub(crate) fn last_page(total: u64, page_size: u32) -> u32 {
    total.div_ceil(u64::from(page_size)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrips_through_storage_form() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Paid,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("SHIPPED"), None);
    }

    #[test]
    fn status_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Pending).unwrap(),
            "\"PENDING\""
        );
        let parsed: OrderStatus = serde_json::from_str("\"PAID\"").unwrap();
        assert_eq!(parsed, OrderStatus::Paid);
    }

    #[test]
    fn default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn last_page_rounds_up() {
        assert_eq!(last_page(0, 10), 0);
        assert_eq!(last_page(1, 10), 1);
        assert_eq!(last_page(10, 10), 1);
        assert_eq!(last_page(25, 10), 3);
    }
}
