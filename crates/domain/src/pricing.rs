//! Pure aggregation of order totals from validated products.
//!
//! No I/O, no clocks, no randomness: the same inputs always produce the
//! same totals. Prices are taken from the catalog response only, never from
//! caller input.

use common::{Money, ProductId};

use crate::catalog::ValidatedProduct;
use crate::error::DomainError;

/// One product+quantity entry as requested by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestedItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A requested item with price and name attached from the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

/// Aggregates computed over one request's line items.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTotals {
    pub total_amount: Money,
    pub total_items: u32,
    pub items: Vec<PricedItem>,
}

/// Computes totals and enriched items for the requested lines.
///
/// Every requested product id must appear in `catalog`; a missing id fails
/// with [`DomainError::ProductNotFound`] — a correctness fault in the
/// validation response, distinct from the remote call failing. Input order
/// is preserved in the returned items.
pub fn price_order(
    requested: &[RequestedItem],
    catalog: &[ValidatedProduct],
) -> Result<OrderTotals, DomainError> {
    let mut items = Vec::with_capacity(requested.len());
    let mut total_amount = Money::zero();
    let mut total_items: u32 = 0;

    for line in requested {
        let product = catalog
            .iter()
            .find(|p| p.id == line.product_id)
            .ok_or(DomainError::ProductNotFound {
                product_id: line.product_id,
            })?;

        total_amount += product.price.multiply(line.quantity);
        total_items += line.quantity;
        items.push(PricedItem {
            product_id: line.product_id,
            product_name: product.name.clone(),
            quantity: line.quantity,
            unit_price: product.price,
        });
    }

    Ok(OrderTotals {
        total_amount,
        total_items,
        items,
    })
}
