//! Domain error types.

use common::{OrderId, ProductId};
use order_store::{OrderStatus, StoreError};
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::payments::PaymentError;

/// Errors surfaced by the order lifecycle service.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Remote product validation failed, timed out, or returned an
    /// incomplete set.
    #[error("product validation failed: {0}")]
    Validation(#[from] CatalogError),

    /// A requested product id is absent from an otherwise successful
    /// validation response.
    #[error("product {product_id} missing from validation response")]
    ProductNotFound { product_id: ProductId },

    /// The referenced order does not exist.
    #[error("order {0} not found")]
    NotFound(OrderId),

    /// The atomic write against the store failed. The cause is carried for
    /// logging; callers see only the generic message.
    #[error("order persistence failed")]
    Persistence(#[source] StoreError),

    /// The status is reachable only through the payment-confirmation path.
    #[error("status {0} cannot be set directly")]
    StatusReserved(OrderStatus),

    /// The payment-session collaborator rejected the request.
    #[error("payment session creation failed: {0}")]
    PaymentSession(#[from] PaymentError),
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => DomainError::NotFound(id),
            other => DomainError::Persistence(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_maps_to_domain_not_found() {
        let id = OrderId::new();
        let err = DomainError::from(StoreError::NotFound(id));
        assert!(matches!(err, DomainError::NotFound(got) if got == id));
    }

    #[test]
    fn other_store_errors_map_to_persistence() {
        let err = DomainError::from(StoreError::InvalidStatus("SHIPPED".to_string()));
        assert!(matches!(err, DomainError::Persistence(_)));
        assert_eq!(err.to_string(), "order persistence failed");
    }
}
