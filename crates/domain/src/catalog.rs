//! Product validator client.
//!
//! Orders reference products owned by a remote catalog service. Before an
//! order is written, every distinct product id in the request is sent to
//! that service in a single batch; the response carries the authoritative
//! price and display name for each id.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::{Money, ProductId};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One product confirmed by the catalog service. Transient: never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedProduct {
    pub id: ProductId,
    pub price: Money,
    pub name: String,
}

/// Error from product validation calls.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("network error: {0}")]
    Network(String),

    #[error("product validation timed out")]
    Timeout,

    #[error("service error: {0}")]
    Service(String),

    #[error("parse error: {0}")]
    Parse(String),

    /// The response was well-formed but omitted a requested id.
    #[error("validation response missing product {0}")]
    MissingProduct(ProductId),
}

/// Remote confirmation that a set of product ids exist, with their current
/// price and name.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Validates a batch of product ids in one outbound call.
    ///
    /// The returned sequence covers every requested id; an incomplete
    /// response is an error, not a partial success.
    async fn validate(&self, product_ids: &[ProductId])
    -> Result<Vec<ValidatedProduct>, CatalogError>;
}

#[async_trait]
impl<T: ProductCatalog + ?Sized> ProductCatalog for Arc<T> {
    async fn validate(
        &self,
        product_ids: &[ProductId],
    ) -> Result<Vec<ValidatedProduct>, CatalogError> {
        (**self).validate(product_ids).await
    }
}

#[derive(Serialize)]
struct ValidateRequest<'a> {
    product_ids: &'a [ProductId],
}

#[derive(Deserialize)]
struct ProductDto {
    id: i64,
    price_cents: i64,
    name: String,
}

/// HTTP client for the product catalog service.
pub struct HttpProductCatalog {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpProductCatalog {
    /// Creates a new catalog client.
    ///
    /// `base_url` is the catalog service root (e.g.
    /// `http://products-service:8080`); `timeout` bounds each validation
    /// call.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ProductCatalog for HttpProductCatalog {
    async fn validate(
        &self,
        product_ids: &[ProductId],
    ) -> Result<Vec<ValidatedProduct>, CatalogError> {
        let response = self
            .client
            .post(format!("{}/products/validate", self.base_url))
            .timeout(self.timeout)
            .json(&ValidateRequest { product_ids })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CatalogError::Timeout
                } else {
                    CatalogError::Network(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(CatalogError::Service(format!("HTTP {}", response.status())));
        }

        let body: Vec<ProductDto> = response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        let products: Vec<ValidatedProduct> = body
            .into_iter()
            .map(|p| ValidatedProduct {
                id: ProductId::new(p.id),
                price: Money::from_cents(p.price_cents),
                name: p.name,
            })
            .collect();

        for id in product_ids {
            if !products.iter().any(|p| p.id == *id) {
                return Err(CatalogError::MissingProduct(*id));
            }
        }

        Ok(products)
    }
}

#[derive(Debug, Default)]
struct InMemoryCatalogState {
    products: HashMap<ProductId, (Money, String)>,
    call_count: usize,
    fail: bool,
}

/// In-memory product catalog for testing and dev mode.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductCatalog {
    state: Arc<RwLock<InMemoryCatalogState>>,
}

impl InMemoryProductCatalog {
    /// Creates a new empty in-memory catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a product.
    pub fn insert(&self, id: ProductId, price: Money, name: impl Into<String>) {
        self.state
            .write()
            .unwrap()
            .products
            .insert(id, (price, name.into()));
    }

    /// Configures the catalog to fail every validation call.
    pub fn set_fail(&self, fail: bool) {
        self.state.write().unwrap().fail = fail;
    }

    /// Returns how many validation calls were issued.
    pub fn call_count(&self) -> usize {
        self.state.read().unwrap().call_count
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn validate(
        &self,
        product_ids: &[ProductId],
    ) -> Result<Vec<ValidatedProduct>, CatalogError> {
        let mut state = self.state.write().unwrap();
        state.call_count += 1;

        if state.fail {
            return Err(CatalogError::Service("catalog unavailable".to_string()));
        }

        product_ids
            .iter()
            .map(|id| {
                state
                    .products
                    .get(id)
                    .map(|(price, name)| ValidatedProduct {
                        id: *id,
                        price: *price,
                        name: name.clone(),
                    })
                    .ok_or(CatalogError::MissingProduct(*id))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_catalog() -> InMemoryProductCatalog {
        let catalog = InMemoryProductCatalog::new();
        catalog.insert(ProductId::new(1), Money::from_cents(1000), "Widget");
        catalog.insert(ProductId::new(2), Money::from_cents(500), "Gadget");
        catalog
    }

    #[tokio::test]
    async fn validate_returns_products_in_request_order() {
        let catalog = seeded_catalog();
        let ids = [ProductId::new(2), ProductId::new(1)];

        let products = catalog.validate(&ids).await.unwrap();

        assert_eq!(products.len(), 2);
        assert_eq!(products[0].id, ProductId::new(2));
        assert_eq!(products[0].name, "Gadget");
        assert_eq!(products[1].price.cents(), 1000);
    }

    #[tokio::test]
    async fn validate_fails_on_unknown_product() {
        let catalog = seeded_catalog();
        let ids = [ProductId::new(1), ProductId::new(99)];

        let result = catalog.validate(&ids).await;
        assert!(matches!(
            result,
            Err(CatalogError::MissingProduct(id)) if id == ProductId::new(99)
        ));
    }

    #[tokio::test]
    async fn set_fail_simulates_remote_outage() {
        let catalog = seeded_catalog();
        catalog.set_fail(true);

        let result = catalog.validate(&[ProductId::new(1)]).await;
        assert!(matches!(result, Err(CatalogError::Service(_))));
    }

    #[tokio::test]
    async fn call_count_tracks_outbound_batches() {
        let catalog = seeded_catalog();
        assert_eq!(catalog.call_count(), 0);

        catalog.validate(&[ProductId::new(1)]).await.unwrap();
        catalog
            .validate(&[ProductId::new(1), ProductId::new(2)])
            .await
            .unwrap();

        assert_eq!(catalog.call_count(), 2);
    }
}
