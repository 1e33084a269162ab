//! Shared types for the order service.
//!
//! Typed identifiers prevent mixing up the various UUID- and integer-based
//! references that flow between the API, the lifecycle service, and the
//! store. `Money` keeps all amounts in integer cents.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{ClientId, LineItemId, OrderId, ProductId, UserId};
