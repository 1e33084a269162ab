//! Payment-session collaborator contract and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{Money, OrderId};
use thiserror::Error;

/// Request to open a payment session for an order.
#[derive(Debug, Clone)]
pub struct PaymentSessionRequest {
    pub order_id: OrderId,
    pub currency: String,
    pub items: Vec<PaymentSessionItem>,
}

/// One order line as presented to the payment provider.
#[derive(Debug, Clone)]
pub struct PaymentSessionItem {
    pub name: String,
    pub price: Money,
    pub quantity: u32,
}

/// Opaque handle to a session created by the payment provider.
#[derive(Debug, Clone)]
pub struct PaymentSession {
    pub session_id: String,
}

/// Error from payment-session calls.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment service error: {0}")]
    Service(String),
}

/// Trait for creating payment sessions with the external payment service.
#[async_trait]
pub trait PaymentSessions: Send + Sync {
    async fn create_session(
        &self,
        request: PaymentSessionRequest,
    ) -> Result<PaymentSession, PaymentError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    sessions: Vec<PaymentSessionRequest>,
    next_id: u32,
    fail: bool,
}

/// In-memory payment-session service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentSessions {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentSessions {
    /// Creates a new in-memory payment-session service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to fail on the next call.
    pub fn set_fail(&self, fail: bool) {
        self.state.write().unwrap().fail = fail;
    }

    /// Returns the number of sessions created.
    pub fn session_count(&self) -> usize {
        self.state.read().unwrap().sessions.len()
    }
}

#[async_trait]
impl PaymentSessions for InMemoryPaymentSessions {
    async fn create_session(
        &self,
        request: PaymentSessionRequest,
    ) -> Result<PaymentSession, PaymentError> {
        let mut state = self.state.write().unwrap();

        if state.fail {
            return Err(PaymentError::Service("session rejected".to_string()));
        }

        state.next_id += 1;
        let session_id = format!("SES-{:04}", state.next_id);
        state.sessions.push(request);

        Ok(PaymentSession { session_id })
    }
}
