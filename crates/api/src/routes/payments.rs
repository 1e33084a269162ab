//! Inbound payment events.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use order_store::OrderRepository;
use serde::Deserialize;

use crate::error::ApiError;
use crate::routes::orders::{AppState, parse_order_id};

/// Payload of the payment-succeeded event.
#[derive(Deserialize)]
pub struct PaymentConfirmedEvent {
    pub order_id: String,
    pub stripe_payment_id: String,
    pub receipt_url: String,
}

/// POST /payments/confirmed — payment-succeeded event from the payment
/// service.
///
/// Event-style: there is no caller waiting on a business response. A non-2xx
/// status hands the event back to the transport for retry or dead-lettering.
#[tracing::instrument(skip(state, event))]
pub async fn confirmed<R: OrderRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Json(event): Json<PaymentConfirmedEvent>,
) -> Result<StatusCode, ApiError> {
    let order_id = parse_order_id(&event.order_id)?;

    match state
        .orders
        .confirm_payment(order_id, &event.stripe_payment_id, &event.receipt_url)
        .await
    {
        Ok(_) => Ok(StatusCode::NO_CONTENT),
        Err(err) => {
            tracing::error!(order_id = %order_id, error = %err, "payment confirmation failed");
            Err(err.into())
        }
    }
}
