//! Order request endpoints.
//!
//! Thin adapters: shape checks happen here, everything else is delegated to
//! the lifecycle service.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{ClientId, OrderId, ProductId, UserId};
use domain::{
    EnrichedOrder, InMemoryPaymentSessions, OrderService, ProductCatalog, RequestedItem,
};
use order_store::{Order, OrderPage, OrderRepository, OrderStatus};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<R: OrderRepository> {
    pub orders: OrderService<R, Arc<dyn ProductCatalog>, InMemoryPaymentSessions>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub product_id: i64,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: i64,
    pub client_id: i64,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Deserialize)]
pub struct UpdateOrderRequest {
    pub user_id: i64,
    pub client_id: i64,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Deserialize)]
pub struct ChangeStatusRequest {
    pub status: OrderStatus,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    10
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<OrderStatus>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct LineItemResponse {
    pub id: String,
    pub product_id: i64,
    pub quantity: u32,
    pub unit_price_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: i64,
    pub client_id: i64,
    pub total_amount_cents: i64,
    pub total_items: u32,
    pub status: String,
    pub paid: bool,
    pub paid_at: Option<String>,
    pub stripe_charge_id: String,
    pub created_at: String,
    pub updated_at: String,
    pub items: Vec<LineItemResponse>,
}

#[derive(Serialize)]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub last_page: u32,
}

#[derive(Serialize)]
pub struct OrderPageResponse {
    pub data: Vec<OrderResponse>,
    pub meta: PageMeta,
}

impl OrderResponse {
    fn from_header(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            user_id: order.user_id.get(),
            client_id: order.client_id.get(),
            total_amount_cents: order.total_amount.cents(),
            total_items: order.total_items,
            status: order.status.to_string(),
            paid: order.paid,
            paid_at: order.paid_at.map(|t| t.to_rfc3339()),
            stripe_charge_id: order.stripe_charge_id,
            created_at: order.created_at.to_rfc3339(),
            updated_at: order.updated_at.to_rfc3339(),
            items: Vec::new(),
        }
    }

    fn from_enriched(order: EnrichedOrder) -> Self {
        let items = order
            .items
            .into_iter()
            .map(|item| LineItemResponse {
                id: item.id.to_string(),
                product_id: item.product_id.get(),
                quantity: item.quantity,
                unit_price_cents: item.unit_price.cents(),
                name: Some(item.product_name),
            })
            .collect();

        Self {
            items,
            ..Self::from_header(order.order)
        }
    }
}

fn page_response(page: OrderPage) -> OrderPageResponse {
    OrderPageResponse {
        data: page
            .orders
            .into_iter()
            .map(OrderResponse::from_header)
            .collect(),
        meta: PageMeta {
            total: page.total,
            page: page.page,
            last_page: page.last_page,
        },
    }
}

// -- Shape checks (the payload boundary, not domain validation) --

pub(crate) fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order id: {e}")))?;
    Ok(OrderId::from(uuid))
}

fn parse_items(items: Vec<OrderItemRequest>) -> Result<Vec<RequestedItem>, ApiError> {
    if items.is_empty() {
        return Err(ApiError::BadRequest(
            "order must contain at least one item".to_string(),
        ));
    }

    items
        .into_iter()
        .map(|item| {
            if item.product_id <= 0 {
                return Err(ApiError::BadRequest(format!(
                    "product_id must be positive, got {}",
                    item.product_id
                )));
            }
            if item.quantity == 0 {
                return Err(ApiError::BadRequest(
                    "item quantity must be positive".to_string(),
                ));
            }
            Ok(RequestedItem {
                product_id: ProductId::new(item.product_id),
                quantity: item.quantity,
            })
        })
        .collect()
}

fn parse_page(query: &ListQuery) -> Result<(u32, u32), ApiError> {
    if query.page == 0 || query.page_size == 0 {
        return Err(ApiError::BadRequest(
            "page and page_size must be positive".to_string(),
        ));
    }
    Ok((query.page, query.page_size))
}

// -- Handlers --

/// POST /orders — create a new order.
#[tracing::instrument(skip(state, req))]
pub async fn create<R: OrderRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let items = parse_items(req.items)?;

    let order = state
        .orders
        .create_order(UserId::new(req.user_id), ClientId::new(req.client_id), items)
        .await?;

    Ok((StatusCode::CREATED, Json(OrderResponse::from_enriched(order))))
}

/// GET /orders — filtered, paginated listing.
#[tracing::instrument(skip(state, query))]
pub async fn list<R: OrderRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<OrderPageResponse>, ApiError> {
    let (page, page_size) = parse_page(&query)?;

    let result = state.orders.list_orders(query.status, page, page_size).await?;

    Ok(Json(page_response(result)))
}

/// GET /orders/:id — load an order with display names attached.
#[tracing::instrument(skip(state))]
pub async fn get<R: OrderRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;

    let order = state.orders.get_order(order_id).await?;

    Ok(Json(OrderResponse::from_enriched(order)))
}

/// PUT /orders/:id — replace the order's entire item set.
#[tracing::instrument(skip(state, req))]
pub async fn update<R: OrderRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateOrderRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let items = parse_items(req.items)?;

    let order = state
        .orders
        .update_order(
            order_id,
            UserId::new(req.user_id),
            ClientId::new(req.client_id),
            items,
        )
        .await?;

    Ok(Json(OrderResponse::from_enriched(order)))
}

/// PATCH /orders/:id/status — transition the order status.
#[tracing::instrument(skip(state, req))]
pub async fn change_status<R: OrderRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
    Json(req): Json<ChangeStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;

    let order = state.orders.change_status(order_id, req.status).await?;

    Ok(Json(OrderResponse::from_enriched(order)))
}
