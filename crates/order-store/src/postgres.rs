use chrono::{DateTime, Duration, DurationRound, Utc};
use common::{ClientId, LineItemId, Money, OrderId, ProductId, UserId};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use async_trait::async_trait;

use crate::{
    LineItem, NewLineItem, NewOrder, Order, OrderPage, OrderStatus, OrderUpdate, OrderWithItems,
    Receipt, Result, StoreError,
    order::last_page,
    repository::OrderRepository,
};

// Timestamps are truncated to the microsecond precision TIMESTAMPTZ keeps,
// so values returned from a write equal what a later read observes.
fn now_micros() -> DateTime<Utc> {
    let now = Utc::now();
    now.duration_trunc(Duration::microseconds(1)).unwrap_or(now)
}

/// PostgreSQL-backed order repository.
#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    /// Creates a new repository over an already-open connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        let status: String = row.try_get("status")?;
        let status =
            OrderStatus::parse(&status).ok_or_else(|| StoreError::InvalidStatus(status.clone()))?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            client_id: ClientId::new(row.try_get("client_id")?),
            total_amount: Money::from_cents(row.try_get("total_amount")?),
            total_items: row.try_get::<i32, _>("total_items")? as u32,
            status,
            paid: row.try_get("paid")?,
            paid_at: row.try_get("paid_at")?,
            stripe_charge_id: row.try_get("stripe_charge_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_item(row: &PgRow) -> Result<LineItem> {
        Ok(LineItem {
            id: LineItemId::from(row.try_get::<Uuid, _>("id")?),
            product_id: ProductId::new(row.try_get("product_id")?),
            quantity: row.try_get::<i32, _>("quantity")? as u32,
            unit_price: Money::from_cents(row.try_get("price")?),
        })
    }

    async fn load_items(&self, order_id: OrderId) -> Result<Vec<LineItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, quantity, price
            FROM order_items
            WHERE order_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_item).collect()
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn create_order(
        &self,
        order: NewOrder,
        items: Vec<NewLineItem>,
    ) -> Result<OrderWithItems> {
        let id = OrderId::new();
        let now = now_micros();
        let charge_ref = Uuid::new_v4().to_string();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders
                (id, user_id, client_id, total_amount, total_items, status, paid,
                 paid_at, stripe_charge_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NULL, $8, $9, $9)
            "#,
        )
        .bind(id.as_uuid())
        .bind(order.user_id.get())
        .bind(order.client_id.get())
        .bind(order.total_amount.cents())
        .bind(order.total_items as i32)
        .bind(order.status.as_str())
        .bind(order.paid)
        .bind(&charge_ref)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let mut stored_items = Vec::with_capacity(items.len());
        for item in &items {
            let item_id = LineItemId::new();
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, quantity, price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(item_id.as_uuid())
            .bind(id.as_uuid())
            .bind(item.product_id.get())
            .bind(item.quantity as i32)
            .bind(item.unit_price.cents())
            .execute(&mut *tx)
            .await?;

            stored_items.push(LineItem {
                id: item_id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            });
        }

        tx.commit().await?;

        Ok(OrderWithItems {
            order: Order {
                id,
                user_id: order.user_id,
                client_id: order.client_id,
                total_amount: order.total_amount,
                total_items: order.total_items,
                status: order.status,
                paid: order.paid,
                paid_at: None,
                stripe_charge_id: charge_ref,
                created_at: now,
                updated_at: now,
            },
            items: stored_items,
        })
    }

    async fn replace_items(
        &self,
        order_id: OrderId,
        header: OrderUpdate,
        items: Vec<NewLineItem>,
    ) -> Result<OrderWithItems> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound(order_id))?;
        let current = Self::row_to_order(&row)?;

        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        let mut stored_items = Vec::with_capacity(items.len());
        for item in &items {
            let item_id = LineItemId::new();
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, quantity, price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(item_id.as_uuid())
            .bind(order_id.as_uuid())
            .bind(item.product_id.get())
            .bind(item.quantity as i32)
            .bind(item.unit_price.cents())
            .execute(&mut *tx)
            .await?;

            stored_items.push(LineItem {
                id: item_id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            });
        }

        let now = now_micros();
        sqlx::query(
            r#"
            UPDATE orders
            SET user_id = $2, client_id = $3, total_amount = $4, total_items = $5,
                updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(header.user_id.get())
        .bind(header.client_id.get())
        .bind(header.total_amount.cents())
        .bind(header.total_items as i32)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(OrderWithItems {
            order: Order {
                user_id: header.user_id,
                client_id: header.client_id,
                total_amount: header.total_amount,
                total_items: header.total_items,
                updated_at: now,
                ..current
            },
            items: stored_items,
        })
    }

    async fn find_by_id(&self, order_id: OrderId) -> Result<OrderWithItems> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(order_id))?;

        let order = Self::row_to_order(&row)?;
        let items = self.load_items(order_id).await?;

        Ok(OrderWithItems { order, items })
    }

    async fn find_page(
        &self,
        status: Option<OrderStatus>,
        page: u32,
        page_size: u32,
    ) -> Result<OrderPage> {
        let total: i64 = match status {
            Some(s) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE status = $1")
                    .bind(s.as_str())
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM orders")
                    .fetch_one(&self.pool)
                    .await?
            }
        };

        let offset = i64::from(page.saturating_sub(1)) * i64::from(page_size);
        let rows = match status {
            Some(s) => {
                sqlx::query(
                    r#"
                    SELECT * FROM orders
                    WHERE status = $1
                    ORDER BY created_at ASC, id ASC
                    LIMIT $2 OFFSET $3
                    "#,
                )
                .bind(s.as_str())
                .bind(i64::from(page_size))
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT * FROM orders
                    ORDER BY created_at ASC, id ASC
                    LIMIT $1 OFFSET $2
                    "#,
                )
                .bind(i64::from(page_size))
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let orders = rows
            .iter()
            .map(Self::row_to_order)
            .collect::<Result<Vec<_>>>()?;

        Ok(OrderPage {
            orders,
            total: total as u64,
            page,
            last_page: last_page(total as u64, page_size),
        })
    }

    async fn update_status(&self, order_id: OrderId, status: OrderStatus) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound(order_id))?;
        let current = Self::row_to_order(&row)?;

        if current.status == status {
            return Ok(current);
        }

        let now = now_micros();
        sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(order_id.as_uuid())
            .bind(status.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Order {
            status,
            updated_at: now,
            ..current
        })
    }

    async fn mark_paid(
        &self,
        order_id: OrderId,
        charge_ref: &str,
        receipt_url: &str,
    ) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound(order_id))?;
        let current = Self::row_to_order(&row)?;

        let now = now_micros();
        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, paid = TRUE, paid_at = $3, stripe_charge_id = $4,
                updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(OrderStatus::Paid.as_str())
        .bind(now)
        .bind(charge_ref)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO order_receipts (id, order_id, receipt_url, updated_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order_id.as_uuid())
        .bind(receipt_url)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Order {
            status: OrderStatus::Paid,
            paid: true,
            paid_at: Some(now),
            stripe_charge_id: charge_ref.to_string(),
            updated_at: now,
            ..current
        })
    }

    async fn find_receipt(&self, order_id: OrderId) -> Result<Option<Receipt>> {
        let row = sqlx::query(
            "SELECT id, order_id, receipt_url, updated_at FROM order_receipts WHERE order_id = $1",
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Receipt {
                id: row.try_get("id")?,
                order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
                receipt_url: row.try_get("receipt_url")?,
                updated_at: row.try_get("updated_at")?,
            })),
            None => Ok(None),
        }
    }
}
