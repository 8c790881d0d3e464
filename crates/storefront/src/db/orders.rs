//! `PostgreSQL` order repository.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use openme_core::{
    Email, Order, OrderId, OrderLine, OrderStatus, PaymentStatus, ProductId, ShippingAddress,
    UserId, VariantId,
};

use super::{OrderStore, RepositoryError, Transition};

const ORDER_COLUMNS: &str = "id, order_number, user_id, email, shipping_address, subtotal, \
     shipping_cost, tax, total, payment_method, status, payment_status, payment_intent_id, \
     created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    user_id: Option<String>,
    email: String,
    shipping_address: Json<ShippingAddress>,
    subtotal: Decimal,
    shipping_cost: Decimal,
    tax: Decimal,
    total: Decimal,
    payment_method: String,
    status: OrderStatus,
    payment_status: PaymentStatus,
    payment_intent_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    order_id: Uuid,
    product_id: String,
    variant_id: Option<String>,
    product_name: String,
    product_sku: Option<String>,
    product_image: Option<String>,
    variant_name: Option<String>,
    unit_price: Decimal,
    quantity: i32,
}

impl ItemRow {
    fn into_line(self) -> Result<OrderLine, RepositoryError> {
        let quantity = u32::try_from(self.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "negative quantity {} on order {}",
                self.quantity, self.order_id
            ))
        })?;

        Ok(OrderLine {
            product_id: ProductId::new(self.product_id),
            variant_id: self.variant_id.map(VariantId::new),
            product_name: self.product_name,
            product_sku: self.product_sku,
            product_image: self.product_image,
            variant_name: self.variant_name,
            unit_price: self.unit_price,
            quantity,
        })
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderLine>) -> Result<Order, RepositoryError> {
        let email = Email::parse(&self.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Order {
            id: OrderId::from_uuid(self.id),
            order_number: self.order_number,
            user_id: self.user_id.map(UserId::new),
            email,
            shipping: self.shipping_address.0,
            items,
            subtotal: self.subtotal,
            shipping_cost: self.shipping_cost,
            tax: self.tax,
            total: self.total,
            payment_method: self.payment_method,
            status: self.status,
            payment_status: self.payment_status,
            payment_intent_id: self.payment_intent_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Order repository backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Attach items to order rows, preserving row order.
    async fn hydrate(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let item_rows: Vec<ItemRow> = sqlx::query_as(
            r"
            SELECT order_id, product_id, variant_id, product_name, product_sku,
                   product_image, variant_name, unit_price, quantity
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            ",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for row in item_rows {
            let order_id = row.order_id;
            items.entry(order_id).or_default().push(row.into_line()?);
        }

        rows.into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_order(lines)
            })
            .collect()
    }

    async fn fetch_one(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(self.hydrate(row.into_iter().collect()).await?.pop())
    }

    /// Turn the result of a conditional `UPDATE ... RETURNING id` into a
    /// [`Transition`].
    async fn finish_transition(
        &self,
        id: OrderId,
        updated: Option<Uuid>,
    ) -> Result<Transition, RepositoryError> {
        if let Some(updated) = updated {
            let order = self
                .fetch_one(updated)
                .await?
                .ok_or(RepositoryError::NotFound)?;
            return Ok(Transition::Applied(Box::new(order)));
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)")
            .bind(id.as_uuid())
            .fetch_one(&self.pool)
            .await?;

        Ok(if exists {
            Transition::AlreadyApplied
        } else {
            Transition::NotFound
        })
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO orders (
                id, order_number, user_id, email, shipping_address, subtotal,
                shipping_cost, tax, total, payment_method, status, payment_status,
                payment_intent_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ",
        )
        .bind(order.id.as_uuid())
        .bind(&order.order_number)
        .bind(order.user_id.as_ref())
        .bind(&order.email)
        .bind(Json(&order.shipping))
        .bind(order.subtotal)
        .bind(order.shipping_cost)
        .bind(order.tax)
        .bind(order.total)
        .bind(&order.payment_method)
        .bind(order.status)
        .bind(order.payment_status)
        .bind(order.payment_intent_id.as_deref())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("order number already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        for (position, item) in order.items.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| RepositoryError::Conflict("too many order items".to_owned()))?;
            let quantity = i32::try_from(item.quantity)
                .map_err(|_| RepositoryError::Conflict("item quantity too large".to_owned()))?;

            sqlx::query(
                r"
                INSERT INTO order_items (
                    order_id, position, product_id, variant_id, product_name,
                    product_sku, product_image, variant_name, unit_price, quantity
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ",
            )
            .bind(order.id.as_uuid())
            .bind(position)
            .bind(&item.product_id)
            .bind(item.variant_id.as_ref())
            .bind(&item.product_name)
            .bind(item.product_sku.as_deref())
            .bind(item.product_image.as_deref())
            .bind(item.variant_name.as_deref())
            .bind(item.unit_price)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        self.fetch_one(id.as_uuid()).await
    }

    async fn get_by_number(&self, order_number: &str) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1"
        ))
        .bind(order_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(self.hydrate(row.into_iter().collect()).await?.pop())
    }

    async fn list_by_email(&self, email: &Email) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE LOWER(email) = LOWER($1) \
             ORDER BY created_at DESC"
        ))
        .bind(email.as_str())
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    async fn mark_paid(
        &self,
        id: OrderId,
        payment_intent_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Transition, RepositoryError> {
        let updated: Option<Uuid> = sqlx::query_scalar(
            r"
            UPDATE orders
            SET status = CASE WHEN status = 'pending' THEN 'paid'::order_status ELSE status END,
                payment_status = 'paid',
                payment_intent_id = COALESCE($2, payment_intent_id),
                updated_at = $3
            WHERE id = $1 AND payment_status <> 'paid'
            RETURNING id
            ",
        )
        .bind(id.as_uuid())
        .bind(payment_intent_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        self.finish_transition(id, updated).await
    }

    async fn mark_payment_failed(
        &self,
        id: OrderId,
        now: DateTime<Utc>,
    ) -> Result<Transition, RepositoryError> {
        let updated: Option<Uuid> = sqlx::query_scalar(
            r"
            UPDATE orders
            SET payment_status = 'failed', updated_at = $2
            WHERE id = $1 AND payment_status = 'pending'
            RETURNING id
            ",
        )
        .bind(id.as_uuid())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        self.finish_transition(id, updated).await
    }

    async fn update_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Transition, RepositoryError> {
        let updated: Option<Uuid> = sqlx::query_scalar(
            r"
            UPDATE orders
            SET status = $3, updated_at = $4
            WHERE id = $1 AND status = $2
            RETURNING id
            ",
        )
        .bind(id.as_uuid())
        .bind(from)
        .bind(to)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        self.finish_transition(id, updated).await
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
