use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use concierge_core::collaborators::OrderDirectory;
use concierge_core::domain::intent::OrderId;
use concierge_core::domain::order::{Order, OrderItem, OrderStatus};
use concierge_core::errors::CollaboratorError;

use super::{parse_u32, RepositoryError};
use crate::DbPool;

pub struct SqlOrderDirectory {
    pool: DbPool,
}

impl SqlOrderDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                id,
                status,
                total_amount,
                currency,
                tracking_number,
                carrier,
                estimated_delivery,
                delivered_at
             FROM customer_order
             WHERE id = ?",
        )
        .bind(id.as_str().to_ascii_uppercase())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut order = order_from_row(row)?;
        let items = sqlx::query(
            "SELECT name, quantity FROM order_item WHERE order_id = ? ORDER BY position ASC",
        )
        .bind(&order.id.0)
        .fetch_all(&self.pool)
        .await?;

        order.items = items.into_iter().map(item_from_row).collect::<Result<_, _>>()?;
        Ok(Some(order))
    }

    pub async fn save(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO customer_order (
                id,
                status,
                total_amount,
                currency,
                tracking_number,
                carrier,
                estimated_delivery,
                delivered_at,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                total_amount = excluded.total_amount,
                currency = excluded.currency,
                tracking_number = excluded.tracking_number,
                carrier = excluded.carrier,
                estimated_delivery = excluded.estimated_delivery,
                delivered_at = excluded.delivered_at",
        )
        .bind(&order.id.0)
        .bind(order.status.as_str())
        .bind(order.total_amount.map(|amount| amount.to_string()))
        .bind(&order.currency)
        .bind(order.tracking_number.as_deref())
        .bind(order.carrier.as_deref())
        .bind(order.estimated_delivery.as_deref())
        .bind(order.delivered_at.as_deref())
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM order_item WHERE order_id = ?")
            .bind(&order.id.0)
            .execute(&mut *tx)
            .await?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_item (order_id, position, name, quantity) VALUES (?, ?, ?, ?)",
            )
            .bind(&order.id.0)
            .bind(position as i64)
            .bind(&item.name)
            .bind(i64::from(item.quantity))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl OrderDirectory for SqlOrderDirectory {
    async fn find_order(&self, order_id: &OrderId) -> Result<Option<Order>, CollaboratorError> {
        Ok(self.find_by_id(order_id).await?)
    }
}

fn order_from_row(row: SqliteRow) -> Result<Order, RepositoryError> {
    let total_amount = row
        .try_get::<Option<String>, _>("total_amount")?
        .map(|raw| {
            Decimal::from_str(&raw)
                .map_err(|_| RepositoryError::Decode(format!("invalid total_amount `{raw}`")))
        })
        .transpose()?;

    Ok(Order {
        id: OrderId(row.try_get("id")?),
        status: OrderStatus::parse(&row.try_get::<String, _>("status")?),
        items: Vec::new(),
        total_amount,
        currency: row.try_get("currency")?,
        tracking_number: row.try_get("tracking_number")?,
        carrier: row.try_get("carrier")?,
        estimated_delivery: row.try_get("estimated_delivery")?,
        delivered_at: row.try_get("delivered_at")?,
    })
}

fn item_from_row(row: SqliteRow) -> Result<OrderItem, RepositoryError> {
    Ok(OrderItem {
        name: row.try_get("name")?,
        quantity: parse_u32("quantity", row.try_get("quantity")?)?,
    })
}
