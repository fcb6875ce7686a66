use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::Row;
use tracing::debug;

use orderdesk_core::domain::order::{Order, OrderId, OrderStatus};
use orderdesk_core::store::{OrderStore, OrderTable, StoreError};

use super::{backend_error, OrderRow};
use crate::DbPool;

pub struct SqlOrderStore {
    pool: DbPool,
    table: OrderTable,
}

impl SqlOrderStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool, table: OrderTable::default() }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn row_to_order_row(row: &sqlx::sqlite::SqliteRow) -> Result<OrderRow, StoreError> {
    let decode = |error: sqlx::Error| StoreError::Decode(error.to_string());
    let customer_id: Option<String> = row.try_get("customer_id").map_err(decode)?;

    Ok(OrderRow {
        order_id: row.try_get("order_id").map_err(decode)?,
        item: row.try_get("item").map_err(decode)?,
        status: row.try_get("status").map_err(decode)?,
        customer_id: customer_id.unwrap_or_default(),
        order_date: row.try_get("order_date").map_err(decode)?,
    })
}

#[async_trait]
impl OrderStore for SqlOrderStore {
    async fn load(&self) -> Result<(), StoreError> {
        let rows = sqlx::query(
            "SELECT order_id, item, status, customer_id, order_date FROM orders ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend_error)?;

        let orders = rows
            .iter()
            .map(|row| row_to_order_row(row)?.into_order())
            .collect::<Result<Vec<_>, _>>()?;
        debug!(event_name = "store.loaded", engine = "sqlite", rows = orders.len());
        self.table.replace(orders).await;
        Ok(())
    }

    /// Rewrites the table from the working copy inside one transaction, so a
    /// failed save leaves the previous contents intact.
    async fn save(&self) -> Result<(), StoreError> {
        let orders = self.table.snapshot().await;
        let mut tx = self.pool.begin().await.map_err(backend_error)?;

        sqlx::query("DELETE FROM orders").execute(&mut *tx).await.map_err(backend_error)?;
        for order in &orders {
            let row = OrderRow::from(order);
            let customer_id = order.customer_id.as_deref();
            sqlx::query(
                "INSERT INTO orders (order_id, item, status, customer_id, order_date)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&row.order_id)
            .bind(&row.item)
            .bind(&row.status)
            .bind(customer_id)
            .bind(&row.order_date)
            .execute(&mut *tx)
            .await
            .map_err(backend_error)?;
        }

        tx.commit().await.map_err(backend_error)?;
        debug!(event_name = "store.saved", engine = "sqlite", rows = orders.len());
        Ok(())
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.table.get(id).await)
    }

    async fn find_by_customer(
        &self,
        customer_id: &str,
        status_filter: Option<&[OrderStatus]>,
        since: Option<NaiveDate>,
    ) -> Result<Vec<Order>, StoreError> {
        Ok(self.table.by_customer(customer_id, status_filter, since).await)
    }

    async fn upsert(&self, order: Order) -> Result<(), StoreError> {
        self.table.upsert(order).await;
        Ok(())
    }

    async fn probe(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT COUNT(*) FROM orders")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(backend_error)
    }
}
