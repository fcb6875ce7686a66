//! Durable engines behind [`orderdesk_core::store::OrderStore`].
//!
//! Both engines keep the same five-column row shape:
//! `order_id, item, status, customer_id, order_date`.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use orderdesk_core::config::{StoreBackend, StoreConfig};
use orderdesk_core::domain::order::{Order, OrderId, OrderStatus};
use orderdesk_core::store::{OrderStore, StoreError};

use crate::{connect_with_settings, migrations};

pub mod csv_file;
pub mod sqlite;

pub use csv_file::CsvOrderStore;
pub use sqlite::SqlOrderStore;

/// Flat storage shape shared by the CSV file and the `orders` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRow {
    pub order_id: String,
    pub item: String,
    pub status: String,
    #[serde(default)]
    pub customer_id: String,
    pub order_date: String,
}

impl OrderRow {
    pub fn into_order(self) -> Result<Order, StoreError> {
        let status = OrderStatus::parse(&self.status).ok_or_else(|| {
            StoreError::Decode(format!(
                "order `{}` has unknown status `{}`",
                self.order_id, self.status
            ))
        })?;
        let order_date =
            NaiveDate::parse_from_str(self.order_date.trim(), "%Y-%m-%d").map_err(|error| {
                StoreError::Decode(format!(
                    "order `{}` has invalid order_date `{}`: {error}",
                    self.order_id, self.order_date
                ))
            })?;
        let customer_id = self.customer_id.trim();

        Ok(Order {
            id: OrderId(self.order_id.trim().to_string()),
            item: self.item,
            status,
            customer_id: (!customer_id.is_empty()).then(|| customer_id.to_string()),
            order_date,
        })
    }
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id.0.clone(),
            item: order.item.clone(),
            status: order.status.as_str().to_string(),
            customer_id: order.customer_id.clone().unwrap_or_default(),
            order_date: order.order_date.format("%Y-%m-%d").to_string(),
        }
    }
}

pub(crate) fn backend_error(error: sqlx::Error) -> StoreError {
    StoreError::Backend(error.to_string())
}

/// Opens the engine selected by `store.url` and performs the initial load.
///
/// SQLite databases are migrated first, so a fresh file is usable at once.
pub async fn open_order_store(config: &StoreConfig) -> Result<Arc<dyn OrderStore>, StoreError> {
    let store: Arc<dyn OrderStore> = match config.backend() {
        StoreBackend::Sqlite(url) => {
            let pool = connect_with_settings(&url, config.max_connections, config.timeout_secs)
                .await
                .map_err(backend_error)?;
            migrations::run_pending(&pool)
                .await
                .map_err(|error| StoreError::Backend(error.to_string()))?;
            info!(event_name = "store.opened", engine = "sqlite", url = %url, "order store opened");
            Arc::new(SqlOrderStore::new(pool))
        }
        StoreBackend::Csv(path) => {
            info!(
                event_name = "store.opened",
                engine = "csv",
                path = %path.display(),
                "order store opened"
            );
            Arc::new(CsvOrderStore::new(path))
        }
    };

    store.load().await?;
    Ok(store)
}
