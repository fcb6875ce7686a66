use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::domain::order::{Order, OrderId, OrderStatus};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

/// Durable order table with reload-before-mutate semantics.
///
/// Reads are served from an in-memory working copy. `load` replaces that copy
/// from durable storage and `save` rewrites durable storage from it in full.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn load(&self) -> Result<(), StoreError>;

    async fn save(&self) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, StoreError>;

    async fn find_by_customer(
        &self,
        customer_id: &str,
        status_filter: Option<&[OrderStatus]>,
        since: Option<NaiveDate>,
    ) -> Result<Vec<Order>, StoreError>;

    async fn upsert(&self, order: Order) -> Result<(), StoreError>;

    /// Checks that durable storage is reachable without touching the working copy.
    async fn probe(&self) -> Result<(), StoreError>;
}

/// Rows in durable order plus an id index. A repeated id keeps its first
/// position and takes the later row's contents.
#[derive(Clone, Debug, Default)]
struct Rows {
    orders: Vec<Order>,
    index: HashMap<OrderId, usize>,
}

impl Rows {
    fn from_orders(orders: Vec<Order>) -> Self {
        let mut rows = Self::default();
        for order in orders {
            rows.upsert(order);
        }
        rows
    }

    fn get(&self, id: &OrderId) -> Option<&Order> {
        self.index.get(id).map(|&position| &self.orders[position])
    }

    fn upsert(&mut self, order: Order) {
        match self.index.get(&order.id) {
            Some(&position) => self.orders[position] = order,
            None => {
                self.index.insert(order.id.clone(), self.orders.len());
                self.orders.push(order);
            }
        }
    }
}

/// Working copy shared by every engine. Scans return rows in the order the
/// engine loaded them, so ranking ties keep storage order.
#[derive(Default)]
pub struct OrderTable {
    rows: RwLock<Rows>,
}

impl OrderTable {
    pub async fn replace(&self, orders: Vec<Order>) {
        *self.rows.write().await = Rows::from_orders(orders);
    }

    pub async fn snapshot(&self) -> Vec<Order> {
        self.rows.read().await.orders.clone()
    }

    pub async fn get(&self, id: &OrderId) -> Option<Order> {
        self.rows.read().await.get(id).cloned()
    }

    /// Legacy rows without a customer never match a customer scan.
    pub async fn by_customer(
        &self,
        customer_id: &str,
        status_filter: Option<&[OrderStatus]>,
        since: Option<NaiveDate>,
    ) -> Vec<Order> {
        let rows = self.rows.read().await;
        rows.orders
            .iter()
            .filter(|order| order.customer_id.as_deref() == Some(customer_id))
            .filter(|order| status_filter.map_or(true, |statuses| statuses.contains(&order.status)))
            .filter(|order| since.map_or(true, |date| order.order_date >= date))
            .cloned()
            .collect()
    }

    pub async fn upsert(&self, order: Order) {
        self.rows.write().await.upsert(order);
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.orders.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.orders.is_empty()
    }
}

/// Process-local engine. The "durable" side is a second map, so tests can
/// simulate an out-of-band writer with [`InMemoryOrderStore::write_through`].
#[derive(Default)]
pub struct InMemoryOrderStore {
    durable: RwLock<Rows>,
    table: OrderTable,
    fail_saves: AtomicBool,
}

impl InMemoryOrderStore {
    pub async fn with_orders(orders: Vec<Order>) -> Self {
        let store = Self::default();
        *store.durable.write().await = Rows::from_orders(orders.clone());
        store.table.replace(orders).await;
        store
    }

    /// Writes straight to durable storage, bypassing the working copy.
    pub async fn write_through(&self, order: Order) {
        self.durable.write().await.upsert(order);
    }

    pub async fn durable_order(&self, id: &OrderId) -> Option<Order> {
        self.durable.read().await.get(id).cloned()
    }

    pub fn fail_saves(&self, enabled: bool) {
        self.fail_saves.store(enabled, Ordering::SeqCst);
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn load(&self) -> Result<(), StoreError> {
        let orders = self.durable.read().await.orders.clone();
        self.table.replace(orders).await;
        Ok(())
    }

    async fn save(&self) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io("in-memory store is refusing writes".to_owned()));
        }
        let rows = self.table.snapshot().await;
        *self.durable.write().await = Rows::from_orders(rows);
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
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{InMemoryOrderStore, OrderStore, StoreError};
    use crate::domain::order::{Order, OrderId, OrderStatus};

    fn order(id: &str, customer: Option<&str>, status: OrderStatus, day: u32) -> Order {
        Order {
            id: OrderId(id.to_owned()),
            item: format!("item-{id}"),
            status,
            customer_id: customer.map(str::to_owned),
            order_date: NaiveDate::from_ymd_opt(2026, 10, day).expect("valid date"),
        }
    }

    #[tokio::test]
    async fn out_of_band_writes_are_visible_only_after_load() {
        let store =
            InMemoryOrderStore::with_orders(vec![order("ORD-1", Some("U1"), OrderStatus::Shipping, 1)])
                .await;
        store.write_through(order("ORD-1", Some("U1"), OrderStatus::Delivered, 1)).await;

        let before = store.find_by_id(&OrderId("ORD-1".to_owned())).await.expect("find");
        assert_eq!(before.map(|o| o.status), Some(OrderStatus::Shipping));

        store.load().await.expect("load");
        let after = store.find_by_id(&OrderId("ORD-1".to_owned())).await.expect("find");
        assert_eq!(after.map(|o| o.status), Some(OrderStatus::Delivered));
    }

    #[tokio::test]
    async fn save_rewrites_durable_side_in_full() {
        let store =
            InMemoryOrderStore::with_orders(vec![order("ORD-1", Some("U1"), OrderStatus::Placed, 1)])
                .await;
        store.upsert(order("ORD-1", Some("U1"), OrderStatus::Cancelled, 1)).await.expect("upsert");
        assert_eq!(
            store.durable_order(&OrderId("ORD-1".to_owned())).await.map(|o| o.status),
            Some(OrderStatus::Placed)
        );

        store.save().await.expect("save");
        assert_eq!(
            store.durable_order(&OrderId("ORD-1".to_owned())).await.map(|o| o.status),
            Some(OrderStatus::Cancelled)
        );
    }

    #[tokio::test]
    async fn customer_scan_applies_status_and_date_filters() {
        let store = InMemoryOrderStore::with_orders(vec![
            order("ORD-1", Some("U1"), OrderStatus::Shipping, 10),
            order("ORD-2", Some("U1"), OrderStatus::Delivered, 2),
            order("ORD-3", Some("U2"), OrderStatus::Shipping, 10),
            order("ORD-4", None, OrderStatus::Preparing, 10),
        ])
        .await;

        let all = store.find_by_customer("U1", None, None).await.expect("scan");
        assert_eq!(all.len(), 2);

        let since = NaiveDate::from_ymd_opt(2026, 10, 5);
        let recent = store.find_by_customer("U1", None, since).await.expect("scan");
        assert_eq!(recent.iter().map(|o| o.id.as_str()).collect::<Vec<_>>(), vec!["ORD-1"]);

        let delivered =
            store.find_by_customer("U1", Some(&[OrderStatus::Delivered][..]), None).await.expect("scan");
        assert_eq!(delivered.iter().map(|o| o.id.as_str()).collect::<Vec<_>>(), vec!["ORD-2"]);
    }

    #[tokio::test]
    async fn scans_keep_storage_order_across_load_and_save() {
        let store = InMemoryOrderStore::with_orders(vec![
            order("ORD-9", Some("U1"), OrderStatus::Shipping, 4),
            order("ORD-2", Some("U1"), OrderStatus::Shipping, 4),
            order("ORD-5", Some("U1"), OrderStatus::Shipping, 4),
        ])
        .await;
        store.upsert(order("ORD-2", Some("U1"), OrderStatus::Preparing, 4)).await.expect("upsert");
        store.upsert(order("ORD-1", Some("U1"), OrderStatus::Shipping, 4)).await.expect("upsert");
        store.save().await.expect("save");
        store.load().await.expect("load");

        let scanned = store.find_by_customer("U1", None, None).await.expect("scan");
        let ids: Vec<&str> = scanned.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["ORD-9", "ORD-2", "ORD-5", "ORD-1"]);
        assert_eq!(scanned[1].status, OrderStatus::Preparing);
    }

    #[tokio::test]
    async fn failing_saves_report_io_errors() {
        let store = InMemoryOrderStore::default();
        store.fail_saves(true);
        assert!(matches!(store.save().await, Err(StoreError::Io(_))));
    }
}
