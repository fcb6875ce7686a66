//! Deterministic demo dataset used by `orderdesk seed` and the store tests.
//!
//! Order dates are relative to the day the dataset is loaded, so the recency
//! window always sees the same picture:
//! 1. Customer `U1` with one order per lifecycle status
//! 2. Customer `U2` with a single placed order
//! 3. One legacy row without a customer

use chrono::{Days, NaiveDate};

use orderdesk_core::domain::order::{Order, OrderId, OrderStatus};
use orderdesk_core::store::{OrderStore, StoreError};

struct SeedOrder {
    order_id: &'static str,
    item: &'static str,
    status: OrderStatus,
    customer_id: Option<&'static str>,
    days_ago: u64,
}

const SEED_ORDERS: &[SeedOrder] = &[
    SeedOrder {
        order_id: "ORD-1001",
        item: "사운드바",
        status: OrderStatus::Shipping,
        customer_id: Some("U1"),
        days_ago: 3,
    },
    SeedOrder {
        order_id: "ORD-1002",
        item: "무선 마우스",
        status: OrderStatus::Preparing,
        customer_id: Some("U1"),
        days_ago: 1,
    },
    SeedOrder {
        order_id: "ORD-1003",
        item: "기계식 키보드",
        status: OrderStatus::Delivered,
        customer_id: Some("U1"),
        days_ago: 12,
    },
    SeedOrder {
        order_id: "ORD-1004",
        item: "USB 허브",
        status: OrderStatus::Cancelled,
        customer_id: Some("U1"),
        days_ago: 5,
    },
    SeedOrder {
        order_id: "ORD-1005",
        item: "노트북 거치대",
        status: OrderStatus::Delivered,
        customer_id: Some("U1"),
        days_ago: 60,
    },
    SeedOrder {
        order_id: "ORD-2001",
        item: "모니터",
        status: OrderStatus::Placed,
        customer_id: Some("U2"),
        days_ago: 2,
    },
    SeedOrder {
        order_id: "ORD-9001",
        item: "HDMI 케이블",
        status: OrderStatus::Preparing,
        customer_id: None,
        days_ago: 10,
    },
];

pub struct DemoDataset;

impl DemoDataset {
    pub fn orders(today: NaiveDate) -> Vec<Order> {
        SEED_ORDERS
            .iter()
            .map(|seed| Order {
                id: OrderId(seed.order_id.to_string()),
                item: seed.item.to_string(),
                status: seed.status,
                customer_id: seed.customer_id.map(str::to_string),
                order_date: today.checked_sub_days(Days::new(seed.days_ago)).unwrap_or(today),
            })
            .collect()
    }

    /// Upserts every demo order and saves. Rows outside the dataset are kept,
    /// and reloading resets demo rows to their seeded state.
    pub async fn load(store: &dyn OrderStore, today: NaiveDate) -> Result<SeedResult, StoreError> {
        store.load().await?;

        let mut inserted = Vec::new();
        let mut reset = Vec::new();
        for order in Self::orders(today) {
            match store.find_by_id(&order.id).await? {
                None => inserted.push(order.id.clone()),
                Some(existing) if existing != order => reset.push(order.id.clone()),
                Some(_) => {}
            }
            store.upsert(order).await?;
        }
        store.save().await?;

        Ok(SeedResult { inserted, reset })
    }

    pub async fn verify(
        store: &dyn OrderStore,
        today: NaiveDate,
    ) -> Result<VerificationResult, StoreError> {
        store.load().await?;

        let mut checks = Vec::new();
        for expected in Self::orders(today) {
            let present = store.find_by_id(&expected.id).await?.as_ref() == Some(&expected);
            checks.push((expected.id.0, present));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub inserted: Vec<OrderId>,
    pub reset: Vec<OrderId>,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}
