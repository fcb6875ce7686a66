use std::cmp::Reverse;

use chrono::{Days, NaiveDate};

use crate::domain::order::{Order, OrderId};
use crate::lexicon::{self, DEFAULT_SCAN_STATUSES};
use crate::store::{OrderStore, StoreError};

pub const DEFAULT_RECENCY_WINDOW_DAYS: u32 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolvedVia {
    ExplicitReference,
    CandidateMatch,
    Recency,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// `reference` is set when the text named an order id that does not exist.
    NotFound { reference: Option<OrderId> },
    Single { order: Order, via: ResolvedVia },
    Multiple(Vec<Order>),
}

#[derive(Clone, Copy, Debug)]
pub struct ResolveRequest<'a> {
    pub text: &'a str,
    pub customer_id: &'a str,
    pub candidates: Option<&'a [OrderId]>,
    pub today: NaiveDate,
}

/// Turns free text plus session state into zero, one or many orders.
#[derive(Clone, Debug)]
pub struct DisambiguationResolver {
    recency_window_days: u32,
}

impl Default for DisambiguationResolver {
    fn default() -> Self {
        Self::new(DEFAULT_RECENCY_WINDOW_DAYS)
    }
}

impl DisambiguationResolver {
    pub fn new(recency_window_days: u32) -> Self {
        Self { recency_window_days }
    }

    pub fn recency_window_days(&self) -> u32 {
        self.recency_window_days
    }

    /// First match wins: explicit id, then open candidates, then the recency
    /// scan. An explicit id that does not exist never falls through.
    pub async fn resolve(
        &self,
        store: &dyn OrderStore,
        request: ResolveRequest<'_>,
    ) -> Result<Resolution, StoreError> {
        if let Some(reference) = lexicon::extract_order_reference(request.text) {
            return Ok(match store.find_by_id(&reference).await? {
                Some(order) => Resolution::Single { order, via: ResolvedVia::ExplicitReference },
                None => Resolution::NotFound { reference: Some(reference) },
            });
        }

        if let Some(candidate_ids) = request.candidates {
            let candidates = load_candidates(store, candidate_ids).await?;
            if let Some(order) = match_candidate(request.text, &candidates) {
                return Ok(Resolution::Single { order, via: ResolvedVia::CandidateMatch });
            }
        }

        let mut recent = self.recent_orders(store, request).await?;
        Ok(match recent.len() {
            0 => Resolution::NotFound { reference: None },
            1 => Resolution::Single { order: recent.remove(0), via: ResolvedVia::Recency },
            _ => Resolution::Multiple(recent),
        })
    }

    async fn recent_orders(
        &self,
        store: &dyn OrderStore,
        request: ResolveRequest<'_>,
    ) -> Result<Vec<Order>, StoreError> {
        let since = request.today.checked_sub_days(Days::new(u64::from(self.recency_window_days)));
        let statuses = lexicon::status_class_hint(request.text)
            .map_or(DEFAULT_SCAN_STATUSES, |class| class.statuses());
        let mut orders = store.find_by_customer(request.customer_id, Some(statuses), since).await?;
        rank(&mut orders);
        Ok(orders)
    }
}

/// Status priority first, newest first within a status. Ties keep the
/// order the store returned, which is storage order.
pub fn rank(orders: &mut [Order]) {
    orders.sort_by_key(|order| (order.status.priority(), Reverse(order.order_date)));
}

pub async fn load_candidates(
    store: &dyn OrderStore,
    candidate_ids: &[OrderId],
) -> Result<Vec<Order>, StoreError> {
    let mut candidates = Vec::with_capacity(candidate_ids.len());
    for id in candidate_ids {
        if let Some(order) = store.find_by_id(id).await? {
            candidates.push(order);
        }
    }
    Ok(candidates)
}

/// Finds the candidate whose item name appears in the text. The longest item
/// name wins; equal lengths keep candidate order.
pub fn match_candidate(text: &str, candidates: &[Order]) -> Option<Order> {
    let folded_text = lexicon::fold(text);
    let mut best: Option<(usize, &Order)> = None;
    for candidate in candidates {
        let item = lexicon::fold(&candidate.item);
        if item.is_empty() || !folded_text.contains(&item) {
            continue;
        }
        let length = item.chars().count();
        if best.map_or(true, |(best_length, _)| length > best_length) {
            best = Some((length, candidate));
        }
    }
    best.map(|(_, order)| order.clone())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{match_candidate, DisambiguationResolver, Resolution, ResolveRequest, ResolvedVia};
    use crate::domain::order::{Order, OrderId, OrderStatus};
    use crate::store::InMemoryOrderStore;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).expect("valid date")
    }

    fn order(id: &str, item: &str, status: OrderStatus, days_ago: u64) -> Order {
        Order {
            id: OrderId(id.to_owned()),
            item: item.to_owned(),
            status,
            customer_id: Some("U1".to_owned()),
            order_date: today() - chrono::Days::new(days_ago),
        }
    }

    async fn store() -> InMemoryOrderStore {
        InMemoryOrderStore::with_orders(vec![
            order("ORD-001", "사운드바", OrderStatus::Shipping, 3),
            order("ORD-002", "무선 마우스", OrderStatus::Preparing, 1),
            order("ORD-003", "기계식 키보드", OrderStatus::Delivered, 45),
            order("ORD-004", "USB 허브", OrderStatus::Cancelled, 5),
        ])
        .await
    }

    fn request<'a>(text: &'a str, candidates: Option<&'a [OrderId]>) -> ResolveRequest<'a> {
        ResolveRequest { text, customer_id: "U1", candidates, today: today() }
    }

    #[tokio::test]
    async fn recency_scan_ranks_shipping_before_preparing() {
        let store = store().await;
        let resolution =
            DisambiguationResolver::default().resolve(&store, request("내 주문 어디야", None)).await;

        let Ok(Resolution::Multiple(orders)) = resolution else {
            panic!("expected multiple matches, got {resolution:?}");
        };
        let ids: Vec<&str> = orders.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["ORD-001", "ORD-002"]);
    }

    #[tokio::test]
    async fn explicit_reference_never_falls_through() {
        let store = store().await;
        let resolver = DisambiguationResolver::default();

        let found = resolver.resolve(&store, request("ord-003 상태", None)).await.expect("resolve");
        assert!(matches!(
            found,
            Resolution::Single { ref order, via: ResolvedVia::ExplicitReference } if order.id.as_str() == "ORD-003"
        ));

        let missing = resolver.resolve(&store, request("ORD-999 어디야", None)).await.expect("resolve");
        assert_eq!(missing, Resolution::NotFound { reference: Some(OrderId("ORD-999".to_owned())) });
    }

    #[tokio::test]
    async fn candidate_item_match_beats_recency() {
        let store = store().await;
        let candidates = vec![OrderId("ORD-001".to_owned()), OrderId("ORD-002".to_owned())];
        let resolution = DisambiguationResolver::default()
            .resolve(&store, request("사운드 바 보여줘", Some(&candidates)))
            .await
            .expect("resolve");

        assert!(matches!(
            resolution,
            Resolution::Single { ref order, via: ResolvedVia::CandidateMatch } if order.id.as_str() == "ORD-001"
        ));
    }

    #[tokio::test]
    async fn status_class_hint_narrows_the_scan() {
        let store = store().await;
        let resolver = DisambiguationResolver::default();

        let cancelled = resolver.resolve(&store, request("취소된 주문", None)).await.expect("resolve");
        assert!(matches!(
            cancelled,
            Resolution::Single { ref order, via: ResolvedVia::Recency } if order.id.as_str() == "ORD-004"
        ));

        let delivered =
            resolver.resolve(&store, request("배송 완료된 주문", None)).await.expect("resolve");
        assert_eq!(delivered, Resolution::NotFound { reference: None });

        let wide = DisambiguationResolver::new(60)
            .resolve(&store, request("배송 완료된 주문", None))
            .await
            .expect("resolve");
        assert!(matches!(wide, Resolution::Single { ref order, .. } if order.id.as_str() == "ORD-003"));
    }

    #[tokio::test]
    async fn ranking_ties_keep_storage_order() {
        let store = InMemoryOrderStore::with_orders(vec![
            order("ORD-030", "충전기", OrderStatus::Shipping, 2),
            order("ORD-010", "케이블", OrderStatus::Shipping, 2),
            order("ORD-020", "젠더", OrderStatus::Shipping, 2),
        ])
        .await;

        let resolution =
            DisambiguationResolver::default().resolve(&store, request("내 주문", None)).await;

        let Ok(Resolution::Multiple(orders)) = resolution else {
            panic!("expected multiple matches, got {resolution:?}");
        };
        let ids: Vec<&str> = orders.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["ORD-030", "ORD-010", "ORD-020"]);
    }

    #[test]
    fn longest_candidate_item_wins() {
        let candidates = vec![
            order("ORD-010", "마우스", OrderStatus::Shipping, 1),
            order("ORD-011", "무선 마우스", OrderStatus::Preparing, 1),
            order("ORD-012", "마우스패드", OrderStatus::Placed, 1),
        ];

        let chosen = match_candidate("무선 마우스 보여줘", &candidates).expect("match");
        assert_eq!(chosen.id.as_str(), "ORD-011");
        assert!(match_candidate("키보드", &candidates).is_none());
    }
}
