use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::transaction::{PendingTransaction, TransactionId};
use crate::errors::DomainError;

/// Open proposals keyed by transaction id. Settled transactions are removed.
#[derive(Default)]
pub struct PendingTransactionTable {
    transactions: RwLock<HashMap<TransactionId, PendingTransaction>>,
}

impl PendingTransactionTable {
    pub async fn insert(&self, transaction: PendingTransaction) -> Result<(), DomainError> {
        let mut transactions = self.transactions.write().await;
        let owner_busy = transactions
            .values()
            .any(|open| open.owner_user_id == transaction.owner_user_id && open.is_proposed());
        if owner_busy {
            return Err(DomainError::InvariantViolation(format!(
                "user {} already has a proposed transaction",
                transaction.owner_user_id
            )));
        }
        transactions.insert(transaction.id.clone(), transaction);
        Ok(())
    }

    pub async fn get(&self, id: &TransactionId) -> Option<PendingTransaction> {
        self.transactions.read().await.get(id).cloned()
    }

    pub async fn find_proposed_for_user(&self, user_id: &str) -> Option<PendingTransaction> {
        self.transactions
            .read()
            .await
            .values()
            .find(|open| open.owner_user_id == user_id && open.is_proposed())
            .cloned()
    }

    pub async fn remove(&self, id: &TransactionId) -> Option<PendingTransaction> {
        self.transactions.write().await.remove(id)
    }

    pub async fn expired(&self, now: DateTime<Utc>) -> Vec<PendingTransaction> {
        self.transactions
            .read()
            .await
            .values()
            .filter(|open| open.is_proposed() && open.is_expired_at(now))
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.transactions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    use super::PendingTransactionTable;
    use crate::domain::order::{Order, OrderId, OrderStatus};
    use crate::domain::transaction::{ActionType, PendingTransaction};

    fn proposal(order_id: &str, owner: &str, minutes_ago: i64) -> PendingTransaction {
        let order = Order {
            id: OrderId(order_id.to_owned()),
            item: "무선 마우스".to_owned(),
            status: OrderStatus::Preparing,
            customer_id: Some(owner.to_owned()),
            order_date: NaiveDate::from_ymd_opt(2026, 10, 15).expect("valid date"),
        };
        let base = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).single().expect("valid time");
        PendingTransaction::propose(
            ActionType::CancelOrder,
            &order,
            owner,
            base - Duration::minutes(minutes_ago),
            Duration::minutes(10),
        )
    }

    #[tokio::test]
    async fn one_proposed_transaction_per_user() {
        let table = PendingTransactionTable::default();
        table.insert(proposal("ORD-1", "U1", 0)).await.expect("first proposal");
        assert!(table.insert(proposal("ORD-2", "U1", 0)).await.is_err());
        table.insert(proposal("ORD-3", "U2", 0)).await.expect("other user");

        assert_eq!(table.len().await, 2);
        let open = table.find_proposed_for_user("U1").await.expect("U1 proposal");
        assert_eq!(open.target_order_id.as_str(), "ORD-1");
    }

    #[tokio::test]
    async fn removed_transactions_are_gone() {
        let table = PendingTransactionTable::default();
        let txn = proposal("ORD-1", "U1", 0);
        table.insert(txn.clone()).await.expect("insert");

        assert!(table.remove(&txn.id).await.is_some());
        assert!(table.remove(&txn.id).await.is_none());
        assert!(table.get(&txn.id).await.is_none());
    }

    #[tokio::test]
    async fn expired_lists_only_stale_proposals() {
        let table = PendingTransactionTable::default();
        table.insert(proposal("ORD-1", "U1", 30)).await.expect("stale");
        table.insert(proposal("ORD-2", "U2", 1)).await.expect("fresh");

        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).single().expect("valid time");
        let expired = table.expired(now).await;
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].owner_user_id, "U1");
    }
}
