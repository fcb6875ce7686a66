use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub String);

impl TransactionId {
    pub fn generate() -> Self {
        Self(format!("TXN-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    CancelOrder,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CancelOrder => "cancel_order",
        }
    }

    pub fn target_status(&self) -> OrderStatus {
        match self {
            Self::CancelOrder => OrderStatus::Cancelled,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::CancelOrder => "주문 취소",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    Proposed,
    Committed,
    Rejected,
    ConflictFailed,
    Expired,
}

impl TransactionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Committed => "committed",
            Self::Rejected => "rejected",
            Self::ConflictFailed => "conflict_failed",
            Self::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "proposed" => Some(Self::Proposed),
            "committed" => Some(Self::Committed),
            "rejected" => Some(Self::Rejected),
            "conflict_failed" => Some(Self::ConflictFailed),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub id: TransactionId,
    pub action_type: ActionType,
    pub target_order_id: OrderId,
    pub expected_prior_status: OrderStatus,
    pub new_status: OrderStatus,
    pub owner_user_id: String,
    pub state: TransactionState,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingTransaction {
    /// Snapshots the order's current status as the optimistic-concurrency token.
    pub fn propose(
        action_type: ActionType,
        order: &Order,
        owner_user_id: impl Into<String>,
        created_at: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            action_type,
            target_order_id: order.id.clone(),
            expected_prior_status: order.status,
            new_status: action_type.target_status(),
            owner_user_id: owner_user_id.into(),
            state: TransactionState::Proposed,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    pub fn is_proposed(&self) -> bool {
        self.state == TransactionState::Proposed
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn can_transition_to(&self, next: TransactionState) -> bool {
        matches!(
            (self.state, next),
            (TransactionState::Proposed, TransactionState::Committed)
                | (TransactionState::Proposed, TransactionState::Rejected)
                | (TransactionState::Proposed, TransactionState::ConflictFailed)
                | (TransactionState::Proposed, TransactionState::Expired)
        )
    }

    pub fn transition_to(&mut self, next: TransactionState) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.state = next;
            return Ok(());
        }

        Err(DomainError::InvalidTransactionTransition { from: self.state, to: next })
    }
}

/// Structured payload the approval UI renders next to the prompt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub transaction_id: TransactionId,
    pub order_id: OrderId,
    pub item: String,
    pub current_status: OrderStatus,
    pub requested_action: ActionType,
}

impl ApprovalRequest {
    pub fn for_transaction(transaction: &PendingTransaction, order: &Order) -> Self {
        Self {
            transaction_id: transaction.id.clone(),
            order_id: order.id.clone(),
            item: order.item.clone(),
            current_status: transaction.expected_prior_status,
            requested_action: transaction.action_type,
        }
    }
}
