use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::order::OrderId;
use crate::domain::transaction::TransactionId;

/// Per-user conversational state carried between turns.
///
/// `candidate_order_ids` and `pending_transaction_id` are never both set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub last_viewed_order_id: Option<OrderId>,
    pub candidate_order_ids: Option<Vec<OrderId>>,
    pub pending_transaction_id: Option<TransactionId>,
    pub last_active_at: Option<DateTime<Utc>>,
}

impl SessionContext {
    pub fn has_open_candidates(&self) -> bool {
        self.candidate_order_ids.as_ref().is_some_and(|ids| !ids.is_empty())
    }

    pub fn is_blank(&self) -> bool {
        self.last_viewed_order_id.is_none()
            && self.candidate_order_ids.is_none()
            && self.pending_transaction_id.is_none()
    }
}
