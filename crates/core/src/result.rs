use serde::Serialize;

use crate::domain::order::Order;
use crate::domain::transaction::{ApprovalRequest, PendingTransaction};
use crate::errors::CoordinatorError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Completed,
    PendingApproval,
    MultipleChoice,
    Cancelled,
    Failed,
    NeedSelection,
    Error,
}

impl ResultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::PendingApproval => "pending_approval",
            Self::MultipleChoice => "multiple_choice",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::NeedSelection => "need_selection",
            Self::Error => "error",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CompletedData {
    Order(Order),
    Commit { order: Order, transaction: PendingTransaction },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Completed { data: CompletedData },
    PendingApproval { data: PendingTransaction, approval_request: ApprovalRequest },
    MultipleChoice { data: Vec<Order> },
    Cancelled { data: PendingTransaction },
    Failed { error: CoordinatorError },
    NeedSelection { error: CoordinatorError },
    Error { error: CoordinatorError },
}

/// What every coordinator call returns: a tagged outcome plus a message the
/// presentation layer can show as-is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransactionResult {
    #[serde(flatten)]
    pub outcome: Outcome,
    pub message: String,
}

impl TransactionResult {
    pub fn new(outcome: Outcome, message: impl Into<String>) -> Self {
        Self { outcome, message: message.into() }
    }

    /// Wraps a failure under the result kind its error maps to.
    pub fn from_error(error: CoordinatorError, message: impl Into<String>) -> Self {
        let outcome = match error.status() {
            ResultKind::Failed => Outcome::Failed { error },
            ResultKind::NeedSelection => Outcome::NeedSelection { error },
            _ => Outcome::Error { error },
        };
        Self::new(outcome, message)
    }

    pub fn kind(&self) -> ResultKind {
        match &self.outcome {
            Outcome::Completed { .. } => ResultKind::Completed,
            Outcome::PendingApproval { .. } => ResultKind::PendingApproval,
            Outcome::MultipleChoice { .. } => ResultKind::MultipleChoice,
            Outcome::Cancelled { .. } => ResultKind::Cancelled,
            Outcome::Failed { .. } => ResultKind::Failed,
            Outcome::NeedSelection { .. } => ResultKind::NeedSelection,
            Outcome::Error { .. } => ResultKind::Error,
        }
    }

    pub fn error(&self) -> Option<&CoordinatorError> {
        match &self.outcome {
            Outcome::Failed { error } | Outcome::NeedSelection { error } | Outcome::Error { error } => {
                Some(error)
            }
            _ => None,
        }
    }

    pub fn pending_transaction(&self) -> Option<&PendingTransaction> {
        match &self.outcome {
            Outcome::PendingApproval { data, .. } | Outcome::Cancelled { data } => Some(data),
            Outcome::Completed { data: CompletedData::Commit { transaction, .. } } => {
                Some(transaction)
            }
            _ => None,
        }
    }

    /// The single order this result is about, when there is one.
    pub fn order(&self) -> Option<&Order> {
        match &self.outcome {
            Outcome::Completed { data: CompletedData::Order(order) }
            | Outcome::Completed { data: CompletedData::Commit { order, .. } } => Some(order),
            _ => None,
        }
    }

    pub fn candidates(&self) -> &[Order] {
        match &self.outcome {
            Outcome::MultipleChoice { data } => data,
            _ => &[],
        }
    }
}
