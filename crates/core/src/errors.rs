use serde::Serialize;
use thiserror::Error;

use crate::domain::order::{OrderId, OrderStatus};
use crate::domain::transaction::{TransactionId, TransactionState};
use crate::result::ResultKind;
use crate::store::StoreError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid order transition from {from:?} to {to:?}")]
    InvalidOrderTransition { from: OrderStatus, to: OrderStatus },
    #[error("invalid transaction transition from {from:?} to {to:?}")]
    InvalidTransactionTransition { from: TransactionState, to: TransactionState },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Failure kinds the coordinator reports inside a structured result.
///
/// These never cross the API boundary as `Err`; `status()` picks the result
/// kind they surface as.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoordinatorError {
    #[error("order {order_id} was not found")]
    OrderNotFound { order_id: OrderId },
    #[error("no order matched the request")]
    NoMatchingOrder,
    #[error("transaction {transaction_id} was not found")]
    TransactionNotFound { transaction_id: TransactionId },
    #[error("order {order_id} belongs to another customer")]
    Forbidden { order_id: OrderId },
    #[error("order {order_id} is already {status:?}")]
    InvalidState { order_id: OrderId, status: OrderStatus },
    #[error("no order is selected for this request")]
    AmbiguousReference,
    #[error("order {order_id} changed from {expected:?} to {current:?} since the proposal")]
    Conflict { order_id: OrderId, expected: OrderStatus, current: OrderStatus },
    #[error("transaction {transaction_id} expired before approval")]
    Expired { transaction_id: TransactionId },
    #[error("intent `{intent}` is not handled by the order desk")]
    UnsupportedIntent { intent: String },
    #[error("order store failure: {message}")]
    Persistence { message: String },
    #[error("session state rejected the change: {message}")]
    Internal { message: String },
}

impl CoordinatorError {
    pub fn status(&self) -> ResultKind {
        match self {
            Self::InvalidState { .. } | Self::Conflict { .. } | Self::Expired { .. } => {
                ResultKind::Failed
            }
            Self::AmbiguousReference => ResultKind::NeedSelection,
            Self::OrderNotFound { .. }
            | Self::NoMatchingOrder
            | Self::TransactionNotFound { .. }
            | Self::Forbidden { .. }
            | Self::UnsupportedIntent { .. }
            | Self::Persistence { .. }
            | Self::Internal { .. } => ResultKind::Error,
        }
    }
}

impl From<StoreError> for CoordinatorError {
    fn from(value: StoreError) -> Self {
        Self::Persistence { message: value.to_string() }
    }
}

impl From<DomainError> for CoordinatorError {
    fn from(value: DomainError) -> Self {
        Self::Internal { message: value.to_string() }
    }
}

/// A request a transport refuses before it reaches the coordinator.
///
/// The HTTP routes and the CLI chat loop share these so that a blank user or
/// transaction id is rejected the same way on both surfaces.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },
    #[error("request body could not be read: {reason}")]
    MalformedBody { reason: String },
}

impl RequestError {
    /// Trims `value` and refuses it when nothing is left.
    pub fn require<'a>(field: &'static str, value: &'a str) -> Result<&'a str, Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(Self::EmptyField { field });
        }
        Ok(trimmed)
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::EmptyField { .. } => "empty_field",
            Self::MalformedBody { .. } => "malformed_body",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::EmptyField { .. } => "A required field was blank. Fill it in and try again.",
            Self::MalformedBody { .. } => "The request body was not valid JSON for this endpoint.",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::order::{OrderId, OrderStatus};
    use crate::errors::{CoordinatorError, DomainError, RequestError};
    use crate::result::ResultKind;
    use crate::store::StoreError;

    #[test]
    fn coordinator_errors_surface_with_documented_kinds() {
        let order_id = OrderId("ORD-001".to_owned());
        assert_eq!(
            CoordinatorError::Conflict {
                order_id: order_id.clone(),
                expected: OrderStatus::Shipping,
                current: OrderStatus::Delivered,
            }
            .status(),
            ResultKind::Failed
        );
        assert_eq!(
            CoordinatorError::InvalidState { order_id: order_id.clone(), status: OrderStatus::Cancelled }
                .status(),
            ResultKind::Failed
        );
        assert_eq!(CoordinatorError::AmbiguousReference.status(), ResultKind::NeedSelection);
        assert_eq!(CoordinatorError::Forbidden { order_id }.status(), ResultKind::Error);
        assert_eq!(CoordinatorError::NoMatchingOrder.status(), ResultKind::Error);
    }

    #[test]
    fn coordinator_error_serializes_with_kind_tag() {
        let value = serde_json::to_value(CoordinatorError::Conflict {
            order_id: OrderId("ORD-001".to_owned()),
            expected: OrderStatus::Shipping,
            current: OrderStatus::Delivered,
        })
        .expect("serialize");

        assert_eq!(value["kind"], "conflict");
        assert_eq!(value["expected"], "Shipping");
        assert_eq!(value["current"], "Delivered");
    }

    #[test]
    fn store_failures_become_persistence_errors() {
        let error = CoordinatorError::from(StoreError::Io("disk full".to_owned()));
        assert!(matches!(error, CoordinatorError::Persistence { ref message } if message.contains("disk full")));
        assert_eq!(error.status(), ResultKind::Error);
    }

    #[test]
    fn domain_errors_surface_as_internal_coordinator_errors() {
        let error = CoordinatorError::from(DomainError::InvariantViolation(
            "candidates open while approval pending".to_owned(),
        ));
        assert!(matches!(error, CoordinatorError::Internal { ref message } if message.contains("approval pending")));
        assert_eq!(error.status(), ResultKind::Error);
    }

    #[test]
    fn require_trims_and_refuses_blank_values() {
        assert_eq!(RequestError::require("user_id", "  U1 "), Ok("U1"));

        let error = RequestError::require("user_id", " \t ").expect_err("blank");
        assert_eq!(error, RequestError::EmptyField { field: "user_id" });
        assert_eq!(error.to_string(), "user_id must not be empty");
        assert_eq!(error.error_class(), "empty_field");
    }

    #[test]
    fn malformed_body_keeps_the_reason_out_of_the_user_message() {
        let error = RequestError::MalformedBody { reason: "missing field `user_id`".to_owned() };
        assert!(error.to_string().contains("missing field"));
        assert!(!error.user_message().contains("user_id"));
        assert_eq!(error.error_class(), "malformed_body");
    }
}
