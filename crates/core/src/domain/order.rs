use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Placed,
    Preparing,
    Shipping,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] =
        [Self::Placed, Self::Preparing, Self::Shipping, Self::Delivered, Self::Cancelled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Placed => "Placed",
            Self::Preparing => "Preparing",
            Self::Shipping => "Shipping",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Accepts the stored PascalCase form, any casing of it, and the legacy
    /// `shipped` / `processing` encodings found in older tables.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "placed" => Some(Self::Placed),
            "preparing" | "processing" => Some(Self::Preparing),
            "shipping" | "shipped" => Some(Self::Shipping),
            "delivered" => Some(Self::Delivered),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Placed => "주문 접수",
            Self::Preparing => "상품 준비 중",
            Self::Shipping => "배송 중",
            Self::Delivered => "배송 완료",
            Self::Cancelled => "취소됨",
        }
    }

    /// Lower sorts first when several orders compete for attention.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Shipping => 0,
            Self::Preparing => 1,
            Self::Placed => 2,
            Self::Delivered => 3,
            Self::Cancelled => 4,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub item: String,
    pub status: OrderStatus,
    pub customer_id: Option<String>,
    pub order_date: NaiveDate,
}

impl Order {
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self.status, next),
            (OrderStatus::Placed, OrderStatus::Cancelled)
                | (OrderStatus::Preparing, OrderStatus::Cancelled)
                | (OrderStatus::Shipping, OrderStatus::Cancelled)
                | (OrderStatus::Preparing, OrderStatus::Delivered)
                | (OrderStatus::Shipping, OrderStatus::Delivered)
        )
    }

    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidOrderTransition { from: self.status, to: next })
    }

    /// Orders without a recorded customer are legacy rows and readable by anyone.
    pub fn is_accessible_by(&self, user_id: &str) -> bool {
        match self.customer_id.as_deref() {
            Some(owner) => owner == user_id,
            None => true,
        }
    }

    pub fn is_legacy(&self) -> bool {
        self.customer_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{Order, OrderId, OrderStatus};
    use crate::errors::DomainError;

    fn order(status: OrderStatus) -> Order {
        Order {
            id: OrderId("ORD-100".to_owned()),
            item: "사운드바".to_owned(),
            status,
            customer_id: Some("U1".to_owned()),
            order_date: NaiveDate::from_ymd_opt(2026, 10, 1).expect("valid date"),
        }
    }

    #[test]
    fn open_orders_can_be_cancelled() {
        for status in [OrderStatus::Placed, OrderStatus::Preparing, OrderStatus::Shipping] {
            let mut order = order(status);
            order.transition_to(OrderStatus::Cancelled).expect("open order -> cancelled");
            assert_eq!(order.status, OrderStatus::Cancelled);
        }
    }

    #[test]
    fn placed_orders_cannot_jump_to_delivered() {
        let mut order = order(OrderStatus::Placed);
        let error = order.transition_to(OrderStatus::Delivered).expect_err("placed->delivered");
        assert_eq!(
            error,
            DomainError::InvalidOrderTransition {
                from: OrderStatus::Placed,
                to: OrderStatus::Delivered
            }
        );
    }

    #[test]
    fn terminal_statuses_reject_every_transition() {
        for terminal in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            let order = order(terminal);
            assert!(terminal.is_terminal());
            for next in OrderStatus::ALL {
                assert!(!order.can_transition_to(next), "{terminal} -> {next} must be refused");
            }
        }
    }

    #[test]
    fn parse_accepts_legacy_encodings() {
        assert_eq!(OrderStatus::parse("Shipping"), Some(OrderStatus::Shipping));
        assert_eq!(OrderStatus::parse(" shipped "), Some(OrderStatus::Shipping));
        assert_eq!(OrderStatus::parse("processing"), Some(OrderStatus::Preparing));
        assert_eq!(OrderStatus::parse("CANCELLED"), Some(OrderStatus::Cancelled));
        assert_eq!(OrderStatus::parse("lost"), None);
    }

    #[test]
    fn legacy_rows_are_accessible_to_any_caller() {
        let mut order = order(OrderStatus::Preparing);
        assert!(order.is_accessible_by("U1"));
        assert!(!order.is_accessible_by("U2"));

        order.customer_id = None;
        assert!(order.is_accessible_by("U2"));
    }
}
