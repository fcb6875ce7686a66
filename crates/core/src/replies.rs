//! Customer-facing message text for each coordinator outcome.

use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::domain::transaction::PendingTransaction;
use crate::errors::CoordinatorError;

pub fn order_status(order: &Order) -> String {
    format!("{} 주문({})은 현재 '{}' 상태입니다.", order.item, order.id, order.status.label())
}

pub fn candidate_list(orders: &[Order], window_days: u32) -> String {
    let mut message = format!(
        "최근 {window_days}일 이내 주문이 {}건 있습니다. 어떤 주문을 확인할까요?",
        orders.len()
    );
    for (index, order) in orders.iter().enumerate() {
        message.push_str(&format!(
            "\n{}. {} ({}, {}, {})",
            index + 1,
            order.item,
            order.id,
            order.status.label(),
            order.order_date
        ));
    }
    message
}

pub fn approval_prompt(order: &Order, transaction: &PendingTransaction) -> String {
    format!(
        "{} 주문({}, 현재 '{}')에 대해 {}을(를) 진행할까요? 승인하시려면 '네', 원하지 않으시면 '아니요'라고 답해 주세요.",
        order.item,
        order.id,
        transaction.expected_prior_status.label(),
        transaction.action_type.label()
    )
}

pub fn approval_still_pending(order: &Order, transaction: &PendingTransaction) -> String {
    format!(
        "이미 승인을 기다리는 요청이 있습니다. {}",
        approval_prompt(order, transaction)
    )
}

pub fn committed(order: &Order) -> String {
    format!("{} 주문({})이 '{}' 처리되었습니다.", order.item, order.id, order.status.label())
}

pub fn rejected(transaction: &PendingTransaction) -> String {
    format!(
        "주문({})에 대한 {} 요청을 진행하지 않았습니다.",
        transaction.target_order_id,
        transaction.action_type.label()
    )
}

pub fn failure(error: &CoordinatorError, window_days: u32) -> String {
    match error {
        CoordinatorError::OrderNotFound { order_id } => {
            format!("주문번호 {order_id}에 해당하는 주문을 찾을 수 없습니다.")
        }
        CoordinatorError::NoMatchingOrder => {
            format!("최근 {window_days}일 이내의 주문 내역을 찾을 수 없습니다.")
        }
        CoordinatorError::TransactionNotFound { .. } => {
            "처리할 승인 요청을 찾을 수 없습니다. 이미 처리되었거나 만료되었을 수 있습니다.".to_owned()
        }
        CoordinatorError::Forbidden { order_id } => {
            format!("주문({order_id})은 고객님의 주문이 아니어서 조회하거나 변경할 수 없습니다.")
        }
        CoordinatorError::InvalidState { order_id, status } => invalid_state(order_id, *status),
        CoordinatorError::AmbiguousReference => {
            "어떤 주문을 말씀하시는지 알 수 없습니다. 주문번호나 상품명을 알려 주세요.".to_owned()
        }
        CoordinatorError::Conflict { order_id, expected, current } => format!(
            "요청 이후 주문({order_id}) 상태가 '{}'에서 '{}'(으)로 바뀌어 처리하지 못했습니다.",
            expected.label(),
            current.label()
        ),
        CoordinatorError::Expired { .. } => {
            "승인 대기 시간이 지나 요청이 만료되었습니다. 다시 요청해 주세요.".to_owned()
        }
        CoordinatorError::UnsupportedIntent { .. } => {
            "주문 조회와 주문 취소만 도와드릴 수 있습니다.".to_owned()
        }
        CoordinatorError::Persistence { .. } | CoordinatorError::Internal { .. } => {
            "일시적인 오류로 요청을 처리하지 못했습니다. 잠시 후 다시 시도해 주세요.".to_owned()
        }
    }
}

fn invalid_state(order_id: &OrderId, status: OrderStatus) -> String {
    format!("주문({order_id})은 이미 '{}' 상태라 취소할 수 없습니다.", status.label())
}
