//! Keyword tables and matchers that read meaning out of free text.
//!
//! Everything here is pure and table driven: reply classification, intent
//! normalization, status-class hints and the structured order reference.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::order::{OrderId, OrderStatus};

/// Accepted reply words. A token must equal an entry exactly; conjugated
/// forms are listed rather than derived, so "진행중" or "그래서" never count.
const AFFIRMATIVE: &[&str] = &[
    "네", "네네", "네요", "예", "예요", "응", "응응", "그래", "그래요", "좋아", "좋아요", "좋습니다",
    "맞아", "맞아요", "맞습니다", "승인", "승인해", "승인해요", "승인합니다", "진행", "진행해",
    "진행해줘", "진행해요", "진행해주세요", "진행합니다", "yes", "y", "yep", "ok", "okay", "sure",
    "confirm", "approve",
];

const NEGATIVE: &[&str] = &[
    "아니", "아니요", "아니오", "아뇨", "싫어", "싫어요", "그만", "그만해", "그만해요", "됐어",
    "됐어요", "됐습니다", "거절", "거절해", "거절합니다", "안해", "안해요", "안할래", "안할래요",
    "no", "n", "nope", "reject", "deny",
];

/// Multi-word replies matched against the whitespace-folded text.
const NEGATIVE_PHRASES: &[&str] = &["안 해", "하지 마", "don't"];

const CANCEL_HINTS: &[&str] = &["취소", "cancel", "철회"];

const CANCELLED_HISTORY_HINTS: &[&str] =
    &["취소된", "취소한", "취소내역", "취소됐", "cancelled", "canceled"];

const HISTORICAL_HINTS: &[&str] = &["배송완료", "배달완료", "도착한", "받은", "delivered"];

const ACTIVE_HINTS: &[&str] =
    &["배송중", "준비중", "진행중", "오고있", "shipping", "preparing", "intransit"];

static ORDER_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^A-Za-z0-9])(ORD-\d+)").expect("valid order reference regex")
});

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyDecision {
    Affirmative,
    Negative,
    Undecided,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    StatusCheck,
    Cancel,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StatusCheck => "status_check",
            Self::Cancel => "cancel",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusClass {
    Active,
    Historical,
    Cancelled,
}

impl StatusClass {
    pub fn statuses(&self) -> &'static [OrderStatus] {
        match self {
            Self::Active => &[OrderStatus::Preparing, OrderStatus::Shipping],
            Self::Historical => &[OrderStatus::Delivered],
            Self::Cancelled => &[OrderStatus::Cancelled],
        }
    }
}

/// Statuses eligible for the recency scan when the text names no class.
pub const DEFAULT_SCAN_STATUSES: &[OrderStatus] = &[
    OrderStatus::Placed,
    OrderStatus::Preparing,
    OrderStatus::Shipping,
    OrderStatus::Delivered,
];

/// Lowercases and strips whitespace so item names and phrases compare loosely.
pub fn fold(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).flat_map(char::to_lowercase).collect()
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

fn contains_any(folded: &str, table: &[&str]) -> bool {
    table.iter().any(|entry| folded.contains(&fold(entry)))
}

pub fn classify_reply(text: &str) -> ReplyDecision {
    let mut affirmative = false;
    let mut negative = false;
    for token in tokens(text) {
        affirmative |= AFFIRMATIVE.contains(&token.as_str());
        negative |= NEGATIVE.contains(&token.as_str());
    }
    let lowered = text.to_lowercase();
    negative |= NEGATIVE_PHRASES.iter().any(|phrase| lowered.contains(phrase));

    match (affirmative, negative) {
        (true, false) => ReplyDecision::Affirmative,
        (false, true) => ReplyDecision::Negative,
        _ => ReplyDecision::Undecided,
    }
}

/// Maps a classifier intent onto the two flows the desk handles.
///
/// The generic `transaction` / `order` buckets are split by keyword hints; a
/// question about already-cancelled orders is a lookup, not a cancellation.
pub fn normalize_intent(intent: &str, text: &str) -> Option<Intent> {
    match intent.trim().to_ascii_lowercase().as_str() {
        "status_check" | "order_status" | "lookup" => Some(Intent::StatusCheck),
        "cancel" | "cancel_order" => Some(Intent::Cancel),
        "transaction" | "order" => {
            let folded = fold(text);
            if contains_any(&folded, CANCELLED_HISTORY_HINTS) {
                Some(Intent::StatusCheck)
            } else if contains_any(&folded, CANCEL_HINTS) {
                Some(Intent::Cancel)
            } else {
                Some(Intent::StatusCheck)
            }
        }
        _ => None,
    }
}

pub fn status_class_hint(text: &str) -> Option<StatusClass> {
    let folded = fold(text);
    if contains_any(&folded, CANCELLED_HISTORY_HINTS) {
        Some(StatusClass::Cancelled)
    } else if contains_any(&folded, HISTORICAL_HINTS) {
        Some(StatusClass::Historical)
    } else if contains_any(&folded, ACTIVE_HINTS) {
        Some(StatusClass::Active)
    } else {
        None
    }
}

pub fn extract_order_reference(text: &str) -> Option<OrderId> {
    ORDER_REFERENCE
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|found| OrderId(found.as_str().to_ascii_uppercase()))
}

#[cfg(test)]
mod tests {
    use super::{
        classify_reply, extract_order_reference, fold, normalize_intent, status_class_hint,
        Intent, ReplyDecision, StatusClass,
    };

    #[test]
    fn affirmative_replies_include_conjugated_forms() {
        for reply in ["네", "네, 취소해주세요", "좋아요", "응 진행해", "Yes please", "OK!"] {
            assert_eq!(classify_reply(reply), ReplyDecision::Affirmative, "{reply}");
        }
    }

    #[test]
    fn negative_replies_include_phrases() {
        for reply in ["아니요", "아니 됐어", "안 해요", "no thanks", "Nope"] {
            assert_eq!(classify_reply(reply), ReplyDecision::Negative, "{reply}");
        }
    }

    #[test]
    fn mixed_or_unrelated_replies_stay_undecided() {
        for reply in ["네 아니요", "무선 마우스는 언제 와요?", "", "now what", "취소"] {
            assert_eq!(classify_reply(reply), ReplyDecision::Undecided, "{reply}");
        }
    }

    #[test]
    fn words_that_merely_start_like_a_reply_stay_undecided() {
        for text in [
            "진행중인 주문 보여줘",
            "그래서 언제 와요?",
            "아니면 모니터는?",
            "좋아하는 사운드바 어디야",
            "네이버페이로 결제한 거",
            "승인번호 알려줘",
        ] {
            assert_eq!(classify_reply(text), ReplyDecision::Undecided, "{text}");
        }
    }

    #[test]
    fn listed_polite_forms_are_recognised() {
        for reply in ["그래요", "진행해주세요", "맞습니다", "네요"] {
            assert_eq!(classify_reply(reply), ReplyDecision::Affirmative, "{reply}");
        }
        for reply in ["아니오", "싫어요", "거절합니다", "됐어요"] {
            assert_eq!(classify_reply(reply), ReplyDecision::Negative, "{reply}");
        }
    }

    #[test]
    fn generic_bucket_splits_on_cancel_wording() {
        assert_eq!(normalize_intent("transaction", "주문 취소해줘"), Some(Intent::Cancel));
        assert_eq!(normalize_intent("order", "please cancel it"), Some(Intent::Cancel));
        assert_eq!(normalize_intent("transaction", "내 주문 어디쯤이야"), Some(Intent::StatusCheck));
        assert_eq!(normalize_intent("transaction", "취소된 주문 보여줘"), Some(Intent::StatusCheck));
        assert_eq!(normalize_intent("order", "my cancelled orders"), Some(Intent::StatusCheck));
    }

    #[test]
    fn explicit_intents_ignore_text_and_unknown_intents_are_refused() {
        assert_eq!(normalize_intent("STATUS_CHECK", "취소해줘"), Some(Intent::StatusCheck));
        assert_eq!(normalize_intent("cancel_order", ""), Some(Intent::Cancel));
        assert_eq!(normalize_intent("faq", "반품 정책"), None);
    }

    #[test]
    fn status_class_hints_prefer_cancelled_then_historical() {
        assert_eq!(status_class_hint("취소 내역 알려줘"), Some(StatusClass::Cancelled));
        assert_eq!(status_class_hint("배송 완료된 주문"), Some(StatusClass::Historical));
        assert_eq!(status_class_hint("배송중인 거"), Some(StatusClass::Active));
        assert_eq!(status_class_hint("내 주문"), None);
    }

    #[test]
    fn order_reference_is_found_inside_korean_text() {
        assert_eq!(extract_order_reference("ord-001번 주문").map(|id| id.0), Some("ORD-001".to_owned()));
        assert_eq!(extract_order_reference("주문 ORD-42 상태").map(|id| id.0), Some("ORD-42".to_owned()));
        assert_eq!(extract_order_reference("XORD-1"), None);
        assert_eq!(extract_order_reference("주문 상태"), None);
    }

    #[test]
    fn fold_ignores_case_and_whitespace() {
        assert_eq!(fold(" Sound Bar "), "soundbar");
        assert_eq!(fold("무선 마우스"), "무선마우스");
    }
}
