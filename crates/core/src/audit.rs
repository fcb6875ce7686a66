use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::order::OrderId;
use crate::domain::transaction::TransactionId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditCategory {
    Session,
    Resolution,
    Transaction,
    Persistence,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Success,
    Rejected,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub user_id: String,
    pub order_id: Option<OrderId>,
    pub transaction_id: Option<TransactionId>,
    pub event_type: String,
    pub category: AuditCategory,
    pub outcome: AuditOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        user_id: impl Into<String>,
        event_type: impl Into<String>,
        category: AuditCategory,
        outcome: AuditOutcome,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            order_id: None,
            transaction_id: None,
            event_type: event_type.into(),
            category,
            outcome,
            metadata: BTreeMap::new(),
            occurred_at,
        }
    }

    pub fn for_order(mut self, order_id: &OrderId) -> Self {
        self.order_id = Some(order_id.clone());
        self
    }

    pub fn for_transaction(mut self, transaction_id: &TransactionId) -> Self {
        self.transaction_id = Some(transaction_id.clone());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn event_types(&self) -> Vec<String> {
        self.events().into_iter().map(|event| event.event_type).collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Forwards audit events to the `tracing` pipeline.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let metadata = serde_json::to_string(&event.metadata).unwrap_or_default();
        tracing::info!(
            event_name = "audit.event",
            audit_event_id = %event.event_id,
            audit_event_type = %event.event_type,
            category = ?event.category,
            outcome = ?event.outcome,
            user_id = %event.user_id,
            order_id = event.order_id.as_ref().map(OrderId::as_str).unwrap_or(""),
            transaction_id = event.transaction_id.as_ref().map(TransactionId::as_str).unwrap_or(""),
            metadata = %metadata,
            "audit event recorded"
        );
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
    use crate::domain::order::OrderId;
    use crate::domain::transaction::TransactionId;

    #[test]
    fn in_memory_sink_records_events_with_correlation_fields() {
        let sink = InMemoryAuditSink::default();
        sink.emit(
            AuditEvent::new(
                "U1",
                "transaction.proposed",
                AuditCategory::Transaction,
                AuditOutcome::Success,
                Utc::now(),
            )
            .for_order(&OrderId("ORD-001".to_owned()))
            .for_transaction(&TransactionId("TXN-1".to_owned()))
            .with_metadata("expected_prior_status", "Shipping"),
        );

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].user_id, "U1");
        assert_eq!(events[0].order_id.as_ref().map(OrderId::as_str), Some("ORD-001"));
        assert_eq!(events[0].transaction_id.as_ref().map(TransactionId::as_str), Some("TXN-1"));
        assert!(events[0].metadata.contains_key("expected_prior_status"));
        assert_eq!(sink.event_types(), vec!["transaction.proposed".to_owned()]);
    }
}
