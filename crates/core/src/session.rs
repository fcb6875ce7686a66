use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::order::OrderId;
use crate::domain::session::SessionContext;
use crate::domain::transaction::TransactionId;
use crate::errors::DomainError;

/// Per-user session map. Entries are created lazily on first write.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionContext>>,
}

impl SessionStore {
    pub async fn get(&self, user_id: &str) -> SessionContext {
        self.sessions.read().await.get(user_id).cloned().unwrap_or_default()
    }

    pub async fn set_last_viewed(&self, user_id: &str, order_id: OrderId) {
        let mut sessions = self.sessions.write().await;
        sessions.entry(user_id.to_owned()).or_default().last_viewed_order_id = Some(order_id);
    }

    pub async fn clear_last_viewed(&self, user_id: &str) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(user_id) {
            session.last_viewed_order_id = None;
        }
    }

    pub async fn set_candidates(
        &self,
        user_id: &str,
        order_ids: Vec<OrderId>,
    ) -> Result<(), DomainError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(user_id.to_owned()).or_default();
        if session.pending_transaction_id.is_some() {
            return Err(DomainError::InvariantViolation(format!(
                "user {user_id} has a pending approval; candidates cannot be opened"
            )));
        }
        session.candidate_order_ids = Some(order_ids);
        Ok(())
    }

    pub async fn clear_candidates(&self, user_id: &str) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(user_id) {
            session.candidate_order_ids = None;
        }
    }

    pub async fn set_pending(
        &self,
        user_id: &str,
        transaction_id: TransactionId,
    ) -> Result<(), DomainError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(user_id.to_owned()).or_default();
        if session.candidate_order_ids.is_some() {
            return Err(DomainError::InvariantViolation(format!(
                "user {user_id} has open candidates; an approval cannot be pending"
            )));
        }
        if let Some(existing) = &session.pending_transaction_id {
            if existing != &transaction_id {
                return Err(DomainError::InvariantViolation(format!(
                    "user {user_id} already has pending transaction {existing}"
                )));
            }
        }
        session.pending_transaction_id = Some(transaction_id);
        Ok(())
    }

    /// Clears the pending id only when it still points at `transaction_id`.
    pub async fn clear_pending(&self, user_id: &str, transaction_id: &TransactionId) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(user_id) {
            if session.pending_transaction_id.as_ref() == Some(transaction_id) {
                session.pending_transaction_id = None;
            }
        }
    }

    pub async fn touch(&self, user_id: &str, now: DateTime<Utc>) {
        let mut sessions = self.sessions.write().await;
        sessions.entry(user_id.to_owned()).or_default().last_active_at = Some(now);
    }

    /// Drops sessions idle since before `cutoff`. Sessions holding a pending
    /// approval are kept; the transaction sweep owns their lifetime.
    pub async fn evict_idle(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        let mut sessions = self.sessions.write().await;
        let idle: Vec<String> = sessions
            .iter()
            .filter(|(_, session)| session.pending_transaction_id.is_none())
            .filter(|(_, session)| session.last_active_at.map_or(true, |at| at < cutoff))
            .map(|(user_id, _)| user_id.clone())
            .collect();
        for user_id in &idle {
            sessions.remove(user_id);
        }
        idle
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
