//! Two-phase propose / approve / commit protocol over the order store.
//!
//! Locking: every entry point that mutates state holds the affected user's
//! mutex for its whole duration, and every load-then-read or
//! load-compare-save sequence additionally holds the store mutex. Locks are
//! always taken user first, store second.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, TracingAuditSink};
use crate::clock::{Clock, SystemClock};
use crate::config::CoordinatorConfig;
use crate::domain::order::{Order, OrderId};
use crate::domain::session::SessionContext;
use crate::domain::transaction::{
    ActionType, ApprovalRequest, PendingTransaction, TransactionId, TransactionState,
};
use crate::errors::CoordinatorError;
use crate::lexicon::{self, Intent, ReplyDecision};
use crate::replies;
use crate::resolver::{self, DisambiguationResolver, Resolution, ResolveRequest};
use crate::result::{CompletedData, Outcome, TransactionResult};
use crate::session::SessionStore;
use crate::store::OrderStore;
use crate::transactions::PendingTransactionTable;

#[derive(Default)]
struct UserLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl UserLocks {
    async fn acquire(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let handle = {
            let mut locks = match self.locks.lock() {
                Ok(locks) => locks,
                Err(poisoned) => poisoned.into_inner(),
            };
            locks.entry(user_id.to_owned()).or_default().clone()
        };
        handle.lock_owned().await
    }

    /// Drops lock handles nobody is holding or waiting on.
    fn forget(&self, user_ids: &[String]) {
        let mut locks = match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        for user_id in user_ids {
            if locks.get(user_id).is_some_and(|handle| Arc::strong_count(handle) == 1) {
                locks.remove(user_id);
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_transactions: Vec<TransactionId>,
    pub evicted_sessions: Vec<String>,
}

pub struct TransactionCoordinator {
    store: Arc<dyn OrderStore>,
    sessions: SessionStore,
    transactions: PendingTransactionTable,
    resolver: DisambiguationResolver,
    config: CoordinatorConfig,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
    user_locks: UserLocks,
    store_lock: AsyncMutex<()>,
}

impl TransactionCoordinator {
    pub fn new(store: Arc<dyn OrderStore>, config: CoordinatorConfig) -> Self {
        Self {
            store,
            sessions: SessionStore::default(),
            transactions: PendingTransactionTable::default(),
            resolver: DisambiguationResolver::new(config.recency_window_days),
            config,
            clock: Arc::new(SystemClock),
            audit: Arc::new(TracingAuditSink),
            user_locks: UserLocks::default(),
            store_lock: AsyncMutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn store(&self) -> &Arc<dyn OrderStore> {
        &self.store
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub async fn session(&self, user_id: &str) -> SessionContext {
        self.sessions.get(user_id).await
    }

    pub async fn pending_transaction(&self, id: &TransactionId) -> Option<PendingTransaction> {
        self.transactions.get(id).await
    }

    /// Handles one conversational turn for `user_id`.
    pub async fn process(&self, intent: &str, free_text: &str, user_id: &str) -> TransactionResult {
        let _user_guard = self.user_locks.acquire(user_id).await;
        let now = self.clock.now();
        self.sessions.touch(user_id, now).await;

        if let Some(pending) = self.transactions.find_proposed_for_user(user_id).await {
            let reply = lexicon::classify_reply(free_text);
            if pending.is_expired_at(now) {
                let transaction_id = pending.id.clone();
                self.expire_locked(pending).await;
                // A late yes or no still answers the lapsed approval.
                if reply != ReplyDecision::Undecided {
                    return self.failure(CoordinatorError::Expired { transaction_id });
                }
            } else {
                match reply {
                    ReplyDecision::Affirmative => return self.commit_locked(pending).await,
                    ReplyDecision::Negative => {
                        return self.discard_locked(pending, TransactionState::Rejected).await
                    }
                    ReplyDecision::Undecided => {}
                }
            }
        } else {
            self.drop_dangling_pending(user_id).await;
        }

        let session = self.sessions.get(user_id).await;
        let Some(mut intent_kind) = lexicon::normalize_intent(intent, free_text) else {
            debug!(
                event_name = "coordinator.intent.unsupported",
                user_id = %user_id,
                intent = %intent,
                "intent is not handled by the order desk"
            );
            return self.failure(CoordinatorError::UnsupportedIntent { intent: intent.to_owned() });
        };
        if session.has_open_candidates() && intent_kind != Intent::Cancel {
            intent_kind = Intent::StatusCheck;
        }

        debug!(
            event_name = "coordinator.turn.routed",
            user_id = %user_id,
            intent = intent_kind.as_str(),
            candidates_open = session.has_open_candidates(),
            "conversation turn routed"
        );

        match intent_kind {
            Intent::StatusCheck => self.status_check(user_id, free_text, &session, now).await,
            Intent::Cancel => self.propose_cancel(user_id, free_text, &session, now).await,
        }
    }

    /// Approves and commits a pending transaction.
    pub async fn execute(&self, transaction_id: &TransactionId) -> TransactionResult {
        let Some(owner) = self.owner_of(transaction_id).await else {
            return self.transaction_not_found(transaction_id);
        };
        let _user_guard = self.user_locks.acquire(&owner).await;
        match self.transactions.get(transaction_id).await {
            Some(transaction) => self.commit_locked(transaction).await,
            None => self.transaction_not_found(transaction_id),
        }
    }

    /// Discards a pending transaction without touching the order.
    pub async fn reject(&self, transaction_id: &TransactionId) -> TransactionResult {
        let Some(owner) = self.owner_of(transaction_id).await else {
            return self.transaction_not_found(transaction_id);
        };
        let _user_guard = self.user_locks.acquire(&owner).await;
        match self.transactions.get(transaction_id).await {
            Some(transaction) => self.discard_locked(transaction, TransactionState::Rejected).await,
            None => self.transaction_not_found(transaction_id),
        }
    }

    /// True while the user has an open candidate list or a live approval.
    pub async fn has_active_context(&self, user_id: &str) -> bool {
        let session = self.sessions.get(user_id).await;
        if session.has_open_candidates() {
            return true;
        }
        let Some(transaction_id) = session.pending_transaction_id else {
            return false;
        };
        let now = self.clock.now();
        self.transactions
            .get(&transaction_id)
            .await
            .is_some_and(|transaction| transaction.is_proposed() && !transaction.is_expired_at(now))
    }

    /// Expires stale approvals and evicts idle sessions.
    pub async fn sweep_expired(&self) -> SweepReport {
        let now = self.clock.now();
        let mut report = SweepReport::default();

        for stale in self.transactions.expired(now).await {
            let _user_guard = self.user_locks.acquire(&stale.owner_user_id).await;
            let Some(current) = self.transactions.get(&stale.id).await else {
                continue;
            };
            if current.is_proposed() && current.is_expired_at(now) {
                report.expired_transactions.push(current.id.clone());
                self.expire_locked(current).await;
            }
        }

        let cutoff = now - self.config.session_idle_ttl();
        report.evicted_sessions = self.sessions.evict_idle(cutoff).await;
        self.user_locks.forget(&report.evicted_sessions);

        if !report.expired_transactions.is_empty() || !report.evicted_sessions.is_empty() {
            info!(
                event_name = "coordinator.sweep.completed",
                expired_transactions = report.expired_transactions.len(),
                evicted_sessions = report.evicted_sessions.len(),
                "expired approvals and idle sessions swept"
            );
        }
        report
    }

    async fn status_check(
        &self,
        user_id: &str,
        free_text: &str,
        session: &SessionContext,
        now: DateTime<Utc>,
    ) -> TransactionResult {
        let resolution = {
            let _store_guard = self.store_lock.lock().await;
            if let Err(error) = self.store.load().await {
                return self.store_failure(user_id, error.into());
            }
            let request = ResolveRequest {
                text: free_text,
                customer_id: user_id,
                candidates: session.candidate_order_ids.as_deref(),
                today: now.date_naive(),
            };
            match self.resolver.resolve(self.store.as_ref(), request).await {
                Ok(resolution) => resolution,
                Err(error) => return self.store_failure(user_id, error.into()),
            }
        };

        match resolution {
            Resolution::NotFound { reference } => {
                self.sessions.clear_candidates(user_id).await;
                let error = match reference {
                    Some(order_id) => CoordinatorError::OrderNotFound { order_id },
                    None => CoordinatorError::NoMatchingOrder,
                };
                self.failure(error)
            }
            Resolution::Single { order, via } => {
                self.sessions.clear_candidates(user_id).await;
                if let Err(error) = self.check_access(&order, user_id) {
                    return self.failure(error);
                }
                self.sessions.set_last_viewed(user_id, order.id.clone()).await;
                self.audit.emit(
                    AuditEvent::new(
                        user_id,
                        "order.viewed",
                        AuditCategory::Resolution,
                        AuditOutcome::Success,
                        now,
                    )
                    .for_order(&order.id)
                    .with_metadata("resolved_via", format!("{via:?}")),
                );
                let message = replies::order_status(&order);
                TransactionResult::new(
                    Outcome::Completed { data: CompletedData::Order(order) },
                    message,
                )
            }
            Resolution::Multiple(orders) => {
                let approval_open = self.transactions.find_proposed_for_user(user_id).await.is_some();
                if !approval_open {
                    let ids: Vec<OrderId> = orders.iter().map(|order| order.id.clone()).collect();
                    if let Err(error) = self.sessions.set_candidates(user_id, ids).await {
                        return self.failure(error.into());
                    }
                    self.audit.emit(
                        AuditEvent::new(
                            user_id,
                            "session.candidates_opened",
                            AuditCategory::Session,
                            AuditOutcome::Success,
                            now,
                        )
                        .with_metadata("candidate_count", orders.len().to_string()),
                    );
                }
                let message = replies::candidate_list(&orders, self.resolver.recency_window_days());
                TransactionResult::new(Outcome::MultipleChoice { data: orders }, message)
            }
        }
    }

    async fn propose_cancel(
        &self,
        user_id: &str,
        free_text: &str,
        session: &SessionContext,
        now: DateTime<Utc>,
    ) -> TransactionResult {
        if let Some(existing) = self.transactions.find_proposed_for_user(user_id).await {
            return self.represent_pending(user_id, existing).await;
        }

        let target = {
            let _store_guard = self.store_lock.lock().await;
            if let Err(error) = self.store.load().await {
                return self.store_failure(user_id, error.into());
            }
            match self.locate_cancel_target(free_text, session).await {
                Ok(target) => target,
                Err(error) => return self.failure(error),
            }
        };

        let Some(order) = target else {
            return self.failure(CoordinatorError::AmbiguousReference);
        };
        if let Err(error) = self.check_access(&order, user_id) {
            return self.failure(error);
        }
        if !order.can_transition_to(ActionType::CancelOrder.target_status()) {
            return self.failure(CoordinatorError::InvalidState {
                order_id: order.id.clone(),
                status: order.status,
            });
        }

        let transaction = PendingTransaction::propose(
            ActionType::CancelOrder,
            &order,
            user_id,
            now,
            self.config.pending_ttl(),
        );
        self.sessions.clear_candidates(user_id).await;
        if let Err(error) = self.transactions.insert(transaction.clone()).await {
            return self.failure(error.into());
        }
        if let Err(error) = self.sessions.set_pending(user_id, transaction.id.clone()).await {
            self.transactions.remove(&transaction.id).await;
            return self.failure(error.into());
        }
        self.sessions.set_last_viewed(user_id, order.id.clone()).await;

        self.audit.emit(
            AuditEvent::new(
                user_id,
                "transaction.proposed",
                AuditCategory::Transaction,
                AuditOutcome::Success,
                now,
            )
            .for_order(&order.id)
            .for_transaction(&transaction.id)
            .with_metadata("action_type", transaction.action_type.as_str())
            .with_metadata("expected_prior_status", transaction.expected_prior_status.as_str()),
        );
        info!(
            event_name = "coordinator.transaction.proposed",
            user_id = %user_id,
            order_id = %order.id,
            transaction_id = %transaction.id,
            expected_prior_status = transaction.expected_prior_status.as_str(),
            "cancellation proposed and awaiting approval"
        );

        let message = replies::approval_prompt(&order, &transaction);
        TransactionResult::new(
            Outcome::PendingApproval {
                approval_request: ApprovalRequest::for_transaction(&transaction, &order),
                data: transaction,
            },
            message,
        )
    }

    /// Explicit reference, then candidate item match, then the last viewed order.
    async fn locate_cancel_target(
        &self,
        free_text: &str,
        session: &SessionContext,
    ) -> Result<Option<Order>, CoordinatorError> {
        if let Some(reference) = lexicon::extract_order_reference(free_text) {
            return match self.store.find_by_id(&reference).await? {
                Some(order) => Ok(Some(order)),
                None => Err(CoordinatorError::OrderNotFound { order_id: reference }),
            };
        }

        if let Some(candidate_ids) = session.candidate_order_ids.as_deref() {
            let candidates = resolver::load_candidates(self.store.as_ref(), candidate_ids).await?;
            if let Some(order) = resolver::match_candidate(free_text, &candidates) {
                return Ok(Some(order));
            }
        }

        match &session.last_viewed_order_id {
            Some(order_id) => match self.store.find_by_id(order_id).await? {
                Some(order) => Ok(Some(order)),
                None => Err(CoordinatorError::OrderNotFound { order_id: order_id.clone() }),
            },
            None => Ok(None),
        }
    }

    async fn represent_pending(
        &self,
        user_id: &str,
        existing: PendingTransaction,
    ) -> TransactionResult {
        let order = {
            let _store_guard = self.store_lock.lock().await;
            if let Err(error) = self.store.load().await {
                return self.store_failure(user_id, error.into());
            }
            match self.store.find_by_id(&existing.target_order_id).await {
                Ok(Some(order)) => order,
                Ok(None) => {
                    let order_id = existing.target_order_id.clone();
                    self.settle(existing, TransactionState::ConflictFailed).await;
                    return self.failure(CoordinatorError::OrderNotFound { order_id });
                }
                Err(error) => return self.store_failure(user_id, error.into()),
            }
        };

        let message = replies::approval_still_pending(&order, &existing);
        TransactionResult::new(
            Outcome::PendingApproval {
                approval_request: ApprovalRequest::for_transaction(&existing, &order),
                data: existing,
            },
            message,
        )
    }

    /// Caller holds the owner's user lock.
    async fn commit_locked(&self, mut transaction: PendingTransaction) -> TransactionResult {
        let now = self.clock.now();
        let user_id = transaction.owner_user_id.clone();
        if transaction.is_expired_at(now) {
            let transaction_id = transaction.id.clone();
            self.expire_locked(transaction).await;
            return self.failure(CoordinatorError::Expired { transaction_id });
        }

        let committed = {
            let _store_guard = self.store_lock.lock().await;
            if let Err(error) = self.store.load().await {
                return self.store_failure(&user_id, error.into());
            }
            let mut order = match self.store.find_by_id(&transaction.target_order_id).await {
                Ok(Some(order)) => order,
                Ok(None) => {
                    let order_id = transaction.target_order_id.clone();
                    self.settle(transaction, TransactionState::ConflictFailed).await;
                    return self.failure(CoordinatorError::OrderNotFound { order_id });
                }
                Err(error) => return self.store_failure(&user_id, error.into()),
            };

            if order.status != transaction.expected_prior_status {
                let error = CoordinatorError::Conflict {
                    order_id: order.id.clone(),
                    expected: transaction.expected_prior_status,
                    current: order.status,
                };
                warn!(
                    event_name = "coordinator.transaction.conflict",
                    user_id = %user_id,
                    order_id = %order.id,
                    transaction_id = %transaction.id,
                    expected = transaction.expected_prior_status.as_str(),
                    current = order.status.as_str(),
                    "order changed since the proposal; commit refused"
                );
                self.audit.emit(
                    AuditEvent::new(
                        &user_id,
                        "transaction.conflict",
                        AuditCategory::Transaction,
                        AuditOutcome::Failed,
                        now,
                    )
                    .for_order(&order.id)
                    .for_transaction(&transaction.id)
                    .with_metadata("expected", transaction.expected_prior_status.as_str())
                    .with_metadata("current", order.status.as_str()),
                );
                self.settle(transaction, TransactionState::ConflictFailed).await;
                return self.failure(error);
            }

            if order.transition_to(transaction.new_status).is_err() {
                let error = CoordinatorError::InvalidState {
                    order_id: order.id.clone(),
                    status: order.status,
                };
                self.settle(transaction, TransactionState::ConflictFailed).await;
                return self.failure(error);
            }

            let written = match self.store.upsert(order.clone()).await {
                Ok(()) => self.store.save().await,
                Err(error) => Err(error),
            };
            if let Err(error) = written {
                // Working copy may hold the unsaved change; the next load discards it.
                if let Err(reload) = self.store.load().await {
                    warn!(
                        event_name = "coordinator.store.reload_failed",
                        error = %reload,
                        "order store reload after failed save also failed"
                    );
                }
                return self.store_failure(&user_id, error.into());
            }
            order
        };

        if let Err(error) = transaction.transition_to(TransactionState::Committed) {
            warn!(event_name = "coordinator.transaction.state", error = %error, "unexpected transaction state");
        }
        self.transactions.remove(&transaction.id).await;
        self.sessions.clear_pending(&user_id, &transaction.id).await;
        let session = self.sessions.get(&user_id).await;
        if session.last_viewed_order_id.as_ref() == Some(&committed.id) && committed.status.is_terminal() {
            self.sessions.clear_last_viewed(&user_id).await;
        }

        self.audit.emit(
            AuditEvent::new(
                &user_id,
                "transaction.committed",
                AuditCategory::Transaction,
                AuditOutcome::Success,
                now,
            )
            .for_order(&committed.id)
            .for_transaction(&transaction.id)
            .with_metadata("new_status", committed.status.as_str()),
        );
        info!(
            event_name = "coordinator.transaction.committed",
            user_id = %user_id,
            order_id = %committed.id,
            transaction_id = %transaction.id,
            new_status = committed.status.as_str(),
            "pending transaction committed"
        );

        let message = replies::committed(&committed);
        TransactionResult::new(
            Outcome::Completed { data: CompletedData::Commit { order: committed, transaction } },
            message,
        )
    }

    /// Caller holds the owner's user lock.
    async fn discard_locked(
        &self,
        transaction: PendingTransaction,
        state: TransactionState,
    ) -> TransactionResult {
        let now = self.clock.now();
        let settled = self.settle(transaction, state).await;
        self.audit.emit(
            AuditEvent::new(
                &settled.owner_user_id,
                "transaction.rejected",
                AuditCategory::Transaction,
                AuditOutcome::Rejected,
                now,
            )
            .for_order(&settled.target_order_id)
            .for_transaction(&settled.id),
        );
        info!(
            event_name = "coordinator.transaction.rejected",
            user_id = %settled.owner_user_id,
            order_id = %settled.target_order_id,
            transaction_id = %settled.id,
            "pending transaction discarded"
        );
        let message = replies::rejected(&settled);
        TransactionResult::new(Outcome::Cancelled { data: settled }, message)
    }

    /// Caller holds the owner's user lock.
    async fn expire_locked(&self, transaction: PendingTransaction) {
        let now = self.clock.now();
        let settled = self.settle(transaction, TransactionState::Expired).await;
        self.audit.emit(
            AuditEvent::new(
                &settled.owner_user_id,
                "transaction.expired",
                AuditCategory::Transaction,
                AuditOutcome::Failed,
                now,
            )
            .for_order(&settled.target_order_id)
            .for_transaction(&settled.id),
        );
        info!(
            event_name = "coordinator.transaction.expired",
            user_id = %settled.owner_user_id,
            order_id = %settled.target_order_id,
            transaction_id = %settled.id,
            "pending transaction expired before approval"
        );
    }

    /// Moves the transaction to its final state and unlinks it everywhere.
    async fn settle(
        &self,
        mut transaction: PendingTransaction,
        state: TransactionState,
    ) -> PendingTransaction {
        if let Err(error) = transaction.transition_to(state) {
            warn!(event_name = "coordinator.transaction.state", error = %error, "unexpected transaction state");
        }
        self.transactions.remove(&transaction.id).await;
        self.sessions.clear_pending(&transaction.owner_user_id, &transaction.id).await;
        transaction
    }

    /// Clears a session pending id whose transaction is gone.
    async fn drop_dangling_pending(&self, user_id: &str) {
        if let Some(transaction_id) = self.sessions.get(user_id).await.pending_transaction_id {
            if self.transactions.get(&transaction_id).await.is_none() {
                self.sessions.clear_pending(user_id, &transaction_id).await;
            }
        }
    }

    async fn owner_of(&self, transaction_id: &TransactionId) -> Option<String> {
        self.transactions.get(transaction_id).await.map(|transaction| transaction.owner_user_id)
    }

    fn check_access(&self, order: &Order, user_id: &str) -> Result<(), CoordinatorError> {
        if !order.is_accessible_by(user_id) {
            warn!(
                event_name = "coordinator.access.denied",
                user_id = %user_id,
                order_id = %order.id,
                "order belongs to another customer"
            );
            return Err(CoordinatorError::Forbidden { order_id: order.id.clone() });
        }
        if order.is_legacy() {
            debug!(
                event_name = "coordinator.access.legacy_order",
                user_id = %user_id,
                order_id = %order.id,
                "order has no recorded customer; access allowed"
            );
        }
        Ok(())
    }

    fn transaction_not_found(&self, transaction_id: &TransactionId) -> TransactionResult {
        self.failure(CoordinatorError::TransactionNotFound { transaction_id: transaction_id.clone() })
    }

    fn store_failure(&self, user_id: &str, error: CoordinatorError) -> TransactionResult {
        warn!(
            event_name = "coordinator.store.failed",
            user_id = %user_id,
            error = %error,
            "order store operation failed"
        );
        self.failure(error)
    }

    fn failure(&self, error: CoordinatorError) -> TransactionResult {
        let message = replies::failure(&error, self.resolver.recency_window_days());
        TransactionResult::from_error(error, message)
    }
}
