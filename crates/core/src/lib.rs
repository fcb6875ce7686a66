pub mod audit;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod errors;
pub mod lexicon;
pub mod replies;
pub mod resolver;
pub mod result;
pub mod session;
pub mod store;
pub mod transactions;

pub use coordinator::{SweepReport, TransactionCoordinator};
pub use domain::order::{Order, OrderId, OrderStatus};
pub use domain::session::SessionContext;
pub use domain::transaction::{
    ActionType, ApprovalRequest, PendingTransaction, TransactionId, TransactionState,
};
pub use errors::{CoordinatorError, DomainError, RequestError};
pub use resolver::{DisambiguationResolver, Resolution};
pub use result::{CompletedData, Outcome, ResultKind, TransactionResult};
pub use store::{InMemoryOrderStore, OrderStore, StoreError};
