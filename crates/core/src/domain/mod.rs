pub mod order;
pub mod session;
pub mod transaction;
