pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod stores;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{DemoDataset, SeedResult, VerificationResult};
pub use stores::{open_order_store, CsvOrderStore, OrderRow, SqlOrderStore};
