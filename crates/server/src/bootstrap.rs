use std::sync::Arc;

use orderdesk_core::config::{AppConfig, ConfigError, LoadOptions};
use orderdesk_core::store::StoreError;
use orderdesk_core::TransactionCoordinator;
use orderdesk_db::open_order_store;
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub coordinator: Arc<TransactionCoordinator>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("order store could not be opened: {0}")]
    StoreOpen(#[source] StoreError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        store_url = %config.store.url,
        "starting application bootstrap"
    );

    let store = open_order_store(&config.store).await.map_err(BootstrapError::StoreOpen)?;
    info!(
        event_name = "system.bootstrap.store_opened",
        correlation_id = "bootstrap",
        "order store opened and loaded"
    );

    let coordinator = Arc::new(TransactionCoordinator::new(store, config.coordinator.clone()));
    Ok(Application { config, coordinator })
}
