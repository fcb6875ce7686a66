use orderdesk_core::config::StoreBackend;
use orderdesk_db::{connect_with_settings, migrations, CsvOrderStore};

use crate::commands::{
    build_runtime, load_config, CommandResult, EXIT_STORE_OPEN, EXIT_STORE_OPERATION,
};
use crate::GlobalArgs;

pub fn run(global: &GlobalArgs) -> CommandResult {
    let config = match load_config("migrate", global) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("migrate") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        match config.store.backend() {
            StoreBackend::Sqlite(url) => {
                let pool = connect_with_settings(
                    &url,
                    config.store.max_connections,
                    config.store.timeout_secs,
                )
                .await
                .map_err(|error| ("store_connectivity", error.to_string(), EXIT_STORE_OPEN))?;
                migrations::run_pending(&pool)
                    .await
                    .map_err(|error| ("migration", error.to_string(), EXIT_STORE_OPERATION))?;
                pool.close().await;
                Ok("applied pending migrations".to_string())
            }
            StoreBackend::Csv(path) => {
                let store = CsvOrderStore::new(&path);
                let created = store
                    .ensure_file()
                    .await
                    .map_err(|error| ("store_io", error.to_string(), EXIT_STORE_OPEN))?;
                Ok(if created {
                    format!("created empty order file {}", path.display())
                } else {
                    format!("order file {} already present; csv engine has no migrations", path.display())
                })
            }
        }
    });

    match result {
        Ok(message) => CommandResult::success("migrate", message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
