use orderdesk_core::clock::{Clock, SystemClock};
use orderdesk_db::{open_order_store, DemoDataset};

use crate::commands::{
    build_runtime, load_config, CommandResult, EXIT_STORE_OPEN, EXIT_STORE_OPERATION,
};
use crate::GlobalArgs;

pub fn run(global: &GlobalArgs) -> CommandResult {
    let config = match load_config("seed", global) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let today = SystemClock.today();
    let result = runtime.block_on(async {
        let store = open_order_store(&config.store)
            .await
            .map_err(|error| ("store_open", error.to_string(), EXIT_STORE_OPEN))?;

        let seeded = DemoDataset::load(store.as_ref(), today)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), EXIT_STORE_OPERATION))?;

        let verification = DemoDataset::verify(store.as_ref(), today)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), EXIT_STORE_OPERATION))?;
        if !verification.all_present {
            let failed = failed_checks(&verification.checks);
            return Err(("seed_verification", verification_message(&failed), EXIT_STORE_OPERATION));
        }

        Ok(format!(
            "demo dataset loaded: {} inserted, {} reset, {} verified",
            seeded.inserted.len(),
            seeded.reset.len(),
            verification.checks.len()
        ))
    });

    match result {
        Ok(message) => CommandResult::success("seed", message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn failed_checks(checks: &[(String, bool)]) -> Vec<&str> {
    checks.iter().filter_map(|(check, passed)| (!passed).then_some(check.as_str())).collect()
}

fn verification_message(failed: &[&str]) -> String {
    if failed.is_empty() {
        "some demo orders failed to load".to_string()
    } else {
        format!("seed verification failed for orders: {}", failed.join(", "))
    }
}
