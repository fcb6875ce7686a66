use orderdesk_core::resolver::rank;
use orderdesk_db::open_order_store;

use crate::commands::{
    build_runtime, load_config, CommandResult, EXIT_STORE_OPEN, EXIT_STORE_OPERATION,
};
use crate::GlobalArgs;

pub fn run(global: &GlobalArgs, customer_id: &str) -> CommandResult {
    let config = match load_config("orders", global) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("orders") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let store = open_order_store(&config.store)
            .await
            .map_err(|error| ("store_open", error.to_string(), EXIT_STORE_OPEN))?;
        store
            .find_by_customer(customer_id, None, None)
            .await
            .map_err(|error| ("store_read", error.to_string(), EXIT_STORE_OPERATION))
    });

    match result {
        Ok(mut orders) => {
            rank(&mut orders);
            let message = format!("{} order(s) for customer {customer_id}", orders.len());
            CommandResult::success_with_data("orders", message, serde_json::to_value(&orders).ok())
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("orders", error_class, message, exit_code)
        }
    }
}
