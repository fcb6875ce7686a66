use std::env;
use std::fs;
use std::path::Path;

use orderdesk_core::config::{resolve_config_path, AppConfig};
use toml::Value;

use crate::commands::{load_options, CommandResult, EXIT_CONFIG};
use crate::GlobalArgs;

struct Field {
    key_path: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn field(key_path: &'static str, value: String, env_keys: &'static [&'static str]) -> Field {
    Field { key_path, value, env_keys }
}

fn fields(config: &AppConfig) -> Vec<Field> {
    vec![
        field("store.url", config.store.url.clone(), &["ORDERDESK_STORE_URL"]),
        field(
            "store.max_connections",
            config.store.max_connections.to_string(),
            &["ORDERDESK_STORE_MAX_CONNECTIONS"],
        ),
        field(
            "store.timeout_secs",
            config.store.timeout_secs.to_string(),
            &["ORDERDESK_STORE_TIMEOUT_SECS"],
        ),
        field(
            "coordinator.recency_window_days",
            config.coordinator.recency_window_days.to_string(),
            &["ORDERDESK_COORDINATOR_RECENCY_WINDOW_DAYS"],
        ),
        field(
            "coordinator.pending_ttl_secs",
            config.coordinator.pending_ttl_secs.to_string(),
            &["ORDERDESK_COORDINATOR_PENDING_TTL_SECS"],
        ),
        field(
            "coordinator.session_idle_ttl_secs",
            config.coordinator.session_idle_ttl_secs.to_string(),
            &["ORDERDESK_COORDINATOR_SESSION_IDLE_TTL_SECS"],
        ),
        field(
            "coordinator.sweep_interval_secs",
            config.coordinator.sweep_interval_secs.to_string(),
            &["ORDERDESK_COORDINATOR_SWEEP_INTERVAL_SECS"],
        ),
        field(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["ORDERDESK_SERVER_BIND_ADDRESS"],
        ),
        field("server.port", config.server.port.to_string(), &["ORDERDESK_SERVER_PORT"]),
        field(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["ORDERDESK_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        field(
            "logging.level",
            config.logging.level.clone(),
            &["ORDERDESK_LOGGING_LEVEL", "ORDERDESK_LOG_LEVEL"],
        ),
        field(
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["ORDERDESK_LOGGING_FORMAT", "ORDERDESK_LOG_FORMAT"],
        ),
    ]
}

pub fn run(global: &GlobalArgs) -> CommandResult {
    let config = match AppConfig::load(load_options(global)) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            )
        }
    };

    let config_file_path = resolve_config_path(global.config.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    for field in fields(&config) {
        let source = if field.key_path == "store.url" && global.store_url.is_some() {
            "flag (--store-url)".to_string()
        } else {
            field_source(
                field.key_path,
                field.env_keys,
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            )
        };
        lines.push(render_line(field.key_path, &field.value, source));
    }

    CommandResult::success("config", lines.join("\n"))
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
