use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resolver::DEFAULT_RECENCY_WINDOW_DAYS;

pub const CONFIG_FILE_CANDIDATES: [&str; 2] = ["orderdesk.toml", "config/orderdesk.toml"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub coordinator: CoordinatorConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite(String),
    Csv(PathBuf),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub recency_window_days: u32,
    pub pending_ttl_secs: u64,
    pub session_idle_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub store_url: Option<String>,
    pub log_level: Option<String>,
    pub recency_window_days: Option<u32>,
    pub pending_ttl_secs: Option<u64>,
    pub port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                url: "sqlite://orderdesk.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            coordinator: CoordinatorConfig::default(),
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            recency_window_days: DEFAULT_RECENCY_WINDOW_DAYS,
            pending_ttl_secs: 600,
            session_idle_ttl_secs: 1800,
            sweep_interval_secs: 60,
        }
    }
}

impl CoordinatorConfig {
    pub fn pending_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.pending_ttl_secs).unwrap_or(i64::MAX))
    }

    pub fn session_idle_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.session_idle_ttl_secs).unwrap_or(i64::MAX))
    }
}

impl StoreConfig {
    /// `csv://` selects the flat-file engine; every other accepted form is SQLite.
    pub fn backend(&self) -> StoreBackend {
        let url = self.url.trim();
        match url.strip_prefix("csv://") {
            Some(path) => StoreBackend::Csv(PathBuf::from(path)),
            None => StoreBackend::Sqlite(url.to_string()),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_CANDIDATES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(store) = patch.store {
            if let Some(url) = store.url {
                self.store.url = url;
            }
            if let Some(max_connections) = store.max_connections {
                self.store.max_connections = max_connections;
            }
            if let Some(timeout_secs) = store.timeout_secs {
                self.store.timeout_secs = timeout_secs;
            }
        }

        if let Some(coordinator) = patch.coordinator {
            if let Some(days) = coordinator.recency_window_days {
                self.coordinator.recency_window_days = days;
            }
            if let Some(secs) = coordinator.pending_ttl_secs {
                self.coordinator.pending_ttl_secs = secs;
            }
            if let Some(secs) = coordinator.session_idle_ttl_secs {
                self.coordinator.session_idle_ttl_secs = secs;
            }
            if let Some(secs) = coordinator.sweep_interval_secs {
                self.coordinator.sweep_interval_secs = secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ORDERDESK_STORE_URL") {
            self.store.url = value;
        }
        if let Some(value) = read_env("ORDERDESK_STORE_MAX_CONNECTIONS") {
            self.store.max_connections = parse_u32("ORDERDESK_STORE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("ORDERDESK_STORE_TIMEOUT_SECS") {
            self.store.timeout_secs = parse_u64("ORDERDESK_STORE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ORDERDESK_COORDINATOR_RECENCY_WINDOW_DAYS") {
            self.coordinator.recency_window_days =
                parse_u32("ORDERDESK_COORDINATOR_RECENCY_WINDOW_DAYS", &value)?;
        }
        if let Some(value) = read_env("ORDERDESK_COORDINATOR_PENDING_TTL_SECS") {
            self.coordinator.pending_ttl_secs =
                parse_u64("ORDERDESK_COORDINATOR_PENDING_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("ORDERDESK_COORDINATOR_SESSION_IDLE_TTL_SECS") {
            self.coordinator.session_idle_ttl_secs =
                parse_u64("ORDERDESK_COORDINATOR_SESSION_IDLE_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("ORDERDESK_COORDINATOR_SWEEP_INTERVAL_SECS") {
            self.coordinator.sweep_interval_secs =
                parse_u64("ORDERDESK_COORDINATOR_SWEEP_INTERVAL_SECS", &value)?;
        }

        if let Some(value) = read_env("ORDERDESK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("ORDERDESK_SERVER_PORT") {
            self.server.port = parse_u16("ORDERDESK_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("ORDERDESK_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("ORDERDESK_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("ORDERDESK_LOGGING_LEVEL").or_else(|| read_env("ORDERDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ORDERDESK_LOGGING_FORMAT").or_else(|| read_env("ORDERDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(store_url) = overrides.store_url {
            self.store.url = store_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(days) = overrides.recency_window_days {
            self.coordinator.recency_window_days = days;
        }
        if let Some(secs) = overrides.pending_ttl_secs {
            self.coordinator.pending_ttl_secs = secs;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_store(&self.store)?;
        validate_coordinator(&self.coordinator)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    CONFIG_FILE_CANDIDATES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_store(store: &StoreConfig) -> Result<(), ConfigError> {
    let url = store.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    let csv_url = url.strip_prefix("csv://").is_some_and(|path| !path.trim().is_empty());
    if !sqlite_url && !csv_url {
        return Err(ConfigError::Validation(
            "store.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, `:memory:`) or `csv://<path>`"
                .to_string(),
        ));
    }

    if store.max_connections == 0 {
        return Err(ConfigError::Validation(
            "store.max_connections must be greater than zero".to_string(),
        ));
    }

    if store.timeout_secs == 0 || store.timeout_secs > 300 {
        return Err(ConfigError::Validation("store.timeout_secs must be in range 1..=300".to_string()));
    }

    Ok(())
}

fn validate_coordinator(coordinator: &CoordinatorConfig) -> Result<(), ConfigError> {
    if coordinator.recency_window_days == 0 || coordinator.recency_window_days > 3650 {
        return Err(ConfigError::Validation(
            "coordinator.recency_window_days must be in range 1..=3650".to_string(),
        ));
    }

    if coordinator.pending_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "coordinator.pending_ttl_secs must be greater than zero".to_string(),
        ));
    }

    if coordinator.session_idle_ttl_secs < coordinator.pending_ttl_secs {
        return Err(ConfigError::Validation(
            "coordinator.session_idle_ttl_secs must not be shorter than pending_ttl_secs"
                .to_string(),
        ));
    }

    if coordinator.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "coordinator.sweep_interval_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    store: Option<StorePatch>,
    coordinator: Option<CoordinatorPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct StorePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CoordinatorPatch {
    recency_window_days: Option<u32>,
    pending_ttl_secs: Option<u64>,
    session_idle_ttl_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
