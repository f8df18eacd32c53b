//! Configuration management
//!
//! Configuration is loaded from `config.yml` and may be overridden by
//! environment variables. Missing values are filled with defaults, so an
//! absent or empty file yields a working setup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Session lifecycle configuration
    #[serde(default)]
    pub session: SessionConfig,
    /// Session store backend configuration
    #[serde(default)]
    pub store: StoreConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Session lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Name of the cookie carrying the session id
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Seconds after the last save before a session is considered gone.
    /// Also used as the cookie Max-Age.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Seconds between background sweeps of expired sessions (0 disables)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            timeout_seconds: default_timeout(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

fn default_cookie_name() -> String {
    "SESSID".to_string()
}

fn default_timeout() -> u64 {
    1800
}

fn default_sweep_interval() -> u64 {
    300
}

/// Session store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store driver (file, memory or redis)
    #[serde(default)]
    pub driver: StoreDriver,
    /// Directory holding one file per session (file driver)
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,
    /// Redis connection URL (redis driver)
    #[serde(default)]
    pub redis_url: Option<String>,
    /// Most sessions the memory driver keeps. Past this, moka evicts
    /// entries before their timeout.
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            driver: StoreDriver::default(),
            dir: default_store_dir(),
            redis_url: None,
            memory_capacity: default_memory_capacity(),
        }
    }
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("data/sessions")
}

fn default_memory_capacity() -> u64 {
    10_000
}

/// Store driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreDriver {
    /// One JSON file per session (default)
    #[default]
    File,
    /// Process-local moka cache
    Memory,
    /// Redis
    Redis,
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist or is empty, returns the default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - SESSIONPAGE_SERVER_HOST
    /// - SESSIONPAGE_SERVER_PORT
    /// - SESSIONPAGE_SESSION_COOKIE_NAME
    /// - SESSIONPAGE_SESSION_TIMEOUT_SECONDS
    /// - SESSIONPAGE_SESSION_SWEEP_INTERVAL_SECONDS
    /// - SESSIONPAGE_STORE_DRIVER
    /// - SESSIONPAGE_STORE_DIR
    /// - SESSIONPAGE_STORE_REDIS_URL
    /// - SESSIONPAGE_STORE_MEMORY_CAPACITY
    ///
    /// The merged result is validated before it is returned.
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check values that would make the server misbehave at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "session.timeout_seconds must be greater than zero".to_string(),
            ));
        }

        let name = &self.session.cookie_name;
        if name.is_empty() || !name.chars().all(is_cookie_name_char) {
            return Err(ConfigError::ValidationError(format!(
                "session.cookie_name '{}' is not a valid cookie name",
                name
            )));
        }

        if self.store.memory_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "store.memory_capacity must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server configuration
        if let Ok(host) = std::env::var("SESSIONPAGE_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("SESSIONPAGE_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }

        // Session configuration
        if let Ok(name) = std::env::var("SESSIONPAGE_SESSION_COOKIE_NAME") {
            self.session.cookie_name = name;
        }
        if let Ok(timeout) = std::env::var("SESSIONPAGE_SESSION_TIMEOUT_SECONDS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                self.session.timeout_seconds = timeout;
            }
        }
        if let Ok(interval) = std::env::var("SESSIONPAGE_SESSION_SWEEP_INTERVAL_SECONDS") {
            if let Ok(interval) = interval.parse::<u64>() {
                self.session.sweep_interval_seconds = interval;
            }
        }

        // Store configuration
        if let Ok(driver) = std::env::var("SESSIONPAGE_STORE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "file" => self.store.driver = StoreDriver::File,
                "memory" => self.store.driver = StoreDriver::Memory,
                "redis" => self.store.driver = StoreDriver::Redis,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(dir) = std::env::var("SESSIONPAGE_STORE_DIR") {
            self.store.dir = PathBuf::from(dir);
        }
        if let Ok(redis_url) = std::env::var("SESSIONPAGE_STORE_REDIS_URL") {
            self.store.redis_url = Some(redis_url);
        }
        if let Ok(capacity) = std::env::var("SESSIONPAGE_STORE_MEMORY_CAPACITY") {
            if let Ok(capacity) = capacity.parse::<u64>() {
                self.store.memory_capacity = capacity;
            }
        }
    }
}

/// RFC 6265 token characters allowed in a cookie name
fn is_cookie_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by `tests` and `property_tests`, both of which touch the process environment.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_KEYS: [&str; 9] = [
    "SESSIONPAGE_SERVER_HOST",
    "SESSIONPAGE_SERVER_PORT",
    "SESSIONPAGE_SESSION_COOKIE_NAME",
    "SESSIONPAGE_SESSION_TIMEOUT_SECONDS",
    "SESSIONPAGE_SESSION_SWEEP_INTERVAL_SECONDS",
    "SESSIONPAGE_STORE_DRIVER",
    "SESSIONPAGE_STORE_DIR",
    "SESSIONPAGE_STORE_REDIS_URL",
    "SESSIONPAGE_STORE_MEMORY_CAPACITY",
];

#[cfg(test)]
fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}


/// Property-based tests for configuration parsing
#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        super::CONFIG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn valid_host_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            (0u8..=255, 0u8..=255, 0u8..=255, 0u8..=255)
                .prop_map(|(a, b, c, d)| format!("{}.{}.{}.{}", a, b, c, d)),
            Just("localhost".to_string()),
            Just("0.0.0.0".to_string()),
            "[a-z][a-z0-9]{0,10}".prop_map(|s| s),
        ]
    }

    fn valid_driver_strategy() -> impl Strategy<Value = StoreDriver> {
        prop_oneof![
            Just(StoreDriver::File),
            Just(StoreDriver::Memory),
            Just(StoreDriver::Redis),
        ]
    }

    fn valid_config_strategy() -> impl Strategy<Value = Config> {
        (
            valid_host_strategy(),
            1u16..=65535,
            "[A-Z][A-Z0-9_]{0,15}",
            1u64..=86_400,
            0u64..=3_600,
            valid_driver_strategy(),
            "[a-z][a-z0-9_/]{0,20}",
            proptest::option::of(Just("redis://localhost:6379".to_string())),
            1u64..=1_000_000,
        )
            .prop_map(
                |(host, port, cookie_name, timeout, sweep, driver, dir, redis_url, memory_capacity)| Config {
                    server: ServerConfig { host, port },
                    session: SessionConfig {
                        cookie_name,
                        timeout_seconds: timeout,
                        sweep_interval_seconds: sweep,
                    },
                    store: StoreConfig {
                        driver,
                        dir: PathBuf::from(dir),
                        redis_url,
                        memory_capacity,
                    },
                },
            )
    }

    fn partial_config_yaml_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            Just("server:\n  port: 9090\n".to_string()),
            Just("session:\n  cookie_name: GOSESSID\n".to_string()),
            Just("store:\n  driver: memory\n".to_string()),
            Just("session: {}\nstore: {}\n".to_string()),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Serializing any valid config to YAML and loading it back yields the same values.
        #[test]
        fn property_config_roundtrip(config in valid_config_strategy()) {
            let yaml = serde_yaml::to_string(&config).expect("Failed to serialize config");

            let mut file = NamedTempFile::new().expect("Failed to create temp file");
            write!(file, "{}", yaml).expect("Failed to write config");

            let parsed = Config::load(file.path()).expect("Failed to parse config");
            prop_assert!(parsed.validate().is_ok());

            prop_assert_eq!(config.server.host, parsed.server.host);
            prop_assert_eq!(config.server.port, parsed.server.port);
            prop_assert_eq!(config.session.cookie_name, parsed.session.cookie_name);
            prop_assert_eq!(config.session.timeout_seconds, parsed.session.timeout_seconds);
            prop_assert_eq!(config.session.sweep_interval_seconds, parsed.session.sweep_interval_seconds);
            prop_assert_eq!(config.store.driver, parsed.store.driver);
            prop_assert_eq!(config.store.dir, parsed.store.dir);
            prop_assert_eq!(config.store.redis_url, parsed.store.redis_url);
            prop_assert_eq!(config.store.memory_capacity, parsed.store.memory_capacity);
        }

        /// Partial files always come back complete and valid.
        #[test]
        fn property_partial_config_fills_defaults(yaml in partial_config_yaml_strategy()) {
            let mut file = NamedTempFile::new().expect("Failed to create temp file");
            write!(file, "{}", yaml).expect("Failed to write config");

            let config = Config::load(file.path()).expect("Failed to parse config");

            prop_assert!(!config.server.host.is_empty());
            prop_assert!(config.session.timeout_seconds > 0);
            prop_assert!(!config.session.cookie_name.is_empty());
            prop_assert!(config.validate().is_ok());
        }

        /// The timeout env var wins over the file for any positive value.
        #[test]
        fn property_env_timeout_precedence(file_timeout in 1u64..10_000, env_timeout in 1u64..10_000) {
            let _guard = lock_env();
            clear_env();

            let mut file = NamedTempFile::new().expect("Failed to create temp file");
            write!(file, "session:\n  timeout_seconds: {}\n", file_timeout).expect("Failed to write config");

            std::env::set_var("SESSIONPAGE_SESSION_TIMEOUT_SECONDS", env_timeout.to_string());
            let config = Config::load_with_env(file.path());
            clear_env();

            prop_assert_eq!(config.expect("Failed to load config").session.timeout_seconds, env_timeout);
        }
    }
}
