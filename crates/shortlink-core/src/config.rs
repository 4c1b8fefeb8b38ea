//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! the defaults used by the shortener and token store.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default endpoint of the shortening service.
pub const DEFAULT_SHORTENER_BASE_URL: &str = "https://shortner.in/api";
/// Default timeout for a single shortening request.
pub const DEFAULT_SHORTENER_TIMEOUT_SECS: u64 = 10;
/// Default location of the token store file.
pub const DEFAULT_TOKEN_STORE_PATH: &str = "user_tokens.json";
/// Shortest accepted token.
pub const DEFAULT_TOKEN_MIN_LEN: usize = 8;
/// Longest accepted token.
pub const DEFAULT_TOKEN_MAX_LEN: usize = 128;

/// Build the layered configuration shared by every settings struct.
///
/// Sources, lowest priority first: `config/default`, `config/{RUN_MODE}`,
/// `config/local`, `APP_*` environment variables and finally plain
/// environment variables.
///
/// # Errors
///
/// Returns a `ConfigError` if a present source cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        // Eg.. `APP_SHORTENER_TIMEOUT_SECS=5 ./target/app`
        .add_source(Environment::with_prefix("APP").separator("__"))
        // UPPER_SNAKE_CASE is mapped to snake_case, empty values count as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

/// Core settings: shortening service and token storage.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CoreSettings {
    /// Base URL of the shortening API.
    #[serde(default = "default_shortener_base_url")]
    pub shortener_base_url: String,
    /// Timeout for a single shortening request, in seconds.
    #[serde(default = "default_shortener_timeout_secs")]
    pub shortener_timeout_secs: u64,
    /// Path of the JSON file holding user tokens.
    #[serde(default = "default_token_store_path")]
    pub token_store_path: PathBuf,
    /// Literal prefix every token must start with. Unset means shape checks only.
    pub token_prefix: Option<String>,
    /// Minimum token length in characters.
    #[serde(default = "default_token_min_len")]
    pub token_min_len: usize,
    /// Maximum token length in characters.
    #[serde(default = "default_token_max_len")]
    pub token_max_len: usize,
}

fn default_shortener_base_url() -> String {
    DEFAULT_SHORTENER_BASE_URL.to_string()
}

const fn default_shortener_timeout_secs() -> u64 {
    DEFAULT_SHORTENER_TIMEOUT_SECS
}

fn default_token_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_TOKEN_STORE_PATH)
}

const fn default_token_min_len() -> usize {
    DEFAULT_TOKEN_MIN_LEN
}

const fn default_token_max_len() -> usize {
    DEFAULT_TOKEN_MAX_LEN
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            shortener_base_url: default_shortener_base_url(),
            shortener_timeout_secs: default_shortener_timeout_secs(),
            token_store_path: default_token_store_path(),
            token_prefix: None,
            token_min_len: default_token_min_len(),
            token_max_len: default_token_max_len(),
        }
    }
}

impl CoreSettings {
    /// Load core settings from files and environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }

    /// Timeout applied to outbound shortening requests.
    #[must_use]
    pub const fn shortener_timeout(&self) -> Duration {
        Duration::from_secs(self.shortener_timeout_secs)
    }

    /// Configured token prefix, ignoring blank values.
    #[must_use]
    pub fn token_prefix(&self) -> Option<&str> {
        self.token_prefix
            .as_deref()
            .map(str::trim)
            .filter(|prefix| !prefix.is_empty())
    }
}
