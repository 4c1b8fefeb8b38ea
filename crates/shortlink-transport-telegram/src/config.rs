//! Telegram transport settings.

use config::ConfigError;
use serde::{Deserialize, Serialize};
use shortlink_core::config::CoreSettings;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

/// Default port the webhook listener binds to.
pub const DEFAULT_PORT: u16 = 8080;

/// Telegram transport settings loaded from environment variables.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TelegramSettings {
    /// Telegram Bot API token.
    pub telegram_token: Option<String>,
    /// Legacy name of the Bot API token, used when `telegram_token` is unset.
    pub bot_token: Option<String>,
    /// Port for the webhook listener.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL Telegram should deliver updates to. Unset means long polling.
    pub webhook_url: Option<String>,
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            telegram_token: None,
            bot_token: None,
            port: default_port(),
            webhook_url: None,
        }
    }
}

/// Combined settings used by the Telegram transport layer.
#[derive(Clone)]
pub struct BotSettings {
    /// Shortener and storage settings.
    pub core: Arc<CoreSettings>,
    /// Telegram-specific settings.
    pub telegram: Arc<TelegramSettings>,
}

impl BotSettings {
    /// Create a new combined settings bundle.
    #[must_use]
    pub fn new(core: CoreSettings, telegram: TelegramSettings) -> Self {
        Self {
            core: Arc::new(core),
            telegram: Arc::new(telegram),
        }
    }
}

impl TelegramSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or no bot token is configured.
    pub fn new() -> Result<Self, ConfigError> {
        let settings: Self = shortlink_core::config::build_config()?.try_deserialize()?;
        if settings.token().is_none() {
            return Err(ConfigError::NotFound("telegram_token".to_string()));
        }
        Ok(settings)
    }

    /// Bot API token, preferring `telegram_token` over `bot_token`.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        [self.telegram_token.as_deref(), self.bot_token.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|token| !token.is_empty())
    }

    /// Webhook URL, ignoring blank values.
    #[must_use]
    pub fn webhook_url(&self) -> Option<&str> {
        self.webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Address the webhook listener binds to.
    #[must_use]
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}
