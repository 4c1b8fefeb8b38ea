//! Per-user message routing
//!
//! Every inbound event is parsed by the transport into an [`Inbound`] value
//! and routed through a two-state machine (`NoToken` / `HasToken`) backed by
//! the [`TokenStore`]. The router never fails: storage and network problems
//! are turned into [`Reply`] variants the transport renders for the user.

use crate::shortener::{ShortenError, ShortenerProvider};
use crate::storage::{StorageError, TokenStore};
use crate::utils::{is_http_url, mask_token};
use crate::validation::TokenValidator;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

/// Number of idle per-user locks tolerated before pruning.
const USER_LOCKS_PRUNE_THRESHOLD: usize = 1024;

/// Commands understood by the router, independent of the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterCommand {
    /// Greeting reflecting whether a token is configured
    Start,
    /// Usage information
    Help,
    /// Explicitly set or replace the token
    SetToken(String),
    /// Forget the stored token
    RemoveToken,
}

/// A parsed inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Slash command
    Command(RouterCommand),
    /// Any other text message
    Text(String),
}

/// Whether a user has a token configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// No token stored
    NoToken,
    /// A non-empty token is stored
    HasToken,
}

/// Outcome of routing one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Answer to `start`
    Welcome(TokenState),
    /// Answer to `help`
    Help(TokenState),
    /// Token accepted and stored
    TokenSaved,
    /// Text did not look like a token
    TokenRejected,
    /// `setapi` without an argument
    SetTokenUsage,
    /// A link was sent before any token was configured
    TokenRequired,
    /// Token deleted
    TokenRemoved,
    /// Remove requested, but nothing was stored
    NothingToRemove,
    /// Text is not a link while a token is configured
    NotAUrl,
    /// The service returned a short link
    Shortened(String),
    /// The service refused the request or answered with something else
    ShortenFailed,
    /// The service could not be reached in time
    ServiceUnavailable,
    /// The token store failed
    StorageUnavailable,
}

/// Per-user async locks serialising read-decide-write sequences.
#[derive(Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

impl UserLocks {
    /// Create an empty lock table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `user_id`'s state.
    pub async fn acquire(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            if locks.len() > USER_LOCKS_PRUNE_THRESHOLD {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(locks.entry(user_id).or_default())
        };
        lock.lock_owned().await
    }
}

/// Routes inbound events through the per-user token state machine.
pub struct MessageRouter {
    store: Arc<dyn TokenStore>,
    shortener: Arc<dyn ShortenerProvider>,
    validator: Arc<dyn TokenValidator>,
    locks: UserLocks,
}

impl MessageRouter {
    /// Create a router over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn TokenStore>,
        shortener: Arc<dyn ShortenerProvider>,
        validator: Arc<dyn TokenValidator>,
    ) -> Self {
        Self {
            store,
            shortener,
            validator,
            locks: UserLocks::new(),
        }
    }

    /// Current state of a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the token store cannot be read.
    pub async fn token_state(&self, user_id: i64) -> Result<TokenState, StorageError> {
        Ok(match self.store.get_token(user_id).await? {
            Some(_) => TokenState::HasToken,
            None => TokenState::NoToken,
        })
    }

    /// Route one inbound event for `user_id`.
    pub async fn handle(&self, user_id: i64, inbound: Inbound) -> Reply {
        match inbound {
            Inbound::Command(RouterCommand::Start) => self
                .token_state(user_id)
                .await
                .map_or_else(|e| storage_failure(user_id, &e), Reply::Welcome),
            Inbound::Command(RouterCommand::Help) => self
                .token_state(user_id)
                .await
                .map_or_else(|e| storage_failure(user_id, &e), Reply::Help),
            Inbound::Command(RouterCommand::SetToken(candidate)) => {
                self.set_token(user_id, &candidate).await
            }
            Inbound::Command(RouterCommand::RemoveToken) => self.remove_token(user_id).await,
            Inbound::Text(text) => self.handle_text(user_id, &text).await,
        }
    }

    async fn set_token(&self, user_id: i64, candidate: &str) -> Reply {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return Reply::SetTokenUsage;
        }
        if !self.validator.looks_like_token(candidate) {
            debug!("User {user_id} sent a value that does not look like a token");
            return Reply::TokenRejected;
        }

        let _guard = self.locks.acquire(user_id).await;
        self.store_token(user_id, candidate).await
    }

    async fn remove_token(&self, user_id: i64) -> Reply {
        let _guard = self.locks.acquire(user_id).await;
        match self.store.delete_token(user_id).await {
            Ok(true) => {
                info!("Token removed for user {user_id}.");
                Reply::TokenRemoved
            }
            Ok(false) => Reply::NothingToRemove,
            Err(e) => storage_failure(user_id, &e),
        }
    }

    async fn handle_text(&self, user_id: i64, text: &str) -> Reply {
        let text = text.trim();

        let token = {
            let _guard = self.locks.acquire(user_id).await;
            match self.store.get_token(user_id).await {
                Ok(Some(token)) => token,
                Ok(None) => return self.configure_from_text(user_id, text).await,
                Err(e) => return storage_failure(user_id, &e),
            }
        };

        // The user lock is released before the outbound call
        if !is_http_url(text) {
            return Reply::NotAUrl;
        }

        match self.shortener.shorten(&token, text).await {
            Ok(short_url) => {
                info!("Shortened link for user {user_id}.");
                Reply::Shortened(short_url)
            }
            Err(e @ (ShortenError::Network(_) | ShortenError::Timeout(_))) => {
                warn!("Shortener unreachable for user {user_id}: {e}");
                Reply::ServiceUnavailable
            }
            Err(e) => {
                warn!("Shortening failed for user {user_id}: {e}");
                Reply::ShortenFailed
            }
        }
    }

    /// `NoToken` branch. Caller holds the user lock.
    async fn configure_from_text(&self, user_id: i64, text: &str) -> Reply {
        if is_http_url(text) {
            return Reply::TokenRequired;
        }
        if !self.validator.looks_like_token(text) {
            debug!("User {user_id} without token sent non-token text");
            return Reply::TokenRejected;
        }
        self.store_token(user_id, text).await
    }

    async fn store_token(&self, user_id: i64, token: &str) -> Reply {
        match self.store.set_token(user_id, token.to_string()).await {
            Ok(()) => {
                info!("Token {} saved for user {user_id}.", mask_token(token));
                Reply::TokenSaved
            }
            Err(e) => storage_failure(user_id, &e),
        }
    }
}

fn storage_failure(user_id: i64, err: &StorageError) -> Reply {
    error!("Token store failure for user {user_id}: {err}");
    Reply::StorageUnavailable
}
