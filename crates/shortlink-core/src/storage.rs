//! Storage layer for per-user shortener tokens
//!
//! Provides a persistent token store backed by a single JSON file.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Error during JSON serialization or deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Interface for token storage providers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Get the token stored for a user
    async fn get_token(&self, user_id: i64) -> Result<Option<String>, StorageError>;
    /// Store or overwrite the token for a user. Returns once the write is durable.
    async fn set_token(&self, user_id: i64, token: String) -> Result<(), StorageError>;
    /// Delete the token for a user. Returns `false` if there was none.
    async fn delete_token(&self, user_id: i64) -> Result<bool, StorageError>;
    /// Number of users with a stored token
    async fn user_count(&self) -> Result<usize, StorageError>;
    /// Check that the backing storage is usable
    async fn check_connection(&self) -> Result<(), String>;
}

/// Token store persisted as a JSON object of `user_id -> token`.
///
/// The whole mapping is kept in memory. Every mutation rewrites the file
/// through a temporary sibling that is renamed over the original, and the
/// in-memory copy is only updated after the rename succeeded.
pub struct JsonFileTokenStore {
    path: PathBuf,
    tokens: RwLock<BTreeMap<i64, String>>,
}

impl JsonFileTokenStore {
    /// Open the store at `path`. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();

        let tokens = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Token store {} not found, starting empty", path.display());
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            "Token store opened at {} ({} users)",
            path.display(),
            tokens.len()
        );

        Ok(Self {
            path,
            tokens: RwLock::new(tokens),
        })
    }

    /// Location of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, tokens: &BTreeMap<i64, String>) -> Result<(), StorageError> {
        let body = serde_json::to_vec_pretty(tokens)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = temp_path_for(&self.path);
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(&body).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for JsonFileTokenStore {
    async fn get_token(&self, user_id: i64) -> Result<Option<String>, StorageError> {
        Ok(self
            .tokens
            .read()
            .await
            .get(&user_id)
            .filter(|token| !token.is_empty())
            .cloned())
    }

    async fn set_token(&self, user_id: i64, token: String) -> Result<(), StorageError> {
        // Holding the write guard across the file write serialises writers
        let mut tokens = self.tokens.write().await;
        let mut next = tokens.clone();
        next.insert(user_id, token);
        self.persist(&next).await?;
        *tokens = next;
        Ok(())
    }

    async fn delete_token(&self, user_id: i64) -> Result<bool, StorageError> {
        let mut tokens = self.tokens.write().await;
        // An empty value reads as absent, so it is left alone like a missing one
        if tokens.get(&user_id).is_none_or(String::is_empty) {
            return Ok(false);
        }
        let mut next = tokens.clone();
        next.remove(&user_id);
        self.persist(&next).await?;
        *tokens = next;
        Ok(true)
    }

    async fn user_count(&self) -> Result<usize, StorageError> {
        Ok(self
            .tokens
            .read()
            .await
            .values()
            .filter(|token| !token.is_empty())
            .count())
    }

    async fn check_connection(&self) -> Result<(), String> {
        let tokens = self.tokens.read().await.clone();
        match self.persist(&tokens).await {
            Ok(()) => {
                info!("Token store {} is writable.", self.path.display());
                Ok(())
            }
            Err(e) => {
                let err_msg = format!(
                    "Token store {} is not writable: {e}",
                    self.path.display()
                );
                error!("{}", err_msg);
                Err(err_msg)
            }
        }
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
