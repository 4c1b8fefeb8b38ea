//! Heuristics deciding whether a text message is a shortener API token.
//!
//! The real token format of the shortening service is not published, so the
//! check is a trait the router is parameterised over.

use crate::config::CoreSettings;
use crate::utils::is_http_url;
use std::sync::Arc;

/// Decides whether free text looks like a shortener API token.
pub trait TokenValidator: Send + Sync {
    /// Returns true if `candidate` should be accepted and stored as a token.
    fn looks_like_token(&self, candidate: &str) -> bool;
}

/// Accepts a single word of bounded length that is neither a URL nor a
/// slash command.
#[derive(Debug, Clone)]
pub struct ShapeTokenValidator {
    min_len: usize,
    max_len: usize,
}

impl ShapeTokenValidator {
    /// Create a validator accepting tokens of `min_len..=max_len` characters.
    #[must_use]
    pub const fn new(min_len: usize, max_len: usize) -> Self {
        Self { min_len, max_len }
    }
}

impl TokenValidator for ShapeTokenValidator {
    fn looks_like_token(&self, candidate: &str) -> bool {
        let candidate = candidate.trim();
        let len = candidate.chars().count();

        len >= self.min_len.max(1)
            && len <= self.max_len
            && !candidate.chars().any(char::is_whitespace)
            && !candidate.starts_with('/')
            && !is_http_url(candidate)
    }
}

/// Shape checks plus a mandatory literal prefix.
#[derive(Debug, Clone)]
pub struct PrefixTokenValidator {
    prefix: String,
    shape: ShapeTokenValidator,
}

impl PrefixTokenValidator {
    /// Create a validator requiring `prefix` on top of `shape`.
    #[must_use]
    pub fn new(prefix: impl Into<String>, shape: ShapeTokenValidator) -> Self {
        Self {
            prefix: prefix.into(),
            shape,
        }
    }
}

impl TokenValidator for PrefixTokenValidator {
    fn looks_like_token(&self, candidate: &str) -> bool {
        candidate.trim().starts_with(&self.prefix) && self.shape.looks_like_token(candidate)
    }
}

/// Build the validator selected by the settings.
#[must_use]
pub fn validator_from_settings(settings: &CoreSettings) -> Arc<dyn TokenValidator> {
    let shape = ShapeTokenValidator::new(settings.token_min_len, settings.token_max_len);
    match settings.token_prefix() {
        Some(prefix) => Arc::new(PrefixTokenValidator::new(prefix, shape)),
        None => Arc::new(shape),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_accepts_plain_tokens() {
        let validator = ShapeTokenValidator::new(8, 128);
        assert!(validator.looks_like_token("startoken123"));
        assert!(validator.looks_like_token("  a1b2c3d4e5f6  "));
        assert!(validator.looks_like_token("da_9f8e7d6c5b4a"));
    }

    #[test]
    fn test_shape_rejects_other_text() {
        let validator = ShapeTokenValidator::new(8, 128);
        assert!(!validator.looks_like_token(""));
        assert!(!validator.looks_like_token("short"));
        assert!(!validator.looks_like_token("hello there friend"));
        assert!(!validator.looks_like_token("https://example.com/page"));
        assert!(!validator.looks_like_token("/removeApi"));
        assert!(!validator.looks_like_token(&"x".repeat(129)));
    }

    #[test]
    fn test_prefix_validator() {
        let validator = PrefixTokenValidator::new("da", ShapeTokenValidator::new(8, 128));
        assert!(validator.looks_like_token("da12345678"));
        assert!(!validator.looks_like_token("startoken123"));
        assert!(!validator.looks_like_token("da"));
    }

    #[test]
    fn test_validator_from_settings() {
        let settings = CoreSettings::default();
        assert!(validator_from_settings(&settings).looks_like_token("startoken123"));

        let settings = CoreSettings {
            token_prefix: Some("da".to_string()),
            ..CoreSettings::default()
        };
        let validator = validator_from_settings(&settings);
        assert!(!validator.looks_like_token("startoken123"));
        assert!(validator.looks_like_token("da_startoken123"));
    }
}
