//! Testing helpers and mock utilities.
//!
//! Provides convenient constructors for mocked token stores and shorteners.

use crate::shortener::MockShortenerProvider;
use crate::storage::MockTokenStore;
use mockall::predicate::*;

/// Create a mock token store whose `get_token` always yields `token`.
///
/// Only reads are configured. Tests that expect writes add their own
/// `expect_set_token` / `expect_delete_token` expectations.
///
/// # Example
///
/// ```rust,ignore
/// use shortlink_core::testing::mock_store_with_token;
///
/// let store = mock_store_with_token(Some("startoken123"));
/// ```
#[must_use]
pub fn mock_store_with_token(token: Option<&'static str>) -> MockTokenStore {
    let mut mock = MockTokenStore::new();
    mock.expect_get_token()
        .with(always())
        .returning(move |_| Ok(token.map(String::from)));
    mock
}

/// Create a mock shortener that must not be called.
#[must_use]
pub fn mock_shortener_unused() -> MockShortenerProvider {
    let mut mock = MockShortenerProvider::new();
    mock.expect_shorten().never();
    mock
}

/// Create a mock shortener expecting exactly one call with `token` and
/// `url`, answering with `short_url`.
#[must_use]
pub fn mock_shortener_ok(
    token: &'static str,
    url: &'static str,
    short_url: &'static str,
) -> MockShortenerProvider {
    let mut mock = MockShortenerProvider::new();
    mock.expect_shorten()
        .with(eq(token), eq(url))
        .times(1)
        .returning(move |_, _| Ok(short_url.to_string()));
    mock
}
