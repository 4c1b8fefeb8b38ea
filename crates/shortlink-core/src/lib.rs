#![deny(missing_docs)]
//! Shortlink core library.
//!
//! Transport-agnostic logic for the link shortening bot: per-user token
//! storage, the shortening service client and the message router.

/// Configuration management.
pub mod config;
/// Per-user message routing state machine.
pub mod router;
/// Client for the external URL shortening service.
pub mod shortener;
/// Token storage (JSON file).
pub mod storage;
/// Utility functions.
pub mod utils;
/// Token shape validation.
pub mod validation;

#[cfg(test)]
pub mod testing;
