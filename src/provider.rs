//! Provider-facing data (discovered metadata, OAuth settings) and the process-wide cache.
//!
//! `metadata` fetches and validates the discovery document, `settings` folds it together
//! with client credentials into the [`ProviderSettings`] the flow driver uses, and `cache`
//! keeps one consistent snapshot of both for concurrent request handlers.

pub mod cache;
pub mod metadata;
pub mod settings;

pub use cache::*;
pub use metadata::*;
pub use settings::*;
