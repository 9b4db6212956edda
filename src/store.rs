//! Storage contract and in-memory implementation for pending authorization attempts.
//!
//! An attempt is saved when the user is redirected to the provider and taken (removed)
//! when the callback arrives, so every `state` value is single use.

pub mod memory;

pub use memory::MemoryAttemptStore;

// self
use crate::{_prelude::*, flows::AuthorizationAttempt};

/// Boxed future returned by [`AttemptStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for attempts awaiting their callback.
pub trait AttemptStore
where
	Self: Send + Sync,
{
	/// Persists an attempt keyed by its `state`.
	fn save(&self, attempt: AuthorizationAttempt) -> StoreFuture<'_, ()>;

	/// Removes and returns the live attempt for `state`, if any.
	fn take<'a>(&'a self, state: &'a str) -> StoreFuture<'a, Option<AuthorizationAttempt>>;
}

/// Error type produced by [`AttemptStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn store_error_converts_into_crate_error_with_source() {
		let store_error = StoreError::Backend { message: "redis unreachable".into() };
		let error: Error = store_error.clone().into();

		assert!(matches!(error, Error::Storage(_)));
		assert!(error.to_string().contains("redis unreachable"));

		let source = StdError::source(&error).expect("Crate error should expose the store error.");

		assert_eq!(source.to_string(), store_error.to_string());
	}
}
