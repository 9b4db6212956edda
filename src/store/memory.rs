//! Thread-safe in-memory [`AttemptStore`] with expiry.

// self
use crate::{
	_prelude::*,
	flows::AuthorizationAttempt,
	store::{AttemptStore, StoreError, StoreFuture},
};

/// Default lifetime of a pending attempt.
pub const DEFAULT_ATTEMPT_TTL: Duration = Duration::minutes(10);
/// Default upper bound on pending attempts held at once.
pub const DEFAULT_ATTEMPT_CAPACITY: usize = 10_000;

type AttemptMap = Arc<RwLock<HashMap<String, AuthorizationAttempt>>>;

/// In-process attempt store holding at most `capacity` attempts.
///
/// Expired attempts are never returned. They are pruned once the store fills up, and if it is
/// still full afterwards the oldest attempt is evicted to make room.
#[derive(Clone, Debug)]
pub struct MemoryAttemptStore {
	attempts: AttemptMap,
	ttl: Duration,
	capacity: usize,
}
impl MemoryAttemptStore {
	/// Creates a store whose attempts expire after `ttl`.
	pub fn new(ttl: Duration) -> Self {
		Self { attempts: Default::default(), ttl, capacity: DEFAULT_ATTEMPT_CAPACITY }
	}

	/// Overrides the maximum number of pending attempts. Zero is treated as one.
	pub fn with_capacity(mut self, capacity: usize) -> Self {
		self.capacity = capacity.max(1);

		self
	}

	/// Number of attempts currently held, including expired ones not yet pruned.
	pub fn len(&self) -> usize {
		self.attempts.read().len()
	}

	/// Returns true when no attempts are held.
	pub fn is_empty(&self) -> bool {
		self.attempts.read().is_empty()
	}

	fn save_now(&self, attempt: AuthorizationAttempt) -> Result<(), StoreError> {
		let now = OffsetDateTime::now_utc();
		let mut guard = self.attempts.write();

		if guard.len() >= self.capacity {
			guard.retain(|_, pending| !pending.is_expired_at(now, self.ttl));
		}
		if guard.len() >= self.capacity {
			let oldest = guard
				.iter()
				.min_by_key(|(_, pending)| pending.created_at())
				.map(|(state, _)| state.clone());

			if let Some(state) = oldest {
				guard.remove(&state);

				tracing::warn!(
					capacity = self.capacity,
					"attempt store full; evicted the oldest attempt"
				);
			}
		}

		guard.insert(attempt.state().to_owned(), attempt);

		Ok(())
	}

	fn take_now(&self, state: &str) -> Option<AuthorizationAttempt> {
		let attempt = self.attempts.write().remove(state)?;

		if attempt.is_expired_at(OffsetDateTime::now_utc(), self.ttl) { None } else { Some(attempt) }
	}
}
impl Default for MemoryAttemptStore {
	fn default() -> Self {
		Self::new(DEFAULT_ATTEMPT_TTL)
	}
}
impl AttemptStore for MemoryAttemptStore {
	fn save(&self, attempt: AuthorizationAttempt) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.save_now(attempt) })
	}

	fn take<'a>(&'a self, state: &'a str) -> StoreFuture<'a, Option<AuthorizationAttempt>> {
		Box::pin(async move { Ok(self.take_now(state)) })
	}
}
