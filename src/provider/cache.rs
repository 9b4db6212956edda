//! Process-wide provider cache with lazy, single-flight re-discovery.
//!
//! Metadata is discovered once at startup and shared by every request. When a TTL is set,
//! the first request after expiry re-runs discovery while holding an async guard so
//! concurrent requests do not stampede the provider. Readers always clone an
//! `Arc<ProviderSnapshot>`, so a handler sees either the old or the new snapshot in full,
//! never a mix of fields. A failed refresh keeps serving the previous snapshot and holds off
//! further attempts for [`REDISCOVERY_BACKOFF`].

// self
use crate::{
	_prelude::*,
	auth::{ScopeList, Secret},
	error::DiscoveryError,
	http::ReqwestHttpClient,
	provider::{self, ProviderMetadata, ProviderSettings, RequestMethod},
};

/// Minimum wait after a failed re-discovery before the provider is asked again.
pub const REDISCOVERY_BACKOFF: Duration = Duration::seconds(30);

/// Metadata and settings produced by one discovery cycle.
#[derive(Clone, Debug)]
pub struct ProviderSnapshot {
	/// Discovered metadata.
	pub metadata: ProviderMetadata,
	/// Settings built from `metadata`.
	pub settings: ProviderSettings,
	/// When discovery completed.
	pub fetched_at: OffsetDateTime,
}

/// Inputs needed to rebuild a [`ProviderSnapshot`].
#[derive(Clone, Debug)]
pub struct ProviderSource {
	/// Discovery document URL.
	pub discovery_url: Url,
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: Secret,
	/// Provider label.
	pub name: String,
	/// Token request method.
	pub request_method: RequestMethod,
	/// Default scopes.
	pub scopes: ScopeList,
}
impl ProviderSource {
	/// Builds settings for freshly discovered metadata.
	pub fn settings_for(&self, metadata: &ProviderMetadata) -> ProviderSettings {
		ProviderSettings::builder(metadata, self.client_id.as_str(), self.client_secret.expose())
			.name(self.name.as_str())
			.request_method(self.request_method)
			.default_scopes(self.scopes.clone())
			.build()
	}

	/// Wraps metadata and derived settings into a snapshot stamped `fetched_at`.
	pub fn snapshot(
		&self,
		metadata: ProviderMetadata,
		fetched_at: OffsetDateTime,
	) -> ProviderSnapshot {
		let settings = self.settings_for(&metadata);

		ProviderSnapshot { metadata, settings, fetched_at }
	}
}

/// Shared, read-mostly provider state.
pub struct ProviderCache {
	http_client: ReqwestHttpClient,
	source: ProviderSource,
	ttl: Option<Duration>,
	current: RwLock<Arc<ProviderSnapshot>>,
	retry_at: Mutex<Option<OffsetDateTime>>,
	refresh_guard: AsyncMutex<()>,
}
impl ProviderCache {
	/// Runs the initial discovery. Failure here is fatal for the server.
	pub async fn bootstrap(
		http_client: ReqwestHttpClient,
		source: ProviderSource,
		ttl: Option<Duration>,
	) -> Result<Self, DiscoveryError> {
		let metadata = provider::discover(&http_client, &source.discovery_url).await?;
		let snapshot = source.snapshot(metadata, OffsetDateTime::now_utc());

		Ok(Self::from_snapshot(http_client, source, ttl, snapshot))
	}

	/// Builds a cache around an already discovered snapshot.
	pub fn from_snapshot(
		http_client: ReqwestHttpClient,
		source: ProviderSource,
		ttl: Option<Duration>,
		snapshot: ProviderSnapshot,
	) -> Self {
		Self {
			http_client,
			source,
			ttl: ttl.filter(|ttl| ttl.is_positive()),
			current: RwLock::new(Arc::new(snapshot)),
			retry_at: Mutex::new(None),
			refresh_guard: AsyncMutex::new(()),
		}
	}

	/// Returns the current snapshot without checking its age.
	pub fn current(&self) -> Arc<ProviderSnapshot> {
		self.current.read().clone()
	}

	/// Returns true when the TTL is set and the current snapshot is older than it.
	pub fn is_stale(&self, now: OffsetDateTime) -> bool {
		match self.ttl {
			Some(ttl) => now - self.current.read().fetched_at >= ttl,
			None => false,
		}
	}

	/// Returns true when the snapshot is stale and no failed attempt is still backing off.
	pub fn needs_rediscovery(&self, now: OffsetDateTime) -> bool {
		let retry_at = *self.retry_at.lock();

		self.is_stale(now) && retry_at.is_none_or(|at| now >= at)
	}

	/// Returns a snapshot, re-discovering first when the current one is stale.
	pub async fn snapshot(&self) -> Arc<ProviderSnapshot> {
		if !self.needs_rediscovery(OffsetDateTime::now_utc()) {
			return self.current();
		}

		let _singleflight = self.refresh_guard.lock().await;

		// Another request may have refreshed, or failed to, while this one waited.
		if !self.needs_rediscovery(OffsetDateTime::now_utc()) {
			return self.current();
		}

		match self.rediscover().await {
			Ok(snapshot) => snapshot,
			Err(e) => {
				let retry_at = OffsetDateTime::now_utc() + REDISCOVERY_BACKOFF;

				*self.retry_at.lock() = Some(retry_at);

				tracing::warn!(
					error = %e,
					%retry_at,
					"provider re-discovery failed; keeping previous metadata"
				);

				self.current()
			},
		}
	}

	/// Forces a discovery round-trip and publishes the result.
	pub async fn refresh(&self) -> Result<Arc<ProviderSnapshot>, DiscoveryError> {
		let _singleflight = self.refresh_guard.lock().await;

		self.rediscover().await
	}

	/// Atomically replaces the current snapshot.
	pub fn publish(&self, snapshot: ProviderSnapshot) -> Arc<ProviderSnapshot> {
		let snapshot = Arc::new(snapshot);

		*self.current.write() = snapshot.clone();

		snapshot
	}

	/// Source used to rebuild snapshots.
	pub fn source(&self) -> &ProviderSource {
		&self.source
	}

	async fn rediscover(&self) -> Result<Arc<ProviderSnapshot>, DiscoveryError> {
		let metadata = provider::discover(&self.http_client, &self.source.discovery_url).await?;

		tracing::info!(issuer = %metadata.issuer, "provider metadata refreshed");

		*self.retry_at.lock() = None;

		Ok(self.publish(self.source.snapshot(metadata, OffsetDateTime::now_utc())))
	}
}
impl Debug for ProviderCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProviderCache")
			.field("discovery_url", &self.source.discovery_url.as_str())
			.field("ttl", &self.ttl)
			.field("fetched_at", &self.current.read().fetched_at)
			.finish()
	}
}
