//! Authorization-code flow driver.
//!
//! [`AuthorizationDriver::initiate`] builds the redirect to the provider and remembers the
//! attempt under its `state`; [`AuthorizationDriver::handle_callback`] consumes that attempt,
//! exchanges the code at the token endpoint, checks the returned ID token against the
//! attempt's nonce, and yields the resulting [`AuthorizationPrincipal`].

pub mod callback;
pub mod session;

pub use callback::*;
pub use session::*;

// self
use crate::{
	_prelude::*,
	auth::Secret,
	http::{ReqwestHttpClient, TokenHttpClient},
	id_token::IdTokenClaims,
	store::AttemptStore,
};

/// Tokens returned by a completed code exchange.
#[derive(Clone, Debug)]
pub struct AuthorizationPrincipal {
	/// Access token for bearer calls.
	pub access_token: Secret,
	/// Token type reported by the provider (normally `bearer`).
	pub token_type: String,
	/// Lifetime of the access token in seconds, if reported.
	pub expires_in: Option<u64>,
	/// Refresh token, if issued.
	pub refresh_token: Option<Secret>,
	/// Space-delimited scopes granted, if reported.
	pub scope: Option<String>,
	/// Every other response parameter, `id_token` included.
	pub extra_parameters: BTreeMap<String, String>,
	/// ID token claims, set once the callback has validated them.
	pub claims: Option<IdTokenClaims>,
}
impl AuthorizationPrincipal {
	/// Raw ID token, when the provider returned one.
	pub fn id_token(&self) -> Option<&str> {
		self.extra_parameters.get("id_token").map(String::as_str)
	}
}

/// Drives authorization-code attempts against the provider described by the caller's
/// [`ProviderSettings`](crate::provider::ProviderSettings).
///
/// The driver owns the HTTP transport, the pending-attempt store, and the redirect URI
/// registered with the provider. It holds no provider settings itself: each call receives the
/// snapshot the request handler is working with.
pub struct AuthorizationDriver<C = ReqwestHttpClient>
where
	C: ?Sized + TokenHttpClient,
{
	/// HTTP client used for the token exchange.
	pub http_client: Arc<C>,
	/// Store for attempts awaiting their callback.
	pub store: Arc<dyn AttemptStore>,
	/// Redirect URI sent on the authorization request and the code exchange.
	pub redirect_uri: Url,
}
impl<C> AuthorizationDriver<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Creates a driver around the provided transport and store.
	pub fn new(
		http_client: impl Into<Arc<C>>,
		store: Arc<dyn AttemptStore>,
		redirect_uri: Url,
	) -> Self {
		Self { http_client: http_client.into(), store, redirect_uri }
	}
}
impl<C> Debug for AuthorizationDriver<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationDriver").field("redirect_uri", &self.redirect_uri).finish()
	}
}
