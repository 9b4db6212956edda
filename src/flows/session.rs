//! Authorization attempts: state, nonce, PKCE, and the authorize URL.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	error::FlowError,
	flows::AuthorizationDriver,
	http::TokenHttpClient,
	obs::{self, FlowKind},
	provider::ProviderSettings,
};

const STATE_LEN: usize = 32;
const NONCE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;

/// Lifecycle of one authorization attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowPhase {
	/// Created, redirect not yet issued.
	Idle,
	/// User was sent to the provider; waiting for the callback.
	AwaitingCallback,
	/// Code exchanged successfully.
	Completed,
	/// Callback or exchange failed.
	Failed,
}
impl FlowPhase {
	/// Returns a stable label for logs and errors.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowPhase::Idle => "idle",
			FlowPhase::AwaitingCallback => "awaiting_callback",
			FlowPhase::Completed => "completed",
			FlowPhase::Failed => "failed",
		}
	}

	fn can_move_to(self, next: FlowPhase) -> bool {
		matches!(
			(self, next),
			(FlowPhase::Idle, FlowPhase::AwaitingCallback)
				| (FlowPhase::AwaitingCallback, FlowPhase::Completed | FlowPhase::Failed)
		)
	}
}
impl Display for FlowPhase {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Supported PKCE challenge methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Where to send the user to start an attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedirectInstruction {
	/// Fully-formed authorize URL.
	pub authorize_url: Url,
	/// Opaque state value that must come back on the callback.
	pub state: String,
}

/// Pending authorization attempt, keyed by `state` in the attempt store.
#[derive(Clone)]
pub struct AuthorizationAttempt {
	state: String,
	nonce: String,
	redirect_uri: Url,
	created_at: OffsetDateTime,
	phase: FlowPhase,
	pkce: PkcePair,
}
impl AuthorizationAttempt {
	/// Starts an idle attempt with fresh random state, nonce, and PKCE verifier.
	pub fn generate(redirect_uri: Url) -> Self {
		Self {
			state: random_string(STATE_LEN),
			nonce: random_string(NONCE_LEN),
			redirect_uri,
			created_at: OffsetDateTime::now_utc(),
			phase: FlowPhase::Idle,
			pkce: PkcePair::generate(),
		}
	}

	/// Opaque anti-forgery value.
	pub fn state(&self) -> &str {
		&self.state
	}

	/// Nonce the ID token must echo back.
	pub fn nonce(&self) -> &str {
		&self.nonce
	}

	/// Redirect URI used for this attempt.
	pub fn redirect_uri(&self) -> &Url {
		&self.redirect_uri
	}

	/// Creation instant.
	pub fn created_at(&self) -> OffsetDateTime {
		self.created_at
	}

	/// Current phase.
	pub fn phase(&self) -> FlowPhase {
		self.phase
	}

	/// PKCE code challenge derived from the secret verifier.
	pub fn code_challenge(&self) -> &str {
		&self.pkce.challenge
	}

	/// PKCE challenge method (currently always `S256`).
	pub fn code_challenge_method(&self) -> PkceCodeChallengeMethod {
		self.pkce.method
	}

	/// Returns true once `ttl` has elapsed since creation.
	pub fn is_expired_at(&self, now: OffsetDateTime, ttl: Duration) -> bool {
		now - self.created_at >= ttl
	}

	/// Moves the attempt to `next`, rejecting out-of-order transitions.
	pub fn advance(&mut self, next: FlowPhase) -> Result<(), FlowError> {
		if !self.phase.can_move_to(next) {
			return Err(FlowError::InvalidTransition {
				from: self.phase.as_str(),
				to: next.as_str(),
			});
		}

		tracing::debug!(from = %self.phase, to = %next, "authorization attempt transition");

		self.phase = next;

		Ok(())
	}

	/// Builds the authorize URL for `settings`.
	pub fn authorize_url(&self, settings: &ProviderSettings) -> Url {
		let mut url = settings.authorize_url.clone();
		let mut pairs = url.query_pairs_mut();

		pairs.append_pair("response_type", "code");
		pairs.append_pair("client_id", &settings.client_id);
		pairs.append_pair("redirect_uri", self.redirect_uri.as_str());

		if !settings.default_scopes.is_empty() {
			pairs.append_pair("scope", &settings.default_scopes.joined());
		}

		pairs.append_pair("state", &self.state);
		pairs.append_pair("nonce", &self.nonce);
		pairs.append_pair("code_challenge", &self.pkce.challenge);
		pairs.append_pair("code_challenge_method", self.pkce.method.as_str());

		drop(pairs);

		url
	}

	pub(crate) fn pkce_verifier(&self) -> &str {
		&self.pkce.verifier
	}
}
impl Debug for AuthorizationAttempt {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationAttempt")
			.field("state", &self.state)
			.field("redirect_uri", &self.redirect_uri)
			.field("created_at", &self.created_at)
			.field("phase", &self.phase)
			.field("code_challenge", &self.pkce.challenge)
			.finish()
	}
}

#[derive(Clone)]
struct PkcePair {
	verifier: String,
	challenge: String,
	method: PkceCodeChallengeMethod,
}
impl PkcePair {
	fn generate() -> Self {
		let verifier = random_string(PKCE_VERIFIER_LEN);
		let challenge = compute_pkce_challenge(&verifier);

		Self { verifier, challenge, method: PkceCodeChallengeMethod::S256 }
	}
}

impl<C> AuthorizationDriver<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Starts an attempt: remembers it under a fresh `state` and returns the redirect.
	pub async fn initiate(&self, settings: &ProviderSettings) -> Result<RedirectInstruction> {
		obs::observe(FlowKind::Authorization, "initiate", async {
			let mut attempt = AuthorizationAttempt::generate(self.redirect_uri.clone());

			attempt.advance(FlowPhase::AwaitingCallback)?;

			let instruction = RedirectInstruction {
				authorize_url: attempt.authorize_url(settings),
				state: attempt.state.clone(),
			};

			self.store.save(attempt).await?;

			tracing::info!(provider = %settings.name, "redirecting to the authorization endpoint");

			Ok(instruction)
		})
		.await
	}
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

fn compute_pkce_challenge(verifier: &str) -> String {
	let mut hasher = Sha256::new();

	hasher.update(verifier.as_bytes());

	URL_SAFE_NO_PAD.encode(hasher.finalize())
}
