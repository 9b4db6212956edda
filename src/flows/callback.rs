//! Callback handling: state lookup, code exchange, and ID token checks.

// self
use crate::{
	_prelude::*,
	error::FlowError,
	flows::{AuthorizationAttempt, AuthorizationDriver, AuthorizationPrincipal, FlowPhase},
	http::TokenHttpClient,
	id_token::IdTokenValidator,
	oauth::TokenFacade,
	obs::{self, FlowKind},
	provider::{ProviderMetadata, ProviderSettings},
};

/// Query parameters the provider appends to the redirect URI.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
	/// Authorization code.
	pub code: Option<String>,
	/// State echoed from the authorization request.
	pub state: Option<String>,
	/// OAuth error code, when the provider refused the request.
	pub error: Option<String>,
	/// Human-readable error detail.
	pub error_description: Option<String>,
}

impl<C> AuthorizationDriver<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Completes an attempt from the provider's redirect.
	///
	/// The attempt named by `state` is removed from the store before anything else happens, so
	/// a state value is accepted at most once even when the callback fails.
	pub async fn handle_callback(
		&self,
		params: CallbackParams,
		settings: &ProviderSettings,
		metadata: &ProviderMetadata,
	) -> Result<AuthorizationPrincipal> {
		obs::observe(FlowKind::Callback, "handle_callback", async {
			let pending = match non_empty(params.state.as_deref()) {
				Some(state) => self.store.take(state).await?,
				None => None,
			};

			if let Some(error) = params.error {
				if let Some(mut attempt) = pending {
					attempt.advance(FlowPhase::Failed)?;
				}

				return Err(
					FlowError::Provider { error, description: params.error_description }.into()
				);
			}

			let mut attempt = pending.ok_or(FlowError::UnknownState)?;
			let Some(code) = non_empty(params.code.as_deref()) else {
				attempt.advance(FlowPhase::Failed)?;

				return Err(FlowError::MissingCode.into());
			};

			match self.redeem(&attempt, code, settings, metadata).await {
				Ok(principal) => {
					attempt.advance(FlowPhase::Completed)?;

					tracing::info!(
						subject = principal.claims.as_ref().and_then(|c| c.sub.as_deref()),
						"authorization completed"
					);

					Ok(principal)
				},
				Err(e) => {
					attempt.advance(FlowPhase::Failed)?;

					Err(e)
				},
			}
		})
		.await
	}

	async fn redeem(
		&self,
		attempt: &AuthorizationAttempt,
		code: &str,
		settings: &ProviderSettings,
		metadata: &ProviderMetadata,
	) -> Result<AuthorizationPrincipal> {
		let facade = <TokenFacade<C>>::from_settings(
			settings,
			&self.redirect_uri,
			Arc::clone(&self.http_client),
		)?;
		let mut principal = facade.exchange_code(code, attempt.pkce_verifier()).await?;
		let id_token = principal.id_token().ok_or(FlowError::MissingIdToken)?;
		let claims = IdTokenValidator::new(&metadata.issuer, &settings.client_id)
			.expected_nonce(attempt.nonce())
			.validate(id_token)?;

		principal.claims = Some(claims);

		Ok(principal)
	}
}

fn non_empty(value: Option<&str>) -> Option<&str> {
	value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{auth::ScopeList, http::ReqwestHttpClient, store::MemoryAttemptStore};

	fn metadata() -> ProviderMetadata {
		ProviderMetadata {
			issuer: "https://idp.example".into(),
			authorization_endpoint: Url::parse("https://idp.example/auth")
				.expect("Authorization URL fixture should parse."),
			token_endpoint: Url::parse("http://127.0.0.1:9/token")
				.expect("Token URL fixture should parse."),
			userinfo_endpoint: Url::parse("https://idp.example/userinfo")
				.expect("Userinfo URL fixture should parse."),
			registration_endpoint: None,
			jwks_uri: None,
			end_session_endpoint: None,
			scopes_supported: Vec::new(),
		}
	}

	fn settings() -> ProviderSettings {
		ProviderSettings::builder(&metadata(), "client-123", "secret")
			.default_scopes(ScopeList::openid_profile())
			.build()
	}

	fn driver() -> (AuthorizationDriver, Arc<MemoryAttemptStore>) {
		let store = Arc::new(MemoryAttemptStore::default());
		let http = ReqwestHttpClient::with_timeout(crate::http::DEFAULT_TIMEOUT)
			.expect("HTTP client should build.");
		let redirect =
			Url::parse("http://localhost:7070/callback").expect("Redirect fixture should parse.");

		(AuthorizationDriver::new(http, store.clone(), redirect), store)
	}

	#[tokio::test]
	async fn unknown_state_is_rejected() {
		let (driver, _) = driver();
		let params = CallbackParams {
			code: Some("code".into()),
			state: Some("never-issued".into()),
			..Default::default()
		};
		let err = driver
			.handle_callback(params, &settings(), &metadata())
			.await
			.expect_err("Unknown state must be rejected.");

		assert!(matches!(err, Error::Flow(FlowError::UnknownState)));
	}

	#[tokio::test]
	async fn provider_error_consumes_the_attempt() {
		let (driver, store) = driver();
		let redirect = driver.initiate(&settings()).await.expect("Initiate should succeed.");

		assert_eq!(store.len(), 1);

		let params = CallbackParams {
			state: Some(redirect.state.clone()),
			error: Some("access_denied".into()),
			error_description: Some("user cancelled".into()),
			..Default::default()
		};
		let err = driver
			.handle_callback(params, &settings(), &metadata())
			.await
			.expect_err("Provider errors must propagate.");

		assert!(matches!(
			err,
			Error::Flow(FlowError::Provider { ref error, .. }) if error == "access_denied"
		));
		assert!(store.is_empty());
	}

	#[tokio::test]
	async fn missing_code_fails_once_state_matches() {
		let (driver, store) = driver();
		let redirect = driver.initiate(&settings()).await.expect("Initiate should succeed.");
		let params = CallbackParams { state: Some(redirect.state.clone()), ..Default::default() };
		let err = driver
			.handle_callback(params.clone(), &settings(), &metadata())
			.await
			.expect_err("Missing code must be rejected.");

		assert!(matches!(err, Error::Flow(FlowError::MissingCode)));
		assert!(store.is_empty());

		let replay = driver
			.handle_callback(params, &settings(), &metadata())
			.await
			.expect_err("A consumed state must not be accepted again.");

		assert!(matches!(replay, Error::Flow(FlowError::UnknownState)));
	}

	#[tokio::test]
	async fn unreachable_token_endpoint_fails_the_exchange() {
		let (driver, store) = driver();
		let redirect = driver.initiate(&settings()).await.expect("Initiate should succeed.");
		let params = CallbackParams {
			code: Some("code".into()),
			state: Some(redirect.state.clone()),
			..Default::default()
		};
		let err = driver
			.handle_callback(params, &settings(), &metadata())
			.await
			.expect_err("An unreachable token endpoint must fail the exchange.");

		assert!(matches!(err, Error::Flow(FlowError::Transport(_))));
		assert!(store.is_empty());
	}
}
