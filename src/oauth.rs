//! Token endpoint facade over the `oauth2` crate.

pub use oauth2;

// std
use std::future;
// crates.io
use oauth2::{
	AsyncHttpClient, AuthType, AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret,
	EndpointNotSet, EndpointSet, ExtraTokenFields, HttpClientError, HttpRequest, HttpResponse,
	PkceCodeVerifier, RedirectUrl, RequestTokenError, StandardRevocableToken,
	StandardTokenResponse, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRequestTokenError, BasicRevocationErrorResponse,
		BasicTokenIntrospectionResponse, BasicTokenType,
	},
	http::{Method, Uri, header::CONTENT_TYPE},
};
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::Secret,
	error::{ConfigError, FlowError, TransportError},
	flows::AuthorizationPrincipal,
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	provider::{ProviderSettings, RequestMethod},
};

type OidcTokenResponse = StandardTokenResponse<OidcTokenFields, BasicTokenType>;
type ConfiguredClient = Client<
	BasicErrorResponse,
	OidcTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;

/// Token response parameters beyond the OAuth 2.0 standard set.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OidcTokenFields {
	/// OpenID Connect ID token.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
	/// Provider-specific parameters (`session_state`, `refresh_expires_in`, ...).
	#[serde(flatten)]
	pub other: BTreeMap<String, Value>,
}
impl ExtraTokenFields for OidcTokenFields {}

/// Exchanges authorization codes at the provider's token endpoint.
///
/// The client authenticates with `client_secret_post`. When the provider is configured for
/// `GET` token requests the form body is moved into the query string before sending.
pub(crate) struct TokenFacade<C = ReqwestHttpClient>
where
	C: ?Sized + TokenHttpClient,
{
	oauth_client: ConfiguredClient,
	http_client: Arc<C>,
	request_method: RequestMethod,
}
impl<C> TokenFacade<C>
where
	C: ?Sized + TokenHttpClient,
{
	pub(crate) fn from_settings(
		settings: &ProviderSettings,
		redirect_uri: &Url,
		http_client: impl Into<Arc<C>>,
	) -> Result<Self, ConfigError> {
		let auth_url = AuthUrl::new(settings.authorize_url.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "authorization", source })?;
		let token_url = TokenUrl::new(settings.access_token_url.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "token", source })?;
		let redirect_url = RedirectUrl::new(redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "redirect", source })?;
		let oauth_client: ConfiguredClient = Client::new(ClientId::new(settings.client_id.clone()))
			.set_client_secret(ClientSecret::new(settings.client_secret.expose().to_owned()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url)
			.set_redirect_uri(redirect_url)
			.set_auth_type(AuthType::RequestBody);

		Ok(Self {
			oauth_client,
			http_client: http_client.into(),
			request_method: settings.request_method,
		})
	}

	/// Redeems `code` together with the PKCE verifier of the attempt that requested it.
	pub(crate) async fn exchange_code(
		&self,
		code: &str,
		pkce_verifier: &str,
	) -> Result<AuthorizationPrincipal, FlowError> {
		let meta = ResponseMetadataSlot::default();
		let adapter = MethodAdapter {
			handle: self.http_client.with_metadata(meta.clone()),
			method: self.request_method,
		};
		let response = self
			.oauth_client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_owned()))
			.request_async(&adapter)
			.await
			.map_err(|e| map_request_error(&*self.http_client, meta.take(), e))?;

		Ok(into_principal(response))
	}
}

/// Rewrites token requests for the configured HTTP method before handing them to the
/// instrumented transport.
struct MethodAdapter<H> {
	handle: H,
	method: RequestMethod,
}
impl<'c, H, E> AsyncHttpClient<'c> for MethodAdapter<H>
where
	H: AsyncHttpClient<'c, Error = HttpClientError<E>, Future: 'c + Send>,
	E: 'static + Send + Sync + StdError,
{
	type Error = HttpClientError<E>;
	type Future = Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let request = match self.method {
			RequestMethod::Post => Ok(request),
			RequestMethod::Get => into_get(request),
		};

		match request {
			Ok(request) => Box::pin(self.handle.call(request)),
			Err(e) => Box::pin(future::ready(Err(HttpClientError::Http(e)))),
		}
	}
}

fn into_get(request: HttpRequest) -> Result<HttpRequest, oauth2::http::Error> {
	let (mut parts, body) = request.into_parts();
	let form = String::from_utf8_lossy(&body);
	let separator = if parts.uri.query().is_some() { '&' } else { '?' };

	parts.uri = format!("{}{separator}{form}", parts.uri).parse::<Uri>()?;
	parts.method = Method::GET;
	parts.headers.remove(CONTENT_TYPE);

	Ok(HttpRequest::from_parts(parts, Vec::new()))
}

fn into_principal(response: OidcTokenResponse) -> AuthorizationPrincipal {
	let fields = response.extra_fields();
	let mut extra_parameters = fields
		.other
		.iter()
		.map(|(key, value)| {
			let value = match value {
				Value::String(s) => s.clone(),
				other => other.to_string(),
			};

			(key.clone(), value)
		})
		.collect::<BTreeMap<_, _>>();

	if let Some(id_token) = &fields.id_token {
		extra_parameters.insert("id_token".into(), id_token.clone());
	}

	AuthorizationPrincipal {
		access_token: Secret::new(response.access_token().secret().to_owned()),
		token_type: response.token_type().as_ref().to_owned(),
		expires_in: response.expires_in().map(|lifetime| lifetime.as_secs()),
		refresh_token: response.refresh_token().map(|token| Secret::new(token.secret().to_owned())),
		scope: response.scopes().map(|scopes| {
			scopes.iter().map(|scope| scope.as_ref()).collect::<Vec<&str>>().join(" ")
		}),
		extra_parameters,
		claims: None,
	}
}

fn map_request_error<C>(
	http_client: &C,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<C::TransportError>>,
) -> FlowError
where
	C: ?Sized + TokenHttpClient,
{
	let status = meta.and_then(|value| value.status);

	match err {
		RequestTokenError::ServerResponse(response) => FlowError::Provider {
			error: response.error().as_ref().to_owned(),
			description: response.error_description().cloned(),
		},
		RequestTokenError::Request(inner) => map_transport_error(http_client, status, inner),
		RequestTokenError::Parse(source, _body) => match status {
			Some(code) if !(200..300).contains(&code) => FlowError::TokenEndpoint {
				message: format!("HTTP {code} without an OAuth error body"),
				status,
			},
			_ => FlowError::TokenResponseParse { source, status },
		},
		RequestTokenError::Other(message) => FlowError::TokenEndpoint { message, status },
	}
}

fn map_transport_error<C>(
	http_client: &C,
	status: Option<u16>,
	err: HttpClientError<C::TransportError>,
) -> FlowError
where
	C: ?Sized + TokenHttpClient,
{
	match err {
		HttpClientError::Reqwest(inner) => http_client.classify(*inner).into(),
		HttpClientError::Http(inner) => FlowError::Request { message: inner.to_string() },
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => FlowError::TokenEndpoint { message, status },
		_ => FlowError::TokenEndpoint {
			message: "HTTP client error occurred while calling the token endpoint".into(),
			status,
		},
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::ScopeList;

	fn settings(method: RequestMethod) -> ProviderSettings {
		ProviderSettings {
			name: "keycloak".into(),
			authorize_url: Url::parse("https://idp.example/auth")
				.expect("Authorization URL fixture should parse."),
			access_token_url: Url::parse("https://idp.example/token")
				.expect("Token URL fixture should parse."),
			client_id: "client-123".into(),
			client_secret: Secret::new("secret"),
			request_method: method,
			default_scopes: ScopeList::openid_profile(),
		}
	}

	#[test]
	fn builds_client_from_settings() {
		let redirect =
			Url::parse("http://localhost:7070/callback").expect("Redirect fixture should parse.");
		let http = ReqwestHttpClient::with_timeout(crate::http::DEFAULT_TIMEOUT)
			.expect("HTTP client should build.");
		let facade = <TokenFacade>::from_settings(&settings(RequestMethod::Get), &redirect, http)
			.expect("Facade should build.");

		assert_eq!(facade.request_method, RequestMethod::Get);
	}

	#[test]
	fn get_requests_carry_the_form_in_the_query() {
		let request = oauth2::http::Request::builder()
			.method(Method::POST)
			.uri("https://idp.example/token?realm=demo")
			.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
			.body(b"grant_type=authorization_code&code=abc".to_vec())
			.expect("Request fixture should build.");
		let rewritten = into_get(request).expect("Request should rewrite.");

		assert_eq!(rewritten.method(), Method::GET);
		assert_eq!(
			rewritten.uri().to_string(),
			"https://idp.example/token?realm=demo&grant_type=authorization_code&code=abc"
		);
		assert!(rewritten.headers().get(CONTENT_TYPE).is_none());
		assert!(rewritten.body().is_empty());
	}

	#[test]
	fn token_response_keeps_id_token_and_extras() {
		let body = r#"{
			"access_token": "at-1",
			"token_type": "Bearer",
			"expires_in": 300,
			"refresh_token": "rt-1",
			"scope": "openid profile",
			"id_token": "h.p.s",
			"session_state": "abc",
			"not-before-policy": 0
		}"#;
		let response: OidcTokenResponse =
			serde_json::from_str(body).expect("Token response should parse.");
		let principal = into_principal(response);

		assert_eq!(principal.access_token.expose(), "at-1");
		assert_eq!(principal.token_type, "bearer");
		assert_eq!(principal.expires_in, Some(300));
		assert_eq!(principal.scope.as_deref(), Some("openid profile"));
		assert_eq!(principal.id_token(), Some("h.p.s"));
		assert_eq!(principal.extra_parameters.get("session_state"), Some(&"abc".into()));
		assert_eq!(principal.extra_parameters.get("not-before-policy"), Some(&"0".into()));
	}
}
