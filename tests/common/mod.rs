//! Shared fixtures for integration tests: a mocked OpenID provider and token helpers.

#![allow(dead_code)]

// std
use std::time::Duration;
// crates.io
use httpmock::prelude::*;
use jsonwebtoken::{EncodingKey, Header};
use serde_json::{Value, json};
// self
use oidc_relying_party::{
	config::Config,
	flows::AuthorizationDriver,
	http::{DEFAULT_TIMEOUT, ReqwestHttpClient},
	provider::{ProviderMetadata, ProviderSettings, RequestMethod, build_provider_settings},
	store::MemoryAttemptStore,
	url::Url,
};

pub const CLIENT_ID: &str = "relying-party-it";
pub const CLIENT_SECRET: &str = "secret-it";
pub const DISCOVERY_PATH: &str = "/realms/demo/.well-known/openid-configuration";
pub const REDIRECT_URI: &str = "http://localhost:7070/callback";

pub fn issuer(server: &MockServer) -> String {
	server.url("/realms/demo")
}

pub fn discovery_document(server: &MockServer) -> Value {
	json!({
		"issuer": issuer(server),
		"authorization_endpoint": server.url("/realms/demo/protocol/openid-connect/auth"),
		"token_endpoint": server.url("/realms/demo/protocol/openid-connect/token"),
		"userinfo_endpoint": server.url("/realms/demo/protocol/openid-connect/userinfo"),
		"jwks_uri": server.url("/realms/demo/protocol/openid-connect/certs"),
		"scopes_supported": ["openid", "profile", "email"],
		"response_types_supported": ["code"],
	})
}

pub async fn mock_discovery(server: &MockServer) -> httpmock::Mock<'_> {
	let document = discovery_document(server).to_string();

	server
		.mock_async(|when, then| {
			when.method(GET).path(DISCOVERY_PATH);
			then.status(200).header("content-type", "application/json").body(document);
		})
		.await
}

pub fn discovery_url(server: &MockServer) -> Url {
	Url::parse(&server.url(DISCOVERY_PATH)).expect("Mock discovery URL should parse.")
}

pub fn http_client() -> ReqwestHttpClient {
	ReqwestHttpClient::with_timeout(DEFAULT_TIMEOUT).expect("HTTP client should build.")
}

/// Client whose timeout is far shorter than [`SLOW_RESPONSE`].
pub fn impatient_http_client() -> ReqwestHttpClient {
	ReqwestHttpClient::with_timeout(Duration::from_millis(200)).expect("HTTP client should build.")
}

pub const SLOW_RESPONSE: Duration = Duration::from_secs(2);

pub fn metadata(server: &MockServer) -> ProviderMetadata {
	ProviderMetadata::from_json(discovery_document(server).to_string().as_bytes())
		.expect("Mock discovery document should parse.")
}

pub fn settings(server: &MockServer, method: RequestMethod) -> ProviderSettings {
	let mut settings = build_provider_settings(&metadata(server), CLIENT_ID, CLIENT_SECRET);

	settings.request_method = method;

	settings
}

pub fn driver() -> (AuthorizationDriver, std::sync::Arc<MemoryAttemptStore>) {
	driver_with(http_client())
}

pub fn driver_with(
	http_client: ReqwestHttpClient,
) -> (AuthorizationDriver, std::sync::Arc<MemoryAttemptStore>) {
	let store = std::sync::Arc::new(MemoryAttemptStore::default());
	let redirect = Url::parse(REDIRECT_URI).expect("Redirect URI should parse.");

	(AuthorizationDriver::new(http_client, store.clone(), redirect), store)
}

pub fn config(server: &MockServer, extra: &[(&str, &str)]) -> Config {
	let discovery = server.url(DISCOVERY_PATH);
	let mut pairs = vec![
		("CLIENT_ID".to_owned(), CLIENT_ID.to_owned()),
		("CLIENT_SECRET".to_owned(), CLIENT_SECRET.to_owned()),
		("DISCOVERY_URL".to_owned(), discovery),
	];

	pairs.extend(extra.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())));

	Config::from_lookup(|name| {
		pairs.iter().rev().find(|(key, _)| key == name).map(|(_, value)| value.clone())
	})
	.expect("Test configuration should load.")
}

/// Signs an ID token with a throwaway HMAC key; the relying party does not check signatures.
pub fn id_token(issuer: &str, nonce: &str) -> String {
	let now = std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.expect("Clock should be after the epoch.")
		.as_secs();
	let claims = json!({
		"iss": issuer,
		"aud": CLIENT_ID,
		"azp": CLIENT_ID,
		"sub": "user-42",
		"exp": now + 300,
		"iat": now,
		"nonce": nonce,
	});

	jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test-only"))
		.expect("Test ID token should encode.")
}

pub fn token_response(id_token: &str) -> String {
	json!({
		"access_token": "access-it",
		"token_type": "Bearer",
		"expires_in": 300,
		"refresh_token": "refresh-it",
		"scope": "openid profile",
		"id_token": id_token,
		"session_state": "session-it",
	})
	.to_string()
}

pub fn query_value(url: &Url, name: &str) -> String {
	url.query_pairs()
		.find(|(key, _)| key == name)
		.map(|(_, value)| value.into_owned())
		.unwrap_or_else(|| panic!("Query parameter `{name}` should be present."))
}
