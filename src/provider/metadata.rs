//! OpenID provider discovery.

// self
use crate::{
	_prelude::*,
	error::{DiscoveryCause, DiscoveryError},
	http::ReqwestHttpClient,
	obs::{self, FlowKind},
};

const WELL_KNOWN_PATH: &str = ".well-known/openid-configuration";

/// Provider metadata taken from the discovery document.
///
/// Field names match the wire JSON; unknown fields are ignored so newer providers keep
/// parsing. URL-typed fields reject relative or malformed endpoints at parse time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
	/// Issuer identifier that ID tokens must carry in `iss`.
	pub issuer: String,
	/// Authorization endpoint for the code flow redirect.
	pub authorization_endpoint: Url,
	/// Token endpoint for the code exchange.
	pub token_endpoint: Url,
	/// Userinfo endpoint for bearer profile lookups.
	pub userinfo_endpoint: Url,
	/// Dynamic client registration endpoint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub registration_endpoint: Option<Url>,
	/// JSON Web Key Set location.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub jwks_uri: Option<Url>,
	/// RP-initiated logout endpoint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub end_session_endpoint: Option<Url>,
	/// Scopes the provider advertises.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub scopes_supported: Vec<String>,
}
impl ProviderMetadata {
	/// Parses and validates a discovery document body.
	pub fn from_json(body: &[u8]) -> Result<Self, DiscoveryCause> {
		let mut deserializer = serde_json::Deserializer::from_slice(body);
		let metadata: Self =
			serde_path_to_error::deserialize(&mut deserializer).map_err(DiscoveryCause::Parse)?;

		metadata.validate()?;

		Ok(metadata)
	}

	fn validate(&self) -> Result<(), DiscoveryCause> {
		if self.issuer.trim().is_empty() {
			return Err(DiscoveryCause::InvalidMetadata {
				field: "issuer",
				reason: "issuer must not be empty",
			});
		}

		Ok(())
	}
}

/// Builds `{issuer}/.well-known/openid-configuration`, keeping any issuer path (realms).
pub fn well_known_url(issuer: &Url) -> Url {
	let mut url = issuer.clone();
	let path = format!("{}/{WELL_KNOWN_PATH}", url.path().trim_end_matches('/'));

	url.set_path(&path);
	url.set_query(None);

	url
}

/// Fetches the discovery document at `url` with a single GET.
///
/// Any transport failure, non-2xx status, or malformed body fails with [`DiscoveryError`].
/// Nothing is retried here.
pub async fn discover(
	http_client: &ReqwestHttpClient,
	url: &Url,
) -> Result<ProviderMetadata, DiscoveryError> {
	obs::observe(FlowKind::Discovery, "discover", async {
		let response = http_client
			.get("discovery", url, None)
			.await
			.map_err(|e| DiscoveryError::new(url, e))?;

		if !response.is_success() {
			return Err(DiscoveryError::new(url, DiscoveryCause::Status {
				status: response.status,
			}));
		}

		let metadata =
			ProviderMetadata::from_json(&response.body).map_err(|e| DiscoveryError::new(url, e))?;

		tracing::debug!(issuer = %metadata.issuer, "discovered provider metadata");

		Ok(metadata)
	})
	.await
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const DOCUMENT: &str = r#"{
		"issuer": "https://idp.example/realms/demo",
		"authorization_endpoint": "https://idp.example/realms/demo/protocol/openid-connect/auth",
		"token_endpoint": "https://idp.example/realms/demo/protocol/openid-connect/token",
		"userinfo_endpoint": "https://idp.example/realms/demo/protocol/openid-connect/userinfo",
		"registration_endpoint": "https://idp.example/realms/demo/clients-registrations/openid-connect",
		"grant_types_supported": ["authorization_code", "refresh_token"],
		"claims_parameter_supported": true
	}"#;

	#[test]
	fn parses_document_and_ignores_unknown_fields() {
		let metadata =
			ProviderMetadata::from_json(DOCUMENT.as_bytes()).expect("Document should parse.");

		assert_eq!(metadata.issuer, "https://idp.example/realms/demo");
		assert_eq!(
			metadata.token_endpoint.as_str(),
			"https://idp.example/realms/demo/protocol/openid-connect/token"
		);
		assert!(metadata.registration_endpoint.is_some());
		assert!(metadata.jwks_uri.is_none());
		assert!(metadata.scopes_supported.is_empty());
	}

	#[test]
	fn missing_issuer_is_a_parse_failure() {
		let body = r#"{
			"authorization_endpoint": "https://idp.example/auth",
			"token_endpoint": "https://idp.example/token",
			"userinfo_endpoint": "https://idp.example/userinfo"
		}"#;
		let err = ProviderMetadata::from_json(body.as_bytes())
			.expect_err("Missing issuer must be rejected.");

		assert!(matches!(err, DiscoveryCause::Parse(_)));
	}

	#[test]
	fn blank_issuer_and_relative_endpoints_are_rejected() {
		let blank = r#"{
			"issuer": " ",
			"authorization_endpoint": "https://idp.example/auth",
			"token_endpoint": "https://idp.example/token",
			"userinfo_endpoint": "https://idp.example/userinfo"
		}"#;
		let relative = r#"{
			"issuer": "https://idp.example",
			"authorization_endpoint": "/auth",
			"token_endpoint": "https://idp.example/token",
			"userinfo_endpoint": "https://idp.example/userinfo"
		}"#;

		assert!(matches!(
			ProviderMetadata::from_json(blank.as_bytes()),
			Err(DiscoveryCause::InvalidMetadata { field: "issuer", .. })
		));

		let err = ProviderMetadata::from_json(relative.as_bytes())
			.expect_err("Relative endpoints must be rejected.");

		match err {
			DiscoveryCause::Parse(inner) =>
				assert_eq!(inner.path().to_string(), "authorization_endpoint"),
			other => panic!("Unexpected cause: {other:?}."),
		}
	}

	#[test]
	fn well_known_url_keeps_realm_path() {
		let issuer =
			Url::parse("http://localhost:8080/auth/realms/myrealm").expect("Issuer should parse.");

		assert_eq!(
			well_known_url(&issuer).as_str(),
			"http://localhost:8080/auth/realms/myrealm/.well-known/openid-configuration"
		);

		let root = Url::parse("https://idp.example/").expect("Root issuer should parse.");

		assert_eq!(
			well_known_url(&root).as_str(),
			"https://idp.example/.well-known/openid-configuration"
		);
	}
}
