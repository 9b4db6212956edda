//! OAuth 2.0 provider settings derived from discovery metadata and client credentials.

// self
use crate::{
	_prelude::*,
	auth::{ScopeList, Secret},
	provider::ProviderMetadata,
};

/// Provider name used when configuration does not override it.
pub const DEFAULT_PROVIDER_NAME: &str = "keycloak";

/// HTTP method used for the token request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestMethod {
	/// Parameters travel in the query string.
	Get,
	/// Parameters travel as an `application/x-www-form-urlencoded` body.
	#[default]
	Post,
}
impl RequestMethod {
	/// Returns the HTTP method name.
	pub const fn as_str(self) -> &'static str {
		match self {
			RequestMethod::Get => "GET",
			RequestMethod::Post => "POST",
		}
	}
}
impl Display for RequestMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for RequestMethod {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_uppercase().as_str() {
			"GET" => Ok(Self::Get),
			"POST" => Ok(Self::Post),
			other => Err(format!("expected GET or POST, got `{other}`")),
		}
	}
}

/// Immutable OAuth 2.0 provider configuration consumed by the flow driver.
///
/// The client secret is held as a [`Secret`] and the type does not implement `Serialize`;
/// use [`ProviderSettings::summary`] for anything that leaves the process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderSettings {
	/// Provider label (authentication scheme name).
	pub name: String,
	/// Authorization endpoint.
	pub authorize_url: Url,
	/// Token endpoint.
	pub access_token_url: Url,
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: Secret,
	/// Method used for the token request.
	pub request_method: RequestMethod,
	/// Scopes requested on every authorization.
	pub default_scopes: ScopeList,
}
impl ProviderSettings {
	/// Starts a builder seeded from discovery metadata and client credentials.
	pub fn builder(
		metadata: &ProviderMetadata,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> ProviderSettingsBuilder {
		ProviderSettingsBuilder::new(metadata, client_id, client_secret)
	}

	/// Returns the secret-free public view of the settings.
	pub fn summary(&self) -> ProviderSummary {
		ProviderSummary {
			name: self.name.clone(),
			client_id: self.client_id.clone(),
			authorize_url: self.authorize_url.clone(),
			access_token_url: self.access_token_url.clone(),
			request_method: self.request_method,
			scopes: self.default_scopes.clone(),
		}
	}
}

/// Serializable view of [`ProviderSettings`] without the client secret.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProviderSummary {
	/// Provider label.
	pub name: String,
	/// OAuth client identifier.
	pub client_id: String,
	/// Authorization endpoint.
	pub authorize_url: Url,
	/// Token endpoint.
	pub access_token_url: Url,
	/// Token request method.
	pub request_method: RequestMethod,
	/// Default scopes.
	pub scopes: ScopeList,
}

/// Builder for [`ProviderSettings`] values.
///
/// Defaults: name `keycloak`, `POST` token requests, and the `openid profile` scopes.
#[derive(Debug)]
pub struct ProviderSettingsBuilder {
	name: String,
	authorize_url: Url,
	access_token_url: Url,
	client_id: String,
	client_secret: Secret,
	request_method: RequestMethod,
	default_scopes: ScopeList,
}
impl ProviderSettingsBuilder {
	/// Creates a builder with the default policy choices.
	pub fn new(
		metadata: &ProviderMetadata,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> Self {
		Self {
			name: DEFAULT_PROVIDER_NAME.into(),
			authorize_url: metadata.authorization_endpoint.clone(),
			access_token_url: metadata.token_endpoint.clone(),
			client_id: client_id.into(),
			client_secret: Secret::new(client_secret),
			request_method: RequestMethod::default(),
			default_scopes: ScopeList::openid_profile(),
		}
	}

	/// Overrides the provider label.
	pub fn name(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();

		self
	}

	/// Overrides the token request method.
	pub fn request_method(mut self, method: RequestMethod) -> Self {
		self.request_method = method;

		self
	}

	/// Overrides the default scopes.
	pub fn default_scopes(mut self, scopes: ScopeList) -> Self {
		self.default_scopes = scopes;

		self
	}

	/// Consumes the builder.
	pub fn build(self) -> ProviderSettings {
		ProviderSettings {
			name: self.name,
			authorize_url: self.authorize_url,
			access_token_url: self.access_token_url,
			client_id: self.client_id,
			client_secret: self.client_secret,
			request_method: self.request_method,
			default_scopes: self.default_scopes,
		}
	}
}

/// Combines discovery metadata with client credentials using the default policy.
pub fn build_provider_settings(
	metadata: &ProviderMetadata,
	client_id: &str,
	client_secret: &str,
) -> ProviderSettings {
	ProviderSettings::builder(metadata, client_id, client_secret).build()
}
