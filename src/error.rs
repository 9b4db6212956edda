//! Relying-party error types shared across discovery, flows, token checks, and userinfo.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type JsonPathError = serde_path_to_error::Error<serde_json::Error>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Startup configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Provider metadata could not be discovered.
	#[error(transparent)]
	Discovery(#[from] DiscoveryError),
	/// Authorization or token exchange failure.
	#[error(transparent)]
	Flow(#[from] FlowError),
	/// ID token claims were rejected; no session may be established.
	#[error(transparent)]
	IdToken(#[from] IdTokenValidationError),
	/// Userinfo endpoint call failed.
	#[error(transparent)]
	UserInfo(#[from] UserInfoError),
	/// Pending-attempt storage failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
}

/// Configuration failures raised while loading settings at startup.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// One or more required environment variables are absent.
	#[error("Missing required environment variables: {}.", .names.join(", "))]
	Missing {
		/// Names of every absent variable, in lookup order.
		names: Vec<&'static str>,
	},
	/// An environment variable holds a value that cannot be used.
	#[error("Environment variable {name} is invalid: {reason}.")]
	Invalid {
		/// Variable name.
		name: &'static str,
		/// Why the value was rejected.
		reason: String,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Provider settings contain a URL the OAuth client rejects.
	#[error("Provider settings contain an invalid {endpoint} URL.")]
	InvalidEndpoint {
		/// Which endpoint failed.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	pub(crate) fn invalid(name: &'static str, reason: impl Display) -> Self {
		Self::Invalid { name, reason: reason.to_string() }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Discovery document could not be fetched or understood.
#[derive(Debug, ThisError)]
#[error("Unable to discover OpenID provider metadata from {url}.")]
pub struct DiscoveryError {
	/// Discovery URL that was requested.
	pub url: String,
	/// Underlying cause.
	#[source]
	pub cause: DiscoveryCause,
}
impl DiscoveryError {
	pub(crate) fn new(url: &Url, cause: impl Into<DiscoveryCause>) -> Self {
		Self { url: url.to_string(), cause: cause.into() }
	}

	/// Returns true when the document was fetched but could not be parsed.
	pub fn is_parse(&self) -> bool {
		matches!(self.cause, DiscoveryCause::Parse(_))
	}
}

/// Reasons a discovery request fails.
#[derive(Debug, ThisError)]
pub enum DiscoveryCause {
	/// Network failure or timeout.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Provider answered with a non-success status.
	#[error("Discovery endpoint returned HTTP {status}.")]
	Status {
		/// HTTP status code.
		status: u16,
	},
	/// Body is not a valid discovery document (malformed JSON or missing fields).
	#[error("Discovery document is malformed.")]
	Parse(#[source] JsonPathError),
	/// Document parsed but violates a metadata invariant.
	#[error("Discovery document field `{field}` is invalid: {reason}.")]
	InvalidMetadata {
		/// Offending field.
		field: &'static str,
		/// Why the value was rejected.
		reason: &'static str,
	},
}

/// Authorization-code flow failures.
#[derive(Debug, ThisError)]
pub enum FlowError {
	/// Callback carried no `code` parameter.
	#[error("Authorization callback is missing the code parameter.")]
	MissingCode,
	/// Callback `state` is absent, unknown, expired, or already used.
	#[error("Authorization state is missing, unknown, or expired.")]
	UnknownState,
	/// Provider reported an OAuth error, either on the redirect or from the token endpoint.
	#[error("Provider returned {error}{}.", .description.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
	Provider {
		/// OAuth `error` code.
		error: String,
		/// Optional `error_description`.
		description: Option<String>,
	},
	/// Token endpoint answered with a non-success status and no OAuth error body.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint responded with malformed JSON.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: JsonPathError,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token response carried no `id_token`.
	#[error("Token response does not include an id_token.")]
	MissingIdToken,
	/// Attempt was asked to move between phases out of order.
	#[error("Authorization attempt cannot move from {from} to {to}.")]
	InvalidTransition {
		/// Current phase label.
		from: &'static str,
		/// Requested phase label.
		to: &'static str,
	},
	/// Token request could not be assembled.
	#[error("Token request could not be built: {message}.")]
	Request {
		/// Builder failure message.
		message: String,
	},
	/// Network failure while calling the token endpoint.
	#[error(transparent)]
	Transport(#[from] TransportError),
}
impl FlowError {
	/// Returns true when the failure originated with the end user or provider redirect rather
	/// than the token endpoint round-trip.
	pub fn is_client_side(&self) -> bool {
		matches!(
			self,
			Self::MissingCode
				| Self::UnknownState
				| Self::InvalidTransition { .. }
				| Self::Provider { .. }
		)
	}
}

/// Categories of ID token rejection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IdTokenErrorKind {
	/// Token is not a decodable JWT.
	Malformed,
	/// `iss` differs from the discovered issuer.
	IssuerMismatch,
	/// `aud` does not contain the client id.
	AudienceMismatch,
	/// `azp` is missing for a multi-audience token or names another client.
	AuthorizedPartyMismatch,
	/// `exp` claim is absent.
	MissingExpiry,
	/// `exp` is in the past.
	Expired,
	/// `nonce` differs from the one sent with the authorization request.
	NonceMismatch,
}

/// ID token rejected during claim validation.
#[derive(Debug, ThisError)]
pub enum IdTokenValidationError {
	/// Token could not be decoded.
	#[error("ID token is malformed.")]
	Malformed(#[source] jsonwebtoken::errors::Error),
	/// Issuer claim mismatch.
	#[error("The issuer {expected} obtained from discovery does not match the iss claim {actual}.")]
	IssuerMismatch {
		/// Issuer from provider metadata.
		expected: String,
		/// Issuer carried by the token.
		actual: String,
	},
	/// Audience claim mismatch.
	#[error("The aud claim {audience:?} does not contain client_id {client_id}.")]
	AudienceMismatch {
		/// Configured client id.
		client_id: String,
		/// Audience carried by the token.
		audience: Vec<String>,
	},
	/// Authorized party claim mismatch.
	#[error("The azp claim {azp:?} does not match client_id {client_id}.")]
	AuthorizedPartyMismatch {
		/// Configured client id.
		client_id: String,
		/// Authorized party carried by the token.
		azp: Option<String>,
	},
	/// Missing expiry.
	#[error("ID token has no exp claim.")]
	MissingExpiry,
	/// Token expired.
	#[error("ID token expired at {expired_at}.")]
	Expired {
		/// Expiry instant from the `exp` claim.
		expired_at: OffsetDateTime,
	},
	/// Nonce mismatch.
	#[error("ID token nonce does not match the authorization request.")]
	NonceMismatch,
}
impl IdTokenValidationError {
	/// Returns the rejection category.
	pub fn kind(&self) -> IdTokenErrorKind {
		match self {
			Self::Malformed(_) => IdTokenErrorKind::Malformed,
			Self::IssuerMismatch { .. } => IdTokenErrorKind::IssuerMismatch,
			Self::AudienceMismatch { .. } => IdTokenErrorKind::AudienceMismatch,
			Self::AuthorizedPartyMismatch { .. } => IdTokenErrorKind::AuthorizedPartyMismatch,
			Self::MissingExpiry => IdTokenErrorKind::MissingExpiry,
			Self::Expired { .. } => IdTokenErrorKind::Expired,
			Self::NonceMismatch => IdTokenErrorKind::NonceMismatch,
		}
	}
}

/// Userinfo endpoint failures.
#[derive(Debug, ThisError)]
pub enum UserInfoError {
	/// Provider answered with a non-success status.
	#[error("Userinfo endpoint returned HTTP {status_code}.")]
	Status {
		/// HTTP status code.
		status_code: u16,
	},
	/// Body is not a valid userinfo document.
	#[error("Userinfo response is malformed.")]
	Parse(#[source] JsonPathError),
	/// Network failure or timeout.
	#[error(transparent)]
	Transport(#[from] TransportError),
}

/// Transport-level failures (network, IO, timeouts).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Request did not complete before the configured timeout.
	#[error("Request to {endpoint} timed out.")]
	Timeout {
		/// Endpoint label.
		endpoint: &'static str,
	},
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the {endpoint} endpoint.")]
	Network {
		/// Endpoint label.
		endpoint: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(endpoint: &'static str, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}

	/// Classifies a reqwest failure for the named endpoint.
	pub fn from_reqwest(endpoint: &'static str, err: ReqwestError) -> Self {
		if err.is_timeout() { Self::Timeout { endpoint } } else { Self::network(endpoint, err) }
	}
}
