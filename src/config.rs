//! Startup configuration read from the environment.
//!
//! Values come from the process environment, with a `.env` file in the working directory
//! loaded first when present. Nothing outside this module reads the environment; the
//! resulting [`Config`] is passed explicitly to whatever needs it.

// std
use std::{
	env,
	net::{IpAddr, SocketAddr},
	time::Duration as StdDuration,
};
// self
use crate::{
	_prelude::*,
	auth::{ScopeList, Secret},
	error::ConfigError,
	http::DEFAULT_TIMEOUT,
	obs::LogFormat,
	provider::{self, DEFAULT_PROVIDER_NAME, ProviderSource, RequestMethod},
	store::memory::DEFAULT_ATTEMPT_TTL,
};

const DEFAULT_CALLBACK_PATH: &str = "/callback";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:7070";
const DEFAULT_DISCOVERY_TTL_SECS: i64 = 3600;
const WELL_KNOWN_SUFFIX: &str = "/.well-known/openid-configuration";

/// Relying-party configuration.
#[derive(Clone, Debug)]
pub struct Config {
	/// OAuth client identifier (`CLIENT_ID`).
	pub client_id: String,
	/// OAuth client secret (`CLIENT_SECRET`).
	pub client_secret: Secret,
	/// Discovery document URL (`DISCOVERY_URL`). An issuer URL is expanded to its
	/// well-known location.
	pub discovery_url: Url,
	/// Path the provider redirects back to (`CALLBACK_PATH`).
	pub callback_path: String,
	/// Listen address (`BIND_ADDR`).
	pub bind_addr: SocketAddr,
	/// Externally visible base URL (`PUBLIC_URL`).
	pub public_url: Url,
	/// `public_url` with `callback_path` appended to its path.
	pub redirect_uri: Url,
	/// Provider label (`PROVIDER_NAME`).
	pub provider_name: String,
	/// Scopes requested on login (`SCOPES`).
	pub scopes: ScopeList,
	/// Token request method (`TOKEN_REQUEST_METHOD`).
	pub token_request_method: RequestMethod,
	/// Timeout for every outbound call (`HTTP_TIMEOUT_SECS`).
	pub http_timeout: StdDuration,
	/// Metadata refresh interval (`DISCOVERY_TTL_SECS`); `None` disables refresh.
	pub discovery_ttl: Option<Duration>,
	/// Lifetime of a pending authorization attempt (`AUTH_STATE_TTL_SECS`).
	pub attempt_ttl: Duration,
	/// Log output format (`LOG_FORMAT`).
	pub log_format: LogFormat,
}
impl Config {
	/// Loads `.env` (if present) and then reads the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		match dotenvy::dotenv() {
			Ok(_) => {},
			Err(e) if e.not_found() => {},
			Err(e) => return Err(ConfigError::invalid(".env", e)),
		}

		Self::from_lookup(|name| env::var(name).ok())
	}

	/// Builds the configuration from an arbitrary variable lookup.
	///
	/// Blank values count as unset. Every missing required variable is reported in one
	/// [`ConfigError::Missing`].
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let get = |name: &str| lookup(name).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
		let mut missing = Vec::new();
		let mut required = |name: &'static str| {
			let value = get(name);

			if value.is_none() {
				missing.push(name);
			}

			value.unwrap_or_default()
		};
		let client_id = required("CLIENT_ID");
		let client_secret = required("CLIENT_SECRET");
		let discovery_url = required("DISCOVERY_URL");

		if !missing.is_empty() {
			return Err(ConfigError::Missing { names: missing });
		}

		let discovery_url = parse_discovery_url(&discovery_url)?;
		let callback_path = get("CALLBACK_PATH").unwrap_or_else(|| DEFAULT_CALLBACK_PATH.into());

		if !callback_path.starts_with('/') {
			return Err(ConfigError::invalid("CALLBACK_PATH", "path must start with `/`"));
		}

		let bind_addr = get("BIND_ADDR")
			.unwrap_or_else(|| DEFAULT_BIND_ADDR.into())
			.parse::<SocketAddr>()
			.map_err(|e| ConfigError::invalid("BIND_ADDR", e))?;
		let public_url = match get("PUBLIC_URL") {
			Some(raw) => Url::parse(&raw).map_err(|e| ConfigError::invalid("PUBLIC_URL", e))?,
			None => default_public_url(bind_addr)?,
		};
		let redirect_uri = callback_url(&public_url, &callback_path)?;
		let scopes = match get("SCOPES") {
			Some(raw) => ScopeList::from_str(&raw).map_err(|e| ConfigError::invalid("SCOPES", e))?,
			None => ScopeList::openid_profile(),
		};
		let token_request_method = get("TOKEN_REQUEST_METHOD")
			.map(|raw| RequestMethod::from_str(&raw))
			.transpose()
			.map_err(|e| ConfigError::invalid("TOKEN_REQUEST_METHOD", e))?
			.unwrap_or_default();
		let http_timeout = match parse_secs(&get, "HTTP_TIMEOUT_SECS")? {
			Some(0) => return Err(ConfigError::invalid("HTTP_TIMEOUT_SECS", "must be positive")),
			Some(secs) => StdDuration::from_secs(secs),
			None => DEFAULT_TIMEOUT,
		};
		let discovery_ttl = match parse_secs(&get, "DISCOVERY_TTL_SECS")? {
			Some(0) => None,
			Some(secs) => Some(seconds("DISCOVERY_TTL_SECS", secs)?),
			None => Some(Duration::seconds(DEFAULT_DISCOVERY_TTL_SECS)),
		};
		let attempt_ttl = match parse_secs(&get, "AUTH_STATE_TTL_SECS")? {
			Some(0) => return Err(ConfigError::invalid("AUTH_STATE_TTL_SECS", "must be positive")),
			Some(secs) => seconds("AUTH_STATE_TTL_SECS", secs)?,
			None => DEFAULT_ATTEMPT_TTL,
		};
		let log_format = get("LOG_FORMAT")
			.map(|raw| LogFormat::from_str(&raw))
			.transpose()
			.map_err(|e| ConfigError::invalid("LOG_FORMAT", e))?
			.unwrap_or_default();

		Ok(Self {
			client_id,
			client_secret: Secret::new(client_secret),
			discovery_url,
			callback_path,
			bind_addr,
			public_url,
			redirect_uri,
			provider_name: get("PROVIDER_NAME").unwrap_or_else(|| DEFAULT_PROVIDER_NAME.into()),
			scopes,
			token_request_method,
			http_timeout,
			discovery_ttl,
			attempt_ttl,
			log_format,
		})
	}

	/// Inputs the provider cache needs to (re)build its snapshot.
	pub fn provider_source(&self) -> ProviderSource {
		ProviderSource {
			discovery_url: self.discovery_url.clone(),
			client_id: self.client_id.clone(),
			client_secret: self.client_secret.clone(),
			name: self.provider_name.clone(),
			request_method: self.token_request_method,
			scopes: self.scopes.clone(),
		}
	}
}

fn parse_discovery_url(raw: &str) -> Result<Url, ConfigError> {
	let url = Url::parse(raw).map_err(|e| ConfigError::invalid("DISCOVERY_URL", e))?;

	if url.path().trim_end_matches('/').ends_with(WELL_KNOWN_SUFFIX) {
		Ok(url)
	} else {
		Ok(provider::well_known_url(&url))
	}
}

fn default_public_url(bind_addr: SocketAddr) -> Result<Url, ConfigError> {
	let host = match bind_addr.ip() {
		ip if ip.is_unspecified() || ip.is_loopback() => "localhost".to_owned(),
		IpAddr::V4(ip) => ip.to_string(),
		IpAddr::V6(ip) => format!("[{ip}]"),
	};

	Url::parse(&format!("http://{host}:{}", bind_addr.port()))
		.map_err(|e| ConfigError::invalid("BIND_ADDR", e))
}

fn callback_url(public_url: &Url, callback_path: &str) -> Result<Url, ConfigError> {
	if public_url.cannot_be_a_base() {
		return Err(ConfigError::invalid("PUBLIC_URL", "URL must have a hierarchical path"));
	}

	let mut url = public_url.clone();
	let path = format!("{}{callback_path}", public_url.path().trim_end_matches('/'));

	url.set_path(&path);
	url.set_query(None);
	url.set_fragment(None);

	Ok(url)
}

fn parse_secs<G>(get: &G, name: &'static str) -> Result<Option<u64>, ConfigError>
where
	G: Fn(&str) -> Option<String>,
{
	get(name).map(|raw| raw.parse::<u64>().map_err(|e| ConfigError::invalid(name, e))).transpose()
}

fn seconds(name: &'static str, secs: u64) -> Result<Duration, ConfigError> {
	i64::try_from(secs).map(Duration::seconds).map_err(|e| ConfigError::invalid(name, e))
}
