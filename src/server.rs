//! HTTP surface of the relying party.
//!
//! | Route | Behavior |
//! |---|---|
//! | `GET /` | Provider summary (no secrets). |
//! | `GET` or `POST /login` | `303` to the provider's authorize URL. |
//! | `GET {callback_path}` | Completes the code flow and returns the tokens. |
//! | `POST /userinfo` | Looks up the profile for a form-supplied `access_token`. |
//!
//! Every failure is rendered by [`ApiError`] as JSON `{ code, message }`.

// std
use std::io;
// crates.io
use axum::{
	Form, Json, Router,
	extract::{Query, State, rejection::FormRejection},
	http::StatusCode,
	response::{IntoResponse, Redirect, Response},
	routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
// self
use crate::{
	_prelude::*,
	auth::Secret,
	config::Config,
	error::UserInfoError,
	flows::{AuthorizationDriver, CallbackParams},
	http::ReqwestHttpClient,
	provider::{ProviderCache, ProviderSummary},
	store::{AttemptStore, MemoryAttemptStore},
	userinfo::{self, UserInfo},
};

/// Shared state handed to every handler.
#[derive(Clone, Debug)]
pub struct AppState {
	/// Startup configuration.
	pub config: Arc<Config>,
	/// Shared outbound HTTP client.
	pub http_client: ReqwestHttpClient,
	/// Cached provider metadata and settings.
	pub provider: Arc<ProviderCache>,
	/// Authorization-code flow driver.
	pub driver: Arc<AuthorizationDriver>,
}
impl AppState {
	/// Assembles state from already constructed parts.
	pub fn new(
		config: Arc<Config>,
		http_client: ReqwestHttpClient,
		provider: ProviderCache,
		driver: AuthorizationDriver,
	) -> Self {
		Self { config, http_client, provider: Arc::new(provider), driver: Arc::new(driver) }
	}

	/// Builds the HTTP client, runs the initial discovery, and wires the in-memory attempt
	/// store. Discovery failure is fatal.
	pub async fn bootstrap(config: Config) -> Result<Self> {
		let http_client = ReqwestHttpClient::with_timeout(config.http_timeout)?;
		let provider = ProviderCache::bootstrap(
			http_client.clone(),
			config.provider_source(),
			config.discovery_ttl,
		)
		.await?;
		let store: Arc<dyn AttemptStore> = Arc::new(MemoryAttemptStore::new(config.attempt_ttl));
		let driver =
			AuthorizationDriver::new(http_client.clone(), store, config.redirect_uri.clone());

		Ok(Self::new(Arc::new(config), http_client, provider, driver))
	}
}

/// JSON error body plus the status it is served with.
#[derive(Clone, Debug, Serialize)]
pub struct ApiError {
	/// HTTP status.
	#[serde(skip)]
	pub status: StatusCode,
	/// Stable machine-readable code.
	pub code: &'static str,
	/// Human-readable message.
	pub message: String,
}
impl ApiError {
	/// Creates an error response.
	pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
		Self { status, code, message: message.into() }
	}
}
impl From<Error> for ApiError {
	fn from(e: Error) -> Self {
		let (status, code) = match &e {
			Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error"),
			Error::Discovery(_) => (StatusCode::BAD_GATEWAY, "discovery_failed"),
			Error::Flow(flow) if flow.is_client_side() =>
				(StatusCode::BAD_REQUEST, "authorization_failed"),
			Error::Flow(_) => (StatusCode::BAD_GATEWAY, "token_exchange_failed"),
			Error::IdToken(_) => (StatusCode::UNAUTHORIZED, "id_token_rejected"),
			Error::UserInfo(UserInfoError::Status { status_code: 401 }) =>
				(StatusCode::UNAUTHORIZED, "userinfo_unauthorized"),
			Error::UserInfo(_) => (StatusCode::BAD_GATEWAY, "userinfo_failed"),
			Error::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
		};

		if status.is_server_error() {
			tracing::error!(error = %e, code, "request failed");
		}

		Self::new(status, code, e.to_string())
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		(self.status, Json(self)).into_response()
	}
}

/// Builds the router with request tracing.
pub fn router(state: AppState) -> Router {
	let callback_path = state.config.callback_path.clone();

	Router::new()
		.route("/", get(index))
		.route("/login", get(login).post(login))
		.route(&callback_path, get(callback))
		.route("/userinfo", post(user_info))
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

/// Binds `config.bind_addr` and serves until Ctrl-C.
pub async fn serve(state: AppState) -> io::Result<()> {
	let listener = TcpListener::bind(state.config.bind_addr).await?;

	tracing::info!(
		addr = %listener.local_addr()?,
		redirect_uri = %state.config.redirect_uri,
		"relying party listening"
	);

	axum::serve(listener, router(state)).with_graceful_shutdown(shutdown_signal()).await
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::warn!(error = %e, "failed to listen for the shutdown signal");
	}

	tracing::info!("shutting down");
}

#[derive(Debug, Serialize)]
struct IndexView {
	#[serde(flatten)]
	provider: ProviderSummary,
	issuer: String,
	userinfo_endpoint: Url,
	callback_url: Url,
}

#[derive(Debug, Serialize)]
struct CallbackView {
	access_token: String,
	token_type: String,
	id_token: Option<String>,
	subject: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfoForm {
	access_token: Option<String>,
}

async fn index(State(state): State<AppState>) -> Json<IndexView> {
	let snapshot = state.provider.snapshot().await;

	Json(IndexView {
		provider: snapshot.settings.summary(),
		issuer: snapshot.metadata.issuer.clone(),
		userinfo_endpoint: snapshot.metadata.userinfo_endpoint.clone(),
		callback_url: state.config.redirect_uri.clone(),
	})
}

async fn login(State(state): State<AppState>) -> Result<Redirect, ApiError> {
	let snapshot = state.provider.snapshot().await;
	let instruction = state.driver.initiate(&snapshot.settings).await?;

	Ok(Redirect::to(instruction.authorize_url.as_str()))
}

async fn callback(
	State(state): State<AppState>,
	Query(params): Query<CallbackParams>,
) -> Result<Json<CallbackView>, ApiError> {
	let snapshot = state.provider.snapshot().await;
	let principal =
		state.driver.handle_callback(params, &snapshot.settings, &snapshot.metadata).await?;

	Ok(Json(CallbackView {
		access_token: principal.access_token.expose().to_owned(),
		token_type: principal.token_type.clone(),
		id_token: principal.id_token().map(str::to_owned),
		subject: principal.claims.and_then(|claims| claims.sub),
	}))
}

async fn user_info(
	State(state): State<AppState>,
	form: Result<Form<UserInfoForm>, FormRejection>,
) -> Result<Json<UserInfo>, ApiError> {
	let token = form
		.ok()
		.and_then(|Form(form)| form.access_token)
		.filter(|token| !token.trim().is_empty())
		.ok_or_else(|| {
			ApiError::new(StatusCode::BAD_REQUEST, "missing_access_token", "Missing access token.")
		})?;
	let snapshot = state.provider.snapshot().await;
	let info = userinfo::fetch_user_info(
		&state.http_client,
		&snapshot.metadata.userinfo_endpoint,
		&Secret::new(token),
	)
	.await
	.map_err(Error::from)?;

	Ok(Json(info))
}
