//! `oidc-rp` binary: loads configuration, discovers the provider, and serves the relying party.

// crates.io
use color_eyre::eyre::{Result, WrapErr};
// self
use oidc_relying_party::{config::Config, obs, server};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = Config::from_env().wrap_err("failed to load configuration")?;

	obs::init_subscriber(config.log_format).wrap_err("failed to install the tracing subscriber")?;

	tracing::info!(
		discovery_url = %config.discovery_url,
		client_id = %config.client_id,
		"starting relying party"
	);

	let state = server::AppState::bootstrap(config)
		.await
		.wrap_err("failed to discover the OpenID provider")?;

	server::serve(state).await.wrap_err("server terminated unexpectedly")?;

	Ok(())
}
