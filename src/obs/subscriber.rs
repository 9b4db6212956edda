// crates.io
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
// self
use crate::_prelude::*;

const DEFAULT_FILTER: &str = "info,oidc_relying_party=debug,tower_http=info";

/// Output format for the process-wide subscriber.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
	/// Human-readable multi-field lines.
	#[default]
	Pretty,
	/// One JSON object per event.
	Json,
}
impl FromStr for LogFormat {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"pretty" | "text" => Ok(Self::Pretty),
			"json" => Ok(Self::Json),
			other => Err(format!("expected `pretty` or `json`, got `{other}`")),
		}
	}
}

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
///
/// Returns an error if a global subscriber is already installed.
pub fn init_subscriber(format: LogFormat) -> Result<(), tracing_subscriber::util::TryInitError> {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
	let registry = tracing_subscriber::registry().with(filter);

	match format {
		LogFormat::Pretty => registry.with(fmt::layer()).try_init(),
		LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn log_format_parses_case_insensitively() {
		assert_eq!(LogFormat::from_str("JSON"), Ok(LogFormat::Json));
		assert_eq!(LogFormat::from_str("pretty"), Ok(LogFormat::Pretty));
		assert!(LogFormat::from_str("xml").is_err());
	}
}
