//! Observability helpers for relying-party flows.
//!
//! - Every flow stage runs inside a `tracing` span named `oidc_rp.flow` with the `flow` and
//!   `stage` fields.
//! - Enable the `metrics` feature to increment the `oidc_rp_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.
//! - [`init_subscriber`] installs the process-wide `tracing-subscriber` stack for the binary.

mod metrics;
mod subscriber;
mod tracing;

pub use self::{metrics::*, subscriber::*, tracing::*};

// self
use crate::_prelude::*;

/// Flow kinds observed by the relying party.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Provider metadata discovery.
	Discovery,
	/// Redirect to the authorization endpoint.
	Authorization,
	/// Callback handling plus the code exchange.
	Callback,
	/// Userinfo lookup.
	UserInfo,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Discovery => "discovery",
			FlowKind::Authorization => "authorization",
			FlowKind::Callback => "callback",
			FlowKind::UserInfo => "userinfo",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside a [`FlowSpan`] and records attempt/outcome counters around it.
pub(crate) async fn observe<T, E, Fut>(
	kind: FlowKind,
	stage: &'static str,
	fut: Fut,
) -> Result<T, E>
where
	Fut: Future<Output = Result<T, E>>,
	E: Display,
{
	let span = FlowSpan::new(kind, stage);

	record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = span.instrument(fut).await;

	match &result {
		Ok(_) => record_flow_outcome(kind, FlowOutcome::Success),
		Err(e) => {
			let _guard = span.entered();

			::tracing::warn!(error = %e, "flow stage failed");
			record_flow_outcome(kind, FlowOutcome::Failure);
		},
	}

	result
}
