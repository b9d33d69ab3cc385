//! Optional observability helpers for broker operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `credential_broker.flow` with the `flow`
//!   (operation), `stage` (call site), and `caller_key` fields, plus a WARN event for every
//!   scheduled retry.
//! - Enable `metrics` to increment the `credential_broker_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`, and the
//!   `credential_broker_retry_total` counter labeled by `flow`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Broker operations observed by the span and metric helpers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Cache-aware token acquisition.
	Token,
	/// Client-credentials exchange against the token endpoint.
	Exchange,
	/// Downstream call with re-authentication on unauthorized responses.
	Request,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Token => "token",
			FlowKind::Exchange => "exchange",
			FlowKind::Request => "request",
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
	/// Entry to a broker operation.
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

/// Records a scheduled retry: a WARN event (with `tracing`) and a counter bump (with `metrics`).
pub fn record_retry(kind: FlowKind, attempt: u32, delay: Duration, reason: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		::tracing::warn!(
			flow = kind.as_str(),
			attempt,
			delay_secs = delay.whole_seconds(),
			%reason,
			"Retrying after backoff."
		);
	}

	#[cfg(not(feature = "tracing"))]
	{
		let _ = (attempt, delay, reason);
	}

	record_retry_count(kind);
}
