// self
use crate::{_prelude::*, obs::FlowKind};

/// Future returned by [`FlowSpan::instrument`]; a plain passthrough without `tracing`.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`FlowSpan::instrument`]; a plain passthrough without `tracing`.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// Span wrapping one broker operation for one caller.
///
/// Fields: `flow` (operation label), `stage` (call site), and `caller_key` (empty when the
/// caller opted out of caching). Token values never enter the span.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates an INFO span for `kind` at `stage` on behalf of `caller_key`.
	pub fn new(kind: FlowKind, stage: &'static str, caller_key: &str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"credential_broker.flow",
				flow = kind.as_str(),
				stage,
				caller_key
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage, caller_key);

			Self {}
		}
	}

	/// Runs `fut` inside the span; every retry event it emits inherits the span fields.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrument_preserves_output() {
		let span = FlowSpan::new(FlowKind::Request, "instrument_preserves_output", "svc");

		assert_eq!(span.instrument(async { 42 }).await, 42);
	}

	#[tokio::test]
	async fn spans_accept_empty_caller_keys() {
		let span = FlowSpan::new(FlowKind::Token, "uncached", "");

		assert!(span.instrument(async { true }).await);
	}
}
