//! Downstream calls that re-authenticate while the service answers `401 Unauthorized`.

// self
use crate::{
	_prelude::*,
	auth::{ScopeList, Secret},
	backoff::BackoffSchedule,
	broker::Broker,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

const UNAUTHORIZED: u16 = 401;

/// Response of a downstream call, inspected for the unauthorized status.
pub trait StatusResponse {
	/// HTTP status code of the response.
	fn status_code(&self) -> u16;

	/// Returns true for `401 Unauthorized`, the only status that triggers re-authentication.
	fn is_unauthorized(&self) -> bool {
		self.status_code() == UNAUTHORIZED
	}
}
#[cfg(feature = "reqwest")]
impl StatusResponse for reqwest::Response {
	fn status_code(&self) -> u16 {
		self.status().as_u16()
	}
}
impl<B> StatusResponse for oauth2::http::Response<B> {
	fn status_code(&self) -> u16 {
		self.status().as_u16()
	}
}

impl Broker {
	/// Runs `call` with the configured retry budget; see [`Broker::request_with_retry`].
	pub async fn request<F, Fut, R, E>(
		&self,
		caller_key: &str,
		scopes: &ScopeList,
		call: F,
	) -> Result<R>
	where
		F: FnMut(Secret) -> Fut,
		Fut: Future<Output = Result<R, E>>,
		R: StatusResponse,
		E: Into<Error>,
	{
		self.request_with_retry(caller_key, scopes, None, call).await
	}

	/// Invokes `call` with a token and retries while the response is unauthorized.
	///
	/// The first token is acquired with `num_retry` exchange retries (`None` uses
	/// [`BrokerConfig::max_retry`](crate::config::BrokerConfig::max_retry)). For every retry `n`
	/// the broker waits `2^n` seconds, evicts the cached token, exchanges a fresh one without
	/// exchange retries, and invokes `call` again. The final response is returned even when it is
	/// still unauthorized; errors from `call` or token acquisition end the loop immediately.
	pub async fn request_with_retry<F, Fut, R, E>(
		&self,
		caller_key: &str,
		scopes: &ScopeList,
		num_retry: Option<u32>,
		mut call: F,
	) -> Result<R>
	where
		F: FnMut(Secret) -> Fut,
		Fut: Future<Output = Result<R, E>>,
		R: StatusResponse,
		E: Into<Error>,
	{
		const KIND: FlowKind = FlowKind::Request;

		let span = FlowSpan::new(KIND, "request_with_retry", caller_key);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let retries = self.resolve_retry(num_retry);
				let token = self.token(caller_key, scopes, Some(retries)).await?;
				let mut response = call(token).await.map_err(Into::into)?;

				for (attempt, delay) in BackoffSchedule::new(retries) {
					if !response.is_unauthorized() {
						break;
					}

					obs::record_retry(KIND, attempt, delay, &"downstream answered 401 Unauthorized");
					self.sleeper.sleep(delay).await;
					self.evict(caller_key, scopes).await?;

					let token = self.token(caller_key, scopes, Some(0)).await?;

					response = call(token).await.map_err(Into::into)?;
				}

				Ok(response)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}
