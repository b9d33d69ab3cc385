//! Token exchange contract and the retrying wrapper around it.
//!
//! A [`TokenExchanger`] performs exactly one client-credentials exchange per call.
//! [`exchange_with_retry`] layers the backoff policy on top: an initial attempt, then up to
//! `retries` further attempts separated by [`backoff_delay`](crate::backoff::backoff_delay)
//! waits. Once the budget is spent, the last failure surfaces as an
//! [`AuthenticationError`].

// self
use crate::{
	_prelude::*,
	auth::{ScopeList, Secret},
	backoff::{BackoffSchedule, Sleeper},
	config::ClientAuthMethod,
	error::{AuthenticationError, ExchangeError},
	obs::{self, FlowKind},
};

/// Boxed future returned by [`TokenExchanger::exchange`].
pub type ExchangeFuture<'a> =
	Pin<Box<dyn Future<Output = Result<IssuedToken, ExchangeError>> + 'a + Send>>;

/// Performs a single client-credentials exchange against a token authority.
pub trait TokenExchanger
where
	Self: Send + Sync,
{
	/// Exchanges the client identity for an access token covering `request.scopes`.
	///
	/// Implementations must not reject empty access tokens; the broker classifies those.
	fn exchange<'a>(&'a self, request: &'a ExchangeRequest<'a>) -> ExchangeFuture<'a>;
}

/// Inputs of a single client-credentials exchange.
#[derive(Clone, Copy, Debug)]
pub struct ExchangeRequest<'a> {
	/// OAuth 2.0 client identifier.
	pub client_id: &'a str,
	/// OAuth 2.0 client secret.
	pub client_secret: &'a Secret,
	/// Token endpoint of the authority.
	pub token_url: &'a Url,
	/// Client authentication method.
	pub auth_method: ClientAuthMethod,
	/// Skips TLS certificate verification when true.
	pub skip_tls_verify: bool,
	/// Scopes to request, in order.
	pub scopes: &'a ScopeList,
}

/// Access token returned by a successful exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedToken {
	/// Access token secret; callers must avoid logging it.
	pub access_token: Secret,
	/// Expiry instant; `None` means the token does not expire.
	pub expires_at: Option<OffsetDateTime>,
}
impl IssuedToken {
	/// Creates a token without an expiry.
	pub fn new(access_token: impl Into<String>) -> Self {
		Self { access_token: Secret::new(access_token), expires_at: None }
	}

	/// Sets an absolute expiry instant.
	pub fn expiring_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets the expiry relative to the current instant.
	pub fn expiring_in(self, lifetime: Duration) -> Self {
		self.expiring_at(OffsetDateTime::now_utc() + lifetime)
	}
}

/// Runs `exchanger` with up to `retries` backoff-separated retries.
///
/// Retry `n` (zero-based) waits `2^n` seconds through `sleeper` before attempting again. After
/// the final failure the last [`ExchangeError`] is wrapped in an [`AuthenticationError`].
pub async fn exchange_with_retry(
	exchanger: &dyn TokenExchanger,
	sleeper: &dyn Sleeper,
	request: &ExchangeRequest<'_>,
	retries: u32,
) -> Result<IssuedToken> {
	let mut last = match exchanger.exchange(request).await {
		Ok(token) => return Ok(token),
		Err(err) => err,
	};

	for (attempt, delay) in BackoffSchedule::new(retries) {
		obs::record_retry(FlowKind::Exchange, attempt, delay, &last);
		sleeper.sleep(delay).await;

		match exchanger.exchange(request).await {
			Ok(token) => return Ok(token),
			Err(err) => last = err,
		}
	}

	Err(AuthenticationError::exhausted(last).into())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::*;

	fn request<'a>(secret: &'a Secret, url: &'a Url, scopes: &'a ScopeList) -> ExchangeRequest<'a> {
		ExchangeRequest {
			client_id: TEST_CLIENT_ID,
			client_secret: secret,
			token_url: url,
			auth_method: ClientAuthMethod::default(),
			skip_tls_verify: false,
			scopes,
		}
	}

	fn unavailable() -> ExchangeError {
		ExchangeError::Unexpected { message: "unavailable".into(), status: Some(503) }
	}

	#[tokio::test]
	async fn first_success_skips_backoff() {
		let secret = Secret::new(TEST_CLIENT_SECRET);
		let url = Url::parse(TEST_TOKEN_URL).expect("Token URL fixture should parse.");
		let scopes = ScopeList::new(["read"]).expect("Scope fixture should be valid.");
		let exchanger = ScriptedExchanger::issuing("fresh");
		let sleeper = RecordingSleeper::default();
		let token = exchange_with_retry(&exchanger, &sleeper, &request(&secret, &url, &scopes), 3)
			.await
			.expect("Exchange should succeed on the first attempt.");

		assert_eq!(token.access_token.expose(), "fresh");
		assert_eq!(exchanger.calls(), 1);
		assert!(sleeper.delays().is_empty());
		assert_eq!(exchanger.requested_scopes(), vec![vec!["read".to_string()]]);
	}

	#[tokio::test]
	async fn exhausted_retries_sleep_exponentially_then_fail() {
		let secret = Secret::new(TEST_CLIENT_SECRET);
		let url = Url::parse(TEST_TOKEN_URL).expect("Token URL fixture should parse.");
		let scopes = ScopeList::default();
		let exchanger = ScriptedExchanger::failing();
		let sleeper = RecordingSleeper::default();
		let err = exchange_with_retry(&exchanger, &sleeper, &request(&secret, &url, &scopes), 3)
			.await
			.expect_err("Exchange should fail once retries are exhausted.");

		assert_eq!(sleeper.seconds(), vec![1, 2, 4]);
		assert_eq!(exchanger.calls(), 4);

		match err {
			Error::Authentication(auth) => assert!(matches!(
				auth.source,
				Some(ExchangeError::Unexpected { status: Some(503), .. })
			)),
			other => panic!("Expected an authentication failure, got {other:?}."),
		}
	}

	#[tokio::test]
	async fn recovers_mid_schedule() {
		let secret = Secret::new(TEST_CLIENT_SECRET);
		let url = Url::parse(TEST_TOKEN_URL).expect("Token URL fixture should parse.");
		let scopes = ScopeList::default();
		let exchanger = ScriptedExchanger::issuing("late")
			.then([Err(unavailable()), Err(unavailable())]);
		let sleeper = RecordingSleeper::default();
		let token = exchange_with_retry(&exchanger, &sleeper, &request(&secret, &url, &scopes), 5)
			.await
			.expect("Exchange should succeed on the third attempt.");

		assert_eq!(token.access_token.expose(), "late");
		assert_eq!(sleeper.seconds(), vec![1, 2]);
		assert_eq!(exchanger.calls(), 3);
	}

	#[tokio::test]
	async fn zero_budget_fails_without_sleeping() {
		let secret = Secret::new(TEST_CLIENT_SECRET);
		let url = Url::parse(TEST_TOKEN_URL).expect("Token URL fixture should parse.");
		let scopes = ScopeList::default();
		let exchanger = ScriptedExchanger::failing();
		let sleeper = RecordingSleeper::default();
		let result =
			exchange_with_retry(&exchanger, &sleeper, &request(&secret, &url, &scopes), 0).await;

		assert!(matches!(result, Err(Error::Authentication(_))));
		assert_eq!(exchanger.calls(), 1);
		assert!(sleeper.delays().is_empty());
	}

	#[test]
	fn issued_token_expiry_helpers() {
		let token = IssuedToken::new("abc");

		assert_eq!(token.expires_at, None);

		let before = OffsetDateTime::now_utc();
		let token = token.expiring_in(Duration::minutes(10));
		let expires_at = token.expires_at.expect("Expiry should be set.");

		assert!(expires_at >= before + Duration::minutes(10));
	}
}
