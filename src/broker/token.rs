//! Cache-aware token acquisition.

// self
use crate::{
	_prelude::*,
	auth::{ScopeList, Secret},
	broker::Broker,
	cache::{self, CacheTtl},
	error::AuthenticationError,
	exchange,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl Broker {
	/// Returns an access token for `caller_key` covering `scopes`.
	///
	/// With a cache configured and a non-empty `caller_key`, a cached value is returned as is.
	/// Otherwise the token is exchanged with up to `num_retry` retries (`None` uses
	/// [`BrokerConfig::max_retry`](crate::config::BrokerConfig::max_retry)) and, when caching is
	/// engaged and the token has not already expired, written back with its remaining lifetime.
	///
	/// An empty access token from the endpoint fails with an
	/// [`AuthenticationError`] and is never cached.
	pub async fn token(
		&self,
		caller_key: &str,
		scopes: &ScopeList,
		num_retry: Option<u32>,
	) -> Result<Secret> {
		const KIND: FlowKind = FlowKind::Token;

		let span = FlowSpan::new(KIND, "token", caller_key);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.acquire(caller_key, scopes, num_retry)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Builds the cache key this broker uses for `caller_key` and `scopes`.
	pub fn cache_key(&self, caller_key: &str, scopes: &ScopeList) -> String {
		cache::cache_key(&self.config.cache_root, self.config.token_class, caller_key, scopes)
	}

	/// Drops the cached token for `caller_key` and `scopes`, forcing the next call to exchange.
	///
	/// Does nothing when no cache is configured or `caller_key` is empty.
	pub async fn evict(&self, caller_key: &str, scopes: &ScopeList) -> Result<()> {
		if let Some(cache) = self.cache_for(caller_key) {
			cache.delete(&self.cache_key(caller_key, scopes)).await?;
		}

		Ok(())
	}

	async fn acquire(
		&self,
		caller_key: &str,
		scopes: &ScopeList,
		num_retry: Option<u32>,
	) -> Result<Secret> {
		let cached = match self.cache_for(caller_key) {
			Some(cache) => {
				let key = self.cache_key(caller_key, scopes);

				if let Some(value) = cache.read(&key).await? {
					return Ok(Secret::new(value));
				}

				Some((cache, key))
			},
			None => None,
		};
		let issued = exchange::exchange_with_retry(
			self.exchanger.as_ref(),
			self.sleeper.as_ref(),
			&self.exchange_request(scopes),
			self.resolve_retry(num_retry),
		)
		.await?;

		if issued.access_token.is_empty() {
			return Err(AuthenticationError::empty_token().into());
		}

		let ttl = CacheTtl::until(issued.expires_at, OffsetDateTime::now_utc());

		if let (Some((cache, key)), Some(ttl)) = (cached, ttl) {
			cache.write(&key, issued.access_token.expose(), ttl).await?;
		}

		Ok(issued.access_token)
	}
}
