//! The broker: cache-aware token acquisition and downstream calls that re-authenticate on `401`.
//!
//! [`Broker`] bundles a [`BrokerConfig`] with the capabilities its operations consume: an
//! optional [`TokenCache`], a [`TokenExchanger`], and a [`Sleeper`] for backoff waits. The
//! operations themselves live in submodules:
//!
//! - [`Broker::token`] reads the cache, falls back to an exchange with retries, and populates the
//!   cache with the token's remaining lifetime.
//! - [`Broker::request_with_retry`] and [`Broker::request`] run a caller-supplied downstream call
//!   with a token and, while the response is unauthorized, evict the cached token, back off, and
//!   retry with a freshly exchanged one.

mod request;
mod token;

pub use request::StatusResponse;

// self
#[cfg(feature = "reqwest")] use crate::oauth::ReqwestExchanger;
use crate::{
	_prelude::*,
	auth::ScopeList,
	backoff::{Sleeper, TokioSleeper},
	cache::TokenCache,
	config::BrokerConfig,
	exchange::{ExchangeRequest, TokenExchanger},
};

/// Obtains client-credentials tokens on behalf of callers and retries downstream calls.
///
/// Cloning is cheap: the capabilities are shared behind [`Arc`]s. Fields are public so owners
/// can adjust them before sharing the broker; the broker itself adds no synchronization.
#[derive(Clone)]
pub struct Broker {
	/// Client identity, token endpoint, retry budget, and cache namespace.
	pub config: BrokerConfig,
	/// Token cache; `None` disables caching entirely.
	pub cache: Option<Arc<dyn TokenCache>>,
	/// Performs single client-credentials exchanges.
	pub exchanger: Arc<dyn TokenExchanger>,
	/// Suspends retry loops between attempts.
	pub sleeper: Arc<dyn Sleeper>,
}
impl Broker {
	/// Creates a broker over the default reqwest-backed [`ReqwestExchanger`], without a cache.
	///
	/// Fails with [`ConfigError::MissingArgument`](crate::error::ConfigError::MissingArgument) when
	/// any argument is empty, or
	/// [`ConfigError::InvalidTokenUrl`](crate::error::ConfigError::InvalidTokenUrl) when the URL
	/// does not parse.
	#[cfg(feature = "reqwest")]
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		token_url: impl AsRef<str>,
	) -> Result<Self> {
		Self::from_config(BrokerConfig::new(client_id, client_secret, token_url)?)
	}

	/// Creates a broker over the default reqwest-backed [`ReqwestExchanger`] from an existing
	/// configuration, e.g. one deserialized from a file.
	#[cfg(feature = "reqwest")]
	pub fn from_config(config: BrokerConfig) -> Result<Self> {
		Self::with_exchanger(config, Arc::new(ReqwestExchanger::default()))
	}

	/// Creates a broker that exchanges tokens through `exchanger`.
	pub fn with_exchanger(config: BrokerConfig, exchanger: Arc<dyn TokenExchanger>) -> Result<Self> {
		config.validate()?;

		Ok(Self { config, cache: None, exchanger, sleeper: Arc::new(TokioSleeper) })
	}

	/// Attaches a token cache.
	pub fn with_cache(mut self, cache: Arc<dyn TokenCache>) -> Self {
		self.cache = Some(cache);

		self
	}

	/// Replaces the sleeper used between retry attempts.
	pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
		self.sleeper = sleeper;

		self
	}

	fn resolve_retry(&self, num_retry: Option<u32>) -> u32 {
		num_retry.unwrap_or(self.config.max_retry)
	}

	/// Caching is engaged only when a cache is configured and the caller supplied a key.
	fn cache_for(&self, caller_key: &str) -> Option<&dyn TokenCache> {
		if caller_key.is_empty() {
			return None;
		}

		self.cache.as_deref()
	}

	fn exchange_request<'a>(&'a self, scopes: &'a ScopeList) -> ExchangeRequest<'a> {
		ExchangeRequest {
			client_id: &self.config.client_id,
			client_secret: &self.config.client_secret,
			token_url: &self.config.token_url,
			auth_method: self.config.client_auth_method,
			skip_tls_verify: self.config.skip_tls_verify,
			scopes,
		}
	}
}
impl Debug for Broker {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("config", &self.config)
			.field("cache_set", &self.cache.is_some())
			.finish()
	}
}
