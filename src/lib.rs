//! Client-credentials token broker: cache-aware token acquisition with exponential backoff and
//! transparent re-authentication of downstream calls that come back unauthorized.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod backoff;
pub mod broker;
pub mod cache;
pub mod config;
pub mod error;
pub mod exchange;
pub mod http;
pub mod oauth;
pub mod obs;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and fakes for tests; enabled via `cfg(test)` or the `test` crate
	//! feature.

	pub use crate::_prelude::*;

	// std
	use std::collections::VecDeque;
	// self
	use crate::{
		auth::Secret,
		backoff::{SleepFuture, Sleeper},
		broker::{Broker, StatusResponse},
		cache::{CacheError, CacheFuture, CacheTtl, MemoryCache, TokenCache},
		config::BrokerConfig,
		error::ExchangeError,
		exchange::{ExchangeFuture, ExchangeRequest, IssuedToken, TokenExchanger},
	};

	/// Client identifier used by test brokers.
	pub const TEST_CLIENT_ID: &str = "test-client";
	/// Client secret used by test brokers.
	pub const TEST_CLIENT_SECRET: &str = "test-secret";
	/// Token endpoint used by test brokers that never reach the network.
	pub const TEST_TOKEN_URL: &str = "https://auth.example.com/oauth2/token";

	/// Sleeper that records requested delays and returns immediately.
	#[derive(Clone, Debug, Default)]
	pub struct RecordingSleeper(Arc<Mutex<Vec<Duration>>>);
	impl RecordingSleeper {
		/// Returns every delay requested so far, in order.
		pub fn delays(&self) -> Vec<Duration> {
			self.0.lock().clone()
		}

		/// Returns the requested delays as whole seconds.
		pub fn seconds(&self) -> Vec<i64> {
			self.0.lock().iter().map(|delay| delay.whole_seconds()).collect()
		}
	}
	impl Sleeper for RecordingSleeper {
		fn sleep(&self, delay: Duration) -> SleepFuture<'_> {
			self.0.lock().push(delay);

			Box::pin(async {})
		}
	}

	/// Single cache operation observed by [`RecordingCache`].
	#[derive(Clone, Debug, PartialEq, Eq)]
	pub enum CacheOp {
		/// `read(key)`.
		Read(String),
		/// `write(key, value, ttl)`.
		Write(String, String, CacheTtl),
		/// `delete(key)`.
		Delete(String),
	}

	/// Cache wrapper that logs every operation before delegating to a [`MemoryCache`].
	#[derive(Clone, Debug, Default)]
	pub struct RecordingCache {
		/// Backing cache that actually stores values.
		pub inner: MemoryCache,
		ops: Arc<Mutex<Vec<CacheOp>>>,
	}
	impl RecordingCache {
		/// Returns every operation observed so far.
		pub fn ops(&self) -> Vec<CacheOp> {
			self.ops.lock().clone()
		}

		/// Returns the keys passed to `delete`.
		pub fn deletes(&self) -> Vec<String> {
			self.ops
				.lock()
				.iter()
				.filter_map(|op| match op {
					CacheOp::Delete(key) => Some(key.clone()),
					_ => None,
				})
				.collect()
		}

		/// Returns the `(key, value, ttl)` triples passed to `write`.
		pub fn writes(&self) -> Vec<(String, String, CacheTtl)> {
			self.ops
				.lock()
				.iter()
				.filter_map(|op| match op {
					CacheOp::Write(key, value, ttl) => Some((key.clone(), value.clone(), *ttl)),
					_ => None,
				})
				.collect()
		}
	}
	impl TokenCache for RecordingCache {
		fn read<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
			self.ops.lock().push(CacheOp::Read(key.to_owned()));

			self.inner.read(key)
		}

		fn write<'a>(&'a self, key: &'a str, value: &'a str, ttl: CacheTtl) -> CacheFuture<'a, ()> {
			self.ops.lock().push(CacheOp::Write(key.to_owned(), value.to_owned(), ttl));

			self.inner.write(key, value, ttl)
		}

		fn delete<'a>(&'a self, key: &'a str) -> CacheFuture<'a, ()> {
			self.ops.lock().push(CacheOp::Delete(key.to_owned()));

			self.inner.delete(key)
		}
	}

	/// Cache whose every operation fails with a backend error.
	#[derive(Clone, Copy, Debug, Default)]
	pub struct FailingCache;
	impl TokenCache for FailingCache {
		fn read<'a>(&'a self, _key: &'a str) -> CacheFuture<'a, Option<String>> {
			Box::pin(async { Err(CacheError::Backend { message: "cache offline".into() }) })
		}

		fn write<'a>(
			&'a self,
			_key: &'a str,
			_value: &'a str,
			_ttl: CacheTtl,
		) -> CacheFuture<'a, ()> {
			Box::pin(async { Err(CacheError::Backend { message: "cache offline".into() }) })
		}

		fn delete<'a>(&'a self, _key: &'a str) -> CacheFuture<'a, ()> {
			Box::pin(async { Err(CacheError::Backend { message: "cache offline".into() }) })
		}
	}

	/// Outcome replayed by [`ScriptedExchanger`] for a single attempt.
	pub type ScriptedOutcome = Result<IssuedToken, ExchangeError>;

	/// Exchanger that replays queued outcomes, then repeats a fallback outcome builder.
	#[derive(Clone)]
	pub struct ScriptedExchanger {
		script: Arc<Mutex<VecDeque<ScriptedOutcome>>>,
		fallback: Arc<dyn Fn() -> ScriptedOutcome + Send + Sync>,
		requests: Arc<Mutex<Vec<Vec<String>>>>,
	}
	impl ScriptedExchanger {
		/// Exchanger that always issues `token` without an expiry.
		pub fn issuing(token: &'static str) -> Self {
			Self::with_fallback(move || Ok(IssuedToken::new(token)))
		}

		/// Exchanger that always fails with an unexpected-response error.
		pub fn failing() -> Self {
			Self::with_fallback(|| {
				Err(ExchangeError::Unexpected {
					message: "token endpoint unavailable".into(),
					status: Some(503),
				})
			})
		}

		/// Exchanger that falls back to `fallback` once the queued outcomes are exhausted.
		pub fn with_fallback(fallback: impl Fn() -> ScriptedOutcome + Send + Sync + 'static) -> Self {
			Self {
				script: Default::default(),
				fallback: Arc::new(fallback),
				requests: Default::default(),
			}
		}

		/// Queues outcomes replayed (in order) before the fallback.
		pub fn then(self, outcomes: impl IntoIterator<Item = ScriptedOutcome>) -> Self {
			self.script.lock().extend(outcomes);

			self
		}

		/// Number of exchange attempts observed.
		pub fn calls(&self) -> usize {
			self.requests.lock().len()
		}

		/// Scopes requested by each attempt.
		pub fn requested_scopes(&self) -> Vec<Vec<String>> {
			self.requests.lock().clone()
		}
	}
	impl TokenExchanger for ScriptedExchanger {
		fn exchange<'a>(&'a self, request: &'a ExchangeRequest<'a>) -> ExchangeFuture<'a> {
			self.requests.lock().push(request.scopes.iter().map(str::to_owned).collect());

			let outcome = self.script.lock().pop_front().unwrap_or_else(|| (self.fallback)());

			Box::pin(async move { outcome })
		}
	}

	/// Minimal downstream response carrying a status code and a label.
	#[derive(Clone, Debug, PartialEq, Eq)]
	pub struct StubResponse {
		/// HTTP status code.
		pub status: u16,
		/// Token the downstream call was invoked with.
		pub token: String,
	}
	impl StatusResponse for StubResponse {
		fn status_code(&self) -> u16 {
			self.status
		}
	}

	/// Builds a broker around `exchanger` with a recording sleeper and no cache.
	pub fn build_test_broker(exchanger: ScriptedExchanger) -> (Broker, RecordingSleeper) {
		let config = BrokerConfig::new(TEST_CLIENT_ID, TEST_CLIENT_SECRET, TEST_TOKEN_URL)
			.expect("Test broker configuration should be valid.");
		let sleeper = RecordingSleeper::default();
		let broker = Broker::with_exchanger(config, Arc::new(exchanger))
			.expect("Test broker should build successfully.")
			.with_sleeper(Arc::new(sleeper.clone()));

		(broker, sleeper)
	}

	/// Builds a broker like [`build_test_broker`] with a [`RecordingCache`] attached.
	pub fn build_cached_test_broker(
		exchanger: ScriptedExchanger,
	) -> (Broker, RecordingSleeper, RecordingCache) {
		let (broker, sleeper) = build_test_broker(exchanger);
		let cache = RecordingCache::default();
		let broker = broker.with_cache(Arc::new(cache.clone()));

		(broker, sleeper, cache)
	}

	/// Reqwest client for downstream calls against self-signed mock servers.
	#[cfg(feature = "reqwest")]
	pub fn test_reqwest_client() -> ReqwestClient {
		ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.")
	}

	/// Builds a broker over the reqwest-backed exchanger pointed at `token_url`, with a recording
	/// sleeper and a [`RecordingCache`].
	///
	/// TLS verification is skipped so the broker can reach self-signed mock endpoints.
	#[cfg(feature = "reqwest")]
	pub fn build_reqwest_test_broker(
		token_url: &str,
	) -> (Broker, RecordingSleeper, RecordingCache) {
		let sleeper = RecordingSleeper::default();
		let cache = RecordingCache::default();
		let config = BrokerConfig::new(TEST_CLIENT_ID, TEST_CLIENT_SECRET, token_url)
			.expect("Reqwest test broker configuration should be valid.")
			.with_skip_tls_verify(true);
		let broker = Broker::from_config(config)
			.expect("Reqwest test broker should build successfully.")
			.with_sleeper(Arc::new(sleeper.clone()))
			.with_cache(Arc::new(cache.clone()));

		(broker, sleeper, cache)
	}

	/// Wraps a raw token string for assertions.
	pub fn secret(value: &str) -> Secret {
		Secret::new(value)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
