//! Cache contract for issued access tokens, key derivation, and the bundled in-memory backend.

pub mod memory;

pub use memory::MemoryCache;

// self
use crate::{_prelude::*, auth::ScopeList};

/// Boxed future returned by [`TokenCache`] operations.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + 'a + Send>>;

/// Storage capability the broker uses to reuse access tokens across calls.
///
/// Implementations must be safe for concurrent use; the broker issues no locking of its own.
/// Backends own expiry: `read` must not return entries whose TTL has elapsed.
pub trait TokenCache
where
	Self: Send + Sync,
{
	/// Returns the value stored under `key`, if present and unexpired.
	fn read<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>>;

	/// Stores `value` under `key` for `ttl`.
	fn write<'a>(&'a self, key: &'a str, value: &'a str, ttl: CacheTtl) -> CacheFuture<'a, ()>;

	/// Removes the entry stored under `key`, if any.
	fn delete<'a>(&'a self, key: &'a str) -> CacheFuture<'a, ()>;
}

/// Error type produced by [`TokenCache`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CacheError {
	/// Backend-level failure for the cache engine.
	#[error("Cache backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Lifetime of a cache entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheTtl {
	/// Entry never expires.
	Unlimited,
	/// Entry expires after the given duration.
	Expires(Duration),
}
impl CacheTtl {
	/// Derives the TTL for a token expiring at `expires_at`, measured in whole seconds from `now`.
	///
	/// Returns `None` when the token is already past its expiry, meaning it must not be cached.
	/// A missing expiry yields [`CacheTtl::Unlimited`].
	pub fn until(expires_at: Option<OffsetDateTime>, now: OffsetDateTime) -> Option<Self> {
		let Some(expires_at) = expires_at else {
			return Some(Self::Unlimited);
		};
		let remaining = expires_at.unix_timestamp() - now.unix_timestamp();

		if remaining < 0 {
			return None;
		}

		Some(Self::Expires(Duration::seconds(remaining)))
	}

	/// Absolute expiry for an entry written at `now`; `None` for unlimited entries.
	pub fn expires_at(self, now: OffsetDateTime) -> Option<OffsetDateTime> {
		match self {
			Self::Unlimited => None,
			Self::Expires(ttl) => Some(now.saturating_add(ttl)),
		}
	}
}

/// Label separating token populations that share a cache namespace.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenClass {
	#[default]
	/// Tokens a client obtains to call protected resources.
	Resources,
	/// Tokens a service obtains to verify incoming tokens.
	Tokens,
}
impl TokenClass {
	/// Returns the label used inside cache keys.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenClass::Resources => "resources",
			TokenClass::Tokens => "tokens",
		}
	}
}
impl Display for TokenClass {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Builds `<root>/<class>/<caller_key>[/<scope1>_<scope2>_...]`.
///
/// Scopes are joined in the order given, so reordering them yields a different key.
pub fn cache_key(root: &str, class: TokenClass, caller_key: &str, scopes: &ScopeList) -> String {
	let mut key = format!("{root}/{class}/{caller_key}");

	if !scopes.is_empty() {
		key.push('/');
		key.push_str(&scopes.join("_"));
	}

	key
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn scopes(values: &[&str]) -> ScopeList {
		ScopeList::new(values.iter().copied()).expect("Scope fixture should be valid.")
	}

	#[test]
	fn cache_key_appends_scopes_in_order() {
		let forward = cache_key("broker", TokenClass::Resources, "billing", &scopes(&["s1", "s2"]));
		let reversed = cache_key("broker", TokenClass::Resources, "billing", &scopes(&["s2", "s1"]));

		assert_eq!(forward, "broker/resources/billing/s1_s2");
		assert_eq!(reversed, "broker/resources/billing/s2_s1");
		assert_ne!(forward, reversed);
		assert_eq!(
			forward,
			cache_key("broker", TokenClass::Resources, "billing", &scopes(&["s1", "s2"]))
		);
	}

	#[test]
	fn cache_key_omits_scope_segment_when_empty() {
		assert_eq!(
			cache_key("root", TokenClass::Tokens, "svc", &ScopeList::default()),
			"root/tokens/svc"
		);
	}

	#[test]
	fn ttl_tracks_remaining_whole_seconds() {
		let now = macros::datetime!(2025-11-10 12:00:00.750 UTC);

		assert_eq!(
			CacheTtl::until(Some(now + Duration::seconds(600)), now),
			Some(CacheTtl::Expires(Duration::seconds(600)))
		);
		assert_eq!(CacheTtl::until(None, now), Some(CacheTtl::Unlimited));
		assert_eq!(CacheTtl::until(Some(now), now), Some(CacheTtl::Expires(Duration::ZERO)));
		assert_eq!(CacheTtl::until(Some(now - Duration::seconds(5)), now), None);
	}

	#[test]
	fn ttl_resolves_absolute_expiry() {
		let now = macros::datetime!(2025-11-10 12:00 UTC);

		assert_eq!(CacheTtl::Unlimited.expires_at(now), None);
		assert_eq!(
			CacheTtl::Expires(Duration::minutes(10)).expires_at(now),
			Some(macros::datetime!(2025-11-10 12:10 UTC))
		);
	}

	#[test]
	fn token_class_labels_are_stable() {
		assert_eq!(TokenClass::default(), TokenClass::Resources);
		assert_eq!(TokenClass::Resources.to_string(), "resources");
		assert_eq!(
			serde_json::to_string(&TokenClass::Tokens).expect("Token class should serialize."),
			"\"tokens\""
		);
	}
}
