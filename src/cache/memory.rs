//! Thread-safe in-memory [`TokenCache`] implementation with per-entry TTLs.

// self
use crate::{
	_prelude::*,
	cache::{CacheFuture, CacheTtl, TokenCache},
};

type CacheMap = Arc<RwLock<HashMap<String, CacheEntry>>>;

#[derive(Clone, Debug)]
struct CacheEntry {
	value: String,
	expires_at: Option<OffsetDateTime>,
}
impl CacheEntry {
	fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| now >= expires_at)
	}
}

/// Process-local cache that keeps tokens until their TTL elapses.
///
/// Expired entries are dropped lazily on read; call [`MemoryCache::purge_expired`] to sweep the
/// whole map.
#[derive(Clone, Debug, Default)]
pub struct MemoryCache(CacheMap);
impl MemoryCache {
	/// Number of stored entries, including expired ones not yet swept.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns true if no entries are stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Removes every entry whose TTL has elapsed, returning how many were dropped.
	pub fn purge_expired(&self) -> usize {
		let now = OffsetDateTime::now_utc();
		let mut guard = self.0.write();
		let before = guard.len();

		guard.retain(|_, entry| !entry.is_expired_at(now));

		before - guard.len()
	}

	fn read_now(map: &CacheMap, key: &str, now: OffsetDateTime) -> Option<String> {
		{
			let guard = map.read();

			match guard.get(key) {
				Some(entry) if !entry.is_expired_at(now) => return Some(entry.value.clone()),
				Some(_) => {},
				None => return None,
			}
		}

		let mut guard = map.write();

		if guard.get(key).is_some_and(|entry| entry.is_expired_at(now)) {
			guard.remove(key);
		}

		None
	}

	fn write_now(map: &CacheMap, key: &str, value: &str, ttl: CacheTtl, now: OffsetDateTime) {
		let entry = CacheEntry { value: value.to_owned(), expires_at: ttl.expires_at(now) };

		map.write().insert(key.to_owned(), entry);
	}
}
impl TokenCache for MemoryCache {
	fn read<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
		Box::pin(async move { Ok(Self::read_now(&self.0, key, OffsetDateTime::now_utc())) })
	}

	fn write<'a>(&'a self, key: &'a str, value: &'a str, ttl: CacheTtl) -> CacheFuture<'a, ()> {
		Box::pin(async move {
			Self::write_now(&self.0, key, value, ttl, OffsetDateTime::now_utc());

			Ok(())
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> CacheFuture<'a, ()> {
		Box::pin(async move {
			self.0.write().remove(key);

			Ok(())
		})
	}
}
