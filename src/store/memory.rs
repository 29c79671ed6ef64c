//! Thread-safe in-memory [`TokenStore`] for single-process use and tests.

// self
use crate::{
	_prelude::*,
	auth::BearerToken,
	store::{CacheKey, StoreFuture, TokenStore},
};

type StoreMap = Arc<RwLock<HashMap<CacheKey, BearerToken>>>;

/// Storage backend that keeps tokens in-process; nothing survives a restart.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Number of cached entries.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is cached.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl TokenStore for MemoryStore {
	fn load<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, Option<BearerToken>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(key).cloned()) })
	}

	fn save<'a>(&'a self, key: &'a CacheKey, token: BearerToken) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(key.clone(), token);

			Ok(())
		})
	}

	fn remove<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, bool> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.write().remove(key).is_some()) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn save_load_remove_round_trip() {
		let store = MemoryStore::default();
		let key = CacheKey::new("dnac", "admin");

		store.save(&key, BearerToken::new("token")).await.expect("Save should succeed.");

		assert_eq!(store.len(), 1);
		assert_eq!(
			store.load(&key).await.expect("Load should succeed.").map(|t| t.expose().to_owned()),
			Some("token".into())
		);
		assert!(store.remove(&key).await.expect("Remove should succeed."));
		assert!(store.is_empty());
	}
}
