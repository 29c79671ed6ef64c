// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for token acquisition.
#[derive(Debug, Default)]
pub struct AuthMetrics {
	cache_hits: AtomicU64,
	network_authentications: AtomicU64,
	invalidations: AtomicU64,
	failures: AtomicU64,
}
impl AuthMetrics {
	/// Returns how many tokens were served from memory or the shared cache.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Returns how many tokens were issued by the controller's token endpoint.
	pub fn network_authentications(&self) -> u64 {
		self.network_authentications.load(Ordering::Relaxed)
	}

	/// Returns how many times the cached token was discarded.
	pub fn invalidations(&self) -> u64 {
		self.invalidations.load(Ordering::Relaxed)
	}

	/// Returns the number of failed acquisitions.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_network_authentication(&self) {
		self.network_authentications.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_invalidation(&self) {
		self.invalidations.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}
