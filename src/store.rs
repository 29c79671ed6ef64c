//! Storage contract and built-in backends for the shared bearer-token cache.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::BearerToken};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for cached bearer tokens.
///
/// Implementations hold at most one token per [`CacheKey`]. Callers serialize every
/// read-check-write sequence through a [`ProcessLock`](crate::lock::ProcessLock); stores do
/// not lock on their own.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Fetches the token cached for `key`, if any.
	fn load<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, Option<BearerToken>>;

	/// Persists or replaces the token cached for `key`.
	fn save<'a>(&'a self, key: &'a CacheKey, token: BearerToken) -> StoreFuture<'a, ()>;

	/// Removes the entry for `key`, returning whether one existed.
	fn remove<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, bool>;
}

/// Error type produced by [`TokenStore`] implementations and the process lock.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// Lock file could not be created, opened, or locked.
	#[error("Lock failure: {message}.")]
	Lock {
		/// Human-readable error payload.
		message: String,
	},
}

/// Cache key identifying one controller/user pair, rendered as `host.username`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);
impl CacheKey {
	/// Builds the key for a host and username.
	pub fn new(host: &str, username: &str) -> Self {
		Self(format!("{host}.{username}"))
	}

	/// Returns the rendered key.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Debug for CacheKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "CacheKey({})", self.0)
	}
}
impl Display for CacheKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
