//! Cross-process advisory lock guarding the shared token cache.
//!
//! In-process mutexes cannot stop two unrelated processes from discovering the same expired
//! token and authenticating twice, or from racing a read against an invalidating write. The
//! lock is an exclusive `flock` on a zero-byte file next to the cache. Each acquisition opens
//! its own file handle, so two acquirers inside one process exclude each other as well.

// std
use std::fs::{self, File, OpenOptions};
// crates.io
use fs2::FileExt;
// self
use crate::{_prelude::*, obs::obs_event, store::StoreError};

/// Exclusive, blocking, cross-process lock scoped to a fixed path.
#[derive(Clone, Debug)]
pub struct ProcessLock {
	path: PathBuf,
}
impl ProcessLock {
	/// Creates the lock file (zero bytes, never truncated) if it does not exist yet.
	pub fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Lock {
				message: format!("Failed to create lock directory {}: {e}", parent.display()),
			})?;
		}

		Self::open(&path)?;

		Ok(Self { path })
	}

	/// Location of the lock file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Waits (without timeout) until the lock is held exclusively.
	///
	/// The wait runs on the blocking thread pool so a contended lock never stalls runtime
	/// workers. The returned guard releases the lock when dropped, including during unwinding.
	pub async fn acquire(&self) -> Result<ProcessLockGuard, StoreError> {
		let path = self.path.clone();
		let file = Self::open(&path)?;
		let started = OffsetDateTime::now_utc();
		let file = tokio::task::spawn_blocking(move || {
			FileExt::lock_exclusive(&file).map(|()| file)
		})
		.await
		.map_err(|e| StoreError::Lock { message: format!("Lock waiter was aborted: {e}") })?
		.map_err(|e| StoreError::Lock {
			message: format!("Failed to lock {}: {e}", path.display()),
		})?;
		let waited = OffsetDateTime::now_utc() - started;

		obs_event!(
			debug,
			path = %path.display(),
			waited_ms = waited.whole_milliseconds() as u64,
			"process lock acquired"
		);

		Ok(ProcessLockGuard { file, path })
	}

	/// Runs `f` while holding the lock; the lock is released on every exit path.
	pub async fn with_lock<F, Fut, T>(&self, f: F) -> Result<T>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let _guard = self.acquire().await?;

		f().await
	}

	fn open(path: &Path) -> Result<File, StoreError> {
		OpenOptions::new().create(true).truncate(false).write(true).open(path).map_err(|e| {
			StoreError::Lock { message: format!("Failed to open {}: {e}", path.display()) }
		})
	}
}

/// RAII guard returned by [`ProcessLock::acquire`].
pub struct ProcessLockGuard {
	file: File,
	path: PathBuf,
}
impl Debug for ProcessLockGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProcessLockGuard").field("path", &self.path).finish()
	}
}
impl Drop for ProcessLockGuard {
	#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
	fn drop(&mut self) {
		// Closing the handle releases the lock too.
		if let Err(e) = FileExt::unlock(&self.file) {
			obs_event!(warn, path = %self.path.display(), error = %e, "process lock release failed");
		}
	}
}
