//! File-backed [`TokenStore`] shared by every process pointing at the same directory.

// std
use std::{
	fs::{self, File},
	io::Write,
};
// self
use crate::{
	_prelude::*,
	auth::BearerToken,
	obs::obs_event,
	store::{CacheKey, StoreError, StoreFuture, TokenStore},
};

type TokenMap = BTreeMap<CacheKey, BearerToken>;

/// Persists the token map as a JSON object and re-reads it on every access, so writes made by
/// other processes are always observed.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
}
impl FileStore {
	/// Opens a store at the provided path, creating its parent directory.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		Ok(Self { path })
	}

	/// Location of the cache file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_map(&self) -> Result<TokenMap, StoreError> {
		let bytes = match fs::read(&self.path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(TokenMap::new()),
			Err(e) =>
				return Err(StoreError::Backend {
					message: format!("Failed to read {}: {e}", self.path.display()),
				}),
		};

		if bytes.is_empty() {
			return Ok(TokenMap::new());
		}

		// A corrupt cache only costs a re-authentication; the next save overwrites it.
		match serde_json::from_slice(&bytes) {
			Ok(map) => Ok(map),
			Err(e) => {
				obs_event!(warn, path = %self.path.display(), error = %e, "token cache is corrupt; ignoring it");

				Ok(TokenMap::new())
			},
		}
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist(&self, contents: &TokenMap) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(contents).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize token cache: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl TokenStore for FileStore {
	fn load<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, Option<BearerToken>> {
		Box::pin(async move { Ok(self.load_map()?.remove(key)) })
	}

	fn save<'a>(&'a self, key: &'a CacheKey, token: BearerToken) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut map = self.load_map()?;

			map.insert(key.clone(), token);

			self.persist(&map)
		})
	}

	fn remove<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			let mut map = self.load_map()?;

			if map.remove(key).is_none() {
				return Ok(false);
			}

			self.persist(&map)?;

			Ok(true)
		})
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// self
	use super::*;

	fn temp_path(label: &str) -> PathBuf {
		let unique = format!(
			"dnac_client_file_store_{label}_{}_{}",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique).join("tokens.json")
	}

	fn cleanup(path: &Path) {
		if let Some(dir) = path.parent() {
			let _ = fs::remove_dir_all(dir);
		}
	}

	#[tokio::test]
	async fn save_is_visible_to_a_second_handle() {
		let path = temp_path("share");
		let writer = FileStore::open(&path).expect("Failed to open file store.");
		let reader = FileStore::open(&path).expect("Failed to open second file store handle.");
		let key = CacheKey::new("dnac", "admin");

		assert_eq!(reader.load(&key).await.expect("Load should succeed on a missing file."), None);

		writer
			.save(&key, BearerToken::new("token-1"))
			.await
			.expect("Failed to save token to file store.");

		let fetched = reader
			.load(&key)
			.await
			.expect("Failed to load token from file store.")
			.expect("Second handle should observe the saved token.");

		assert_eq!(fetched.expose(), "token-1");

		cleanup(&path);
	}

	#[tokio::test]
	async fn save_overwrites_and_remove_deletes_only_its_key() {
		let path = temp_path("remove");
		let store = FileStore::open(&path).expect("Failed to open file store.");
		let admin = CacheKey::new("dnac", "admin");
		let other = CacheKey::new("dnac", "operator");

		store.save(&admin, BearerToken::new("old")).await.expect("First save should succeed.");
		store.save(&admin, BearerToken::new("new")).await.expect("Overwrite should succeed.");
		store.save(&other, BearerToken::new("theirs")).await.expect("Second key should save.");

		assert_eq!(
			store.load(&admin).await.expect("Load should succeed.").map(|t| t.expose().to_owned()),
			Some("new".into())
		);
		assert!(store.remove(&admin).await.expect("Remove should succeed."));
		assert!(!store.remove(&admin).await.expect("Second remove should succeed."));
		assert_eq!(store.load(&admin).await.expect("Load should succeed."), None);
		assert!(store.load(&other).await.expect("Load should succeed.").is_some());

		let raw = fs::read_to_string(&path).expect("Cache file should exist.");

		assert!(raw.contains("\"dnac.operator\""));
		assert!(!raw.contains("dnac.admin"));

		cleanup(&path);
	}

	#[tokio::test]
	async fn corrupt_file_reads_as_empty_and_is_overwritten() {
		let path = temp_path("corrupt");
		let store = FileStore::open(&path).expect("Failed to open file store.");
		let key = CacheKey::new("dnac", "admin");

		fs::write(&path, b"\x80not json").expect("Failed to write corrupt fixture.");

		assert_eq!(store.load(&key).await.expect("Corrupt cache should not error."), None);

		store.save(&key, BearerToken::new("fresh")).await.expect("Save should replace corrupt file.");

		assert!(store.load(&key).await.expect("Load should succeed.").is_some());

		cleanup(&path);
	}
}
