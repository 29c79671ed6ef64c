//! Token acquisition shared by every process pointing at the same cache directory.
//!
//! [`TokenManager::get_token`] answers from memory when it can. Otherwise it serializes callers
//! through an in-process singleflight guard and then the cross-process [`ProcessLock`], re-reads
//! the shared cache, and only contacts the controller when no usable token is cached. A freshly
//! issued token is persisted before the lock is released, so every other process waiting on the
//! lock reuses it instead of authenticating again.

mod metrics;

pub use metrics::AuthMetrics;

// crates.io
use reqwest::header::{ACCEPT, CONTENT_TYPE};
// self
use crate::{
	_prelude::*,
	auth::{BearerToken, TokenClaims},
	config::ConnectionParams,
	error::ConnectivityError,
	lock::ProcessLock,
	obs::{self, OpKind, OpOutcome, OpSpan, obs_event},
	store::{CacheKey, FileStore, TokenStore},
};

/// Token endpoint path relative to the controller base URL.
pub const AUTH_TOKEN_PATH: &str = "dna/system/api/v1/auth/token";

#[derive(Deserialize)]
struct TokenResponseBody {
	#[serde(rename = "Token")]
	token: String,
}

/// Acquires, caches, and invalidates the bearer token for one controller/user pair.
pub struct TokenManager {
	params: ConnectionParams,
	key: CacheKey,
	store: Arc<dyn TokenStore>,
	lock: ProcessLock,
	http_client: ReqwestClient,
	current: Mutex<Option<BearerToken>>,
	singleflight: AsyncMutex<()>,
	metrics: Arc<AuthMetrics>,
}
impl TokenManager {
	/// Creates a manager backed by the JSON token cache inside `params.log_dir`.
	pub fn new(params: ConnectionParams, http_client: ReqwestClient) -> Result<Self> {
		let store = FileStore::open(params.token_cache_path())?;

		Self::with_store(params, Arc::new(store), http_client)
	}

	/// Creates a manager that caches tokens in the provided store.
	///
	/// The lock file still lives in `params.log_dir`; it guards whatever store is supplied.
	pub fn with_store(
		params: ConnectionParams,
		store: Arc<dyn TokenStore>,
		http_client: ReqwestClient,
	) -> Result<Self> {
		params.validate()?;

		let lock = ProcessLock::new(params.lock_path())?;

		Ok(Self {
			key: params.cache_key(),
			params,
			store,
			lock,
			http_client,
			current: Mutex::new(None),
			singleflight: AsyncMutex::new(()),
			metrics: Default::default(),
		})
	}

	/// Connection parameters this manager authenticates with.
	pub fn params(&self) -> &ConnectionParams {
		&self.params
	}

	/// Key of this manager's entry in the shared cache.
	pub fn cache_key(&self) -> &CacheKey {
		&self.key
	}

	/// Shared acquisition counters.
	pub fn metrics(&self) -> Arc<AuthMetrics> {
		self.metrics.clone()
	}

	/// Claims of the token currently held in memory, if it decodes.
	pub fn claims(&self) -> Option<TokenClaims> {
		self.current.lock().as_ref().and_then(|token| token.claims().ok())
	}

	/// Returns a token usable for the next request.
	///
	/// Order of resolution: memory, then the shared cache under the process lock (rejecting tokens
	/// that expire within [`EXPIRY_MARGIN`](crate::auth::EXPIRY_MARGIN)), then the controller's
	/// token endpoint. Network failures are not retried here.
	pub async fn get_token(&self) -> Result<BearerToken> {
		const KIND: OpKind = OpKind::Authenticate;

		if let Some(token) = self.in_memory() {
			self.metrics.record_cache_hit();

			return Ok(token);
		}

		let span = OpSpan::new(KIND, "get_token");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.acquire()).await;

		match &result {
			Ok(_) => obs::record_op_outcome(KIND, OpOutcome::Success),
			Err(e) => {
				self.metrics.record_failure();
				obs::record_op_outcome(KIND, OpOutcome::Failure);
				obs::record_op_error(KIND, e.kind());
			},
		}

		result
	}

	/// Replaces (`Some`) or discards (`None`) the cached token for this connection.
	///
	/// Discarding clears memory and removes the shared cache entry under the process lock, so the
	/// next [`get_token`](Self::get_token) in any process authenticates again.
	pub async fn save_token(&self, token: Option<BearerToken>) -> Result<()> {
		match token {
			Some(token) => {
				let _guard = self.lock.acquire().await?;

				self.store.save(&self.key, token.clone()).await?;
				*self.current.lock() = Some(token);
			},
			None => {
				self.current.lock().take();

				let _guard = self.lock.acquire().await?;

				self.store.remove(&self.key).await?;
				self.metrics.record_invalidation();

				obs_event!(info, key = %self.key, "token invalidated");
			},
		}

		Ok(())
	}

	/// Shorthand for `save_token(None)`.
	pub async fn invalidate(&self) -> Result<()> {
		self.save_token(None).await
	}

	/// Authenticates against the controller without reading or writing any cache.
	///
	/// Useful as a connectivity and credential check; the issued token is dropped.
	pub async fn ping(&self) -> Result<()> {
		let span = OpSpan::new(OpKind::Authenticate, "ping");

		span.instrument(self.authenticate()).await.map(|_| ())
	}

	fn in_memory(&self) -> Option<BearerToken> {
		self.current.lock().as_ref().filter(|token| !token.is_empty()).cloned()
	}

	async fn acquire(&self) -> Result<BearerToken> {
		let _singleflight = self.singleflight.lock().await;

		// Another task may have finished acquiring while this one waited.
		if let Some(token) = self.in_memory() {
			self.metrics.record_cache_hit();

			return Ok(token);
		}

		let _guard = self.lock.acquire().await?;

		if let Some(cached) = self.store.load(&self.key).await? {
			let status = cached.status();

			if status.is_usable() {
				obs_event!(debug, key = %self.key, "reusing cached token");

				self.metrics.record_cache_hit();
				*self.current.lock() = Some(cached.clone());

				return Ok(cached);
			}

			obs_event!(debug, key = %self.key, ?status, "cached token is not usable");
		}

		let token = self.authenticate().await?;

		self.store.save(&self.key, token.clone()).await?;
		*self.current.lock() = Some(token.clone());

		Ok(token)
	}

	async fn authenticate(&self) -> Result<BearerToken> {
		let url = self.params.api_url(AUTH_TOKEN_PATH)?;
		let proxied = self.params.http_proxy.is_some();

		obs_event!(
			info,
			host = %self.params.host,
			username = %self.params.username,
			"requesting new token"
		);

		let response = self
			.http_client
			.post(url)
			.basic_auth(&self.params.username, Some(self.params.password.expose()))
			.header(ACCEPT, "application/json")
			.header(CONTENT_TYPE, "application/json")
			.send()
			.await
			.map_err(|e| ConnectivityError::classify(e, proxied))?;
		let status = response.status();
		let bytes = response.bytes().await.map_err(|e| ConnectivityError::classify(e, proxied))?;

		if !status.is_success() {
			let body = String::from_utf8_lossy(&bytes);
			let reason = match body.trim() {
				"" => status.canonical_reason().unwrap_or("token request rejected").to_owned(),
				text => text.to_owned(),
			};

			return Err(Error::Authentication { status: status.as_u16(), reason });
		}

		let mut deserializer = serde_json::Deserializer::from_slice(&bytes);
		let body: TokenResponseBody = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| Error::TokenResponse { source })?;

		if body.token.is_empty() {
			return Err(Error::Authentication {
				status: status.as_u16(),
				reason: "token endpoint returned an empty token".into(),
			});
		}

		self.metrics.record_network_authentication();

		Ok(BearerToken::new(body.token))
	}
}
impl Debug for TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("key", &self.key)
			.field("lock", &self.lock)
			.field("token_cached", &self.current.lock().is_some())
			.finish()
	}
}
