//! Authenticated request envelope around the controller's REST API.
//!
//! Every verb goes through one [`Transport::execute`] call. [`RestClient`] fetches a token from
//! its [`TokenManager`], injects it as `x-auth-token`, and turns whatever happens next into an
//! [`ApiResponse`]. Transport failures never escape as errors: callers branch on
//! [`ApiResponse::failed`] and [`ApiResponse::error_kind`]. A 401 discards the shared token so
//! the next request in any process authenticates again.

#[cfg(test)] pub(crate) mod scripted;

// crates.io
use reqwest::{
	Method, Proxy,
	header::{ACCEPT, CONTENT_TYPE},
};
// self
use crate::{
	_prelude::*,
	config::ConnectionParams,
	error::{ConfigError, ConnectivityError, ErrorKind},
	obs::{self, OpKind, OpOutcome, OpSpan, obs_event},
	token::TokenManager,
};

/// Header carrying the bearer token.
pub const AUTH_HEADER: &str = "x-auth-token";
/// Header asking the controller to execute a mutation synchronously.
pub const RUNSYNC_HEADER: &str = "__runsync";

/// Message reported when no token could be obtained before a request.
pub const TOKEN_FAILURE_MSG: &str = "failed to get token to access rest api";
/// Message reported when the controller rejects the token.
pub const AUTHENTICATION_ERROR_MSG: &str = "authentication error";

/// Boxed future returned by [`Transport`] calls.
pub type ApiFuture<'a> = Pin<Box<dyn Future<Output = ApiResponse> + 'a + Send>>;

/// HTTP verbs used against the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
	/// `GET`
	Get,
	/// `POST`
	Post,
	/// `PUT`
	Put,
	/// `DELETE`
	Delete,
}
impl HttpMethod {
	/// Returns the verb as it appears on the wire.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Get => "GET",
			Self::Post => "POST",
			Self::Put => "PUT",
			Self::Delete => "DELETE",
		}
	}
}
impl Display for HttpMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl From<HttpMethod> for Method {
	fn from(method: HttpMethod) -> Self {
		match method {
			HttpMethod::Get => Method::GET,
			HttpMethod::Post => Method::POST,
			HttpMethod::Put => Method::PUT,
			HttpMethod::Delete => Method::DELETE,
		}
	}
}

/// Parsed response body.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
	/// No body, or the request never reached the controller.
	#[default]
	Empty,
	/// Body announced as JSON and parsed as such.
	Json(Value),
	/// Any other body, kept verbatim.
	Text(String),
}
impl ResponseBody {
	/// Classifies a raw body: JSON when the content type mentions `json` (any case) and the text
	/// parses, text otherwise.
	#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
	pub fn parse(content_type: &str, text: String) -> Self {
		if text.is_empty() {
			return Self::Empty;
		}
		if content_type.to_ascii_lowercase().contains("json") {
			match serde_json::from_str(&text) {
				Ok(value) => return Self::Json(value),
				Err(e) => {
					obs_event!(debug, error = %e, "body announced as JSON does not parse; keeping text");
				},
			}
		}

		Self::Text(text)
	}

	/// Returns the JSON payload, if any.
	pub fn as_json(&self) -> Option<&Value> {
		match self {
			Self::Json(value) => Some(value),
			_ => None,
		}
	}

	/// Returns the text payload, if any.
	pub fn as_text(&self) -> Option<&str> {
		match self {
			Self::Text(text) => Some(text),
			_ => None,
		}
	}

	/// Returns `true` for [`ResponseBody::Empty`].
	pub fn is_empty(&self) -> bool {
		matches!(self, Self::Empty)
	}
}

/// Outcome of one envelope call.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ApiResponse {
	/// `true` unless the controller answered with a 2xx status.
	pub failed: bool,
	/// HTTP status, absent when no response was received.
	pub status: Option<u16>,
	/// Parsed body.
	pub data: ResponseBody,
	/// Human-readable summary of a failure.
	pub msg: String,
	/// Underlying transport or token error text, when there was one.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub original_message: Option<String>,
	/// Failure classification, absent on success.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error_kind: Option<ErrorKind>,
}
impl ApiResponse {
	/// Builds a failed response that never reached (or never heard back from) the controller.
	pub fn from_error(msg: impl Into<String>, err: &Error) -> Self {
		let original_message = match err {
			Error::Connectivity(e) => e.original_message(),
			other => other.to_string(),
		};

		Self {
			failed: true,
			status: None,
			data: ResponseBody::Empty,
			msg: msg.into(),
			original_message: Some(original_message),
			error_kind: Some(err.kind()),
		}
	}

	/// HTTP status, or `-1` when no response was received.
	pub fn status_code(&self) -> i32 {
		self.status.map(i32::from).unwrap_or(-1)
	}

	/// Returns `true` when the controller answered with `status`.
	pub fn has_status(&self, status: u16) -> bool {
		self.status == Some(status)
	}

	/// Extracts `data.response`, the envelope most controller endpoints wrap results in.
	pub fn response(&self) -> Option<&Value> {
		self.data.as_json()?.get("response")
	}

	/// Converts a failed response into an [`Error`].
	///
	/// A 401 becomes [`Error::Authentication`], any other status [`Error::Server`], and a
	/// response that never arrived [`Error::Request`] with the recorded classification.
	pub fn into_result(self) -> Result<Self> {
		if !self.failed {
			return Ok(self);
		}

		match self.status {
			Some(401) => Err(Error::Authentication { status: 401, reason: self.msg }),
			Some(status) => {
				let message = match self.data.as_text() {
					Some(text) if !text.is_empty() => format!("{}: {text}", self.msg),
					_ => self.msg,
				};

				Err(Error::Server { status, message })
			},
			None => Err(Error::Request {
				kind: self.error_kind.unwrap_or(ErrorKind::Transport),
				message: self.original_message.unwrap_or(self.msg),
			}),
		}
	}
}

/// Verb-level access to the controller.
///
/// Implementations perform one request per call and report every outcome through
/// [`ApiResponse`]. The verb helpers are thin defaults over [`Transport::execute`].
pub trait Transport
where
	Self: Send + Sync,
{
	/// Sends one request. `api_path` is relative to the controller root and may carry a query.
	fn execute<'a>(
		&'a self,
		method: HttpMethod,
		api_path: &'a str,
		body: Option<&'a Value>,
	) -> ApiFuture<'a>;

	/// Dry-run flag; mutating helpers skip the network when set.
	fn check_mode(&self) -> bool {
		false
	}

	/// `GET api_path`.
	fn get<'a>(&'a self, api_path: &'a str) -> ApiFuture<'a> {
		self.execute(HttpMethod::Get, api_path, None)
	}

	/// `POST api_path` with a JSON body.
	fn post<'a>(&'a self, api_path: &'a str, body: &'a Value) -> ApiFuture<'a> {
		self.execute(HttpMethod::Post, api_path, Some(body))
	}

	/// `PUT api_path` with a JSON body.
	fn put<'a>(&'a self, api_path: &'a str, body: &'a Value) -> ApiFuture<'a> {
		self.execute(HttpMethod::Put, api_path, Some(body))
	}

	/// `DELETE api_path`.
	fn delete<'a>(&'a self, api_path: &'a str) -> ApiFuture<'a> {
		self.execute(HttpMethod::Delete, api_path, None)
	}
}

/// Builds the reqwest client shared by token and resource requests.
///
/// Applies the per-request timeout and the optional proxy. Without a configured proxy, proxy
/// environment variables are ignored. Certificate checks follow `validate_certs`.
pub fn build_http_client(params: &ConnectionParams) -> Result<ReqwestClient, ConfigError> {
	let mut builder = ReqwestClient::builder()
		.timeout(params.timeout())
		.danger_accept_invalid_certs(!params.validate_certs);

	builder = match &params.http_proxy {
		Some(proxy) => builder.proxy(Proxy::all(proxy.as_str())?),
		None => builder.no_proxy(),
	};

	Ok(builder.build()?)
}

/// Reqwest-backed [`Transport`] that authenticates every request.
#[derive(Clone, Debug)]
pub struct RestClient {
	http_client: ReqwestClient,
	tokens: Arc<TokenManager>,
}
impl RestClient {
	/// Builds the HTTP client and a file-backed [`TokenManager`] from `params`.
	pub fn new(params: ConnectionParams) -> Result<Self> {
		let http_client = build_http_client(&params)?;
		let tokens = TokenManager::new(params, http_client.clone())?;

		Ok(Self::from_parts(http_client, Arc::new(tokens)))
	}

	/// Reuses an existing client and token manager.
	pub fn from_parts(http_client: ReqwestClient, tokens: Arc<TokenManager>) -> Self {
		Self { http_client, tokens }
	}

	/// Connection parameters of the underlying token manager.
	pub fn params(&self) -> &ConnectionParams {
		self.tokens.params()
	}

	/// Token manager used for every request.
	pub fn token_manager(&self) -> &Arc<TokenManager> {
		&self.tokens
	}

	#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
	async fn send(&self, method: HttpMethod, api_path: &str, body: Option<&Value>) -> ApiResponse {
		let token = match self.tokens.get_token().await {
			Ok(token) => token,
			Err(e) => {
				obs_event!(error, error = %e, "failed to get token to access rest api");

				return ApiResponse::from_error(TOKEN_FAILURE_MSG, &e);
			},
		};
		let params = self.params();
		let url = match params.api_url(api_path) {
			Ok(url) => url,
			Err(e) => {
				let err = Error::from(e);

				return ApiResponse::from_error(err.to_string(), &err);
			},
		};
		let proxied = params.http_proxy.is_some();

		obs_event!(info, %method, %url, "sending request");

		let mut request = self
			.http_client
			.request(method.into(), url)
			.header(ACCEPT, "application/json")
			.header(CONTENT_TYPE, "application/json")
			.header(AUTH_HEADER, token.expose());

		if params.run_sync {
			request = request.header(RUNSYNC_HEADER, "true");
		}
		if let Some(body) = body {
			request = request.json(body);
		}

		let response = match request.send().await {
			Ok(response) => response,
			Err(e) => {
				let err = Error::from(ConnectivityError::classify(e, proxied));

				obs_event!(warn, error = %err, kind = %err.kind(), "request did not complete");

				return ApiResponse::from_error(err.to_string(), &err);
			},
		};
		let status = response.status();
		let content_type = response
			.headers()
			.get(CONTENT_TYPE)
			.and_then(|value| value.to_str().ok())
			.unwrap_or_default()
			.to_owned();

		obs_event!(info, status = status.as_u16(), url = %response.url(), "controller responded");

		let text = match response.text().await {
			Ok(text) => text,
			Err(e) => {
				let err = Error::from(ConnectivityError::classify(e, proxied));
				let mut result = ApiResponse::from_error(err.to_string(), &err);

				result.status = Some(status.as_u16());

				return result;
			},
		};
		let mut result = ApiResponse {
			failed: !status.is_success(),
			status: Some(status.as_u16()),
			data: ResponseBody::parse(&content_type, text),
			..Default::default()
		};

		if status.as_u16() == 401 {
			if let Err(e) = self.tokens.invalidate().await {
				obs_event!(warn, error = %e, "failed to discard rejected token");
			}

			result.msg = AUTHENTICATION_ERROR_MSG.into();
			result.error_kind = Some(ErrorKind::Authentication);
		} else if result.failed {
			result.msg = format!("status code: {}", status.as_u16());
			result.error_kind = Some(ErrorKind::Server);
		}

		result
	}
}
impl Transport for RestClient {
	fn execute<'a>(
		&'a self,
		method: HttpMethod,
		api_path: &'a str,
		body: Option<&'a Value>,
	) -> ApiFuture<'a> {
		const KIND: OpKind = OpKind::Request;

		Box::pin(async move {
			let span = OpSpan::new(KIND, method.as_str());

			obs::record_op_outcome(KIND, OpOutcome::Attempt);

			let result = span.instrument(self.send(method, api_path, body)).await;

			obs::record_op_outcome(KIND, OpOutcome::from_failed(result.failed));

			if let Some(error_kind) = result.error_kind {
				obs::record_op_error(KIND, error_kind);
			}

			result
		})
	}

	fn check_mode(&self) -> bool {
		self.params().check_mode
	}
}
