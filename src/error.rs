//! Client-level error types shared across the token cache, request envelope, and task poller.

// std
use std::io::ErrorKind as IoErrorKind;
// self
use crate::{_prelude::*, auth::TaskId};

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Token cache or lock file failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// The controller could not be reached (proxy, TLS, TCP, timeout).
	#[error(transparent)]
	Connectivity(#[from] ConnectivityError),

	/// Credentials were rejected or the token endpoint refused to issue a token.
	#[error("Authentication failed with status {status}: {reason}.")]
	Authentication {
		/// HTTP status returned by the controller.
		status: u16,
		/// Controller- or client-supplied reason string.
		reason: String,
	},
	/// Controller answered with a non-success status other than 401.
	#[error("Controller returned status {status}: {message}.")]
	Server {
		/// HTTP status returned by the controller.
		status: u16,
		/// Summary of the failure.
		message: String,
	},
	/// Request failed before the controller answered, after its transport error was flattened
	/// into an [`ApiResponse`](crate::http::ApiResponse).
	#[error("Request failed ({kind}): {message}.")]
	Request {
		/// Classification recorded by the envelope.
		kind: ErrorKind,
		/// Transport or token error text.
		message: String,
	},
	/// Token endpoint responded with a body that does not carry a token.
	#[error("Token endpoint returned a malformed body.")]
	TokenResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Asynchronous task did not reach a terminal state within the polling budget.
	#[error("Task {task_id} did not end within the polling budget ({budget}).")]
	AsyncTimeout {
		/// Task identifier being polled.
		task_id: TaskId,
		/// Total wall-clock budget that was exceeded.
		budget: Duration,
	},
	/// Asynchronous task finished with its error flag set.
	#[error("Task {task_id} failed: {reason}.")]
	AsyncTask {
		/// Task identifier being polled.
		task_id: TaskId,
		/// Failure reason reported by the controller, when available.
		reason: String,
	},
}
impl Error {
	/// Flattens the error into the client's failure taxonomy.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Storage(_) => ErrorKind::Storage,
			Self::Config(_) => ErrorKind::Configuration,
			Self::Connectivity(e) => e.kind(),
			Self::Authentication { .. } | Self::TokenResponse { .. } => ErrorKind::Authentication,
			Self::Server { .. } => ErrorKind::Server,
			Self::Request { kind, .. } => *kind,
			Self::AsyncTimeout { .. } => ErrorKind::AsyncTimeout,
			Self::AsyncTask { .. } => ErrorKind::AsyncTask,
		}
	}
}

/// Flat failure classification carried by [`ApiResponse`](crate::http::ApiResponse) values so
/// callers can branch without matching on error types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	/// Proxy refused or failed the connection.
	Proxy,
	/// TLS handshake or certificate failure.
	Tls,
	/// TCP/DNS connection failure.
	Connection,
	/// Request exceeded the configured timeout.
	Timeout,
	/// Any other transport-level failure.
	Transport,
	/// Token could not be obtained or was rejected (401).
	Authentication,
	/// Non-success status other than 401.
	Server,
	/// Task polling exceeded its budget.
	AsyncTimeout,
	/// Task finished with an error flag.
	AsyncTask,
	/// Missing or invalid configuration.
	Configuration,
	/// Token cache or lock file failure.
	Storage,
}
impl ErrorKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Proxy => "proxy",
			Self::Tls => "tls",
			Self::Connection => "connection",
			Self::Timeout => "timeout",
			Self::Transport => "transport",
			Self::Authentication => "authentication",
			Self::Server => "server",
			Self::AsyncTimeout => "async_timeout",
			Self::AsyncTask => "async_task",
			Self::Configuration => "configuration",
			Self::Storage => "storage",
		}
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures raised while building a client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Required connection parameter is absent or empty.
	#[error("Required parameter `{name}` is missing.")]
	MissingParameter {
		/// Parameter name.
		name: &'static str,
	},
	/// Connection parameter is present but unusable.
	#[error("Parameter `{name}` is invalid: {reason}.")]
	InvalidParameter {
		/// Parameter name.
		name: &'static str,
		/// Why the value was rejected.
		reason: String,
	},
	/// Controller URL cannot be assembled from the parameters.
	#[error("Controller URL is invalid.")]
	InvalidUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures that never reached the controller.
#[derive(Debug, ThisError)]
pub enum ConnectivityError {
	/// Proxy refused or failed the connection.
	#[error("Proxy error occurred while calling {url}.")]
	Proxy {
		/// Target URL of the request.
		url: String,
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// TLS handshake or certificate validation failed.
	#[error("TLS error occurred while calling {url}.")]
	Tls {
		/// Target URL of the request.
		url: String,
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// TCP connection or DNS resolution failed.
	#[error("Connection error occurred while calling {url}.")]
	Connection {
		/// Target URL of the request.
		url: String,
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// The request exceeded the configured timeout.
	#[error("Request timed out while calling {url}.")]
	Timeout {
		/// Target URL of the request.
		url: String,
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// Any other request failure (body, decode, redirect).
	#[error("Request failed while calling {url}.")]
	Other {
		/// Target URL of the request.
		url: String,
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
}
impl ConnectivityError {
	/// Classifies a reqwest failure. `proxied` tells whether the client routes through a proxy,
	/// which is the only way to attribute a connect failure to the proxy hop.
	pub fn classify(err: ReqwestError, proxied: bool) -> Self {
		let url = err.url().map(|u| u.to_string()).unwrap_or_else(|| "<unknown>".into());

		if err.is_timeout() {
			Self::Timeout { url, source: Box::new(err) }
		} else if is_tls_failure(&err) {
			Self::Tls { url, source: Box::new(err) }
		} else if err.is_connect() && proxied {
			Self::Proxy { url, source: Box::new(err) }
		} else if err.is_connect() {
			Self::Connection { url, source: Box::new(err) }
		} else {
			Self::Other { url, source: Box::new(err) }
		}
	}

	/// Returns the taxonomy entry for this failure.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Proxy { .. } => ErrorKind::Proxy,
			Self::Tls { .. } => ErrorKind::Tls,
			Self::Connection { .. } => ErrorKind::Connection,
			Self::Timeout { .. } => ErrorKind::Timeout,
			Self::Other { .. } => ErrorKind::Transport,
		}
	}

	/// Renders the innermost source message, mirroring what the transport reported.
	pub fn original_message(&self) -> String {
		let mut current: Option<&(dyn StdError + 'static)> = StdError::source(self);
		let mut message = String::new();

		while let Some(err) = current {
			message = err.to_string();
			current = err.source();
		}

		message
	}
}

// rustls reports handshake failures as `InvalidData` I/O errors deep in the source chain.
fn is_tls_failure(err: &ReqwestError) -> bool {
	let mut current = StdError::source(err);

	while let Some(inner) = current {
		if inner
			.downcast_ref::<std::io::Error>()
			.is_some_and(|io| io.kind() == IoErrorKind::InvalidData)
		{
			return true;
		}
		if inner.to_string().to_ascii_lowercase().contains("certificate") {
			return true;
		}

		current = inner.source();
	}

	false
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::StoreError;

	#[test]
	fn store_error_converts_into_client_error_with_source() {
		let store_error = StoreError::Backend { message: "disk full".into() };
		let error: Error = store_error.clone().into();

		assert_eq!(error.kind(), ErrorKind::Storage);
		assert!(error.to_string().contains("disk full"));

		let source = StdError::source(&error)
			.expect("Client error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn kinds_cover_the_taxonomy() {
		let task_id = TaskId::new("task-1").expect("Task fixture should be valid.");

		assert_eq!(
			Error::from(ConfigError::MissingParameter { name: "host" }).kind(),
			ErrorKind::Configuration
		);
		assert_eq!(
			Error::Authentication { status: 401, reason: "bad password".into() }.kind(),
			ErrorKind::Authentication
		);
		assert_eq!(
			Error::Server { status: 500, message: "boom".into() }.kind(),
			ErrorKind::Server
		);
		assert_eq!(
			Error::AsyncTimeout { task_id: task_id.clone(), budget: Duration::seconds(20) }.kind(),
			ErrorKind::AsyncTimeout
		);
		assert_eq!(
			Error::AsyncTask { task_id, reason: "bad payload".into() }.kind(),
			ErrorKind::AsyncTask
		);
	}

	#[test]
	fn error_kind_labels_are_snake_case() {
		assert_eq!(ErrorKind::AsyncTimeout.to_string(), "async_timeout");
		assert_eq!(
			serde_json::to_string(&ErrorKind::Tls).expect("ErrorKind should serialize."),
			"\"tls\""
		);
	}
}
