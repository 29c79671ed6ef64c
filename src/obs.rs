//! Optional observability helpers for client operations.
//!
//! # Feature Flags
//!
//! - `tracing` (default) emits spans named `dnac_client.op` with the `op` and `stage` fields, plus
//!   events for cache hits, authentications, HTTP statuses, and task polling.
//! - `metrics` increments the `dnac_client_op_total` counter for every attempt/success/failure,
//!   labeled by `op` + `outcome`, and `dnac_client_op_errors_total` labeled by `op` + `error_kind`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

pub(crate) use tracing::obs_event;

// self
use crate::_prelude::*;

/// Operation kinds observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// Token acquisition (cache or network).
	Authenticate,
	/// Authenticated REST request.
	Request,
	/// Asynchronous task polling.
	TaskPoll,
	/// Create/update/delete of a controller object.
	Mutation,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::Authenticate => "authenticate",
			OpKind::Request => "request",
			OpKind::TaskPoll => "task_poll",
			OpKind::Mutation => "mutation",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to a client operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure surfaced to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}

	/// Maps a failure flag to an outcome.
	pub const fn from_failed(failed: bool) -> Self {
		if failed { OpOutcome::Failure } else { OpOutcome::Success }
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
