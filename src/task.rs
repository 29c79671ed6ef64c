//! Bounded polling of asynchronous controller tasks.
//!
//! Mutations answered with HTTP 202 carry a task identifier. [`TaskPoller::wait_for_task`]
//! polls `dna/intent/api/v1/task/{id}` until the task reports an `endTime`, sets `isError`, or
//! the wall-clock budget (`retry_interval * max_retry_count`) runs out. A status request that
//! fails is retried like a pending task. Polling is never unbounded.

// std
use std::time::{Duration as StdDuration, Instant};
// self
use crate::{
	_prelude::*,
	auth::TaskId,
	error::ConfigError,
	http::{ApiResponse, Transport},
	obs::{self, OpKind, OpOutcome, OpSpan, obs_event},
};

/// Task status path relative to the controller root.
pub const TASK_PATH: &str = "dna/intent/api/v1/task";

/// Interval and retry ceiling for [`TaskPoller`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
	retry_interval: StdDuration,
	max_retry_count: u32,
}
impl PollPolicy {
	/// Default pause between polls.
	pub const DEFAULT_RETRY_INTERVAL: StdDuration = StdDuration::from_secs(2);
	/// Default retry ceiling.
	pub const DEFAULT_MAX_RETRY_COUNT: u32 = 10;

	/// Creates a policy; both values must be non-zero so the budget is a real ceiling.
	pub fn new(retry_interval: StdDuration, max_retry_count: u32) -> Result<Self, ConfigError> {
		if retry_interval.is_zero() {
			return Err(ConfigError::InvalidParameter {
				name: "retry_interval",
				reason: "interval must be greater than zero".into(),
			});
		}
		if max_retry_count == 0 {
			return Err(ConfigError::InvalidParameter {
				name: "max_retry_count",
				reason: "at least one retry is required".into(),
			});
		}

		Ok(Self { retry_interval, max_retry_count })
	}

	/// Pause between polls.
	pub fn retry_interval(&self) -> StdDuration {
		self.retry_interval
	}

	/// Retry ceiling.
	pub fn max_retry_count(&self) -> u32 {
		self.max_retry_count
	}

	/// Total wall-clock budget.
	pub fn budget(&self) -> StdDuration {
		self.retry_interval.saturating_mul(self.max_retry_count)
	}
}
impl Default for PollPolicy {
	fn default() -> Self {
		Self {
			retry_interval: Self::DEFAULT_RETRY_INTERVAL,
			max_retry_count: Self::DEFAULT_MAX_RETRY_COUNT,
		}
	}
}

/// Lifecycle of a polled task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
	/// No terminal marker seen yet.
	Polling,
	/// Task reported an `endTime`.
	Done,
	/// Task set `isError`.
	Error,
	/// Budget exhausted before a terminal marker appeared.
	TimedOut,
}
impl TaskState {
	/// Returns `true` for every state but [`TaskState::Polling`].
	pub fn is_terminal(self) -> bool {
		!matches!(self, Self::Polling)
	}
}

/// Final outcome of [`TaskPoller::wait_for_task`].
#[derive(Clone, Debug)]
pub struct TaskReport {
	/// Polled task.
	pub task_id: TaskId,
	/// Terminal state.
	pub state: TaskState,
	/// Number of status requests issued.
	pub polls: u32,
	/// Time from the first poll to the terminal decision.
	pub elapsed: StdDuration,
	/// Budget the poll ran under.
	pub budget: StdDuration,
	/// Last status response.
	pub response: ApiResponse,
	/// Failure summary; empty when the task is done.
	pub msg: String,
}
impl TaskReport {
	/// Returns `true` unless the task is [`TaskState::Done`].
	pub fn failed(&self) -> bool {
		self.state != TaskState::Done
	}

	/// Task payload (`data.response`) of the last status response.
	pub fn payload(&self) -> Option<&Value> {
		self.response.response()
	}

	/// Converts failures into [`Error::AsyncTask`] or [`Error::AsyncTimeout`].
	pub fn into_result(self) -> Result<Self> {
		match self.state {
			TaskState::Done => Ok(self),
			TaskState::TimedOut => Err(Error::AsyncTimeout {
				task_id: self.task_id,
				budget: Duration::try_from(self.budget).unwrap_or(Duration::MAX),
			}),
			TaskState::Error | TaskState::Polling =>
				Err(Error::AsyncTask { task_id: self.task_id, reason: self.msg }),
		}
	}
}

/// Polls task status through any [`Transport`].
#[derive(Debug)]
pub struct TaskPoller<'a, T>
where
	T: ?Sized + Transport,
{
	transport: &'a T,
	policy: PollPolicy,
}
impl<'a, T> TaskPoller<'a, T>
where
	T: ?Sized + Transport,
{
	/// Creates a poller with [`PollPolicy::default`].
	pub fn new(transport: &'a T) -> Self {
		Self { transport, policy: PollPolicy::default() }
	}

	/// Overrides the poll policy.
	pub fn with_policy(mut self, policy: PollPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Active poll policy.
	pub fn policy(&self) -> PollPolicy {
		self.policy
	}

	/// Polls until the task ends, errors, or the budget runs out.
	///
	/// Each iteration checks, in order: `endTime` present, `isError` set, budget exceeded.
	/// Otherwise, including when the status request itself failed, it sleeps one interval and
	/// polls again.
	pub async fn wait_for_task(&self, task_id: &TaskId) -> TaskReport {
		const KIND: OpKind = OpKind::TaskPoll;

		let span = OpSpan::new(KIND, "wait_for_task");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let report = span.instrument(self.poll(task_id)).await;

		obs::record_op_outcome(KIND, OpOutcome::from_failed(report.failed()));

		report
	}

	async fn poll(&self, task_id: &TaskId) -> TaskReport {
		let path = format!("{TASK_PATH}/{task_id}");
		let budget = self.policy.budget();
		let started = Instant::now();
		let mut polls = 0_u32;
		let mut last_failure = None;

		loop {
			let response = self.transport.get(&path).await;

			polls += 1;

			if response.failed {
				obs_event!(warn, %task_id, polls, msg = %response.msg, "task status request failed");

				last_failure = Some(response.msg.clone());
			}

			let elapsed = started.elapsed();
			let (state, msg) =
				evaluate(task_id, &response, elapsed, budget, last_failure.as_deref());

			if state.is_terminal() {
				obs_event!(info, %task_id, ?state, polls, "task polling finished");

				return TaskReport {
					task_id: task_id.clone(),
					state,
					polls,
					elapsed,
					budget,
					response,
					msg,
				};
			}

			obs_event!(
				debug,
				%task_id,
				polls,
				interval_ms = self.policy.retry_interval.as_millis() as u64,
				"task has not completed yet"
			);

			tokio::time::sleep(self.policy.retry_interval).await;
		}
	}
}

fn evaluate(
	task_id: &TaskId,
	response: &ApiResponse,
	elapsed: StdDuration,
	budget: StdDuration,
	last_failure: Option<&str>,
) -> (TaskState, String) {
	// A failed status request carries no task payload; only the budget can end the wait.
	let payload = if response.failed { None } else { response.response() };

	// Key presence marks completion, whatever its value.
	if payload.is_some_and(|p| p.get("endTime").is_some()) {
		return (TaskState::Done, String::new());
	}
	if payload.and_then(|p| p.get("isError")).and_then(Value::as_bool) == Some(true) {
		let reason = payload.and_then(|p| p.get("failureReason")).and_then(Value::as_str);
		let msg = match reason {
			Some(reason) => format!("task_id {task_id} is error: {reason}"),
			None => format!("task_id {task_id} is error"),
		};

		return (TaskState::Error, msg);
	}
	if elapsed > budget {
		let mut msg = format!(
			"task_id {task_id} did not end within the specified timeout ({} sec)",
			budget.as_secs_f64()
		);

		if let Some(failure) = last_failure {
			msg.push_str(&format!("; last poll failed: {failure}"));
		}

		return (TaskState::TimedOut, msg);
	}

	(TaskState::Polling, String::new())
}
