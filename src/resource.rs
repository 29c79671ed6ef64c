//! Create/update/delete of controller objects and present/absent reconciliation.
//!
//! The controller answers a mutation either synchronously (200, 201, 204, 206) or with 202 and
//! a task to poll. [`ResourceOps`] hides that difference and reports a [`ChangeResult`]. In
//! check mode no request is sent at all.

// self
use crate::{
	_prelude::*,
	auth::TaskId,
	http::{ApiResponse, HttpMethod, Transport},
	obs::{self, OpKind, OpOutcome, OpSpan, obs_event},
	task::{PollPolicy, TaskPoller, TaskState},
};

/// Statuses that mean the mutation finished synchronously.
pub const SYNC_SUCCESS_STATUSES: [u16; 4] = [200, 201, 204, 206];
/// Status that means the mutation was accepted and must be polled.
pub const ACCEPTED_STATUS: u16 = 202;

/// Message reported when check mode suppresses a mutation.
pub const CHECK_MODE_MSG: &str = "did nothing because of check mode";
/// Message reported when the current state already matches the desired one.
pub const ALREADY_IN_DESIRED_STATE_MSG: &str = "already in desired state";

/// Outcome of a mutation or reconciliation.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ChangeResult {
	/// `true` when the mutation was attempted and did not succeed.
	pub failed: bool,
	/// `true` when the controller state was modified.
	pub changed: bool,
	/// Human-readable summary.
	pub msg: String,
	/// Last envelope response (mutation or task status), if a request was sent.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub response: Option<ApiResponse>,
	/// Terminal task state when the mutation went through the 202 path.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub task_state: Option<TaskState>,
}
impl ChangeResult {
	/// Successful no-op.
	pub fn unchanged(msg: impl Into<String>) -> Self {
		Self { msg: msg.into(), ..Default::default() }
	}

	/// Failure that never produced a usable response.
	pub fn failure(msg: impl Into<String>) -> Self {
		Self { failed: true, msg: msg.into(), ..Default::default() }
	}

	/// HTTP status of the last response, or `-1`.
	pub fn status_code(&self) -> i32 {
		self.response.as_ref().map(ApiResponse::status_code).unwrap_or(-1)
	}
}

/// Desired existence of an object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
	/// Object must exist.
	#[default]
	Present,
	/// Object must not exist.
	Absent,
}
impl DesiredState {
	/// Returns the action that moves `exists` towards this state.
	pub fn action(self, exists: bool) -> ReconcileAction {
		match (self, exists) {
			(Self::Present, false) => ReconcileAction::Create,
			(Self::Absent, true) => ReconcileAction::Delete,
			_ => ReconcileAction::Nothing,
		}
	}
}
impl FromStr for DesiredState {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"present" => Ok(Self::Present),
			"absent" => Ok(Self::Absent),
			other => Err(format!("unknown state `{other}`; expected `present` or `absent`")),
		}
	}
}

/// Step chosen by [`DesiredState::action`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileAction {
	/// Object is missing and must be created.
	Create,
	/// Object exists and must be deleted.
	Delete,
	/// Current state already matches.
	Nothing,
}

/// Runs `create` or `delete` when the current state differs from `desired`.
///
/// When nothing needs to happen the result is unchanged with [`ALREADY_IN_DESIRED_STATE_MSG`].
pub async fn reconcile<C, CF, D, DF>(
	desired: DesiredState,
	exists: bool,
	create: C,
	delete: D,
) -> ChangeResult
where
	C: FnOnce() -> CF,
	CF: Future<Output = ChangeResult>,
	D: FnOnce() -> DF,
	DF: Future<Output = ChangeResult>,
{
	match desired.action(exists) {
		ReconcileAction::Create => create().await,
		ReconcileAction::Delete => delete().await,
		ReconcileAction::Nothing => ChangeResult::unchanged(ALREADY_IN_DESIRED_STATE_MSG),
	}
}

/// Mutation helpers over any [`Transport`].
pub struct ResourceOps<'a, T>
where
	T: ?Sized + Transport,
{
	transport: &'a T,
	policy: PollPolicy,
}
impl<'a, T> ResourceOps<'a, T>
where
	T: ?Sized + Transport,
{
	/// Creates helpers that poll 202 tasks with [`PollPolicy::default`].
	pub fn new(transport: &'a T) -> Self {
		Self { transport, policy: PollPolicy::default() }
	}

	/// Overrides the policy used for 202 tasks.
	pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// `POST api_path` with `data`.
	pub async fn create_object(&self, api_path: &str, data: &Value) -> ChangeResult {
		self.mutate(HttpMethod::Post, api_path, Some(data)).await
	}

	/// `PUT api_path` with `data`.
	pub async fn update_object(&self, api_path: &str, data: &Value) -> ChangeResult {
		self.mutate(HttpMethod::Put, api_path, Some(data)).await
	}

	/// `DELETE api_path`.
	pub async fn delete_object(&self, api_path: &str) -> ChangeResult {
		self.mutate(HttpMethod::Delete, api_path, None).await
	}

	/// Reconciles a singleton setting list at `api_path`.
	///
	/// `want` is a non-empty JSON array whose first element carries a `value`. With
	/// [`DesiredState::Present`] the setting is posted unless the single current entry already
	/// has the same `value`. With [`DesiredState::Absent`] the setting is posted with an empty
	/// value list.
	pub async fn reconcile_setting(
		&self,
		api_path: &str,
		state: DesiredState,
		want: &Value,
	) -> ChangeResult {
		let Some(first_want) = want.as_array().and_then(|items| items.first()) else {
			return ChangeResult::failure("desired settings must be a non-empty list");
		};
		let current = self.transport.get(api_path).await;

		if current.failed {
			let msg = current.msg.clone();

			return ChangeResult { response: Some(current), ..ChangeResult::failure(msg) };
		}

		let have = current.response().and_then(Value::as_array).cloned().unwrap_or_default();

		match state {
			DesiredState::Present => match have.as_slice() {
				[] => self.create_object(api_path, want).await,
				[only] if only.get("value") == first_want.get("value") =>
					ChangeResult::unchanged(ALREADY_IN_DESIRED_STATE_MSG),
				[_] => self.create_object(api_path, want).await,
				many => ChangeResult::failure(format!(
					"expected at most one current setting at {api_path}, found {}",
					many.len()
				)),
			},
			DesiredState::Absent => {
				let mut cleared = want.clone();

				if let Some(entry) = cleared.get_mut(0).and_then(Value::as_object_mut) {
					entry.insert("value".into(), Value::Array(Vec::new()));
				}

				self.create_object(api_path, &cleared).await
			},
		}
	}

	async fn mutate(&self, method: HttpMethod, api_path: &str, body: Option<&Value>) -> ChangeResult {
		const KIND: OpKind = OpKind::Mutation;

		if self.transport.check_mode() {
			obs_event!(info, %method, api_path, "check mode; skipping mutation");

			return ChangeResult::unchanged(CHECK_MODE_MSG);
		}

		let span = OpSpan::new(KIND, method.as_str());

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async {
				let response = self.transport.execute(method, api_path, body).await;

				self.interpret(response).await
			})
			.await;

		obs::record_op_outcome(KIND, OpOutcome::from_failed(result.failed));

		result
	}

	async fn interpret(&self, response: ApiResponse) -> ChangeResult {
		match response.status {
			Some(status) if SYNC_SUCCESS_STATUSES.contains(&status) => ChangeResult {
				failed: false,
				changed: true,
				msg: response.msg.clone(),
				response: Some(response),
				task_state: None,
			},
			Some(ACCEPTED_STATUS) => {
				let task_id = match response.response().and_then(TaskId::from_accepted) {
					Some(Ok(task_id)) => task_id,
					Some(Err(e)) => {
						let msg = format!("accepted with an unusable task id: {e}");

						return ChangeResult { response: Some(response), ..ChangeResult::failure(msg) };
					},
					None => {
						let msg = "accepted without a task id";

						return ChangeResult { response: Some(response), ..ChangeResult::failure(msg) };
					},
				};
				let report =
					TaskPoller::new(self.transport).with_policy(self.policy).wait_for_task(&task_id).await;
				let failed = report.failed();

				ChangeResult {
					failed,
					changed: !failed,
					msg: report.msg,
					response: Some(report.response),
					task_state: Some(report.state),
				}
			},
			_ => ChangeResult {
				failed: true,
				changed: false,
				msg: response.msg.clone(),
				response: Some(response),
				task_state: None,
			},
		}
	}
}
impl<T> Debug for ResourceOps<'_, T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ResourceOps")
			.field("check_mode", &self.transport.check_mode())
			.field("policy", &self.policy)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::time::Duration as StdDuration;
	// self
	use super::*;
	use crate::http::scripted::{self, ScriptedTransport};

	fn fast_ops<T>(transport: &T) -> ResourceOps<'_, T>
	where
		T: Transport,
	{
		ResourceOps::new(transport).with_poll_policy(
			PollPolicy::new(StdDuration::from_millis(10), 10).expect("Test policy should be valid."),
		)
	}

	#[tokio::test]
	async fn check_mode_sends_nothing() {
		let transport =
			ScriptedTransport::new(Vec::new(), scripted::json_response(201, Value::Null))
				.in_check_mode();
		let ops = fast_ops(&transport);
		let created = ops.create_object("api/v1/group", &serde_json::json!({})).await;
		let deleted = ops.delete_object("api/v1/group/g-1").await;

		for result in [created, deleted] {
			assert!(!result.failed);
			assert!(!result.changed);
			assert_eq!(result.msg, CHECK_MODE_MSG);
		}

		assert_eq!(transport.call_count(), 0);
	}

	#[tokio::test]
	async fn synchronous_statuses_report_changed() {
		for status in SYNC_SUCCESS_STATUSES {
			let transport =
				ScriptedTransport::new(Vec::new(), scripted::json_response(status, Value::Null));
			let ops = fast_ops(&transport);
			let deleted = ops.delete_object("api/v1/group/g-1").await;
			let updated =
				ops.update_object("api/v1/group/g-1", &serde_json::json!({ "name": "Osaka" })).await;

			for result in [deleted, updated] {
				assert!(!result.failed, "status {status} should succeed");
				assert!(result.changed);
				assert_eq!(result.status_code(), i32::from(status));
			}

			let calls = transport.calls();

			assert_eq!(calls[1].method, HttpMethod::Put);
			assert_eq!(calls[1].body, Some(serde_json::json!({ "name": "Osaka" })));
		}
	}

	#[tokio::test]
	async fn accepted_mutation_polls_the_task() {
		let accepted = scripted::json_response(
			202,
			serde_json::json!({ "taskId": "t-42", "url": "/api/v1/task/t-42" }),
		);
		let done = scripted::json_response(200, serde_json::json!({ "endTime": 1 }));
		let transport = ScriptedTransport::new(vec![accepted], done);
		let result = fast_ops(&transport)
			.create_object("api/v1/group", &serde_json::json!({ "name": "Tokyo" }))
			.await;
		let calls = transport.calls();

		assert!(!result.failed);
		assert!(result.changed);
		assert_eq!(result.task_state, Some(TaskState::Done));
		assert_eq!(calls.len(), 2);
		assert_eq!(calls[0].method, HttpMethod::Post);
		assert_eq!(calls[0].body, Some(serde_json::json!({ "name": "Tokyo" })));
		assert_eq!(calls[1].path, "dna/intent/api/v1/task/t-42");
	}

	#[tokio::test]
	async fn failed_task_is_not_a_change() {
		let accepted = scripted::json_response(202, serde_json::json!({ "taskId": "t-7" }));
		let errored = scripted::json_response(200, serde_json::json!({ "isError": true }));
		let transport = ScriptedTransport::new(vec![accepted], errored);
		let result = fast_ops(&transport).delete_object("api/v1/group/g-1").await;

		assert!(result.failed);
		assert!(!result.changed);
		assert_eq!(result.msg, "task_id t-7 is error");
	}

	#[tokio::test]
	async fn other_statuses_pass_the_envelope_message_through() {
		let mut rejected = scripted::json_response(400, Value::Null);

		rejected.msg = "status code: 400".into();

		let transport = ScriptedTransport::new(Vec::new(), rejected);
		let result = fast_ops(&transport).create_object("api/v1/group", &Value::Null).await;

		assert!(result.failed);
		assert!(!result.changed);
		assert_eq!(result.msg, "status code: 400");

		let accepted_without_task = ScriptedTransport::new(
			Vec::new(),
			scripted::json_response(202, serde_json::json!({})),
		);
		let result = fast_ops(&accepted_without_task).delete_object("api/v1/group/g-1").await;

		assert!(result.failed);
		assert_eq!(accepted_without_task.call_count(), 1);
	}

	#[tokio::test]
	async fn setting_reconciliation_is_idempotent() {
		let path = "api/v1/commonsetting/global/-1";
		let want = serde_json::json!([{ "instanceType": "ip", "key": "dns.server", "value": ["8.8.8.8"] }]);
		let current = scripted::json_response(
			200,
			serde_json::json!([{ "instanceType": "ip", "key": "dns.server", "value": ["8.8.8.8"] }]),
		);
		let transport = ScriptedTransport::new(Vec::new(), current);
		let ops = fast_ops(&transport);

		for _ in 0..2 {
			let result = ops.reconcile_setting(path, DesiredState::Present, &want).await;

			assert!(!result.failed);
			assert!(!result.changed);
			assert_eq!(result.msg, ALREADY_IN_DESIRED_STATE_MSG);
		}

		assert!(transport.calls().iter().all(|c| c.method == HttpMethod::Get));
	}

	#[tokio::test]
	async fn absent_setting_posts_an_empty_value() {
		let path = "api/v1/commonsetting/global/-1";
		let want = serde_json::json!([{ "key": "ntp.server", "value": ["10.0.0.1"] }]);
		let current =
			scripted::json_response(200, serde_json::json!([{ "key": "ntp.server", "value": ["10.0.0.1"] }]));
		let transport =
			ScriptedTransport::new(vec![current], scripted::json_response(201, Value::Null));
		let result = fast_ops(&transport).reconcile_setting(path, DesiredState::Absent, &want).await;
		let calls = transport.calls();

		assert!(result.changed);
		assert_eq!(calls[1].method, HttpMethod::Post);
		assert_eq!(calls[1].body, Some(serde_json::json!([{ "key": "ntp.server", "value": [] }])));
	}

	#[tokio::test]
	async fn reconcile_dispatches_by_desired_state() {
		let created = reconcile(
			DesiredState::Present,
			false,
			|| async { ChangeResult { changed: true, ..Default::default() } },
			|| async { ChangeResult::failure("delete must not run") },
		)
		.await;
		let untouched = reconcile(
			DesiredState::Absent,
			false,
			|| async { ChangeResult::failure("create must not run") },
			|| async { ChangeResult::failure("delete must not run") },
		)
		.await;

		assert!(created.changed);
		assert!(!untouched.failed);
		assert_eq!(untouched.msg, ALREADY_IN_DESIRED_STATE_MSG);
		assert_eq!("absent".parse::<DesiredState>(), Ok(DesiredState::Absent));
		assert!("gone".parse::<DesiredState>().is_err());
	}
}
