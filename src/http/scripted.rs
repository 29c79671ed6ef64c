//! Scripted [`Transport`] double for unit tests.

// std
use std::collections::VecDeque;
// self
use crate::{
	_prelude::*,
	http::{ApiFuture, ApiResponse, HttpMethod, ResponseBody, Transport},
};

/// One request observed by [`ScriptedTransport`].
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RecordedCall {
	pub(crate) method: HttpMethod,
	pub(crate) path: String,
	pub(crate) body: Option<Value>,
}

/// Replays queued responses in order, then repeats `fallback` forever.
pub(crate) struct ScriptedTransport {
	script: Mutex<VecDeque<ApiResponse>>,
	fallback: ApiResponse,
	calls: Mutex<Vec<RecordedCall>>,
	check_mode: bool,
}
impl ScriptedTransport {
	pub(crate) fn new(script: Vec<ApiResponse>, fallback: ApiResponse) -> Self {
		Self {
			script: Mutex::new(script.into()),
			fallback,
			calls: Mutex::new(Vec::new()),
			check_mode: false,
		}
	}

	pub(crate) fn in_check_mode(mut self) -> Self {
		self.check_mode = true;

		self
	}

	pub(crate) fn calls(&self) -> Vec<RecordedCall> {
		self.calls.lock().clone()
	}

	pub(crate) fn call_count(&self) -> usize {
		self.calls.lock().len()
	}
}
impl Transport for ScriptedTransport {
	fn execute<'a>(
		&'a self,
		method: HttpMethod,
		api_path: &'a str,
		body: Option<&'a Value>,
	) -> ApiFuture<'a> {
		self.calls.lock().push(RecordedCall {
			method,
			path: api_path.to_owned(),
			body: body.cloned(),
		});

		let next = self.script.lock().pop_front().unwrap_or_else(|| self.fallback.clone());

		Box::pin(async move { next })
	}

	fn check_mode(&self) -> bool {
		self.check_mode
	}
}

/// Successful JSON response wrapping `payload` in the controller's `response` envelope.
pub(crate) fn json_response(status: u16, payload: Value) -> ApiResponse {
	ApiResponse {
		failed: !(200..300).contains(&status),
		status: Some(status),
		data: ResponseBody::Json(serde_json::json!({ "response": payload, "version": "1.0" })),
		..Default::default()
	}
}
