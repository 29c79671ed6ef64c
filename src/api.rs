//! Thin endpoint wrappers composed over a [`Transport`].
//!
//! Each wrapper builds a path, issues one request through the envelope, and unwraps the
//! controller's `response` field. Failures surface as `None` (or an empty collection); callers
//! that need the failure details use the [`Transport`] directly.

pub mod devices;
pub mod groups;
pub mod hosts;
pub mod path_trace;

pub use devices::Devices;
pub use groups::Groups;
pub use hosts::Hosts;
pub use path_trace::{PathHop, PathTrace};

// self
use crate::{_prelude::*, http::Transport};

/// Entry point handing out the endpoint wrappers for one transport.
pub struct Api<'a, T>
where
	T: ?Sized + Transport,
{
	transport: &'a T,
}
impl<'a, T> Api<'a, T>
where
	T: ?Sized + Transport,
{
	/// Wraps a transport.
	pub fn new(transport: &'a T) -> Self {
		Self { transport }
	}

	/// Network device inventory.
	pub fn devices(&self) -> Devices<'a, T> {
		Devices::new(self.transport)
	}

	/// End hosts seen by the controller.
	pub fn hosts(&self) -> Hosts<'a, T> {
		Hosts::new(self.transport)
	}

	/// Site/group hierarchy.
	pub fn groups(&self) -> Groups<'a, T> {
		Groups::new(self.transport)
	}

	/// Path trace diagnostics.
	pub fn path_trace(&self) -> PathTrace<'a, T> {
		PathTrace::new(self.transport)
	}
}
impl<T> Debug for Api<'_, T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Api").finish_non_exhaustive()
	}
}

/// Appends URL-encoded query pairs to `path`.
pub fn with_query<'p>(path: &str, pairs: impl IntoIterator<Item = (&'p str, &'p str)>) -> String {
	let mut serializer = url::form_urlencoded::Serializer::new(String::new());

	for (key, value) in pairs {
		serializer.append_pair(key, value);
	}

	match serializer.finish() {
		query if query.is_empty() => path.to_owned(),
		query => format!("{path}?{query}"),
	}
}

/// `GET path` and return `data.response`, or `None` when the request failed.
pub(crate) async fn fetch_response<T>(transport: &T, path: &str) -> Option<Value>
where
	T: ?Sized + Transport,
{
	let result = transport.get(path).await;

	if result.failed {
		return None;
	}

	result.response().cloned()
}

/// Like [`fetch_response`] but expects a JSON array.
pub(crate) async fn fetch_list<T>(transport: &T, path: &str) -> Vec<Value>
where
	T: ?Sized + Transport,
{
	match fetch_response(transport, path).await {
		Some(Value::Array(items)) => items,
		_ => Vec::new(),
	}
}
