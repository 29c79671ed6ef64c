//! Path trace (flow analysis) results.

// self
use crate::{_prelude::*, api, auth::TraceId, http::Transport};

/// Flow analysis path.
pub const FLOW_ANALYSIS_PATH: &str = "dna/intent/api/v1/flow-analysis";

/// One network element along a traced path.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathHop {
	/// Element name.
	pub name: Option<String>,
	/// Element address.
	pub ip: Option<String>,
	/// Element type, e.g. `Switches and Hubs`.
	pub element_type: Option<String>,
	/// Ingress physical interface.
	pub ingress: Option<String>,
	/// Egress physical interface.
	pub egress: Option<String>,
}
impl PathHop {
	/// Extracts hops from a trace's `networkElementsInfo` list.
	pub fn from_trace(trace: &Value) -> Vec<Self> {
		let Some(elements) = trace.get("networkElementsInfo").and_then(Value::as_array) else {
			return Vec::new();
		};

		elements
			.iter()
			.map(|element| Self {
				name: string_at(element, &["name"]),
				ip: string_at(element, &["ip"]),
				element_type: string_at(element, &["type"]),
				ingress: string_at(element, &["ingressInterface", "physicalInterface", "name"]),
				egress: string_at(element, &["egressInterface", "physicalInterface", "name"]),
			})
			.collect()
	}
}

fn string_at(value: &Value, keys: &[&str]) -> Option<String> {
	keys.iter()
		.try_fold(value, |current, key| current.get(key))
		.and_then(Value::as_str)
		.map(str::to_owned)
}

/// Wrapper over the flow analysis endpoints.
pub struct PathTrace<'a, T>
where
	T: ?Sized + Transport,
{
	transport: &'a T,
}
impl<'a, T> PathTrace<'a, T>
where
	T: ?Sized + Transport,
{
	/// Wraps a transport.
	pub fn new(transport: &'a T) -> Self {
		Self { transport }
	}

	/// Summaries of previous traces.
	pub async fn list(&self) -> Vec<Value> {
		api::fetch_list(self.transport, FLOW_ANALYSIS_PATH).await
	}

	/// One trace by id.
	pub async fn by_id(&self, trace_id: &TraceId) -> Option<Value> {
		api::fetch_response(self.transport, &format!("{FLOW_ANALYSIS_PATH}/{trace_id}")).await
	}
}
