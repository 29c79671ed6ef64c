//! Site/group hierarchy: lookups and present/absent reconciliation of groups.

// self
use crate::{
	_prelude::*,
	api,
	auth::GroupId,
	http::Transport,
	resource::{self, ALREADY_IN_DESIRED_STATE_MSG, ChangeResult, DesiredState, ResourceOps},
	task::PollPolicy,
};

/// Group list path.
pub const GROUP_PATH: &str = "api/v1/group";
/// Site list path.
pub const SITE_PATH: &str = "dna/intent/api/v1/site";
/// Site count path.
pub const SITE_COUNT_PATH: &str = "dna/intent/api/v1/site/count";
/// Name of the implicit root of the hierarchy.
pub const GLOBAL_GROUP: &str = "Global";
/// Page size used when listing sites.
pub const SITE_PAGE_SIZE: usize = 10;

/// Result of resolving a group name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GroupLookup {
	/// The hierarchy root (or an empty name).
	Global,
	/// Exactly one group carries the name.
	Found(GroupId),
	/// No group, or more than one, carries the name.
	NotFound,
}
impl GroupLookup {
	/// Controller-style identifier: `-1` for the root, `0` when not found.
	pub fn as_str(&self) -> &str {
		match self {
			Self::Global => "-1",
			Self::Found(id) => id.as_ref(),
			Self::NotFound => "0",
		}
	}
}

/// Kind of site group.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupType {
	/// Area (may contain areas and buildings).
	#[default]
	Area,
	/// Building (carries an address and coordinates).
	Building,
	/// Floor inside a building.
	Floor,
}
impl GroupType {
	/// Label used in the `Location` attributes.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Area => "area",
			Self::Building => "building",
			Self::Floor => "floor",
		}
	}
}

/// Desired site group.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupSpec {
	/// Group name.
	pub name: String,
	/// Group kind.
	pub group_type: GroupType,
	/// Name of the parent group.
	pub parent_name: String,
	/// Extra `Location` attributes, e.g. `address`, `latitude`, `longitude` for buildings.
	pub attributes: serde_json::Map<String, Value>,
}
impl GroupSpec {
	/// An area named `name` directly under [`GLOBAL_GROUP`].
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			group_type: GroupType::default(),
			parent_name: GLOBAL_GROUP.into(),
			attributes: Default::default(),
		}
	}

	/// Sets the group kind.
	pub fn group_type(mut self, group_type: GroupType) -> Self {
		self.group_type = group_type;

		self
	}

	/// Sets the parent group name.
	pub fn parent(mut self, parent_name: impl Into<String>) -> Self {
		self.parent_name = parent_name.into();

		self
	}

	/// Adds one `Location` attribute.
	pub fn attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.attributes.insert(key.into(), value.into());

		self
	}

	/// Request body for `POST api/v1/group`.
	pub fn payload(&self) -> Value {
		let mut attributes = serde_json::Map::new();

		attributes.insert("type".into(), self.group_type.as_str().into());
		attributes.extend(self.attributes.clone());

		serde_json::json!({
			"groupTypeList": ["SITE"],
			"name": self.name,
			"additionalInfo": [{ "nameSpace": "Location", "attributes": attributes }],
		})
	}
}

/// Wrapper over the group and site endpoints.
pub struct Groups<'a, T>
where
	T: ?Sized + Transport,
{
	transport: &'a T,
	policy: PollPolicy,
}
impl<'a, T> Groups<'a, T>
where
	T: ?Sized + Transport,
{
	/// Wraps a transport.
	pub fn new(transport: &'a T) -> Self {
		Self { transport, policy: PollPolicy::default() }
	}

	/// Overrides the policy used when a group mutation answers 202.
	pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Names of every group.
	pub async fn group_names(&self) -> Vec<String> {
		names_of(&api::fetch_list(self.transport, GROUP_PATH).await)
	}

	/// Resolves a group name to its identifier.
	pub async fn group_id_by_name(&self, name: &str) -> GroupLookup {
		if name.is_empty() || name.eq_ignore_ascii_case(GLOBAL_GROUP) {
			return GroupLookup::Global;
		}

		let groups = api::fetch_list(self.transport, GROUP_PATH).await;
		let mut matches = groups
			.iter()
			.filter(|group| group.get("name").and_then(Value::as_str) == Some(name))
			.filter_map(|group| group.get("id").and_then(Value::as_str));

		match (matches.next(), matches.next()) {
			(Some(id), None) =>
				GroupId::new(id).map(GroupLookup::Found).unwrap_or(GroupLookup::NotFound),
			_ => GroupLookup::NotFound,
		}
	}

	/// Every site keyed by `groupNameHierarchy`, plus [`GLOBAL_GROUP`].
	///
	/// Sites are fetched [`SITE_PAGE_SIZE`] at a time. Any failed page yields an empty map.
	pub async fn site_names(&self) -> BTreeMap<String, Value> {
		let Some(count) =
			api::fetch_response(self.transport, SITE_COUNT_PATH).await.and_then(|c| c.as_u64())
		else {
			return BTreeMap::new();
		};
		let mut sites = BTreeMap::new();

		for offset in (1..=count as usize).step_by(SITE_PAGE_SIZE) {
			let offset = offset.to_string();
			let limit = SITE_PAGE_SIZE.to_string();
			let path =
				api::with_query(SITE_PATH, [("offset", offset.as_str()), ("limit", limit.as_str())]);
			let page = self.transport.get(&path).await;

			if page.failed {
				return BTreeMap::new();
			}

			for site in page.response().and_then(Value::as_array).into_iter().flatten() {
				if let Some(name) = site.get("groupNameHierarchy").and_then(Value::as_str) {
					sites.insert(name.to_owned(), site.clone());
				}
			}
		}

		sites.insert(
			GLOBAL_GROUP.into(),
			serde_json::json!({
				"groupNameHierarchy": GLOBAL_GROUP,
				"additionalInfo": [{ "attributes": { "type": "area" } }],
			}),
		);

		sites
	}

	/// Creates or deletes the group described by `spec` so that it matches `state`.
	///
	/// The parent must already exist. Nothing is sent when the group list already matches.
	pub async fn process_group(&self, state: DesiredState, spec: &GroupSpec) -> ChangeResult {
		let listing = self.transport.get(GROUP_PATH).await;

		if listing.failed {
			let msg = listing.msg.clone();

			return ChangeResult { response: Some(listing), ..ChangeResult::failure(msg) };
		}

		let listed = listing.response().and_then(Value::as_array).map_or(&[][..], Vec::as_slice);
		let names = names_of(listed);
		let has_group = names.iter().any(|n| n == &spec.name);
		let has_parent =
			spec.parent_name == GLOBAL_GROUP || names.iter().any(|n| n == &spec.parent_name);

		if !has_parent {
			let msg = format!("parent group {} does not exist", spec.parent_name);

			return ChangeResult::failure(msg);
		}

		let ops = ResourceOps::new(self.transport).with_poll_policy(self.policy);
		let payload = spec.payload();
		let mut result = resource::reconcile(
			state,
			has_group,
			|| ops.create_object(GROUP_PATH, &payload),
			|| async {
				match self.group_id_by_name(&spec.name).await {
					GroupLookup::Found(id) =>
						ops.delete_object(&format!("{GROUP_PATH}/{id}")).await,
					_ => ChangeResult::failure(format!("group {} could not be resolved", spec.name)),
				}
			},
		)
		.await;

		if !result.changed && !result.failed && result.msg == ALREADY_IN_DESIRED_STATE_MSG {
			result.msg = match state {
				DesiredState::Present => format!("group_name {} already exists", spec.name),
				DesiredState::Absent => format!("group_name {} is already absent", spec.name),
			};
		}

		result
	}
}

fn names_of(groups: &[Value]) -> Vec<String> {
	groups
		.iter()
		.filter_map(|group| group.get("name").and_then(Value::as_str))
		.map(str::to_owned)
		.collect()
}
