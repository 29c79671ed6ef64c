//! Strongly typed controller identifiers.
//!
//! Identifiers come back from the controller and are spliced straight into request paths
//! (`task/{id}`, `group/{id}`, `site/{id}/device`, `flow-analysis/{id}`), so anything that would
//! change the path shape is rejected.

// self
use crate::_prelude::*;

/// Longest identifier accepted from the controller.
pub const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (task, group, site, trace).
		kind: &'static str,
	},
	/// The identifier contains a character that is unsafe inside a URL path segment.
	#[error("{kind} identifier contains {found:?}, which is not allowed in a path segment.")]
	InvalidCharacter {
		/// Kind of identifier (task, group, site, trace).
		kind: &'static str,
		/// First offending character.
		found: char,
	},
	/// The identifier exceeded the allowed length.
	#[error("{kind} identifier exceeds {max} bytes.")]
	TooLong {
		/// Kind of identifier (task, group, site, trace).
		kind: &'static str,
		/// Maximum permitted length.
		max: usize,
	},
}

macro_rules! path_id {
	($(#[$meta:meta])* $name:ident => $kind:literal) => {
		$(#[$meta])*
		#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Validates `value` as a path-safe identifier.
			pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
				let value = value.into();

				check_segment($kind, &value)?;

				Ok(Self(value))
			}

			/// Borrows the raw identifier.
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				Self::new(value)
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, "{}({})", $kind, self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
	};
}

path_id! {
	/// Identifier of an asynchronous controller task returned with HTTP 202.
	TaskId => "Task"
}
impl TaskId {
	/// Reads `taskId` from the `response` object of an accepted (202) mutation.
	///
	/// `None` means the field is missing or not a string.
	pub fn from_accepted(response: &Value) -> Option<Result<Self, IdentifierError>> {
		response.get("taskId").and_then(Value::as_str).map(Self::new)
	}
}

path_id! {
	/// Identifier of a site/group in the controller hierarchy.
	GroupId => "Group"
}

path_id! {
	/// Identifier of a site that devices are assigned to.
	SiteId => "Site"
}

path_id! {
	/// Identifier of a path trace (flow analysis) run.
	TraceId => "Trace"
}

fn check_segment(kind: &'static str, value: &str) -> Result<(), IdentifierError> {
	if value.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if let Some(found) =
		value.chars().find(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '%'))
	{
		return Err(IdentifierError::InvalidCharacter { kind, found });
	}
	if value.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}
