//! Auth-domain identifiers, redacted secrets, and bearer-token models.

pub mod id;
pub mod token;

pub use id::*;
pub use token::{claims::*, secret::*, *};
