//! End hosts.

// self
use crate::{_prelude::*, api, http::Transport};

/// Host inventory path.
pub const HOSTS_PATH: &str = "api/v1/host";

/// Wrapper over the host endpoints.
pub struct Hosts<'a, T>
where
	T: ?Sized + Transport,
{
	transport: &'a T,
}
impl<'a, T> Hosts<'a, T>
where
	T: ?Sized + Transport,
{
	/// Wraps a transport.
	pub fn new(transport: &'a T) -> Self {
		Self { transport }
	}

	/// Every known host.
	pub async fn list(&self) -> Vec<Value> {
		api::fetch_list(self.transport, HOSTS_PATH).await
	}

	/// Hosts with the given IP address.
	pub async fn by_ip(&self, ip: &str) -> Vec<Value> {
		api::fetch_list(self.transport, &api::with_query(HOSTS_PATH, [("hostIp", ip)])).await
	}

	/// Hosts with the given MAC address.
	pub async fn by_mac(&self, mac: &str) -> Vec<Value> {
		api::fetch_list(self.transport, &api::with_query(HOSTS_PATH, [("hostMac", mac)])).await
	}
}
