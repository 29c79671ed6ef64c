//! Network device inventory.

// self
use crate::{
	_prelude::*,
	api,
	auth::SiteId,
	http::Transport,
	resource::{ChangeResult, ResourceOps},
};

/// Device inventory path.
pub const DEVICES_PATH: &str = "dna/intent/api/v1/network-device";

/// Device to site assignment entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteDevice {
	/// Device serial number.
	pub serial_number: String,
	/// Target site hierarchy name.
	pub site_name: String,
	/// Management address; empty lets the controller decide.
	#[serde(default)]
	pub ip: String,
}

/// Wrapper over the device inventory endpoints.
pub struct Devices<'a, T>
where
	T: ?Sized + Transport,
{
	transport: &'a T,
}
impl<'a, T> Devices<'a, T>
where
	T: ?Sized + Transport,
{
	/// Wraps a transport.
	pub fn new(transport: &'a T) -> Self {
		Self { transport }
	}

	/// Every managed device.
	pub async fn list(&self) -> Vec<Value> {
		api::fetch_list(self.transport, DEVICES_PATH).await
	}

	/// Devices whose management address matches `ip`.
	pub async fn by_ip(&self, ip: &str) -> Vec<Value> {
		let path = api::with_query(DEVICES_PATH, [("managementIpAddress", ip)]);

		api::fetch_list(self.transport, &path).await
	}

	/// Devices with the given serial number.
	pub async fn by_serial(&self, serial_number: &str) -> Vec<Value> {
		let path = api::with_query(DEVICES_PATH, [("serialNumber", serial_number)]);

		api::fetch_list(self.transport, &path).await
	}

	/// Assigns devices to the site identified by `site_id`.
	pub async fn assign_to_site(&self, site_id: &SiteId, devices: &[SiteDevice]) -> ChangeResult {
		let payload = serde_json::json!({ "device": devices });
		let path = format!("dna/intent/api/v1/site/{site_id}/device");

		ResourceOps::new(self.transport).create_object(&path, &payload).await
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::http::{
		HttpMethod,
		scripted::{self, ScriptedTransport},
	};

	#[tokio::test]
	async fn lookups_build_filtered_paths() {
		let transport = ScriptedTransport::new(
			Vec::new(),
			scripted::json_response(200, serde_json::json!([{ "hostname": "cat_9k_1" }])),
		);
		let devices = Devices::new(&transport);

		assert_eq!(devices.by_ip("10.10.20.81").await.len(), 1);
		assert_eq!(devices.by_serial("FOC1703V36B").await.len(), 1);

		let paths: Vec<String> = transport.calls().into_iter().map(|c| c.path).collect();

		assert_eq!(
			paths,
			[
				"dna/intent/api/v1/network-device?managementIpAddress=10.10.20.81",
				"dna/intent/api/v1/network-device?serialNumber=FOC1703V36B",
			]
		);
	}

	#[tokio::test]
	async fn site_assignment_posts_device_list() {
		let transport = ScriptedTransport::new(Vec::new(), scripted::json_response(200, Value::Null));
		let device = SiteDevice {
			serial_number: "FTX1842AHM1".into(),
			site_name: "Area1-BLD1".into(),
			ip: String::new(),
		};
		let site_id = SiteId::new("site-1").expect("Site fixture should be valid.");
		let result = Devices::new(&transport).assign_to_site(&site_id, &[device]).await;
		let calls = transport.calls();

		assert!(result.changed);
		assert_eq!(calls[0].method, HttpMethod::Post);
		assert_eq!(calls[0].path, "dna/intent/api/v1/site/site-1/device");
		assert_eq!(
			calls[0].body,
			Some(serde_json::json!({
				"device": [{ "serialNumber": "FTX1842AHM1", "siteName": "Area1-BLD1", "ip": "" }]
			}))
		);
	}
}
