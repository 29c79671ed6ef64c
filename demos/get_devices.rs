//! Demonstrates listing and filtering the device inventory through the authenticated envelope.

// std
use std::env;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use dnac_client::{
	api::Api,
	config::{ConnectionParams, Scheme},
	http::RestClient,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let _token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/dna/system/api/v1/auth/token");
			// Unsigned token without `exp`; it is accepted but never reused from the shared cache.
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"Token\":\"eyJhbGciOiJub25lIn0.eyJ1c2VybmFtZSI6ImRldm5ldHVzZXIifQ.\"}");
		})
		.await;
	let devices_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/dna/intent/api/v1/network-device")
				.query_param("managementIpAddress", "10.10.20.81");
			then.status(200).header("content-type", "application/json").body(
				"{\"response\":[{\"hostname\":\"cat_9k_1\",\"managementIpAddress\":\"10.10.20.81\",\
				 \"platformId\":\"C9300-24U\"}],\"version\":\"1.0\"}",
			);
		})
		.await;
	let params = ConnectionParams::builder(server.host(), "devnetuser", "Cisco123!")
		.port(server.port())
		.scheme(Scheme::Http)
		.log_dir(env::temp_dir().join(format!("dnac_client_demo_{}", std::process::id())))
		.build()?;
	let client = RestClient::new(params)?;

	for device in Api::new(&client).devices().by_ip("10.10.20.81").await {
		println!(
			"{} ({})",
			device["hostname"].as_str().unwrap_or("<unnamed>"),
			device["platformId"].as_str().unwrap_or("<unknown platform>"),
		);
	}

	devices_mock.assert_async().await;

	Ok(())
}
