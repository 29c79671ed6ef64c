//! Demonstrates two independent clients sharing one cached controller token through the
//! file-backed cache and process lock.

// std
use std::env;
// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use color_eyre::Result;
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime};
// self
use dnac_client::{
	config::{ConnectionParams, Scheme},
	http::RestClient,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let exp = (OffsetDateTime::now_utc() + Duration::hours(1)).unix_timestamp();
	let jwt = format!(
		"{}.{}.c2lnbmF0dXJl",
		URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#),
		URL_SAFE_NO_PAD.encode(format!(r#"{{"username":"devnetuser","exp":{exp}}}"#)),
	);
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/dna/system/api/v1/auth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(format!("{{\"Token\":\"{jwt}\"}}"));
		})
		.await;
	let log_dir = env::temp_dir().join(format!("dnac_client_demo_{}", std::process::id()));
	let params = ConnectionParams::builder(server.host(), "devnetuser", "Cisco123!")
		.port(server.port())
		.scheme(Scheme::Http)
		.log_dir(&log_dir)
		.build()?;
	let first = RestClient::new(params.clone())?;
	let second = RestClient::new(params)?;
	let token = first.token_manager().get_token().await?;
	let reused = second.token_manager().get_token().await?;

	assert_eq!(token.expose(), reused.expose());

	if let Some(expires_at) = token.claims()?.expires_at() {
		println!("Shared token expires at {expires_at}.");
	}

	println!(
		"Second client reused the cache: {} hit(s), {} authentication(s).",
		second.token_manager().metrics().cache_hits(),
		second.token_manager().metrics().network_authentications(),
	);

	token_mock.assert_async().await;

	Ok(())
}
