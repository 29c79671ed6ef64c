//! Token acquisition against a mock controller: cache sharing, expiry, and failures.

mod common;

// crates.io
use httpmock::prelude::*;
use time::Duration;
// self
use common::*;
use dnac_client::{
	error::{Error, ErrorKind},
	http::build_http_client,
	token::TokenManager,
};

fn manager(params: &dnac_client::config::ConnectionParams) -> TokenManager {
	let http_client = build_http_client(params).expect("HTTP client should build.");

	TokenManager::new(params.clone(), http_client).expect("Token manager should build.")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn independent_managers_share_one_token() {
	let server = MockServer::start_async().await;
	let jwt = jwt_expiring_in(Duration::hours(1));
	let token_mock = mock_token_endpoint(&server, &jwt).await;
	let log_dir = temp_log_dir("shared");
	let params = params_for(&server, &log_dir);
	let handles = (0..5)
		.map(|_| {
			let manager = manager(&params);

			tokio::spawn(async move { manager.get_token().await })
		})
		.collect::<Vec<_>>();

	for handle in handles {
		let token = handle
			.await
			.expect("Token task should not panic.")
			.expect("Every manager should obtain a token.");

		assert_eq!(token.expose(), jwt);
	}

	token_mock.assert_calls_async(1).await;

	let cached = cached_token(&params).await.expect("Shared cache should hold the token.");

	assert_eq!(cached.expose(), jwt);
}

#[tokio::test]
async fn cached_token_from_another_process_is_reused() {
	let server = MockServer::start_async().await;
	let token_mock = mock_token_endpoint(&server, &jwt_expiring_in(Duration::hours(1))).await;
	let log_dir = temp_log_dir("reuse");
	let params = params_for(&server, &log_dir);
	let seeded = jwt_expiring_in(Duration::minutes(30));

	seed_cache(&params, &seeded).await;

	let manager = manager(&params);
	let token = manager.get_token().await.expect("Seeded token should be returned.");

	assert_eq!(token.expose(), seeded);
	assert_eq!(manager.metrics().cache_hits(), 1);
	assert_eq!(manager.metrics().network_authentications(), 0);

	token_mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn token_inside_expiry_margin_is_replaced() {
	let server = MockServer::start_async().await;
	let fresh = jwt_expiring_in(Duration::hours(1));
	let token_mock = mock_token_endpoint(&server, &fresh).await;
	let log_dir = temp_log_dir("margin");
	let params = params_for(&server, &log_dir);

	seed_cache(&params, &jwt_expiring_in(Duration::minutes(4))).await;

	let manager = manager(&params);
	let token = manager.get_token().await.expect("A fresh token should be issued.");

	assert_eq!(token.expose(), fresh);
	assert_eq!(manager.metrics().network_authentications(), 1);
	assert_eq!(
		cached_token(&params).await.expect("Fresh token should be cached.").expose(),
		fresh
	);

	token_mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn rejected_credentials_surface_as_authentication_error() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(401)
				.header("content-type", "application/json")
				.body(r#"{"error":"Authentication has failed. Please provide valid credentials."}"#);
		})
		.await;
	let log_dir = temp_log_dir("rejected");
	let params = params_for(&server, &log_dir);
	let manager = manager(&params);
	let err = manager.get_token().await.expect_err("Rejected credentials should fail.");

	assert!(matches!(err, Error::Authentication { status: 401, .. }));
	assert_eq!(err.kind(), ErrorKind::Authentication);
	assert_eq!(manager.metrics().failures(), 1);
	assert!(cached_token(&params).await.is_none());

	token_mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn malformed_token_body_is_reported() {
	let server = MockServer::start_async().await;
	let _token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).header("content-type", "application/json").body(r#"{"token":"x"}"#);
		})
		.await;
	let log_dir = temp_log_dir("malformed");
	let manager = manager(&params_for(&server, &log_dir));
	let err = manager.get_token().await.expect_err("A body without `Token` should fail.");

	assert!(matches!(err, Error::TokenResponse { .. }));
}

#[tokio::test]
async fn ping_authenticates_without_touching_the_cache() {
	let server = MockServer::start_async().await;
	let token_mock = mock_token_endpoint(&server, &jwt_expiring_in(Duration::hours(1))).await;
	let log_dir = temp_log_dir("ping");
	let params = params_for(&server, &log_dir);
	let manager = manager(&params);

	manager.ping().await.expect("Ping should authenticate.");

	assert!(cached_token(&params).await.is_none());

	token_mock.assert_calls_async(1).await;
}
