mod common;

// crates.io
use httpmock::prelude::*;
// self
use oidc_relying_party::{
	auth::Secret,
	error::{DiscoveryCause, Error, FlowError, TransportError, UserInfoError},
	flows::CallbackParams,
	provider::{self, RequestMethod},
	url::Url,
	userinfo,
};

#[tokio::test]
async fn slow_discovery_times_out() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path(common::DISCOVERY_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body(common::discovery_document(&server).to_string())
				.delay(common::SLOW_RESPONSE);
		})
		.await;

	let err =
		provider::discover(&common::impatient_http_client(), &common::discovery_url(&server))
			.await
			.expect_err("A slow provider must time out.");

	assert!(matches!(err.cause, DiscoveryCause::Transport(TransportError::Timeout { .. })));
}

#[tokio::test]
async fn slow_userinfo_times_out() {
	let server = MockServer::start_async().await;
	let path = "/realms/demo/protocol/openid-connect/userinfo";

	server
		.mock_async(|when, then| {
			when.method(GET).path(path);
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"sub":"user-42","preferred_username":"alice"}"#)
				.delay(common::SLOW_RESPONSE);
		})
		.await;

	let endpoint = Url::parse(&server.url(path)).expect("Userinfo URL should parse.");
	let err = userinfo::fetch_user_info(
		&common::impatient_http_client(),
		&endpoint,
		&Secret::new("access-it"),
	)
	.await
	.expect_err("A slow userinfo endpoint must time out.");

	assert!(matches!(err, UserInfoError::Transport(TransportError::Timeout { .. })));
}

#[tokio::test]
async fn slow_token_endpoint_times_out() {
	let server = MockServer::start_async().await;
	let settings = common::settings(&server, RequestMethod::Post);
	let metadata = common::metadata(&server);
	let (driver, store) = common::driver_with(common::impatient_http_client());
	let redirect = driver.initiate(&settings).await.expect("Initiate should succeed.");
	let nonce = common::query_value(&redirect.authorize_url, "nonce");
	let body = common::token_response(&common::id_token(&metadata.issuer, &nonce));

	server
		.mock_async(|when, then| {
			when.method(POST).path("/realms/demo/protocol/openid-connect/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(body)
				.delay(common::SLOW_RESPONSE);
		})
		.await;

	let params = CallbackParams {
		code: Some("code-it".into()),
		state: Some(redirect.state.clone()),
		..Default::default()
	};
	let err = driver
		.handle_callback(params, &settings, &metadata)
		.await
		.expect_err("A slow token endpoint must time out.");

	assert!(matches!(
		err,
		Error::Flow(FlowError::Transport(TransportError::Timeout { endpoint: "token" }))
	));
	assert!(store.is_empty());
}
