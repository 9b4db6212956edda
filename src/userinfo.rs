//! Userinfo endpoint client.

// self
use crate::{
	_prelude::*,
	auth::Secret,
	error::UserInfoError,
	http::ReqwestHttpClient,
	obs::{self, FlowKind},
};

/// Profile returned by the userinfo endpoint. Other claims are ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
	/// Subject identifier.
	pub sub: String,
	/// Login name as the provider knows it.
	pub preferred_username: String,
	/// Display name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	/// Email address.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
}

/// Calls the userinfo endpoint with `access_token` as a bearer credential.
pub async fn fetch_user_info(
	http_client: &ReqwestHttpClient,
	url: &Url,
	access_token: &Secret,
) -> Result<UserInfo, UserInfoError> {
	obs::observe(FlowKind::UserInfo, "fetch_user_info", async {
		let response = http_client.get("userinfo", url, Some(access_token)).await?;

		if !response.is_success() {
			return Err(UserInfoError::Status { status_code: response.status });
		}

		let mut deserializer = serde_json::Deserializer::from_slice(&response.body);

		serde_path_to_error::deserialize(&mut deserializer).map_err(UserInfoError::Parse)
	})
	.await
}
