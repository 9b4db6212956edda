//! ID token claim checks.
//!
//! Tokens are decoded with `jsonwebtoken` but their signature is not verified: the relying
//! party only accepts ID tokens received directly from the token endpoint over TLS, so the
//! checks here cover issuer, audience, authorized party, expiry, and nonce.

// crates.io
use jsonwebtoken::{DecodingKey, Validation};
use serde::Deserializer;
// self
use crate::{_prelude::*, error::IdTokenValidationError, provider::ProviderMetadata};

/// Clock skew tolerated when checking `exp`.
pub const DEFAULT_LEEWAY: Duration = Duration::seconds(60);

/// Claims the relying party reads from an ID token. Other claims are ignored.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct IdTokenClaims {
	/// Issuer.
	pub iss: String,
	/// Audience; a single string on the wire is accepted as a one-element list.
	#[serde(default, deserialize_with = "one_or_many")]
	pub aud: Vec<String>,
	/// Subject identifier.
	#[serde(default)]
	pub sub: Option<String>,
	/// Expiry as Unix seconds.
	#[serde(default)]
	pub exp: Option<i64>,
	/// Issue time as Unix seconds.
	#[serde(default)]
	pub iat: Option<i64>,
	/// Nonce echoed from the authorization request.
	#[serde(default)]
	pub nonce: Option<String>,
	/// Authorized party.
	#[serde(default)]
	pub azp: Option<String>,
}

/// Validates ID tokens for one issuer and client.
#[derive(Clone, Debug)]
pub struct IdTokenValidator {
	issuer: String,
	client_id: String,
	leeway: Duration,
	expected_nonce: Option<String>,
}
impl IdTokenValidator {
	/// Creates a validator with the default leeway and no nonce expectation.
	pub fn new(issuer: impl Into<String>, client_id: impl Into<String>) -> Self {
		Self {
			issuer: issuer.into(),
			client_id: client_id.into(),
			leeway: DEFAULT_LEEWAY,
			expected_nonce: None,
		}
	}

	/// Overrides the expiry leeway.
	pub fn leeway(mut self, leeway: Duration) -> Self {
		self.leeway = leeway;

		self
	}

	/// Requires the token's `nonce` claim to equal `nonce`.
	pub fn expected_nonce(mut self, nonce: impl Into<String>) -> Self {
		self.expected_nonce = Some(nonce.into());

		self
	}

	/// Validates `token` against the current time.
	pub fn validate(&self, token: &str) -> Result<IdTokenClaims, IdTokenValidationError> {
		self.validate_at(token, OffsetDateTime::now_utc())
	}

	/// Validates `token` as if the current time were `now`.
	pub fn validate_at(
		&self,
		token: &str,
		now: OffsetDateTime,
	) -> Result<IdTokenClaims, IdTokenValidationError> {
		let claims = decode_claims(token)?;

		if claims.iss != self.issuer {
			return Err(IdTokenValidationError::IssuerMismatch {
				expected: self.issuer.clone(),
				actual: claims.iss,
			});
		}
		if !claims.aud.iter().any(|aud| aud == &self.client_id) {
			return Err(IdTokenValidationError::AudienceMismatch {
				client_id: self.client_id.clone(),
				audience: claims.aud,
			});
		}

		let azp_ok = match claims.azp.as_deref() {
			Some(azp) => azp == self.client_id,
			None => claims.aud.len() <= 1,
		};

		if !azp_ok {
			return Err(IdTokenValidationError::AuthorizedPartyMismatch {
				client_id: self.client_id.clone(),
				azp: claims.azp,
			});
		}

		let exp = claims.exp.ok_or(IdTokenValidationError::MissingExpiry)?;

		if now.unix_timestamp() >= exp.saturating_add(self.leeway.whole_seconds()) {
			return Err(IdTokenValidationError::Expired {
				expired_at: OffsetDateTime::from_unix_timestamp(exp)
					.unwrap_or(OffsetDateTime::UNIX_EPOCH),
			});
		}

		if self
			.expected_nonce
			.as_deref()
			.is_some_and(|expected| claims.nonce.as_deref() != Some(expected))
		{
			return Err(IdTokenValidationError::NonceMismatch);
		}

		Ok(claims)
	}
}

/// Validates `id_token` against the discovered issuer and the configured client id.
pub fn validate(
	id_token: &str,
	metadata: &ProviderMetadata,
	client_id: &str,
) -> Result<IdTokenClaims, IdTokenValidationError> {
	IdTokenValidator::new(&metadata.issuer, client_id).validate(id_token)
}

fn decode_claims(token: &str) -> Result<IdTokenClaims, IdTokenValidationError> {
	let mut validation = Validation::default();

	validation.insecure_disable_signature_validation();
	validation.validate_exp = false;
	validation.validate_nbf = false;
	validation.validate_aud = false;
	validation.required_spec_claims.clear();

	jsonwebtoken::decode::<IdTokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
		.map(|data| data.claims)
		.map_err(IdTokenValidationError::Malformed)
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum OneOrMany {
		One(String),
		Many(Vec<String>),
	}

	Ok(match OneOrMany::deserialize(deserializer)? {
		OneOrMany::One(aud) => vec![aud],
		OneOrMany::Many(aud) => aud,
	})
}

#[cfg(test)]
mod tests {
	// crates.io
	use jsonwebtoken::{EncodingKey, Header};
	use serde_json::{Value, json};
	// self
	use super::*;
	use crate::error::IdTokenErrorKind;

	const ISSUER: &str = "https://idp.example/realms/demo";
	const CLIENT_ID: &str = "relying-party";

	fn sign(claims: Value) -> String {
		jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(b"unused"))
			.expect("Test token should encode.")
	}

	fn now() -> OffsetDateTime {
		OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("Fixed instant should be valid.")
	}

	fn claims() -> Value {
		json!({
			"iss": ISSUER,
			"aud": CLIENT_ID,
			"sub": "user-1",
			"exp": 1_700_000_300,
			"iat": 1_700_000_000,
			"nonce": "n-123",
			"auth_time": 1_700_000_000,
		})
	}

	fn kind_of(token: &str) -> IdTokenErrorKind {
		IdTokenValidator::new(ISSUER, CLIENT_ID)
			.validate_at(token, now())
			.expect_err("Token should be rejected.")
			.kind()
	}

	#[test]
	fn matching_claims_validate() {
		let claims = IdTokenValidator::new(ISSUER, CLIENT_ID)
			.expected_nonce("n-123")
			.validate_at(&sign(claims()), now())
			.expect("Token should validate.");

		assert_eq!(claims.sub.as_deref(), Some("user-1"));
		assert_eq!(claims.aud, [CLIENT_ID]);
	}

	#[test]
	fn issuer_must_match_discovery() {
		let mut evil = claims();

		evil["iss"] = json!("https://evil.example");

		assert_eq!(kind_of(&sign(evil)), IdTokenErrorKind::IssuerMismatch);
	}

	#[test]
	fn audience_must_contain_client_id() {
		let mut other = claims();

		other["aud"] = json!(["someone-else"]);

		assert_eq!(kind_of(&sign(other)), IdTokenErrorKind::AudienceMismatch);
	}

	#[test]
	fn multi_audience_tokens_need_matching_azp() {
		let mut multi = claims();

		multi["aud"] = json!([CLIENT_ID, "account"]);

		assert_eq!(kind_of(&sign(multi.clone())), IdTokenErrorKind::AuthorizedPartyMismatch);

		multi["azp"] = json!(CLIENT_ID);

		assert!(IdTokenValidator::new(ISSUER, CLIENT_ID).validate_at(&sign(multi), now()).is_ok());
	}

	#[test]
	fn expiry_is_required_and_honors_leeway() {
		let mut missing = claims();

		missing.as_object_mut().expect("Claims are an object.").remove("exp");

		assert_eq!(kind_of(&sign(missing)), IdTokenErrorKind::MissingExpiry);

		let mut recent = claims();

		recent["exp"] = json!(1_700_000_000 - 30);

		assert!(IdTokenValidator::new(ISSUER, CLIENT_ID).validate_at(&sign(recent), now()).is_ok());

		let mut stale = claims();

		stale["exp"] = json!(1_700_000_000 - 61);

		assert_eq!(kind_of(&sign(stale)), IdTokenErrorKind::Expired);
	}

	#[test]
	fn nonce_must_match_when_expected() {
		let err = IdTokenValidator::new(ISSUER, CLIENT_ID)
			.expected_nonce("other")
			.validate_at(&sign(claims()), now())
			.expect_err("Nonce mismatch should be rejected.");

		assert_eq!(err.kind(), IdTokenErrorKind::NonceMismatch);
	}

	#[test]
	fn garbage_is_malformed() {
		assert_eq!(kind_of("not-a-jwt"), IdTokenErrorKind::Malformed);
	}

	#[test]
	fn unsigned_tokens_pass_claim_validation() {
		let token = sign(claims());
		let (unsigned, _) = token.rsplit_once('.').expect("JWT has a signature segment.");
		let tampered = format!("{unsigned}.AAAA");

		assert!(
			IdTokenValidator::new(ISSUER, CLIENT_ID).validate_at(&tampered, now()).is_ok(),
			"Signatures are not checked for tokens received from the token endpoint."
		);
	}
}
