//! JWT payload decoding without signature verification.
//!
//! The controller signs its tokens with a key the client never sees, so the client only reads
//! the payload segment to learn when the token expires.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::_prelude::*;

/// Errors raised while decoding a JWT payload.
#[derive(Debug, ThisError)]
pub enum JwtError {
	/// Token does not have the `header.payload.signature` shape.
	#[error("Token has {segments} dot-separated segments; expected 3.")]
	Malformed {
		/// Number of segments found.
		segments: usize,
	},
	/// Payload segment is not valid base64url.
	#[error("Token payload is not valid base64url.")]
	Base64(#[from] base64::DecodeError),
	/// Payload segment is not a JSON object.
	#[error("Token payload is not a JSON object.")]
	Json(#[from] serde_json::Error),
}

/// Claims carried by a controller-issued token.
///
/// Only `exp` drives client behavior; the remaining fields are kept for diagnostics.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
	/// Subject (user object identifier).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sub: Option<String>,
	/// Login name the token was issued to.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub username: Option<String>,
	/// Tenant name reported by the controller.
	#[serde(default, rename = "tenantName", skip_serializing_if = "Option::is_none")]
	pub tenant_name: Option<String>,
	/// Raw `exp` claim; kept untyped so a malformed value reads as "no expiry".
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub exp: Option<Value>,
	/// Every other claim.
	#[serde(flatten)]
	pub extra: BTreeMap<String, Value>,
}
impl TokenClaims {
	/// Decodes the payload segment of a JWT.
	pub fn decode(token: &str) -> Result<Self, JwtError> {
		let segments: Vec<&str> = token.split('.').collect();

		if segments.len() != 3 {
			return Err(JwtError::Malformed { segments: segments.len() });
		}

		let payload = URL_SAFE_NO_PAD.decode(segments[1].trim_end_matches('='))?;

		Ok(serde_json::from_slice(&payload)?)
	}

	/// Returns the expiry instant, or `None` when `exp` is absent or not a Unix timestamp.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		let exp = self.exp.as_ref()?;
		let seconds = exp.as_i64().or_else(|| exp.as_f64().map(|value| value.trunc() as i64))?;

		OffsetDateTime::from_unix_timestamp(seconds).ok()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn encode(payload: &str) -> String {
		format!(
			"{}.{}.signature",
			URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#),
			URL_SAFE_NO_PAD.encode(payload)
		)
	}

	#[test]
	fn decodes_controller_payload() {
		let token = encode(
			r#"{"sub":"5ce712b08ee66202fa2eb8f8","authSource":"internal","tenantName":"TNT0","exp":1575109548,"username":"devnetuser"}"#,
		);
		let claims = TokenClaims::decode(&token).expect("Controller payload should decode.");

		assert_eq!(claims.username.as_deref(), Some("devnetuser"));
		assert_eq!(claims.tenant_name.as_deref(), Some("TNT0"));
		assert_eq!(claims.extra.get("authSource"), Some(&Value::from("internal")));
		assert_eq!(
			claims.expires_at().map(OffsetDateTime::unix_timestamp),
			Some(1_575_109_548)
		);
	}

	#[test]
	fn padded_payload_is_accepted() {
		let padded = format!("header.{}==.sig", URL_SAFE_NO_PAD.encode(r#"{"exp":1}"#));
		let claims = TokenClaims::decode(&padded).expect("Padded payload should decode.");

		assert_eq!(claims.expires_at().map(OffsetDateTime::unix_timestamp), Some(1));
	}

	#[test]
	fn malformed_tokens_are_rejected() {
		assert!(matches!(
			TokenClaims::decode("not-a-jwt"),
			Err(JwtError::Malformed { segments: 1 })
		));
		assert!(matches!(TokenClaims::decode("a.!!!.c"), Err(JwtError::Base64(_))));
		assert!(matches!(
			TokenClaims::decode(&format!("a.{}.c", URL_SAFE_NO_PAD.encode("[1,2]"))),
			Err(JwtError::Json(_))
		));
	}

	#[test]
	fn non_numeric_exp_has_no_expiry() {
		let claims = TokenClaims::decode(&encode(r#"{"exp":"tomorrow"}"#))
			.expect("String exp should still decode.");

		assert_eq!(claims.expires_at(), None);
		assert_eq!(TokenClaims::default().expires_at(), None);
	}
}
