//! Bearer token wrapper and expiry evaluation.

pub mod claims;
pub mod secret;

// self
use crate::{
	_prelude::*,
	auth::{JwtError, Secret, TokenClaims},
};

/// Tokens expiring sooner than this are treated as already expired so a request never starts
/// with a token that lapses mid-flight.
pub const EXPIRY_MARGIN: Duration = Duration::minutes(5);

/// Usability of a cached token at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token stays valid beyond the safety margin.
	Active,
	/// Token expires within the safety margin or already has.
	Expired,
	/// Payload decodes but carries no usable `exp` claim.
	MissingExpiry,
	/// Token is not a decodable JWT.
	Undecodable,
}
impl TokenStatus {
	/// Returns `true` only for [`TokenStatus::Active`].
	pub fn is_usable(self) -> bool {
		matches!(self, Self::Active)
	}
}

/// Opaque controller-issued bearer token (structurally a JWT).
///
/// Tokens are never mutated; the cache replaces or deletes them.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BearerToken(Secret);
impl BearerToken {
	/// Wraps a raw token string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(Secret::new(value))
	}

	/// Returns the raw token. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		self.0.expose()
	}

	/// Returns `true` when the token string is empty.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Decodes the token's claims without verifying the signature.
	pub fn claims(&self) -> Result<TokenClaims, JwtError> {
		TokenClaims::decode(self.expose())
	}

	/// Evaluates the token against `now` using the provided safety margin.
	///
	/// The token is usable only while `exp >= now + margin`; an absent or unparsable `exp`
	/// never counts as usable.
	pub fn status_at(&self, now: OffsetDateTime, margin: Duration) -> TokenStatus {
		let Ok(claims) = self.claims() else {
			return TokenStatus::Undecodable;
		};
		let Some(expires_at) = claims.expires_at() else {
			return TokenStatus::MissingExpiry;
		};

		if expires_at < now + margin { TokenStatus::Expired } else { TokenStatus::Active }
	}

	/// Evaluates the token against the current clock and [`EXPIRY_MARGIN`].
	pub fn status(&self) -> TokenStatus {
		self.status_at(OffsetDateTime::now_utc(), EXPIRY_MARGIN)
	}

	/// Returns `true` if the token must not be reused at the provided instant.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		!self.status_at(now, EXPIRY_MARGIN).is_usable()
	}
}
impl Debug for BearerToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("BearerToken").field(&"<redacted>").finish()
	}
}
