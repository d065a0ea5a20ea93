//! Bearer credential issued by the upstream token endpoint.

// self
use crate::{_prelude::*, auth::TokenSecret, error::AuthError};

/// Bearer token plus the absolute instant it stops being accepted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
	/// Bearer token; callers must avoid logging it.
	pub token: TokenSecret,
	/// Expiry instant reported (or assumed) for the token.
	pub expires_at: OffsetDateTime,
}
impl Credential {
	/// Lifetime assumed when the token endpoint reports no expiry at all.
	pub const DEFAULT_LIFETIME: Duration = Duration::hours(1);

	/// Creates a credential from its parts.
	pub fn new(token: impl Into<String>, expires_at: OffsetDateTime) -> Self {
		Self { token: TokenSecret::new(token), expires_at }
	}

	/// Returns `true` if the token stays valid for more than `leeway` past `now`.
	///
	/// An expiry too close to the representable minimum to subtract `leeway` from is never fresh.
	pub fn is_fresh_at(&self, now: OffsetDateTime, leeway: Duration) -> bool {
		self.expires_at.checked_sub(leeway).is_some_and(|deadline| now < deadline)
	}

	/// Builds a credential from a raw token endpoint body.
	///
	/// `exp` is an absolute epoch second and wins over the relative `expires_in`; when neither is
	/// present the token is assumed to live for [`Credential::DEFAULT_LIFETIME`].
	pub fn from_token_response(
		body: &str,
		status: u16,
		now: OffsetDateTime,
	) -> Result<Self, AuthError> {
		let mut deserializer = serde_json::Deserializer::from_str(body);
		let response: TokenResponse = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| AuthError::MalformedResponse { source, status })?;
		let token = response
			.access_token
			.filter(|token| !token.is_empty())
			.ok_or(AuthError::MissingAccessToken)?;
		let expires_at = match (response.exp, response.expires_in) {
			(Some(exp), _) => OffsetDateTime::from_unix_timestamp(exp)
				.map_err(|_| AuthError::ExpiryOutOfRange)?,
			(None, Some(secs)) => now
				.checked_add(Duration::seconds(secs))
				.ok_or(AuthError::ExpiryOutOfRange)?,
			(None, None) =>
				now.checked_add(Self::DEFAULT_LIFETIME).ok_or(AuthError::ExpiryOutOfRange)?,
		};

		Ok(Self::new(token, expires_at))
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

#[derive(Deserialize)]
struct TokenResponse {
	access_token: Option<String>,
	exp: Option<i64>,
	expires_in: Option<i64>,
}
