//! Bearer token cache with a singleflight refresh section.
//!
//! [`CredentialCache::token`] returns the cached token without any I/O while it stays fresh for
//! more than the leeway window. Otherwise the caller enters the refresh section, re-checks the
//! cached credential (another caller may have refreshed it while this one waited), and only then
//! calls the [`Authenticator`]. At most one authentication call is in flight per cache; every
//! other caller waits on the section and reuses the published credential.

// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSecret},
	error::AuthError,
	obs::{self, FlowOutcome, FlowSpan, OperationKind},
};

/// Boxed future returned by [`Authenticator::authenticate`].
pub type AuthFuture<'a> = Pin<Box<dyn Future<Output = Result<Credential, AuthError>> + 'a + Send>>;

/// Obtains a new bearer credential from the upstream token endpoint.
///
/// Implementations perform exactly one authentication call per invocation and never retry;
/// retry policy belongs to the upstream client.
pub trait Authenticator
where
	Self: Send + Sync,
{
	/// Performs a single authentication call.
	fn authenticate(&self) -> AuthFuture<'_>;
}

/// Shared cache holding the admin bearer credential.
pub struct CredentialCache {
	authenticator: Arc<dyn Authenticator>,
	current: RwLock<Option<Credential>>,
	refresh_guard: AsyncMutex<()>,
	leeway: Duration,
	clock: fn() -> OffsetDateTime,
}
impl CredentialCache {
	/// Minimum remaining lifetime for a cached token to be handed out.
	pub const DEFAULT_LEEWAY: Duration = Duration::seconds(10);

	/// Creates an empty cache backed by the provided authenticator.
	pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
		Self {
			authenticator,
			current: RwLock::new(None),
			refresh_guard: AsyncMutex::new(()),
			leeway: Self::DEFAULT_LEEWAY,
			clock: OffsetDateTime::now_utc,
		}
	}

	/// Overrides the freshness leeway (negative values clamp to zero).
	pub fn with_leeway(mut self, leeway: Duration) -> Self {
		self.leeway = if leeway.is_negative() { Duration::ZERO } else { leeway };

		self
	}

	/// Overrides the clock used for freshness checks.
	pub fn with_clock(mut self, clock: fn() -> OffsetDateTime) -> Self {
		self.clock = clock;

		self
	}

	/// Returns a token that stays valid for at least the leeway window, refreshing if needed.
	pub async fn token(&self) -> Result<TokenSecret, AuthError> {
		if let Some(token) = self.fresh_token() {
			return Ok(token);
		}

		let _singleflight = self.refresh_guard.lock().await;

		if let Some(token) = self.fresh_token() {
			return Ok(token);
		}

		const KIND: OperationKind = OperationKind::TokenRefresh;

		let span = FlowSpan::new(KIND, "authenticate");

		obs::record_operation_outcome(KIND, FlowOutcome::Attempt);

		match span.instrument(self.authenticator.authenticate()).await {
			Ok(credential) => {
				let token = credential.token.clone();

				tracing::debug!(expires_at = %credential.expires_at, "Published refreshed admin credential.");
				*self.current.write() = Some(credential);
				obs::record_operation_outcome(KIND, FlowOutcome::Success);

				Ok(token)
			},
			Err(e) => {
				tracing::warn!(error = %e, "Admin authentication failed.");
				obs::record_operation_outcome(KIND, FlowOutcome::Failure);

				Err(e)
			},
		}
	}

	/// Clears the cached expiry so the next [`token`](Self::token) call refreshes.
	///
	/// Only takes effect while `stale` is still the cached token; a caller that observed a 401
	/// after another caller already refreshed leaves the newer credential alone. Returns `true`
	/// when the cached credential was invalidated.
	pub fn invalidate(&self, stale: &TokenSecret) -> bool {
		let mut current = self.current.write();

		match current.as_mut() {
			Some(credential) if &credential.token == stale => {
				credential.expires_at = OffsetDateTime::UNIX_EPOCH;

				true
			},
			_ => false,
		}
	}

	/// Returns a snapshot of the cached credential, if any.
	pub fn snapshot(&self) -> Option<Credential> {
		self.current.read().clone()
	}

	fn fresh_token(&self) -> Option<TokenSecret> {
		let now = (self.clock)();

		self.current
			.read()
			.as_ref()
			.filter(|credential| credential.is_fresh_at(now, self.leeway))
			.map(|credential| credential.token.clone())
	}
}
impl Debug for CredentialCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialCache")
			.field("current", &*self.current.read())
			.field("leeway", &self.leeway)
			.finish()
	}
}
