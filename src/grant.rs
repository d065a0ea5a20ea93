//! Check and one-time Grant orchestration over the upstream client and the grant store.
//!
//! Both operations hold a per-username guard for their whole sequence, so two requests for the
//! same user inside one process never interleave their check, fetch, write, and persist steps.
//! Ledger mutations additionally re-load the store under a process-wide persist guard right
//! before saving, which keeps concurrent grants for different users from overwriting each
//! other's records. The store is only written after the upstream `PUT` succeeded: a crash in
//! between leaves the user granted upstream without a local record (at most one re-grant),
//! never a local record without the upstream grant.

pub mod plan;

pub use plan::*;

// self
use crate::{
	_prelude::*,
	error::PolicyViolation,
	obs::{self, FlowOutcome, FlowSpan, OperationKind},
	store::{GrantLedger, GrantRecord, GrantStore},
	upstream::UpstreamClient,
};

/// Result of a Check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
	/// User the check was issued for.
	pub username: String,
	/// Whether the one-time grant is currently consumed.
	pub used: bool,
	/// Set when an upstream renewal just cleared the record.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub renewed: Option<bool>,
	/// Upstream failure that prevented verifying a renewal.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	/// Stored record while the grant stays consumed.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub record: Option<GrantRecord>,
}
impl CheckReport {
	fn unused(username: &str) -> Self {
		Self { username: username.into(), used: false, renewed: None, error: None, record: None }
	}
}

/// Successful Grant response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantReceipt {
	/// Always `true`.
	pub ok: bool,
	/// User the grant was applied to.
	pub username: String,
}

/// `Referer`/`Origin` header values carried by the inbound request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BrowserEvidence {
	/// `Referer` header value.
	pub referer: Option<String>,
	/// `Origin` header value.
	pub origin: Option<String>,
}
impl BrowserEvidence {
	/// Evidence consisting only of an `Origin` header.
	pub fn origin(origin: impl Into<String>) -> Self {
		Self { referer: None, origin: Some(origin.into()) }
	}

	/// Returns `true` if either header is present and non-empty.
	pub fn is_present(&self) -> bool {
		[&self.referer, &self.origin].into_iter().flatten().any(|value| !value.is_empty())
	}
}

/// Inbound Grant request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrantRequest {
	/// User to grant.
	pub username: String,
	/// Amounts to add.
	pub amount: GrantAmount,
	/// Browser-origin evidence.
	pub evidence: BrowserEvidence,
}

/// Orchestrates Check and Grant.
#[derive(Clone)]
pub struct GrantService {
	upstream: Arc<UpstreamClient>,
	store: Arc<dyn GrantStore>,
	clock: fn() -> OffsetDateTime,
	user_guards: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
	persist_guard: Arc<AsyncMutex<()>>,
}
impl GrantService {
	/// Creates a service over the provided upstream client and store.
	pub fn new(upstream: Arc<UpstreamClient>, store: Arc<dyn GrantStore>) -> Self {
		Self {
			upstream,
			store,
			clock: OffsetDateTime::now_utc,
			user_guards: Default::default(),
			persist_guard: Default::default(),
		}
	}

	/// Overrides the clock used to stamp and compute grants.
	pub fn with_clock(mut self, clock: fn() -> OffsetDateTime) -> Self {
		self.clock = clock;

		self
	}

	/// Reports whether the grant for `username` is consumed, clearing it on upstream renewal.
	///
	/// Upstream failures are folded into the report (`used: true` plus `error`); only a failed
	/// ledger save is returned as an error.
	pub async fn check(&self, username: &str) -> Result<CheckReport> {
		const KIND: OperationKind = OperationKind::Check;

		let span = FlowSpan::for_user(KIND, "check", username);

		obs::record_operation_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let guard = self.user_guard(username);
				let _user = guard.lock().await;
				let ledger = self.store.load().await;
				let Some(record) = ledger.get(username).cloned() else {
					return Ok(CheckReport::unused(username));
				};
				let current = match self.upstream.fetch_user(username).await {
					Ok(current) => current,
					Err(e) => {
						tracing::warn!(error = %e, "Could not verify renewal; reporting the grant as used.");

						return Ok(CheckReport {
							username: username.into(),
							used: true,
							renewed: None,
							error: Some(e.to_string()),
							record: None,
						});
					},
				};

				if is_renewed(&record, &current) {
					self.mutate_ledger(|ledger| {
						ledger.remove(username);
					})
					.await?;
					tracing::info!(
						data_limit = current.data_limit,
						expire = current.expire,
						"Upstream renewal detected; grant record cleared."
					);

					return Ok(CheckReport {
						username: username.into(),
						used: false,
						renewed: Some(true),
						error: None,
						record: None,
					});
				}

				Ok(CheckReport {
					username: username.into(),
					used: true,
					renewed: None,
					error: None,
					record: Some(record),
				})
			})
			.await;

		match &result {
			Ok(_) => obs::record_operation_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_operation_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Applies the one-time grant.
	///
	/// Rejects with [`PolicyViolation::MissingBrowserOrigin`] and then
	/// [`PolicyViolation::AlreadyUsed`] before any upstream call. Upstream failures abort the
	/// whole operation without touching the ledger.
	pub async fn grant(&self, request: GrantRequest) -> Result<GrantReceipt> {
		const KIND: OperationKind = OperationKind::Grant;

		let span = FlowSpan::for_user(KIND, "grant", &request.username);

		obs::record_operation_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				if !request.evidence.is_present() {
					return Err(PolicyViolation::MissingBrowserOrigin.into());
				}

				let username = request.username.as_str();
				let guard = self.user_guard(username);
				let _user = guard.lock().await;

				if self.store.load().await.is_used(username) {
					return Err(
						PolicyViolation::AlreadyUsed { username: request.username.clone() }.into()
					);
				}

				let current = self.upstream.fetch_user(username).await?;
				let now = (self.clock)().unix_timestamp();
				let plan = GrantPlan::compute(current, request.amount, now);

				self.upstream.update_user(username, &plan.updated).await?;

				let record = plan.record();

				self.mutate_ledger(|ledger| {
					ledger.insert(username, record);
				})
				.await
				.inspect_err(|e| {
					tracing::error!(error = %e, "Upstream was granted but the grant record could not be saved.");
				})?;
				tracing::info!(
					data_limit = plan.updated.data_limit,
					expire = plan.updated.expire,
					"Emergency grant applied."
				);

				Ok(GrantReceipt { ok: true, username: request.username.clone() })
			})
			.await;

		match &result {
			Ok(_) => obs::record_operation_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_operation_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn mutate_ledger<F>(&self, mutate: F) -> Result<()>
	where
		F: FnOnce(&mut GrantLedger),
	{
		let _persist = self.persist_guard.lock().await;
		let mut ledger = self.store.load().await;

		mutate(&mut ledger);
		self.store.save(&ledger).await?;

		Ok(())
	}

	fn user_guard(&self, username: &str) -> Arc<AsyncMutex<()>> {
		let mut guards = self.user_guards.lock();

		guards.entry(username.to_owned()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}
}
impl Debug for GrantService {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("GrantService").field("upstream", &self.upstream).finish()
	}
}
