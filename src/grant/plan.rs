//! Grant arithmetic: new quota values and the resulting ledger record.

// self
use crate::{
	_prelude::*,
	store::GrantRecord,
	upstream::{UpstreamUser, UserQuota},
};

/// Amounts added by a single emergency grant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantAmount {
	/// Bytes added to the data limit.
	pub add_bytes: u64,
	/// Seconds added to the expiry.
	pub add_seconds: u64,
}

/// Upstream values before and after a grant computed at a fixed instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GrantPlan {
	/// Values observed before the grant.
	pub current: UpstreamUser,
	/// Values to write upstream.
	pub updated: UserQuota,
	/// Epoch second the plan was computed at.
	pub now: i64,
}
impl GrantPlan {
	/// Computes the new limit and expiry.
	///
	/// An expiry already in the past (or unset) is extended from `now` rather than from the stale
	/// value. Arithmetic saturates at `i64::MAX`.
	pub fn compute(current: UpstreamUser, amount: GrantAmount, now: i64) -> Self {
		let data_limit = current.data_limit.saturating_add_unsigned(amount.add_bytes);
		let base = current.expire.max(now);
		let expire = base.saturating_add_unsigned(amount.add_seconds);

		Self { current, updated: UserQuota { data_limit, expire }, now }
	}

	/// Ledger record capturing the pre- and post-grant values.
	pub fn record(&self) -> GrantRecord {
		GrantRecord {
			used: true,
			granted_at: self.now,
			saved_data_limit: self.current.data_limit,
			saved_expire: self.current.expire,
			granted_data_limit: self.updated.data_limit,
			granted_expire: self.updated.expire,
		}
	}
}

/// Returns `true` if upstream values moved past what the grant left behind.
///
/// Either a larger data limit or a later expiry counts as an independent renewal. Each field is
/// compared against the larger of its `saved_*` and `granted_*` values, so the grant's own write
/// is never mistaken for a renewal.
pub fn is_renewed(record: &GrantRecord, current: &UpstreamUser) -> bool {
	let limit = record.saved_data_limit.max(record.granted_data_limit);
	let expire = record.saved_expire.max(record.granted_expire);

	current.data_limit > limit || current.expire > expire
}
