//! Observability helpers: operation spans, outcome counters, and subscriber setup.
//!
//! # Feature Flags
//!
//! - Spans named `emergency_grant.operation` carry the `operation` (check/grant/token refresh) and
//!   `stage` (call site) fields.
//! - Enable `metrics` to increment the `emergency_grant_operation_total` counter for every
//!   attempt/success/failure, labeled by `operation` + `outcome`.

mod logging;
mod metrics;
mod tracing;

pub use self::{logging::*, metrics::*, tracing::*};

// self
use crate::_prelude::*;

/// Operations observed by the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
	/// Read-only grant status query.
	Check,
	/// One-time emergency grant.
	Grant,
	/// Admin bearer token refresh.
	TokenRefresh,
}
impl OperationKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationKind::Check => "check",
			OperationKind::Grant => "grant",
			OperationKind::TokenRefresh => "token_refresh",
		}
	}
}
impl Display for OperationKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
