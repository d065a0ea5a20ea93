// crates.io
use tracing::{Instrument, instrument::Instrumented};
// self
use crate::{_prelude::*, obs::OperationKind};

/// A span builder used by service operations.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided operation + stage.
	pub fn new(kind: OperationKind, stage: &'static str) -> Self {
		let span = tracing::info_span!("emergency_grant.operation", operation = kind.as_str(), stage);

		Self { span }
	}

	/// Creates a span that also records the user the operation targets.
	pub fn for_user(kind: OperationKind, stage: &'static str, username: &str) -> Self {
		let span = tracing::info_span!(
			"emergency_grant.operation",
			operation = kind.as_str(),
			stage,
			username
		);

		Self { span }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}
}
