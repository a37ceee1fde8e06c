//! Optional observability helpers for launches, service calls, and administration.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `lti_provider.operation` with the
//!   `operation` and `stage` fields, plus warn/debug events for rejected launches and failed
//!   service calls.
//! - Enable `metrics` to increment the `lti_provider_operation_total` counter for every
//!   attempt/success/failure, labeled by `operation` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operation kinds observed by the tool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
	/// Inbound launch authentication.
	Launch,
	/// Outcomes service call.
	Outcomes,
	/// Memberships service call.
	Memberships,
	/// Tool setting service call.
	Setting,
	/// Consumer or share administration.
	Administration,
}
impl OperationKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationKind::Launch => "launch",
			OperationKind::Outcomes => "outcomes",
			OperationKind::Memberships => "memberships",
			OperationKind::Setting => "setting",
			OperationKind::Administration => "administration",
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
pub enum OperationOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Rejection or failure reported back to the caller.
	Failure,
}
impl OperationOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationOutcome::Attempt => "attempt",
			OperationOutcome::Success => "success",
			OperationOutcome::Failure => "failure",
		}
	}
}
impl Display for OperationOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
