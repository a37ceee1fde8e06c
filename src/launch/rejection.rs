//! Launch rejection reasons and the response shown to the user.

// self
use crate::_prelude::*;

/// Category of a rejected launch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectionKind {
	/// Message type, version, or a message-specific field is missing or invalid.
	Shape,
	/// Unknown consumer, bad signature, replayed nonce, or GUID mismatch.
	Identity,
	/// Consumer is disabled or outside its enable window.
	Availability,
	/// Value-domain checks or declared parameter constraints failed.
	Constraint,
	/// The sharing arrangement does not permit the launch.
	Sharing,
}
impl RejectionKind {
	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Shape => "shape",
			Self::Identity => "identity",
			Self::Availability => "availability",
			Self::Constraint => "constraint",
			Self::Sharing => "sharing",
		}
	}
}
impl Display for RejectionKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Why a launch was rejected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionReason {
	/// Category.
	pub kind: RejectionKind,
	/// Human-readable reason.
	pub message: String,
	/// Diagnostics surfaced only in debug mode.
	pub details: Vec<String>,
}
impl RejectionReason {
	/// Creates a reason without diagnostics.
	pub fn new(kind: RejectionKind, message: impl Into<String>) -> Self {
		Self { kind, message: message.into(), details: Vec::new() }
	}

	/// Appends a diagnostic line.
	pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
		self.details.push(detail.into());

		self
	}

	/// Reason text, with diagnostics appended when `debug` is set.
	pub fn describe(&self, debug: bool) -> String {
		if debug && !self.details.is_empty() {
			format!("{} [{}]", self.message, self.details.join("; "))
		} else {
			self.message.clone()
		}
	}
}
impl Display for RejectionReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{} rejection: {}", self.kind, self.message)
	}
}

/// What the host should send back for a rejected launch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorResponse {
	/// Redirect the browser to the platform's return URL.
	Redirect(Url),
	/// Render the message in place.
	Inline(String),
}

/// A rejected launch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchRejection {
	/// Why the launch was rejected.
	pub reason: RejectionReason,
	/// Debug mode was in effect for the launch.
	pub debug: bool,
	/// Where the platform asked errors to be reported.
	pub return_url: Option<Url>,
	/// Message configured for users.
	pub user_message: String,
}
impl LaunchRejection {
	/// Builds the response for the host to send.
	///
	/// With a return URL the browser is redirected there with `lti_errormsg` (and, outside
	/// debug mode, the internal reason as `lti_errorlog`); otherwise the text is rendered
	/// inline.
	pub fn response(&self) -> ErrorResponse {
		let reason = format!("Debug error: {}", self.reason.describe(self.debug));

		match &self.return_url {
			Some(url) => {
				let mut url = url.clone();

				{
					let mut query = url.query_pairs_mut();

					if self.debug {
						query.append_pair("lti_errormsg", &reason);
					} else {
						query.append_pair("lti_errormsg", &self.user_message);
						query.append_pair("lti_errorlog", &reason);
					}
				}

				ErrorResponse::Redirect(url)
			},
			None if self.debug => ErrorResponse::Inline(reason),
			None => ErrorResponse::Inline(format!("Error: {}", self.user_message)),
		}
	}
}
