//! LTI message types and protocol versions understood by the tool.

// self
use crate::_prelude::*;

/// Error returned when a wire value is not part of a known vocabulary.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Unrecognized {vocabulary} value `{value}`.")]
pub struct UnknownValue {
	/// Vocabulary being parsed.
	pub vocabulary: &'static str,
	/// Offending value.
	pub value: String,
}

/// Inbound message types accepted by the launch authenticator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
	/// Regular resource-link launch.
	#[serde(rename = "basic-lti-launch-request")]
	BasicLaunch,
	/// Instructor configuration launch.
	#[serde(rename = "ConfigureLaunchRequest")]
	Configure,
	/// Dashboard launch for a resource link.
	#[serde(rename = "DashboardRequest")]
	Dashboard,
	/// Content-item selection (deep linking) request.
	#[serde(rename = "ContentItemSelectionRequest")]
	ContentItemSelection,
}
impl MessageType {
	/// Every supported message type.
	pub const ALL: [MessageType; 4] =
		[Self::BasicLaunch, Self::Configure, Self::Dashboard, Self::ContentItemSelection];

	/// Returns the `lti_message_type` wire value.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::BasicLaunch => "basic-lti-launch-request",
			Self::Configure => "ConfigureLaunchRequest",
			Self::Dashboard => "DashboardRequest",
			Self::ContentItemSelection => "ContentItemSelectionRequest",
		}
	}

	/// Returns `true` when the message must identify a resource link.
	pub const fn requires_resource_link(self) -> bool {
		matches!(self, Self::BasicLaunch | Self::Dashboard)
	}
}
impl Display for MessageType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for MessageType {
	type Err = UnknownValue;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|kind| kind.as_str() == s)
			.ok_or_else(|| UnknownValue { vocabulary: "lti_message_type", value: s.to_owned() })
	}
}

/// LTI protocol versions accepted in `lti_version`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LtiVersion {
	/// LTI 1.0 / 1.1 / 1.2 (`LTI-1p0`).
	#[default]
	#[serde(rename = "LTI-1p0")]
	V1,
	/// LTI 2.0 (`LTI-2p0`).
	#[serde(rename = "LTI-2p0")]
	V2,
}
impl LtiVersion {
	/// Returns the wire value.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::V1 => "LTI-1p0",
			Self::V2 => "LTI-2p0",
		}
	}
}
impl Display for LtiVersion {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for LtiVersion {
	type Err = UnknownValue;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"LTI-1p0" => Ok(Self::V1),
			"LTI-2p0" => Ok(Self::V2),
			_ => Err(UnknownValue { vocabulary: "lti_version", value: s.to_owned() }),
		}
	}
}
