//! Tool configuration: launch policy, verification knobs, and declared parameter constraints.

pub mod builder;

pub use builder::*;

// std
use std::{fs, path::Path};
// self
use crate::{
	_prelude::*,
	auth::NONCE_LIFETIME,
	error::ConfigError,
	model::MessageType,
	oauth::VerifyPolicy,
};

/// User-facing message shown when a launch is rejected.
pub const DEFAULT_ERROR_MESSAGE: &str =
	"Sorry, there was an error connecting you to the application.";

/// Declared requirement on one launch parameter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterConstraint {
	/// Parameter name.
	pub name: String,
	/// Parameter must be present and non-blank.
	#[serde(default)]
	pub required: bool,
	/// Upper bound on the value length in characters.
	#[serde(default)]
	pub max_length: Option<usize>,
	/// Message types the constraint applies to; empty means all.
	#[serde(default)]
	pub message_types: Vec<MessageType>,
}
impl ParameterConstraint {
	/// Creates a constraint applying to every message type.
	pub fn new(name: impl Into<String>, required: bool, max_length: Option<usize>) -> Self {
		Self { name: name.into(), required, max_length, message_types: Vec::new() }
	}

	/// Limits the constraint to the given message types.
	pub fn for_message_types(mut self, types: impl IntoIterator<Item = MessageType>) -> Self {
		self.message_types = types.into_iter().collect();

		self
	}

	/// Returns `true` when the constraint applies to `kind`.
	pub fn applies_to(&self, kind: MessageType) -> bool {
		self.message_types.is_empty() || self.message_types.contains(&kind)
	}

	/// Returns `true` when `value` satisfies the constraint.
	pub fn is_satisfied_by(&self, value: Option<&str>) -> bool {
		let value = value.map(str::trim).filter(|v| !v.is_empty());

		match value {
			None => !self.required,
			Some(value) => self.max_length.is_none_or(|max| value.chars().count() <= max),
		}
	}
}

/// Validated tool configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ToolConfigBuilder", into = "ToolConfigBuilder")]
pub struct ToolConfig {
	/// Surface internal rejection reasons to the platform and user.
	pub debug_mode: bool,
	/// Let a launch turn on debug mode with `custom_debug=true`.
	pub honour_custom_debug: bool,
	/// Accept `custom_share_key` launches.
	pub allow_sharing: bool,
	/// Email (or `@domain`) used when the launch omits one.
	pub default_email: Option<String>,
	/// Message shown to users when a launch is rejected.
	pub error_message: String,
	/// How long a consumed nonce blocks replays.
	pub nonce_lifetime: Duration,
	/// Signature methods and timestamp tolerance for inbound verification.
	pub verify: VerifyPolicy,
	/// Declared parameter constraints.
	pub constraints: Vec<ParameterConstraint>,
}
impl ToolConfig {
	/// Returns a builder seeded with defaults.
	pub fn builder() -> ToolConfigBuilder {
		ToolConfigBuilder::default()
	}

	/// Parses a JSON document; errors carry the path of the offending value.
	pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
		let mut deserializer = serde_json::Deserializer::from_str(raw);
		let builder: ToolConfigBuilder = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|e| ConfigError::Parse {
				path: e.path().to_string(),
				message: e.inner().to_string(),
			})?;

		builder.build()
	}

	/// Reads and parses a JSON file.
	pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		Self::from_json_str(&fs::read_to_string(path)?)
	}
}
impl Default for ToolConfig {
	fn default() -> Self {
		Self {
			debug_mode: false,
			honour_custom_debug: false,
			allow_sharing: false,
			default_email: None,
			error_message: DEFAULT_ERROR_MESSAGE.into(),
			nonce_lifetime: NONCE_LIFETIME,
			verify: VerifyPolicy::default(),
			constraints: Vec::new(),
		}
	}
}
impl TryFrom<ToolConfigBuilder> for ToolConfig {
	type Error = ConfigError;

	fn try_from(builder: ToolConfigBuilder) -> Result<Self, Self::Error> {
		builder.build()
	}
}
