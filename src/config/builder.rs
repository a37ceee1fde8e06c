//! Validating builder for [`ToolConfig`], doubling as its serialized form.

// self
use crate::{
	_prelude::*,
	config::{ParameterConstraint, ToolConfig},
	error::ConfigError,
	oauth::{SignatureMethod, VerifyPolicy},
};

/// Builder (and serialized form) of [`ToolConfig`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfigBuilder {
	/// See [`ToolConfig::debug_mode`].
	pub debug_mode: bool,
	/// See [`ToolConfig::honour_custom_debug`].
	pub honour_custom_debug: bool,
	/// See [`ToolConfig::allow_sharing`].
	pub allow_sharing: bool,
	/// See [`ToolConfig::default_email`].
	pub default_email: Option<String>,
	/// See [`ToolConfig::error_message`].
	pub error_message: String,
	/// Nonce lifetime in seconds.
	pub nonce_lifetime_secs: i64,
	/// Timestamp tolerance in seconds.
	pub timestamp_tolerance_secs: i64,
	/// Accepted signature methods.
	pub signature_methods: Vec<SignatureMethod>,
	/// Declared parameter constraints.
	pub constraints: Vec<ParameterConstraint>,
}
impl ToolConfigBuilder {
	/// Toggles debug mode.
	pub fn debug_mode(mut self, enabled: bool) -> Self {
		self.debug_mode = enabled;

		self
	}

	/// Lets launches request debug mode with `custom_debug=true`.
	pub fn honour_custom_debug(mut self, enabled: bool) -> Self {
		self.honour_custom_debug = enabled;

		self
	}

	/// Toggles resource-link sharing.
	pub fn allow_sharing(mut self, enabled: bool) -> Self {
		self.allow_sharing = enabled;

		self
	}

	/// Sets the fallback email or `@domain`.
	pub fn default_email(mut self, email: impl Into<String>) -> Self {
		self.default_email = Some(email.into());

		self
	}

	/// Sets the user-facing rejection message.
	pub fn error_message(mut self, message: impl Into<String>) -> Self {
		self.error_message = message.into();

		self
	}

	/// Sets the nonce lifetime.
	pub fn nonce_lifetime(mut self, lifetime: Duration) -> Self {
		self.nonce_lifetime_secs = lifetime.whole_seconds();

		self
	}

	/// Sets the accepted clock skew.
	pub fn timestamp_tolerance(mut self, tolerance: Duration) -> Self {
		self.timestamp_tolerance_secs = tolerance.whole_seconds();

		self
	}

	/// Replaces the accepted signature methods.
	pub fn signature_methods(mut self, methods: impl IntoIterator<Item = SignatureMethod>) -> Self {
		self.signature_methods = methods.into_iter().collect();

		self
	}

	/// Adds a parameter constraint.
	pub fn constraint(mut self, constraint: ParameterConstraint) -> Self {
		self.constraints.push(constraint);

		self
	}

	/// Validates the settings and produces a [`ToolConfig`].
	pub fn build(self) -> Result<ToolConfig, ConfigError> {
		if self.signature_methods.is_empty() {
			return Err(ConfigError::NoSignatureMethods);
		}
		if self.nonce_lifetime_secs <= 0 {
			return Err(ConfigError::NonPositiveDuration { field: "nonce_lifetime" });
		}
		if self.timestamp_tolerance_secs <= 0 {
			return Err(ConfigError::NonPositiveDuration { field: "timestamp_tolerance" });
		}

		for constraint in &self.constraints {
			if constraint.name.trim().is_empty() {
				return Err(ConfigError::InvalidConstraint {
					name: constraint.name.clone(),
					reason: "name is blank",
				});
			}
			if constraint.max_length == Some(0) {
				return Err(ConfigError::InvalidConstraint {
					name: constraint.name.clone(),
					reason: "max_length must be positive",
				});
			}
		}

		let mut methods = self.signature_methods;

		methods.dedup();

		Ok(ToolConfig {
			debug_mode: self.debug_mode,
			honour_custom_debug: self.honour_custom_debug,
			allow_sharing: self.allow_sharing,
			default_email: self.default_email.filter(|e| !e.trim().is_empty()),
			error_message: self.error_message,
			nonce_lifetime: Duration::seconds(self.nonce_lifetime_secs),
			verify: VerifyPolicy {
				methods,
				timestamp_tolerance: Duration::seconds(self.timestamp_tolerance_secs),
			},
			constraints: self.constraints,
		})
	}
}
impl Default for ToolConfigBuilder {
	fn default() -> Self {
		ToolConfig::default().into()
	}
}
impl From<ToolConfig> for ToolConfigBuilder {
	fn from(config: ToolConfig) -> Self {
		Self {
			debug_mode: config.debug_mode,
			honour_custom_debug: config.honour_custom_debug,
			allow_sharing: config.allow_sharing,
			default_email: config.default_email,
			error_message: config.error_message,
			nonce_lifetime_secs: config.nonce_lifetime.whole_seconds(),
			timestamp_tolerance_secs: config.verify.timestamp_tolerance.whole_seconds(),
			signature_methods: config.verify.methods,
			constraints: config.constraints,
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::NONCE_LIFETIME, config::DEFAULT_ERROR_MESSAGE, oauth::DEFAULT_TIMESTAMP_TOLERANCE,
	};

	#[test]
	fn defaults_match_protocol_windows() {
		let config = ToolConfig::builder().build().expect("Default config should build.");

		assert_eq!(config.nonce_lifetime, NONCE_LIFETIME);
		assert_eq!(config.verify.timestamp_tolerance, DEFAULT_TIMESTAMP_TOLERANCE);
		assert_eq!(config.error_message, DEFAULT_ERROR_MESSAGE);
		assert!(!config.allow_sharing);
	}

	#[test]
	fn invalid_settings_are_rejected() {
		assert!(matches!(
			ToolConfig::builder().signature_methods([]).build(),
			Err(ConfigError::NoSignatureMethods)
		));
		assert!(matches!(
			ToolConfig::builder().nonce_lifetime(Duration::ZERO).build(),
			Err(ConfigError::NonPositiveDuration { field: "nonce_lifetime" })
		));
		assert!(matches!(
			ToolConfig::builder().constraint(ParameterConstraint::new(" ", true, None)).build(),
			Err(ConfigError::InvalidConstraint { .. })
		));
	}
}
