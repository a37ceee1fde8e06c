//! Platform (tool consumer) registration, availability rules, and identity scoping.

// crates.io
use time::Date;
// self
use crate::{
	_prelude::*,
	auth::{ConsumerKey, ConsumerSecret},
	model::LtiVersion,
};

/// Availability of a consumer at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
	/// Enabled and inside its enable window.
	Available,
	/// Switched off by the tool.
	Disabled,
	/// `enable_from` lies in the future.
	NotYetAvailable,
	/// `enable_until` has passed.
	Expired,
}

/// Rule used to derive the tool-side identity string of a platform user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum IdScope {
	/// Raw platform id.
	#[default]
	IdOnly,
	/// `consumer_key:raw`.
	Global,
	/// `consumer_key:context_id:raw`.
	Context,
	/// `consumer_key:resource_link_id:raw`.
	Resource,
}
impl IdScope {
	/// Separator placed between identity segments.
	pub const SEPARATOR: char = ':';

	/// Numeric code stored by persistence adapters.
	pub const fn code(self) -> u8 {
		match self {
			Self::IdOnly => 0,
			Self::Global => 1,
			Self::Context => 2,
			Self::Resource => 3,
		}
	}

	/// Parses a stored numeric code.
	pub const fn from_code(code: u8) -> Option<Self> {
		match code {
			0 => Some(Self::IdOnly),
			1 => Some(Self::Global),
			2 => Some(Self::Context),
			3 => Some(Self::Resource),
			_ => None,
		}
	}

	/// Derives the identity string for `raw` under this scope.
	///
	/// Missing context or resource ids collapse to the consumer prefix so the result never
	/// contains empty segments.
	pub fn derive(
		self,
		consumer: &ConsumerKey,
		context_id: Option<&str>,
		resource_link_id: Option<&str>,
		raw: &str,
	) -> String {
		let middle = match self {
			Self::IdOnly => return raw.to_owned(),
			Self::Global => None,
			Self::Context => context_id.filter(|id| !id.is_empty()),
			Self::Resource => resource_link_id.filter(|id| !id.is_empty()),
		};
		let mut identity = String::with_capacity(consumer.len() + raw.len() + 2);

		identity.push_str(consumer);

		if let Some(middle) = middle {
			identity.push(Self::SEPARATOR);
			identity.push_str(middle);
		}

		identity.push(Self::SEPARATOR);
		identity.push_str(raw);

		identity
	}
}
impl From<IdScope> for u8 {
	fn from(value: IdScope) -> Self {
		value.code()
	}
}
impl TryFrom<u8> for IdScope {
	type Error = String;

	fn try_from(value: u8) -> Result<Self, Self::Error> {
		Self::from_code(value).ok_or_else(|| format!("Unknown id scope code {value}."))
	}
}

/// Self-description a platform reports in each launch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlatformReport {
	/// `lti_version` of the launch.
	pub lti_version: LtiVersion,
	/// `tool_consumer_instance_name`.
	pub instance_name: Option<String>,
	/// Product family code plus version, or `ext_lms`.
	pub product_version: Option<String>,
	/// `tool_consumer_instance_guid`.
	pub instance_guid: Option<String>,
	/// Stylesheet URL supplied for the presentation.
	pub css_url: Option<String>,
}

/// Errors produced by [`ConsumerBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ConsumerBuilderError {
	/// Consumer name was blank.
	#[error("Consumer name is required.")]
	MissingName,
	/// `enable_from` is not before `enable_until`.
	#[error("Consumer enable window must start before it ends.")]
	InvalidWindow,
}

/// Registered platform allowed to launch the tool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumer {
	key: ConsumerKey,
	/// Shared signing secret.
	pub secret: ConsumerSecret,
	/// Display name assigned by the tool administrator.
	pub name: String,
	/// Version reported by the last accepted launch.
	pub lti_version: Option<LtiVersion>,
	/// Platform instance name it reported.
	pub consumer_name: Option<String>,
	/// Platform product and version it reported.
	pub consumer_version: Option<String>,
	/// Platform instance GUID it reported.
	pub consumer_guid: Option<String>,
	/// Stylesheet URL it reported.
	pub css_path: Option<String>,
	/// Only launches carrying the stored GUID are accepted.
	pub protected: bool,
	/// Administrative switch.
	pub enabled: bool,
	/// Start of the enable window.
	pub enable_from: Option<OffsetDateTime>,
	/// End of the enable window (exclusive).
	pub enable_until: Option<OffsetDateTime>,
	/// Day of the most recent accepted launch.
	pub last_access: Option<Date>,
	/// Identity derivation rule for users of this consumer.
	pub id_scope: IdScope,
	/// Creation instant.
	pub created: OffsetDateTime,
	/// Last persisted modification.
	pub updated: OffsetDateTime,
}
impl Consumer {
	/// Returns a builder for a new registration.
	pub fn builder(key: ConsumerKey, name: impl Into<String>) -> ConsumerBuilder {
		ConsumerBuilder::new(key, name.into())
	}

	/// Immutable consumer key.
	pub fn key(&self) -> &ConsumerKey {
		&self.key
	}

	/// Evaluates the enable flag and window at `instant`.
	pub fn availability_at(&self, instant: OffsetDateTime) -> Availability {
		if !self.enabled {
			return Availability::Disabled;
		}
		if self.enable_from.is_some_and(|from| instant < from) {
			return Availability::NotYetAvailable;
		}
		if self.enable_until.is_some_and(|until| instant >= until) {
			return Availability::Expired;
		}

		Availability::Available
	}

	/// Returns `true` when the consumer may launch at `instant`.
	pub fn is_available_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.availability_at(instant), Availability::Available)
	}

	/// Applies the platform's self-description and stamps today's access.
	///
	/// Returns `true` when any stored field changed and the consumer needs saving.
	pub fn absorb(&mut self, report: &PlatformReport, now: OffsetDateTime) -> bool {
		let mut dirty = false;

		dirty |= replace(&mut self.lti_version, Some(report.lti_version));

		if report.instance_name.is_some() {
			dirty |= replace(&mut self.consumer_name, report.instance_name.clone());
		}
		if report.product_version.is_some() {
			dirty |= replace(&mut self.consumer_version, report.product_version.clone());
		}
		if let Some(guid) = &report.instance_guid
			&& (self.consumer_guid.is_none() || !self.protected)
		{
			dirty |= replace(&mut self.consumer_guid, Some(guid.clone()));
		}
		if report.css_url.is_some() {
			dirty |= replace(&mut self.css_path, report.css_url.clone());
		}

		dirty |= replace(&mut self.last_access, Some(now.date()));

		dirty
	}

	/// Rebuilds a consumer from stored columns; persistence adapters only.
	#[doc(hidden)]
	pub fn restore(key: ConsumerKey, secret: ConsumerSecret, name: String) -> Self {
		let now = OffsetDateTime::now_utc();

		Self {
			key,
			secret,
			name,
			lti_version: None,
			consumer_name: None,
			consumer_version: None,
			consumer_guid: None,
			css_path: None,
			protected: false,
			enabled: false,
			enable_from: None,
			enable_until: None,
			last_access: None,
			id_scope: IdScope::IdOnly,
			created: now,
			updated: now,
		}
	}
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
	if *slot == value {
		return false;
	}

	*slot = value;

	true
}

/// Builder for [`Consumer`].
#[derive(Clone, Debug)]
pub struct ConsumerBuilder {
	key: ConsumerKey,
	name: String,
	secret: Option<ConsumerSecret>,
	lti_version: Option<LtiVersion>,
	protected: bool,
	enabled: bool,
	enable_from: Option<OffsetDateTime>,
	enable_until: Option<OffsetDateTime>,
	id_scope: IdScope,
	created: Option<OffsetDateTime>,
}
impl ConsumerBuilder {
	fn new(key: ConsumerKey, name: String) -> Self {
		Self {
			key,
			name,
			secret: None,
			lti_version: None,
			protected: false,
			enabled: true,
			enable_from: None,
			enable_until: None,
			id_scope: IdScope::IdOnly,
			created: None,
		}
	}

	/// Uses a known shared secret instead of generating one.
	pub fn secret(mut self, secret: impl Into<String>) -> Self {
		self.secret = Some(ConsumerSecret::new(secret));

		self
	}

	/// Pins the LTI version the platform must use.
	pub fn lti_version(mut self, version: LtiVersion) -> Self {
		self.lti_version = Some(version);

		self
	}

	/// Restricts launches to the first platform instance GUID seen.
	pub fn protected(mut self, protected: bool) -> Self {
		self.protected = protected;

		self
	}

	/// Sets the administrative switch; consumers are enabled by default.
	pub fn enabled(mut self, enabled: bool) -> Self {
		self.enabled = enabled;

		self
	}

	/// Sets the start of the enable window.
	pub fn enable_from(mut self, instant: OffsetDateTime) -> Self {
		self.enable_from = Some(instant);

		self
	}

	/// Sets the end of the enable window.
	pub fn enable_until(mut self, instant: OffsetDateTime) -> Self {
		self.enable_until = Some(instant);

		self
	}

	/// Sets the identity derivation rule.
	pub fn id_scope(mut self, scope: IdScope) -> Self {
		self.id_scope = scope;

		self
	}

	/// Sets the creation instant (defaults to now).
	pub fn created_at(mut self, instant: OffsetDateTime) -> Self {
		self.created = Some(instant);

		self
	}

	/// Consumes the builder and produces a [`Consumer`].
	pub fn build(self) -> Result<Consumer, ConsumerBuilderError> {
		if self.name.trim().is_empty() {
			return Err(ConsumerBuilderError::MissingName);
		}
		if let (Some(from), Some(until)) = (self.enable_from, self.enable_until)
			&& from >= until
		{
			return Err(ConsumerBuilderError::InvalidWindow);
		}

		let created = self.created.unwrap_or_else(OffsetDateTime::now_utc);

		Ok(Consumer {
			key: self.key,
			secret: self.secret.unwrap_or_else(ConsumerSecret::generate),
			name: self.name,
			lti_version: self.lti_version,
			consumer_name: None,
			consumer_version: None,
			consumer_guid: None,
			css_path: None,
			protected: self.protected,
			enabled: self.enabled,
			enable_from: self.enable_from,
			enable_until: self.enable_until,
			last_access: None,
			id_scope: self.id_scope,
			created,
			updated: created,
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn key(value: &str) -> ConsumerKey {
		ConsumerKey::new(value).expect("Consumer key fixture should be valid.")
	}

	#[test]
	fn availability_honours_flag_and_window() {
		let mut consumer = Consumer::builder(key("K1"), "Platform")
			.enable_from(macros::datetime!(2025-01-01 00:00 UTC))
			.enable_until(macros::datetime!(2025-02-01 00:00 UTC))
			.build()
			.expect("Consumer fixture should build.");

		assert_eq!(
			consumer.availability_at(macros::datetime!(2024-12-31 23:59 UTC)),
			Availability::NotYetAvailable
		);
		assert_eq!(
			consumer.availability_at(macros::datetime!(2025-01-01 00:00 UTC)),
			Availability::Available
		);
		assert_eq!(
			consumer.availability_at(macros::datetime!(2025-02-01 00:00 UTC)),
			Availability::Expired
		);

		consumer.enabled = false;

		assert_eq!(
			consumer.availability_at(macros::datetime!(2025-01-15 00:00 UTC)),
			Availability::Disabled
		);
	}

	#[test]
	fn builder_rejects_inverted_window() {
		let err = Consumer::builder(key("K1"), "Platform")
			.enable_from(macros::datetime!(2025-02-01 00:00 UTC))
			.enable_until(macros::datetime!(2025-01-01 00:00 UTC))
			.build()
			.expect_err("Inverted window should fail.");

		assert_eq!(err, ConsumerBuilderError::InvalidWindow);
	}

	#[test]
	fn id_scope_derivation_is_prefixed_per_scope() {
		let consumer = key("K1");

		assert_eq!(IdScope::IdOnly.derive(&consumer, Some("C1"), Some("R1"), "U1"), "U1");
		assert_eq!(IdScope::Global.derive(&consumer, Some("C1"), Some("R1"), "U1"), "K1:U1");
		assert_eq!(IdScope::Context.derive(&consumer, Some("C1"), Some("R1"), "U1"), "K1:C1:U1");
		assert_eq!(IdScope::Resource.derive(&consumer, Some("C1"), Some("R1"), "U1"), "K1:R1:U1");
		assert_eq!(IdScope::Context.derive(&consumer, None, Some("R1"), "U1"), "K1:U1");
		assert_ne!(
			IdScope::Global.derive(&consumer, None, None, "U1"),
			IdScope::Global.derive(&consumer, None, None, "U2")
		);
	}

	#[test]
	fn id_scope_round_trips_through_codes() {
		let payload = serde_json::to_string(&IdScope::Context).expect("IdScope should serialize.");

		assert_eq!(payload, "2");
		assert_eq!(IdScope::from_code(3), Some(IdScope::Resource));
		assert_eq!(IdScope::from_code(4), None);
	}

	#[test]
	fn absorb_tracks_changes_and_protects_guid() {
		let now = macros::datetime!(2025-03-01 12:00 UTC);
		let mut consumer = Consumer::builder(key("K1"), "Platform")
			.protected(true)
			.build()
			.expect("Consumer fixture should build.");
		let report = PlatformReport {
			lti_version: LtiVersion::V1,
			instance_name: Some("Campus".into()),
			product_version: Some("moodle-4.1".into()),
			instance_guid: Some("guid-1".into()),
			css_url: None,
		};

		assert!(consumer.absorb(&report, now));
		assert_eq!(consumer.consumer_guid.as_deref(), Some("guid-1"));
		assert_eq!(consumer.last_access, Some(macros::date!(2025-03-01)));
		assert!(!consumer.absorb(&report, now));

		let moved = PlatformReport { instance_guid: Some("guid-2".into()), ..report };

		assert!(!consumer.absorb(&moved, now));
		assert_eq!(consumer.consumer_guid.as_deref(), Some("guid-1"));
	}
}
