//! Resource links: the launched placement, its settings bag, and its sharing pointer.

// self
use crate::{
	_prelude::*,
	auth::{ConsumerKey, ResourceLinkId},
	model::OutcomeType,
};

/// Prefix reserved for custom launch parameters.
pub const CUSTOM_PREFIX: &str = "custom_";
/// Launch parameters snapshotted into the settings bag on every launch.
pub const LTI_SETTING_NAMES: [&str; 11] = [
	"lis_result_sourcedid",
	"lis_outcome_service_url",
	"ext_ims_lis_basic_outcome_url",
	"ext_ims_lis_resultvalue_sourcedids",
	"ext_ims_lis_memberships_id",
	"ext_ims_lis_memberships_url",
	"ext_ims_lti_tool_setting",
	"ext_ims_lti_tool_setting_id",
	"ext_ims_lti_tool_setting_url",
	"ext_resource_link_content",
	"ext_resource_link_content_signature",
];

/// Setting holding the LTI 1.1 outcomes endpoint.
pub const OUTCOME_SERVICE_URL: &str = "lis_outcome_service_url";
/// Setting holding the extension outcomes endpoint.
pub const EXT_OUTCOME_URL: &str = "ext_ims_lis_basic_outcome_url";
/// Setting listing result types the extension outcomes endpoint accepts.
pub const RESULT_TYPES: &str = "ext_ims_lis_resultvalue_sourcedids";
/// Setting holding the memberships endpoint.
pub const MEMBERSHIPS_URL: &str = "ext_ims_lis_memberships_url";
/// Setting holding the opaque memberships id.
pub const MEMBERSHIPS_ID: &str = "ext_ims_lis_memberships_id";
/// Setting holding the cached tool setting value.
pub const TOOL_SETTING: &str = "ext_ims_lti_tool_setting";
/// Setting holding the opaque tool setting id.
pub const TOOL_SETTING_ID: &str = "ext_ims_lti_tool_setting_id";
/// Setting holding the tool setting endpoint.
pub const TOOL_SETTING_URL: &str = "ext_ims_lti_tool_setting_url";

/// Composite identifier of a resource link.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceLinkKey {
	/// Owning consumer.
	pub consumer: ConsumerKey,
	/// Platform-supplied `resource_link_id`.
	pub link: ResourceLinkId,
}
impl ResourceLinkKey {
	/// Creates a key from its parts.
	pub fn new(consumer: ConsumerKey, link: ResourceLinkId) -> Self {
		Self { consumer, link }
	}
}
impl Display for ResourceLinkKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}/{}", self.consumer, self.link)
	}
}

/// Sharing invariant violations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ShareError {
	/// A link may not point to itself.
	#[error("Resource link `{0}` cannot share itself.")]
	SelfShare(ResourceLinkKey),
}

/// Placement launched from a platform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLink {
	key: ResourceLinkKey,
	/// Platform `context_id`.
	pub context_id: Option<String>,
	/// Display title derived from the launch.
	pub title: String,
	/// Launch, custom, and service-discovery settings.
	pub settings: BTreeMap<String, String>,
	primary: Option<ResourceLinkKey>,
	share_approved: Option<bool>,
	/// Creation instant.
	pub created: OffsetDateTime,
	/// Last persisted modification.
	pub updated: OffsetDateTime,
}
impl ResourceLink {
	/// Creates an unsaved link.
	pub fn new(key: ResourceLinkKey, now: OffsetDateTime) -> Self {
		Self {
			key,
			context_id: None,
			title: String::new(),
			settings: BTreeMap::new(),
			primary: None,
			share_approved: None,
			created: now,
			updated: now,
		}
	}

	/// Builds the display title from the context and link titles.
	pub fn derive_title(
		context_title: Option<&str>,
		link_title: Option<&str>,
		link: &ResourceLinkId,
	) -> String {
		let mut title = context_title.map(str::trim).unwrap_or_default().to_owned();

		if let Some(link_title) = link_title.map(str::trim).filter(|t| !t.is_empty()) {
			if !title.is_empty() {
				title.push_str(": ");
			}

			title.push_str(link_title);
		}
		if title.is_empty() {
			title = format!("Course {link}");
		}

		title
	}

	/// Composite key.
	pub fn key(&self) -> &ResourceLinkKey {
		&self.key
	}

	/// Owning consumer.
	pub fn consumer_key(&self) -> &ConsumerKey {
		&self.key.consumer
	}

	/// Platform link id.
	pub fn id(&self) -> &ResourceLinkId {
		&self.key.link
	}

	/// Moves the link to a new platform id; storage must be updated with `rekey_resource_link`.
	pub(crate) fn set_id(&mut self, link: ResourceLinkId) {
		self.key.link = link;
	}

	/// Link whose roster this one shares, if any.
	pub fn primary(&self) -> Option<&ResourceLinkKey> {
		self.primary.as_ref()
	}

	/// Approval of the sharing arrangement: `None` while pending.
	pub fn share_approved(&self) -> Option<bool> {
		self.share_approved
	}

	/// Returns `true` when a primary pointer is set and approved.
	pub fn is_share_approved(&self) -> bool {
		self.primary.is_some() && self.share_approved == Some(true)
	}

	/// Points this link at `primary`.
	pub fn share_with(
		&mut self,
		primary: ResourceLinkKey,
		approved: Option<bool>,
	) -> Result<(), ShareError> {
		if primary == self.key {
			return Err(ShareError::SelfShare(primary));
		}

		self.primary = Some(primary);
		self.share_approved = approved;

		Ok(())
	}

	/// Records an approval decision for an existing pointer.
	pub fn set_share_approved(&mut self, approved: Option<bool>) {
		if self.primary.is_some() {
			self.share_approved = approved;
		}
	}

	/// Removes the sharing pointer and its approval.
	pub fn clear_share(&mut self) {
		self.primary = None;
		self.share_approved = None;
	}

	/// Legacy accessor for the primary link id.
	#[deprecated(note = "use `primary()`")]
	pub fn primary_context_id(&self) -> Option<&ResourceLinkId> {
		self.primary.as_ref().map(|key| &key.link)
	}

	/// Legacy mutator for the primary pointer.
	#[deprecated(note = "use `share_with()` or `clear_share()`")]
	pub fn set_primary_context_id(
		&mut self,
		primary: Option<ResourceLinkKey>,
	) -> Result<(), ShareError> {
		match primary {
			Some(primary) => {
				let approved = self.share_approved;

				self.share_with(primary, approved)
			},
			None => {
				self.clear_share();

				Ok(())
			},
		}
	}

	/// Returns a setting value.
	pub fn setting(&self, name: &str) -> Option<&str> {
		self.settings.get(name).map(String::as_str)
	}

	/// Sets a setting, removing it when `value` is `None` or empty.
	pub fn set_setting(&mut self, name: impl Into<String>, value: Option<String>) {
		let name = name.into();

		match value.filter(|v| !v.is_empty()) {
			Some(value) => {
				self.settings.insert(name, value);
			},
			None => {
				self.settings.remove(&name);
			},
		}
	}

	/// Replaces launch-derived settings with the values in `params`.
	///
	/// Every `custom_*` entry is dropped and re-read; each name in [`LTI_SETTING_NAMES`]
	/// is copied when present and removed otherwise.
	pub fn snapshot_launch_settings(&mut self, params: &BTreeMap<String, String>) {
		self.settings.retain(|name, _| !name.starts_with(CUSTOM_PREFIX));

		for name in LTI_SETTING_NAMES {
			self.set_setting(name, params.get(name).cloned());
		}
		for (name, value) in params.range(CUSTOM_PREFIX.to_owned()..) {
			if !name.starts_with(CUSTOM_PREFIX) {
				break;
			}

			self.settings.insert(name.clone(), value.clone());
		}
	}

	fn setting_url(&self, name: &str) -> Option<Url> {
		self.setting(name).and_then(|raw| Url::parse(raw).ok())
	}

	/// LTI 1.1 outcomes endpoint.
	pub fn outcomes_service_url(&self) -> Option<Url> {
		self.setting_url(OUTCOME_SERVICE_URL)
	}

	/// Extension outcomes endpoint.
	pub fn ext_outcomes_url(&self) -> Option<Url> {
		self.setting_url(EXT_OUTCOME_URL)
	}

	/// Memberships endpoint.
	pub fn memberships_url(&self) -> Option<Url> {
		self.setting_url(MEMBERSHIPS_URL)
	}

	/// Tool setting endpoint.
	pub fn setting_service_url(&self) -> Option<Url> {
		self.setting_url(TOOL_SETTING_URL)
	}

	/// Returns `true` when either outcomes protocol is advertised.
	pub fn has_outcomes_service(&self) -> bool {
		self.outcomes_service_url().is_some() || self.ext_outcomes_url().is_some()
	}

	/// Returns `true` when the memberships extension is advertised.
	pub fn has_memberships_service(&self) -> bool {
		self.memberships_url().is_some()
	}

	/// Returns `true` when the tool setting extension is advertised.
	pub fn has_setting_service(&self) -> bool {
		self.setting_service_url().is_some()
	}

	/// Result types accepted by the extension outcomes service.
	pub fn supported_result_types(&self) -> Vec<OutcomeType> {
		let raw = self.setting(RESULT_TYPES).unwrap_or(OutcomeType::Decimal.as_str());
		let mut types = raw
			.split(',')
			.filter_map(|name| name.trim().to_ascii_lowercase().parse::<OutcomeType>().ok())
			.collect::<Vec<_>>();

		if types.is_empty() {
			types.push(OutcomeType::Decimal);
		}

		types
	}
}

/// Pre-rename name of [`ResourceLink`].
#[deprecated(note = "use `ResourceLink`")]
pub type Context = ResourceLink;

/// Link sharing into a primary, as listed for administrators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLinkShare {
	/// Sharing link.
	pub key: ResourceLinkKey,
	/// Its display title.
	pub title: String,
	/// Approval state.
	pub approved: Option<bool>,
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn link_key(consumer: &str, link: &str) -> ResourceLinkKey {
		ResourceLinkKey::new(
			ConsumerKey::new(consumer).expect("Consumer key fixture should be valid."),
			ResourceLinkId::new(link).expect("Resource link id fixture should be valid."),
		)
	}

	fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
		pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
	}

	#[test]
	fn titles_fall_back_to_course_label() {
		let id = ResourceLinkId::new("R1").expect("Resource link id fixture should be valid.");

		assert_eq!(ResourceLink::derive_title(Some("Maths"), Some("Quiz"), &id), "Maths: Quiz");
		assert_eq!(ResourceLink::derive_title(None, Some(" Quiz "), &id), "Quiz");
		assert_eq!(ResourceLink::derive_title(Some("Maths"), Some("  "), &id), "Maths");
		assert_eq!(ResourceLink::derive_title(None, None, &id), "Course R1");
	}

	#[test]
	fn snapshot_replaces_custom_and_lti_settings() {
		let mut link = ResourceLink::new(link_key("K1", "R1"), macros::datetime!(2025-03-01 0:00 UTC));

		link.snapshot_launch_settings(&params(&[
			("custom_colour", "red"),
			("custom_size", "L"),
			("lis_outcome_service_url", "https://lms.test/outcomes"),
			("user_id", "U1"),
		]));

		assert_eq!(link.setting("custom_colour"), Some("red"));
		assert_eq!(link.setting("user_id"), None);

		link.set_setting("local_note", Some("kept".into()));
		link.snapshot_launch_settings(&params(&[("custom_size", "M")]));

		assert_eq!(link.setting("custom_colour"), None);
		assert_eq!(link.setting("custom_size"), Some("M"));
		assert_eq!(link.setting("lis_outcome_service_url"), None);
		assert_eq!(link.setting("local_note"), Some("kept"));
	}

	#[test]
	fn self_sharing_is_rejected() {
		let mut link = ResourceLink::new(link_key("K1", "R1"), macros::datetime!(2025-03-01 0:00 UTC));

		assert_eq!(
			link.share_with(link_key("K1", "R1"), Some(true)),
			Err(ShareError::SelfShare(link_key("K1", "R1")))
		);
		assert!(link.share_with(link_key("K2", "R1"), None).is_ok());
		assert!(!link.is_share_approved());

		link.set_share_approved(Some(true));

		assert!(link.is_share_approved());

		link.clear_share();

		assert_eq!(link.primary(), None);
		assert_eq!(link.share_approved(), None);
	}

	#[test]
	#[allow(deprecated)]
	fn legacy_primary_accessors_map_to_pointer() {
		let mut link: Context =
			ResourceLink::new(link_key("K1", "R1"), macros::datetime!(2025-03-01 0:00 UTC));

		link.set_primary_context_id(Some(link_key("K1", "R9")))
			.expect("Pointer to another link should be accepted.");

		assert_eq!(link.primary_context_id().map(|id| id.as_ref()), Some("R9"));
	}

	#[test]
	fn result_types_default_to_decimal() {
		let mut link = ResourceLink::new(link_key("K1", "R1"), macros::datetime!(2025-03-01 0:00 UTC));

		assert_eq!(link.supported_result_types(), vec![OutcomeType::Decimal]);

		link.set_setting(RESULT_TYPES, Some("decimal, Percentage,ratio,bogus".into()));

		assert_eq!(
			link.supported_result_types(),
			vec![OutcomeType::Decimal, OutcomeType::Percentage, OutcomeType::Ratio]
		);
	}
}
