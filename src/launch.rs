//! Launch authentication.
//!
//! [`ToolProvider::authenticate`] runs the checks in a fixed order and stops at the first
//! failure: request shape, consumer lookup, version, OAuth signature and nonce, instance
//! GUID, availability, value domains, and declared constraints. An accepted launch then
//! materializes the resource link, resolves sharing, refreshes the user, and persists what
//! changed. Rejections are returned as [`LaunchOutcome::Rejected`]; only storage faults
//! surface as errors.

pub mod rejection;
pub mod request;

mod sharing;

pub use rejection::*;
pub use request::*;
pub use sharing::SHARE_KEY_PARAM;

// self
use crate::{
	_prelude::*,
	auth::{ConsumerKey, NonceRecord, ResourceLinkId, UserId},
	http::MessageHttpClient,
	model::{
		Availability, Consumer, LtiVersion, MessageType, ResourceLink, ResourceLinkKey, User,
		UserKey,
	},
	oauth::{self, OAuthError},
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
	store::{NonceOutcome, StoreError},
	tool::ToolProvider,
};

/// Presentation targets a platform may request.
pub const DOCUMENT_TARGETS: [&str; 7] =
	["embed", "frame", "iframe", "window", "popup", "overlay", "none"];
/// Launch parameter naming the previous id of a link created by content-item selection.
pub const CONTENT_ITEM_ID_PARAM: &str = "custom_content_item_id";

const CONTENT_ITEM_FLAGS: [&str; 5] =
	["accept_unsigned", "accept_multiple", "accept_copy_advice", "auto_create", "can_confirm"];
const KIND: OperationKind = OperationKind::Launch;

/// An accepted launch.
#[derive(Clone, Debug)]
pub struct Launch {
	/// Consumer that signed the launch, with the platform's self-description applied.
	pub consumer: Consumer,
	/// Message type.
	pub message_type: MessageType,
	/// LTI version.
	pub lti_version: LtiVersion,
	/// Link the launch operates on: the primary link while sharing, else the launched one.
	pub resource_link: Option<ResourceLink>,
	/// Link the platform launched.
	pub launched_link: Option<ResourceLink>,
	/// Launching user, bound to the launched link.
	pub user: Option<User>,
	/// Where the platform expects the user to return.
	pub return_url: Option<Url>,
	/// Media types accepted by a content-item selection.
	pub media_types: Vec<String>,
	/// Document targets accepted by a content-item selection.
	pub document_targets: Vec<String>,
	/// Debug mode was in effect.
	pub debug: bool,
}
impl Launch {
	/// Returns `true` when the launched link shares into another link.
	pub fn is_shared(&self) -> bool {
		match (&self.resource_link, &self.launched_link) {
			(Some(effective), Some(launched)) => effective.key() != launched.key(),
			_ => false,
		}
	}

	/// Tool-side identity of the user under the consumer's id scope.
	pub fn user_identity(&self) -> Option<String> {
		let user = self.user.as_ref()?;
		let context_id = self.launched_link.as_ref().and_then(|link| link.context_id.as_deref());

		Some(user.identity(self.consumer.id_scope, context_id))
	}
}

/// Result of [`ToolProvider::authenticate`].
#[derive(Clone, Debug)]
pub enum LaunchOutcome {
	/// Every check passed and the launch was persisted.
	Accepted(Box<Launch>),
	/// A check failed.
	Rejected(LaunchRejection),
}
impl LaunchOutcome {
	/// Returns `true` for accepted launches.
	pub fn is_accepted(&self) -> bool {
		matches!(self, Self::Accepted(_))
	}

	/// Returns the accepted launch.
	pub fn launch(&self) -> Option<&Launch> {
		match self {
			Self::Accepted(launch) => Some(launch),
			Self::Rejected(_) => None,
		}
	}

	/// Returns the rejection.
	pub fn rejection(&self) -> Option<&LaunchRejection> {
		match self {
			Self::Accepted(_) => None,
			Self::Rejected(rejection) => Some(rejection),
		}
	}
}

/// Why the state machine stopped early.
enum Halt {
	Rejected(RejectionReason),
	Failed(Error),
}
impl From<RejectionReason> for Halt {
	fn from(reason: RejectionReason) -> Self {
		Self::Rejected(reason)
	}
}
impl From<Error> for Halt {
	fn from(e: Error) -> Self {
		Self::Failed(e)
	}
}
impl From<StoreError> for Halt {
	fn from(e: StoreError) -> Self {
		Self::Failed(e.into())
	}
}

/// Fields validated by the shape check.
struct Shape {
	message_type: MessageType,
	version: LtiVersion,
	link_id: Option<ResourceLinkId>,
	user_id: Option<UserId>,
}

impl<C> ToolProvider<C>
where
	C: ?Sized + MessageHttpClient,
{
	/// Authenticates a launch against the current clock.
	pub async fn authenticate(&self, request: &LaunchRequest) -> Result<LaunchOutcome> {
		self.authenticate_at(request, OffsetDateTime::now_utc()).await
	}

	/// Authenticates a launch as of `now`.
	pub async fn authenticate_at(
		&self,
		request: &LaunchRequest,
		now: OffsetDateTime,
	) -> Result<LaunchOutcome> {
		let span = OperationSpan::new(KIND, "authenticate");

		obs::record_operation_outcome(KIND, OperationOutcome::Attempt);

		let result = span
			.instrument(async move {
				let debug = self.debug_requested(request);

				match self.admit(request, debug, now).await {
					Ok(launch) => Ok(LaunchOutcome::Accepted(Box::new(launch))),
					Err(Halt::Rejected(reason)) => Ok(LaunchOutcome::Rejected(LaunchRejection {
						reason,
						debug,
						return_url: return_url(request),
						user_message: self.config.error_message.clone(),
					})),
					Err(Halt::Failed(e)) => Err(e),
				}
			})
			.await;

		match &result {
			Ok(LaunchOutcome::Accepted(_)) => {
				obs::record_operation_outcome(KIND, OperationOutcome::Success)
			},
			Ok(LaunchOutcome::Rejected(rejection)) => {
				obs::warn_event(KIND, &rejection.reason);
				obs::record_operation_outcome(KIND, OperationOutcome::Failure);
			},
			Err(e) => {
				obs::warn_event(KIND, e);
				obs::record_operation_outcome(KIND, OperationOutcome::Failure);
			},
		}

		result
	}

	fn debug_requested(&self, request: &LaunchRequest) -> bool {
		self.config.debug_mode
			|| (self.config.honour_custom_debug
				&& request.value("custom_debug").is_some_and(|v| v.eq_ignore_ascii_case("true")))
	}

	async fn admit(
		&self,
		request: &LaunchRequest,
		debug: bool,
		now: OffsetDateTime,
	) -> Result<Launch, Halt> {
		let shape = check_shape(request)?;
		let mut consumer = self.identify(request, &shape, now).await?;

		check_availability(&consumer, now)?;
		check_value_domains(request, shape.message_type)?;
		self.check_constraints(request, shape.message_type)?;

		let consumer_dirty = consumer.absorb(&request.platform_report(shape.version), now);
		let (launched, effective, launched_saved) = match &shape.link_id {
			Some(link_id) => {
				let mut link = self.materialize_link(consumer.key(), link_id, request, now).await?;
				let sharing = self.resolve_sharing(request, &mut link, now).await??;

				(Some(link), Some(sharing.effective), sharing.launched_saved)
			},
			None => (None, None, false),
		};
		let user = match (&launched, shape.user_id) {
			(Some(link), Some(user_id)) =>
				Some(self.materialize_user(link.key(), user_id, request, now).await?),
			_ => None,
		};

		if consumer_dirty {
			consumer.updated = now;
			self.store.save_consumer(consumer.clone()).await?;
		}
		if let Some(link) = &launched
			&& !launched_saved
		{
			self.store.save_resource_link(link.clone()).await?;
		}
		if let Some(user) = &user {
			if user.result_sourcedid.is_some() {
				self.store.save_user(user.clone()).await?;
			} else {
				self.store.delete_user(user.key()).await?;
			}
		}

		let content_item = shape.message_type == MessageType::ContentItemSelection;

		Ok(Launch {
			consumer,
			message_type: shape.message_type,
			lti_version: shape.version,
			resource_link: effective,
			launched_link: launched,
			user,
			return_url: return_url(request),
			media_types: if content_item { request.list("accept_media_types") } else { Vec::new() },
			document_targets: if content_item {
				request.list("accept_presentation_document_targets")
			} else {
				Vec::new()
			},
			debug,
		})
	}

	/// Consumer lookup, version match, OAuth verification, nonce, and instance GUID.
	async fn identify(
		&self,
		request: &LaunchRequest,
		shape: &Shape,
		now: OffsetDateTime,
	) -> Result<Consumer, Halt> {
		let Some(raw_key) = request.value("oauth_consumer_key") else {
			return Err(identity("Missing consumer key.").into());
		};
		let invalid_key = || identity("Invalid consumer key.").with_detail(format!("key: {raw_key}"));
		let Ok(key) = ConsumerKey::new(raw_key) else {
			return Err(invalid_key().into());
		};
		let Some(consumer) = self.store.load_consumer(&key).await? else {
			return Err(invalid_key().into());
		};

		if let Some(reported) = consumer.lti_version
			&& reported != shape.version
		{
			return Err(identity("LTI version does not match that of the tool consumer.")
				.with_detail(format!("expected {reported}, got {}", shape.version))
				.into());
		}

		let verified = oauth::verify_request(
			request.method(),
			request.url(),
			&request.signed_parameters(),
			&consumer.secret,
			&self.config.verify,
			now,
		)
		.map_err(signature_failure)?;
		let record =
			NonceRecord::new(key, verified.nonce.clone(), now, self.config.nonce_lifetime);

		if self.store.consume_nonce(record, now).await? == NonceOutcome::Replayed {
			return Err(identity("Invalid nonce.")
				.with_detail(format!("nonce {} was already used", verified.nonce))
				.into());
		}
		if consumer.protected {
			let guid = request.value("tool_consumer_instance_guid");
			let matches = match &consumer.consumer_guid {
				Some(stored) => guid == Some(stored.as_str()),
				None => guid.is_some(),
			};

			if !matches {
				return Err(identity("Request is from an invalid tool consumer.").into());
			}
		}

		Ok(consumer)
	}

	fn check_constraints(
		&self,
		request: &LaunchRequest,
		message_type: MessageType,
	) -> Result<(), RejectionReason> {
		let invalid = self
			.config
			.constraints
			.iter()
			.filter(|c| c.applies_to(message_type) && !c.is_satisfied_by(request.param(&c.name)))
			.map(|c| c.name.as_str())
			.collect::<Vec<_>>();

		if invalid.is_empty() {
			Ok(())
		} else {
			Err(RejectionReason::new(
				RejectionKind::Constraint,
				format!("Invalid parameter(s): {}.", invalid.join(", ")),
			))
		}
	}

	/// Loads (or migrates, or creates) the launched link and applies the launch data.
	async fn materialize_link(
		&self,
		consumer: &ConsumerKey,
		link_id: &ResourceLinkId,
		request: &LaunchRequest,
		now: OffsetDateTime,
	) -> Result<ResourceLink> {
		let key = ResourceLinkKey::new(consumer.clone(), link_id.clone());
		let stored = match self.store.load_resource_link(&key).await? {
			Some(link) => Some(link),
			None => self.migrate_link(&key, request).await?,
		};
		let mut link = stored.unwrap_or_else(|| ResourceLink::new(key, now));

		if let Some(context_id) = request.value("context_id") {
			link.context_id = Some(context_id.to_owned());
		}

		link.title = ResourceLink::derive_title(
			request.value("context_title"),
			request.value("resource_link_title"),
			link_id,
		);
		link.snapshot_launch_settings(&request.parameters());
		link.updated = now;

		Ok(link)
	}

	/// Moves a link stored under its content-item id to the id the platform now uses.
	async fn migrate_link(
		&self,
		key: &ResourceLinkKey,
		request: &LaunchRequest,
	) -> Result<Option<ResourceLink>> {
		let Some(previous) =
			request.value(CONTENT_ITEM_ID_PARAM).and_then(|raw| ResourceLinkId::new(raw).ok())
		else {
			return Ok(None);
		};

		if previous == key.link {
			return Ok(None);
		}

		let from = ResourceLinkKey::new(key.consumer.clone(), previous);

		if !self.store.rekey_resource_link(&from, &key.link).await? {
			return Ok(None);
		}

		obs::debug_event(KIND, &format_args!("Resource link {from} migrated to {key}."));

		Ok(self.store.load_resource_link(key).await?)
	}

	async fn materialize_user(
		&self,
		link: &ResourceLinkKey,
		user_id: UserId,
		request: &LaunchRequest,
		now: OffsetDateTime,
	) -> Result<User> {
		let key = UserKey::new(link.clone(), user_id);
		let mut user = match self.store.load_user(&key).await? {
			Some(user) => user,
			None => User::new(key, now),
		};

		user.set_names(
			request.value("lis_person_name_given"),
			request.value("lis_person_name_family"),
			request.value("lis_person_name_full"),
		);
		user.set_email(
			request.value("lis_person_contact_email_primary"),
			self.config.default_email.as_deref(),
		);
		user.set_roles(request.param("roles").unwrap_or_default());
		user.result_sourcedid = request.value("lis_result_sourcedid").map(str::to_owned);
		user.updated = now;

		Ok(user)
	}
}

fn shape(message: impl Into<String>) -> RejectionReason {
	RejectionReason::new(RejectionKind::Shape, message)
}

fn identity(message: impl Into<String>) -> RejectionReason {
	RejectionReason::new(RejectionKind::Identity, message)
}

fn constraint(message: impl Into<String>) -> RejectionReason {
	RejectionReason::new(RejectionKind::Constraint, message)
}

fn check_shape(request: &LaunchRequest) -> Result<Shape, RejectionReason> {
	let message_type = request
		.value("lti_message_type")
		.and_then(|raw| raw.parse::<MessageType>().ok())
		.ok_or_else(|| shape("Invalid or missing lti_message_type parameter."))?;
	let version = request
		.value("lti_version")
		.and_then(|raw| raw.parse::<LtiVersion>().ok())
		.ok_or_else(|| shape("Invalid or missing lti_version parameter."))?;
	let link_id = request
		.value("resource_link_id")
		.map(ResourceLinkId::new)
		.transpose()
		.map_err(|e| shape("Invalid resource link ID.").with_detail(e.to_string()))?;

	if message_type.requires_resource_link() && link_id.is_none() {
		return Err(shape("Missing resource link ID."));
	}

	let user_id = request
		.value("user_id")
		.map(UserId::new)
		.transpose()
		.map_err(|e| shape("Invalid user ID.").with_detail(e.to_string()))?;

	if message_type == MessageType::ContentItemSelection {
		if request.list("accept_media_types").is_empty() {
			return Err(shape("No accept_media_types found."));
		}

		let targets = request.list("accept_presentation_document_targets");

		if targets.is_empty() {
			return Err(shape("No accept_presentation_document_targets found."));
		}
		if let Some(unknown) = targets.iter().find(|t| !DOCUMENT_TARGETS.contains(&t.as_str())) {
			return Err(shape(format!(
				"Invalid value in accept_presentation_document_targets parameter: {unknown}."
			)));
		}
		if request.value("content_item_return_url").is_none() {
			return Err(shape("Missing content_item_return_url parameter."));
		}
	}

	Ok(Shape { message_type, version, link_id, user_id })
}

fn signature_failure(e: OAuthError) -> RejectionReason {
	let mut reason =
		identity("OAuth signature check failed - perhaps an incorrect secret or timestamp.")
			.with_detail(e.to_string());

	match e {
		OAuthError::ExpiredTimestamp { timestamp, server_time } => {
			reason = reason
				.with_detail(format!("timestamp: {timestamp}"))
				.with_detail(format!("current server time: {server_time}"));
		},
		OAuthError::SignatureMismatch { expected, base_string } => {
			reason = reason
				.with_detail(format!("computed signature: {expected}"))
				.with_detail(format!("base string: {base_string}"));
		},
		_ => {},
	}

	reason
}

fn check_availability(consumer: &Consumer, now: OffsetDateTime) -> Result<(), RejectionReason> {
	let message = match consumer.availability_at(now) {
		Availability::Available => return Ok(()),
		Availability::Disabled => "Tool consumer has not been enabled by the tool provider.",
		Availability::NotYetAvailable => "Tool consumer access is not yet available.",
		Availability::Expired => "Tool consumer access has expired.",
	};

	Err(RejectionReason::new(RejectionKind::Availability, message))
}

fn check_value_domains(
	request: &LaunchRequest,
	message_type: MessageType,
) -> Result<(), RejectionReason> {
	if let Some(target) = request.value("launch_presentation_document_target")
		&& !DOCUMENT_TARGETS.contains(&target)
	{
		return Err(constraint(format!(
			"Invalid value for launch_presentation_document_target parameter: {target}."
		)));
	}
	if message_type == MessageType::ContentItemSelection {
		for flag in CONTENT_ITEM_FLAGS {
			if let Some(value) = request.value(flag)
				&& value != "true"
				&& value != "false"
			{
				return Err(constraint(format!("Invalid value for {flag} parameter: {value}.")));
			}
		}
	}

	Ok(())
}

/// Return URL for error reports: the content-item URL for selections, else the launch one.
fn return_url(request: &LaunchRequest) -> Option<Url> {
	let name = match request.value("lti_message_type") {
		Some(raw) if raw == MessageType::ContentItemSelection.as_str() => "content_item_return_url",
		_ => "launch_presentation_return_url",
	};

	request.value(name).and_then(|raw| Url::parse(raw).ok())
}
