//! Launching users and their result-reporting handle.

// self
use crate::{
	_prelude::*,
	auth::UserId,
	model::{IdScope, ResourceLinkKey},
};

/// Prefix expanded onto short role names.
pub const ROLE_URN_PREFIX: &str = "urn:lti:role:ims/lis/";

const ADMIN_ROLES: [&str; 4] = [
	"urn:lti:role:ims/lis/Administrator",
	"urn:lti:sysrole:ims/lis/SysAdmin",
	"urn:lti:sysrole:ims/lis/Administrator",
	"urn:lti:instrole:ims/lis/Administrator",
];
const STAFF_ROLES: [&str; 3] = ["Instructor", "ContentDeveloper", "TeachingAssistant"];

/// Composite identifier of a user within a resource link.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserKey {
	/// Link the user launched from.
	pub link: ResourceLinkKey,
	/// Platform `user_id`.
	pub user: UserId,
}
impl UserKey {
	/// Creates a key from its parts.
	pub fn new(link: ResourceLinkKey, user: UserId) -> Self {
		Self { link, user }
	}
}
impl Display for UserKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}/{}", self.link, self.user)
	}
}

/// Platform user as seen through one resource link.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
	key: UserKey,
	/// Given name.
	pub firstname: String,
	/// Family name.
	pub lastname: String,
	/// Full display name.
	pub fullname: String,
	/// Contact email, possibly synthesised from a default domain.
	pub email: String,
	/// Role URNs.
	pub roles: Vec<String>,
	/// Group ids reported by the memberships service.
	pub groups: Vec<String>,
	/// `lis_result_sourcedid` for outcome reporting.
	pub result_sourcedid: Option<String>,
	/// Creation instant.
	pub created: OffsetDateTime,
	/// Last persisted modification.
	pub updated: OffsetDateTime,
}
impl User {
	/// Creates an unsaved user.
	pub fn new(key: UserKey, now: OffsetDateTime) -> Self {
		Self {
			key,
			firstname: String::new(),
			lastname: String::new(),
			fullname: String::new(),
			email: String::new(),
			roles: Vec::new(),
			groups: Vec::new(),
			result_sourcedid: None,
			created: now,
			updated: now,
		}
	}

	/// Composite key.
	pub fn key(&self) -> &UserKey {
		&self.key
	}

	/// Moves the user to another link after a link id migration.
	pub(crate) fn relink(&mut self, link: ResourceLinkKey) {
		self.key.link = link;
	}

	/// Raw platform user id.
	pub fn raw_id(&self) -> &UserId {
		&self.key.user
	}

	/// Derives the tool-side identity string.
	pub fn identity(&self, scope: IdScope, context_id: Option<&str>) -> String {
		scope.derive(&self.key.link.consumer, context_id, Some(&self.key.link.link), &self.key.user)
	}

	/// Fills the name fields, splitting the full name to supply missing parts.
	pub fn set_names(&mut self, first: Option<&str>, last: Option<&str>, full: Option<&str>) {
		let first = first.map(str::trim).filter(|v| !v.is_empty());
		let last = last.map(str::trim).filter(|v| !v.is_empty());
		let full = full.map(str::trim).filter(|v| !v.is_empty());
		let mut split = full.map(|f| f.splitn(2, char::is_whitespace)).into_iter().flatten();
		let split_first = split.next().filter(|v| !v.is_empty());
		let split_last = split.next().map(str::trim).filter(|v| !v.is_empty());

		self.firstname = first.or(split_first).unwrap_or("User").to_owned();
		self.lastname = match last.or(split_last) {
			Some(last) => last.to_owned(),
			None => self.key.user.to_string(),
		};
		self.fullname = match full {
			Some(full) => full.to_owned(),
			None => format!("{} {}", self.firstname, self.lastname),
		};
	}

	/// Sets the email, falling back to `default`; a default starting with `@` is a domain.
	pub fn set_email(&mut self, email: Option<&str>, default: Option<&str>) {
		let email = email.map(str::trim).filter(|v| !v.is_empty());

		self.email = match (email, default.filter(|v| !v.is_empty())) {
			(Some(email), _) => email.to_owned(),
			(None, Some(domain)) if domain.starts_with('@') => format!("{}{domain}", self.key.user),
			(None, Some(default)) => default.to_owned(),
			(None, None) => String::new(),
		};
	}

	/// Replaces the roles with a parsed comma-separated list.
	pub fn set_roles(&mut self, roles: &str) {
		self.roles = parse_roles(roles);
	}

	/// Returns `true` when the user holds `role` (short names are expanded).
	pub fn has_role(&self, role: &str) -> bool {
		let role = expand_role(role);

		self.roles.iter().any(|held| *held == role)
	}

	/// Administrator in the context or the platform.
	pub fn is_admin(&self) -> bool {
		ADMIN_ROLES.iter().any(|role| self.has_role(role))
	}

	/// Teaching or content staff.
	pub fn is_staff(&self) -> bool {
		STAFF_ROLES.iter().any(|role| self.has_role(role))
	}

	/// Learner.
	pub fn is_learner(&self) -> bool {
		self.has_role("Learner")
	}
}

/// Parses `Instructor, urn:...` into full role URNs.
pub fn parse_roles(roles: &str) -> Vec<String> {
	roles.split(',').map(str::trim).filter(|r| !r.is_empty()).map(expand_role).collect()
}

fn expand_role(role: &str) -> String {
	if role.starts_with("urn:") { role.to_owned() } else { format!("{ROLE_URN_PREFIX}{role}") }
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::auth::{ConsumerKey, ResourceLinkId};

	fn user(raw: &str) -> User {
		let link = ResourceLinkKey::new(
			ConsumerKey::new("K1").expect("Consumer key fixture should be valid."),
			ResourceLinkId::new("R1").expect("Resource link id fixture should be valid."),
		);
		let key = UserKey::new(link, UserId::new(raw).expect("User id fixture should be valid."));

		User::new(key, macros::datetime!(2025-03-01 12:00 UTC))
	}

	#[test]
	fn names_are_completed_from_full_name() {
		let mut u = user("U1");

		u.set_names(None, None, Some("Ada  King Lovelace"));

		assert_eq!(u.firstname, "Ada");
		assert_eq!(u.lastname, "King Lovelace");
		assert_eq!(u.fullname, "Ada  King Lovelace");

		u.set_names(None, None, None);

		assert_eq!(u.firstname, "User");
		assert_eq!(u.lastname, "U1");
		assert_eq!(u.fullname, "User U1");
	}

	#[test]
	fn email_defaults_to_domain() {
		let mut u = user("U1");

		u.set_email(None, Some("@school.test"));

		assert_eq!(u.email, "U1@school.test");

		u.set_email(Some("ada@lms.test"), Some("@school.test"));

		assert_eq!(u.email, "ada@lms.test");

		u.set_email(Some(" "), None);

		assert_eq!(u.email, "");
	}

	#[test]
	fn roles_expand_and_classify() {
		let mut u = user("U1");

		u.set_roles("Instructor, urn:lti:sysrole:ims/lis/SysAdmin,,Learner");

		assert_eq!(u.roles[0], "urn:lti:role:ims/lis/Instructor");
		assert!(u.is_staff());
		assert!(u.is_admin());
		assert!(u.is_learner());
		assert!(!u.has_role("TeachingAssistant"));
	}

	#[test]
	fn identity_follows_scope() {
		let u = user("U1");

		assert_eq!(u.identity(IdScope::Resource, Some("C1")), "K1:R1:U1");
		assert_eq!(u.identity(IdScope::Context, Some("C1")), "K1:C1:U1");
	}
}
