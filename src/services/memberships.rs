//! Memberships service: fetch the roster of a link and refresh the cached users.

// self
use crate::{
	_prelude::*,
	auth::UserId,
	error::ServiceError,
	http::MessageHttpClient,
	model::{MEMBERSHIPS_ID, ResourceLink, User, UserKey},
	obs::{self, OperationKind},
	services::{
		ServiceCall,
		ext::{ExtMember, READ_MEMBERSHIPS, READ_MEMBERSHIPS_WITH_GROUPS},
	},
	tool::ToolProvider,
};

const KIND: OperationKind = OperationKind::Memberships;

/// Options for [`ToolProvider::read_memberships`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MembershipOptions {
	/// Ask for group membership, falling back to a plain roster if the platform refuses.
	pub with_groups: bool,
	/// Treat users cached under links sharing into this one as part of the prior roster,
	/// so they are removed when absent from the new one.
	pub include_shared: bool,
}

/// A group set reported with the roster.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSet {
	/// Set id.
	pub id: String,
	/// Set title.
	pub title: String,
	/// Ids of the groups in the set.
	pub groups: Vec<String>,
}

/// A group reported with the roster.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
	/// Group id.
	pub id: String,
	/// Group title.
	pub title: String,
	/// Id of the set the group belongs to.
	pub set: Option<String>,
}

/// Roster returned by the platform.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Roster {
	/// Members, bound to the requesting link.
	pub users: Vec<User>,
	/// Group sets by id.
	pub group_sets: BTreeMap<String, GroupSet>,
	/// Groups by id.
	pub groups: BTreeMap<String, Group>,
}

impl<C> ToolProvider<C>
where
	C: ?Sized + MessageHttpClient,
{
	/// Fetches the roster of `link` and replaces its cached users.
	///
	/// Members with a result sourcedid are saved; cached users missing from the roster, or
	/// without a sourcedid, are deleted. Returns `None` when the call failed.
	pub async fn read_memberships(
		&self,
		link: &ResourceLink,
		options: MembershipOptions,
	) -> Result<Option<Roster>> {
		self.observe_service(KIND, "read_memberships", async move {
			let consumer = self.service_consumer(link).await?;
			let mut call = ServiceCall::new(KIND, READ_MEMBERSHIPS);
			let members = match (link.memberships_url(), link.setting(MEMBERSHIPS_ID)) {
				(None, _) => Err(ServiceError::Unavailable { service: "memberships" }),
				(_, None) => Err(ServiceError::MissingValue("memberships id")),
				(Some(url), Some(id)) => {
					let params = BTreeMap::from([("id".to_owned(), id.to_owned())]);
					let grouped = if options.with_groups {
						let reply = self
							.send_ext(
								&mut call,
								url.clone(),
								READ_MEMBERSHIPS_WITH_GROUPS,
								&consumer,
								params.clone(),
							)
							.await;

						if let Err(e) = &reply {
							obs::debug_event(
								KIND,
								&format_args!("Group roster refused, retrying without groups: {e}"),
							);
						}

						Some(reply)
					} else {
						None
					};
					let reply = match grouped {
						Some(Ok(response)) => Ok(response),
						_ => self.send_ext(&mut call, url, READ_MEMBERSHIPS, &consumer, params).await,
					};

					reply.and_then(|response| {
						response
							.memberships
							.map(|memberships| memberships.members)
							.ok_or(ServiceError::Decode { message: "missing memberships".into() })
					})
				},
			};
			let Some(members) = self.settle(call, members) else {
				return Ok(None);
			};

			Ok(Some(self.replace_roster(link, members, options).await?))
		})
		.await
	}

	async fn replace_roster(
		&self,
		link: &ResourceLink,
		members: Vec<ExtMember>,
		options: MembershipOptions,
	) -> Result<Roster> {
		let now = OffsetDateTime::now_utc();
		let prior = self.store.list_users(link.key(), options.include_shared).await?;
		let mut roster = Roster::default();

		for member in members {
			let Ok(user_id) = UserId::new(member.user_id.trim()) else {
				obs::debug_event(
					KIND,
					&format_args!("Skipping member with invalid id {:?}.", member.user_id),
				);

				continue;
			};
			let key = UserKey::new(link.key().clone(), user_id);
			let mut user = match self.store.load_user(&key).await? {
				Some(user) => user,
				None => User::new(key, now),
			};

			user.set_names(
				member.person_name_given.as_deref(),
				member.person_name_family.as_deref(),
				member.person_name_full.as_deref(),
			);
			user.set_email(
				member.person_contact_email_primary.as_deref(),
				self.config.default_email.as_deref(),
			);
			user.set_roles(member.roles.as_deref().unwrap_or_default());
			user.result_sourcedid =
				member.lis_result_sourcedid.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty());
			user.groups.clear();

			for group in member.groups.map(|groups| groups.groups).unwrap_or_default() {
				let set = group.set.map(|set| {
					let entry = roster.group_sets.entry(set.id.clone()).or_insert_with(|| GroupSet {
						id: set.id.clone(),
						title: set.title.clone().unwrap_or_default(),
						groups: Vec::new(),
					});

					if !entry.groups.contains(&group.id) {
						entry.groups.push(group.id.clone());
					}

					set.id
				});

				roster.groups.entry(group.id.clone()).or_insert_with(|| Group {
					id: group.id.clone(),
					title: group.title.clone().unwrap_or_default(),
					set,
				});
				user.groups.push(group.id);
			}

			user.updated = now;

			if user.result_sourcedid.is_some() {
				self.store.save_user(user.clone()).await?;
			} else {
				self.store.delete_user(user.key()).await?;
			}

			roster.users.push(user);
		}

		// Users of sharing links carry their own link in the key; match on the platform id.
		for stale in prior {
			let listed = roster.users.iter().any(|user| {
				user.raw_id() == stale.raw_id()
					&& user.key().link.consumer == stale.key().link.consumer
			});

			if !listed {
				self.store.delete_user(stale.key()).await?;
			}
		}

		Ok(roster)
	}
}
