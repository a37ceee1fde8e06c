//! Thread-safe in-memory [`DataConnector`] for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{ConsumerKey, NonceRecord, ResourceLinkId},
	model::{Consumer, ResourceLink, ResourceLinkKey, ResourceLinkShare, ShareKey, User, UserKey},
	store::{DataConnector, NonceOutcome, StoreError, StoreFuture},
};

/// Collections shared by the in-process adapters.
#[derive(Clone, Debug, Default)]
pub(crate) struct Tables {
	pub(crate) consumers: BTreeMap<ConsumerKey, Consumer>,
	pub(crate) links: BTreeMap<ResourceLinkKey, ResourceLink>,
	pub(crate) nonces: BTreeMap<(ConsumerKey, String), OffsetDateTime>,
	pub(crate) share_keys: BTreeMap<String, ShareKey>,
	pub(crate) users: BTreeMap<UserKey, User>,
}
impl Tables {
	pub(crate) fn save_consumer(&mut self, consumer: Consumer) {
		self.consumers.insert(consumer.key().clone(), consumer);
	}

	pub(crate) fn delete_consumer(&mut self, key: &ConsumerKey) -> bool {
		if self.consumers.remove(key).is_none() {
			return false;
		}

		self.nonces.retain(|(consumer, _), _| consumer != key);
		self.share_keys.retain(|_, share| share.primary.consumer != *key);
		self.users.retain(|user, _| user.link.consumer != *key);

		for link in self.links.values_mut() {
			if link.primary().is_some_and(|primary| primary.consumer == *key) {
				link.clear_share();
			}
		}

		self.links.retain(|link, _| link.consumer != *key);

		true
	}

	pub(crate) fn save_resource_link(&mut self, link: ResourceLink) -> Result<(), StoreError> {
		if !self.consumers.contains_key(link.consumer_key()) {
			return Err(StoreError::integrity(format!(
				"resource link {} references unknown consumer",
				link.key()
			)));
		}
		if let Some(primary) = link.primary()
			&& !self.links.contains_key(primary)
		{
			return Err(StoreError::integrity(format!(
				"resource link {} references missing primary {primary}",
				link.key()
			)));
		}

		self.links.insert(link.key().clone(), link);

		Ok(())
	}

	pub(crate) fn rekey_resource_link(
		&mut self,
		from: &ResourceLinkKey,
		to: &ResourceLinkId,
	) -> Result<bool, StoreError> {
		let target = ResourceLinkKey::new(from.consumer.clone(), to.clone());

		if self.links.contains_key(&target) {
			return Err(StoreError::integrity(format!("resource link {target} already exists")));
		}

		let Some(mut link) = self.links.remove(from) else {
			return Ok(false);
		};

		link.set_id(to.clone());
		self.links.insert(target.clone(), link);

		let moved = self
			.users
			.keys()
			.filter(|key| key.link == *from)
			.cloned()
			.collect::<Vec<_>>();

		for key in moved {
			if let Some(mut user) = self.users.remove(&key) {
				user.relink(target.clone());
				self.users.insert(user.key().clone(), user);
			}
		}
		for share in self.share_keys.values_mut() {
			if share.primary == *from {
				share.primary = target.clone();
			}
		}
		for link in self.links.values_mut() {
			if link.primary() == Some(from) {
				let approved = link.share_approved();

				link.share_with(target.clone(), approved)
					.map_err(|e| StoreError::integrity(e.to_string()))?;
			}
		}

		Ok(true)
	}

	pub(crate) fn delete_resource_link(&mut self, key: &ResourceLinkKey) -> bool {
		if self.links.remove(key).is_none() {
			return false;
		}

		self.share_keys.retain(|_, share| share.primary != *key);
		self.users.retain(|user, _| user.link != *key);

		for link in self.links.values_mut() {
			if link.primary() == Some(key) {
				link.clear_share();
			}
		}

		true
	}

	pub(crate) fn list_shares(&self, primary: &ResourceLinkKey) -> Vec<ResourceLinkShare> {
		self.links
			.values()
			.filter(|link| link.primary() == Some(primary))
			.map(|link| ResourceLinkShare {
				key: link.key().clone(),
				title: link.title.clone(),
				approved: link.share_approved(),
			})
			.collect()
	}

	pub(crate) fn list_users(&self, link: &ResourceLinkKey, include_shared: bool) -> Vec<User> {
		let shared = if include_shared {
			self.links
				.values()
				.filter(|l| l.primary() == Some(link) && l.is_share_approved())
				.map(|l| l.key().clone())
				.collect::<Vec<_>>()
		} else {
			Vec::new()
		};

		self.users
			.values()
			.filter(|user| user.key().link == *link || shared.contains(&user.key().link))
			.cloned()
			.collect()
	}

	pub(crate) fn consume_nonce(
		&mut self,
		record: NonceRecord,
		now: OffsetDateTime,
	) -> Result<NonceOutcome, StoreError> {
		self.nonces.retain(|_, expires_at| *expires_at > now);

		if !self.consumers.contains_key(&record.consumer_key) {
			return Err(StoreError::integrity(format!(
				"nonce references unknown consumer {}",
				record.consumer_key
			)));
		}

		let key = (record.consumer_key, record.value);

		if self.nonces.contains_key(&key) {
			return Ok(NonceOutcome::Replayed);
		}

		self.nonces.insert(key, record.expires_at);

		Ok(NonceOutcome::Fresh)
	}

	pub(crate) fn purge_share_keys(&mut self, now: OffsetDateTime) -> bool {
		let before = self.share_keys.len();

		self.share_keys.retain(|_, share| !share.is_expired_at(now));

		before != self.share_keys.len()
	}

	pub(crate) fn save_share_key(&mut self, share: ShareKey) -> Result<(), StoreError> {
		if !self.links.contains_key(&share.primary) {
			return Err(StoreError::integrity(format!(
				"share key references missing resource link {}",
				share.primary
			)));
		}

		self.share_keys.insert(share.id.clone(), share);

		Ok(())
	}

	pub(crate) fn save_user(&mut self, user: User) -> Result<(), StoreError> {
		if !self.links.contains_key(&user.key().link) {
			return Err(StoreError::integrity(format!(
				"user {} references missing resource link",
				user.key()
			)));
		}

		self.users.insert(user.key().clone(), user);

		Ok(())
	}
}

/// Thread-safe storage backend that keeps every collection in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<Tables>>);
impl MemoryStore {
	/// Number of nonces currently recorded, expired ones included until the next purge.
	pub fn nonce_count(&self) -> usize {
		self.0.read().nonces.len()
	}

	/// Number of share keys currently stored, expired ones included until the next purge.
	pub fn share_key_count(&self) -> usize {
		self.0.read().share_keys.len()
	}
}
impl DataConnector for MemoryStore {
	fn load_consumer<'a>(&'a self, key: &'a ConsumerKey) -> StoreFuture<'a, Option<Consumer>> {
		Box::pin(async move { Ok(self.0.read().consumers.get(key).cloned()) })
	}

	fn save_consumer(&self, consumer: Consumer) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.0.write().save_consumer(consumer);

			Ok(())
		})
	}

	fn delete_consumer<'a>(&'a self, key: &'a ConsumerKey) -> StoreFuture<'a, bool> {
		Box::pin(async move { Ok(self.0.write().delete_consumer(key)) })
	}

	fn list_consumers(&self) -> StoreFuture<'_, Vec<Consumer>> {
		Box::pin(async move { Ok(self.0.read().consumers.values().cloned().collect()) })
	}

	fn load_resource_link<'a>(
		&'a self,
		key: &'a ResourceLinkKey,
	) -> StoreFuture<'a, Option<ResourceLink>> {
		Box::pin(async move { Ok(self.0.read().links.get(key).cloned()) })
	}

	fn save_resource_link(&self, link: ResourceLink) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.0.write().save_resource_link(link) })
	}

	fn rekey_resource_link<'a>(
		&'a self,
		from: &'a ResourceLinkKey,
		to: &'a ResourceLinkId,
	) -> StoreFuture<'a, bool> {
		Box::pin(async move { self.0.write().rekey_resource_link(from, to) })
	}

	fn delete_resource_link<'a>(&'a self, key: &'a ResourceLinkKey) -> StoreFuture<'a, bool> {
		Box::pin(async move { Ok(self.0.write().delete_resource_link(key)) })
	}

	fn list_shares<'a>(
		&'a self,
		primary: &'a ResourceLinkKey,
	) -> StoreFuture<'a, Vec<ResourceLinkShare>> {
		Box::pin(async move { Ok(self.0.read().list_shares(primary)) })
	}

	fn list_users<'a>(
		&'a self,
		link: &'a ResourceLinkKey,
		include_shared: bool,
	) -> StoreFuture<'a, Vec<User>> {
		Box::pin(async move { Ok(self.0.read().list_users(link, include_shared)) })
	}

	fn consume_nonce(
		&self,
		record: NonceRecord,
		now: OffsetDateTime,
	) -> StoreFuture<'_, NonceOutcome> {
		Box::pin(async move { self.0.write().consume_nonce(record, now) })
	}

	fn load_share_key<'a>(
		&'a self,
		id: &'a str,
		now: OffsetDateTime,
	) -> StoreFuture<'a, Option<ShareKey>> {
		Box::pin(async move {
			let mut guard = self.0.write();

			guard.purge_share_keys(now);

			Ok(guard.share_keys.get(id).cloned())
		})
	}

	fn save_share_key(&self, key: ShareKey) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.0.write().save_share_key(key) })
	}

	fn delete_share_key<'a>(&'a self, id: &'a str) -> StoreFuture<'a, bool> {
		Box::pin(async move { Ok(self.0.write().share_keys.remove(id).is_some()) })
	}

	fn load_user<'a>(&'a self, key: &'a UserKey) -> StoreFuture<'a, Option<User>> {
		Box::pin(async move { Ok(self.0.read().users.get(key).cloned()) })
	}

	fn save_user(&self, user: User) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.0.write().save_user(user) })
	}

	fn delete_user<'a>(&'a self, key: &'a UserKey) -> StoreFuture<'a, bool> {
		Box::pin(async move { Ok(self.0.write().users.remove(key).is_some()) })
	}
}
