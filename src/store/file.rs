//! File-backed [`DataConnector`] for single-node deployments.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{ConsumerKey, NonceRecord, ResourceLinkId},
	model::{Consumer, ResourceLink, ResourceLinkKey, ResourceLinkShare, ShareKey, User, UserKey},
	store::{DataConnector, NonceOutcome, StoreError, StoreFuture, memory::Tables},
};

/// On-disk layout: one array per collection.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
	#[serde(default)]
	consumers: Vec<Consumer>,
	#[serde(default)]
	resource_links: Vec<ResourceLink>,
	#[serde(default)]
	nonces: Vec<NonceRecord>,
	#[serde(default)]
	share_keys: Vec<ShareKey>,
	#[serde(default)]
	users: Vec<User>,
}
impl From<Snapshot> for Tables {
	fn from(snapshot: Snapshot) -> Self {
		Self {
			consumers: snapshot.consumers.into_iter().map(|c| (c.key().clone(), c)).collect(),
			links: snapshot.resource_links.into_iter().map(|l| (l.key().clone(), l)).collect(),
			nonces: snapshot
				.nonces
				.into_iter()
				.map(|n| ((n.consumer_key, n.value), n.expires_at))
				.collect(),
			share_keys: snapshot.share_keys.into_iter().map(|s| (s.id.clone(), s)).collect(),
			users: snapshot.users.into_iter().map(|u| (u.key().clone(), u)).collect(),
		}
	}
}
impl From<&Tables> for Snapshot {
	fn from(tables: &Tables) -> Self {
		Self {
			consumers: tables.consumers.values().cloned().collect(),
			resource_links: tables.links.values().cloned().collect(),
			nonces: tables
				.nonces
				.iter()
				.map(|((consumer_key, value), expires_at)| NonceRecord {
					consumer_key: consumer_key.clone(),
					value: value.clone(),
					expires_at: *expires_at,
				})
				.collect(),
			share_keys: tables.share_keys.values().cloned().collect(),
			users: tables.users.values().cloned().collect(),
		}
	}
}

/// Persists every collection to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Tables>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let tables = Self::load_snapshot(&path)?.into();

		Ok(Self { path, inner: Arc::new(RwLock::new(tables)) })
	}

	/// Location of the snapshot file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<Snapshot, StoreError> {
		if !path.exists() {
			return Ok(Snapshot::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(Snapshot::default());
		}

		let mut deserializer = serde_json::Deserializer::from_slice(&bytes);

		serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
			StoreError::Serialization {
				message: format!("Failed to parse {} at `{}`: {}", path.display(), e.path(), e.inner()),
			}
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, tables: &Tables) -> Result<(), StoreError> {
		let serialized = serde_json::to_vec_pretty(&Snapshot::from(tables)).map_err(|e| {
			StoreError::Serialization { message: format!("Failed to serialize store snapshot: {e}") }
		})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn mutate<T>(
		&self,
		f: impl FnOnce(&mut Tables) -> Result<T, StoreError>,
	) -> Result<T, StoreError> {
		let mut guard = self.inner.write();
		let value = f(&mut guard)?;

		self.persist_locked(&guard)?;

		Ok(value)
	}
}
impl DataConnector for FileStore {
	fn load_consumer<'a>(&'a self, key: &'a ConsumerKey) -> StoreFuture<'a, Option<Consumer>> {
		Box::pin(async move { Ok(self.inner.read().consumers.get(key).cloned()) })
	}

	fn save_consumer(&self, consumer: Consumer) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.mutate(|tables| {
				tables.save_consumer(consumer);

				Ok(())
			})
		})
	}

	fn delete_consumer<'a>(&'a self, key: &'a ConsumerKey) -> StoreFuture<'a, bool> {
		Box::pin(async move { self.mutate(|tables| Ok(tables.delete_consumer(key))) })
	}

	fn list_consumers(&self) -> StoreFuture<'_, Vec<Consumer>> {
		Box::pin(async move { Ok(self.inner.read().consumers.values().cloned().collect()) })
	}

	fn load_resource_link<'a>(
		&'a self,
		key: &'a ResourceLinkKey,
	) -> StoreFuture<'a, Option<ResourceLink>> {
		Box::pin(async move { Ok(self.inner.read().links.get(key).cloned()) })
	}

	fn save_resource_link(&self, link: ResourceLink) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.mutate(|tables| tables.save_resource_link(link)) })
	}

	fn rekey_resource_link<'a>(
		&'a self,
		from: &'a ResourceLinkKey,
		to: &'a ResourceLinkId,
	) -> StoreFuture<'a, bool> {
		Box::pin(async move { self.mutate(|tables| tables.rekey_resource_link(from, to)) })
	}

	fn delete_resource_link<'a>(&'a self, key: &'a ResourceLinkKey) -> StoreFuture<'a, bool> {
		Box::pin(async move { self.mutate(|tables| Ok(tables.delete_resource_link(key))) })
	}

	fn list_shares<'a>(
		&'a self,
		primary: &'a ResourceLinkKey,
	) -> StoreFuture<'a, Vec<ResourceLinkShare>> {
		Box::pin(async move { Ok(self.inner.read().list_shares(primary)) })
	}

	fn list_users<'a>(
		&'a self,
		link: &'a ResourceLinkKey,
		include_shared: bool,
	) -> StoreFuture<'a, Vec<User>> {
		Box::pin(async move { Ok(self.inner.read().list_users(link, include_shared)) })
	}

	fn consume_nonce(
		&self,
		record: NonceRecord,
		now: OffsetDateTime,
	) -> StoreFuture<'_, NonceOutcome> {
		Box::pin(async move { self.mutate(|tables| tables.consume_nonce(record, now)) })
	}

	fn load_share_key<'a>(
		&'a self,
		id: &'a str,
		now: OffsetDateTime,
	) -> StoreFuture<'a, Option<ShareKey>> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			if guard.purge_share_keys(now) {
				self.persist_locked(&guard)?;
			}

			Ok(guard.share_keys.get(id).cloned())
		})
	}

	fn save_share_key(&self, key: ShareKey) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.mutate(|tables| tables.save_share_key(key)) })
	}

	fn delete_share_key<'a>(&'a self, id: &'a str) -> StoreFuture<'a, bool> {
		Box::pin(async move { self.mutate(|tables| Ok(tables.share_keys.remove(id).is_some())) })
	}

	fn load_user<'a>(&'a self, key: &'a UserKey) -> StoreFuture<'a, Option<User>> {
		Box::pin(async move { Ok(self.inner.read().users.get(key).cloned()) })
	}

	fn save_user(&self, user: User) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.mutate(|tables| tables.save_user(user)) })
	}

	fn delete_user<'a>(&'a self, key: &'a UserKey) -> StoreFuture<'a, bool> {
		Box::pin(async move { self.mutate(|tables| Ok(tables.users.remove(key).is_some())) })
	}
}
