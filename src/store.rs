//! Persistence contract for consumers, resource links, users, nonces, and share keys, plus
//! the built-in adapters.

pub mod file;
pub mod memory;
#[cfg(feature = "sqlite")] pub mod sqlite;

pub use file::FileStore;
pub use memory::MemoryStore;
#[cfg(feature = "sqlite")] pub use sqlite::SqliteStore;

// self
use crate::{
	_prelude::*,
	auth::{ConsumerKey, NonceRecord, ResourceLinkId},
	model::{Consumer, ResourceLink, ResourceLinkKey, ResourceLinkShare, ShareKey, User, UserKey},
};

/// Boxed future returned by every [`DataConnector`] operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract used by the tool.
///
/// Writes are last-writer-wins. The only operation that must be atomic is
/// [`DataConnector::consume_nonce`]: two concurrent calls with the same consumer and value
/// must not both report [`NonceOutcome::Fresh`].
pub trait DataConnector
where
	Self: Send + Sync,
{
	/// Loads a consumer by key.
	fn load_consumer<'a>(&'a self, key: &'a ConsumerKey) -> StoreFuture<'a, Option<Consumer>>;

	/// Inserts or replaces a consumer.
	fn save_consumer(&self, consumer: Consumer) -> StoreFuture<'_, ()>;

	/// Deletes a consumer with its nonces, share keys, users, and links.
	///
	/// Links of other consumers that share one of the deleted links lose their pointer.
	fn delete_consumer<'a>(&'a self, key: &'a ConsumerKey) -> StoreFuture<'a, bool>;

	/// Lists every consumer ordered by key.
	fn list_consumers(&self) -> StoreFuture<'_, Vec<Consumer>>;

	/// Loads a resource link.
	fn load_resource_link<'a>(
		&'a self,
		key: &'a ResourceLinkKey,
	) -> StoreFuture<'a, Option<ResourceLink>>;

	/// Inserts or replaces a resource link.
	///
	/// Fails with [`StoreError::Integrity`] when the consumer is unknown or the primary
	/// pointer references a missing link.
	fn save_resource_link(&self, link: ResourceLink) -> StoreFuture<'_, ()>;

	/// Moves a stored link to a new platform id together with its users, share keys, and
	/// the pointers of links sharing it. Returns `false` when `from` is not stored.
	fn rekey_resource_link<'a>(
		&'a self,
		from: &'a ResourceLinkKey,
		to: &'a ResourceLinkId,
	) -> StoreFuture<'a, bool>;

	/// Deletes a link with its share keys and users, clearing pointers of links sharing it.
	fn delete_resource_link<'a>(&'a self, key: &'a ResourceLinkKey) -> StoreFuture<'a, bool>;

	/// Lists links whose primary pointer references `primary`.
	fn list_shares<'a>(
		&'a self,
		primary: &'a ResourceLinkKey,
	) -> StoreFuture<'a, Vec<ResourceLinkShare>>;

	/// Lists users of `link`; with `include_shared`, users of approved sharing links too.
	fn list_users<'a>(
		&'a self,
		link: &'a ResourceLinkKey,
		include_shared: bool,
	) -> StoreFuture<'a, Vec<User>>;

	/// Purges expired nonces, then records `record` unless the value is already present.
	fn consume_nonce(&self, record: NonceRecord, now: OffsetDateTime)
	-> StoreFuture<'_, NonceOutcome>;

	/// Purges expired share keys, then loads `id`.
	fn load_share_key<'a>(
		&'a self,
		id: &'a str,
		now: OffsetDateTime,
	) -> StoreFuture<'a, Option<ShareKey>>;

	/// Stores a newly issued share key.
	fn save_share_key(&self, key: ShareKey) -> StoreFuture<'_, ()>;

	/// Deletes a share key.
	fn delete_share_key<'a>(&'a self, id: &'a str) -> StoreFuture<'a, bool>;

	/// Loads a user.
	fn load_user<'a>(&'a self, key: &'a UserKey) -> StoreFuture<'a, Option<User>>;

	/// Inserts or replaces a user; the link must be stored.
	fn save_user(&self, user: User) -> StoreFuture<'_, ()>;

	/// Deletes a user.
	fn delete_user<'a>(&'a self, key: &'a UserKey) -> StoreFuture<'a, bool>;
}

/// Result of an atomic nonce check-and-insert.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NonceOutcome {
	/// The value was unseen and is now recorded.
	Fresh,
	/// The value is still recorded from an earlier request.
	Replayed,
}

/// Error type produced by [`DataConnector`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// A write would break a reference between collections.
	#[error("Integrity violation: {message}.")]
	Integrity {
		/// Human-readable error payload.
		message: String,
	},
}
impl StoreError {
	pub(crate) fn integrity(message: impl Into<String>) -> Self {
		Self::Integrity { message: message.into() }
	}
}
