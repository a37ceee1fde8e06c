//! Consumer registration and share administration.
//!
//! These calls back the tool's own management screens: registering platforms, issuing
//! share keys for a primary link, and approving or cancelling the links that share into
//! it. Each call runs in an `administration` span and records its outcome.

// self
use crate::{
	_prelude::*,
	auth::ConsumerKey,
	http::MessageHttpClient,
	model::{Consumer, ResourceLink, ResourceLinkKey, ResourceLinkShare, ShareKey, ShareKeyRequest},
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
	tool::ToolProvider,
};

const KIND: OperationKind = OperationKind::Administration;

impl<C> ToolProvider<C>
where
	C: ?Sized + MessageHttpClient,
{
	/// Registers a new consumer; an existing key is rejected.
	pub async fn register_consumer(&self, consumer: Consumer) -> Result<()> {
		observe("register_consumer", async move {
			if self.store.load_consumer(consumer.key()).await?.is_some() {
				return Err(Error::DuplicateConsumer { key: consumer.key().to_string() });
			}

			self.store.save_consumer(consumer).await?;

			Ok(())
		})
		.await
	}

	/// Replaces a registered consumer, for example after editing its enable window.
	pub async fn update_consumer(&self, consumer: Consumer) -> Result<()> {
		observe("update_consumer", async move {
			if self.store.load_consumer(consumer.key()).await?.is_none() {
				return Err(Error::UnknownConsumer { key: consumer.key().to_string() });
			}

			self.store.save_consumer(consumer).await?;

			Ok(())
		})
		.await
	}

	/// Loads a registered consumer.
	pub async fn consumer(&self, key: &ConsumerKey) -> Result<Option<Consumer>> {
		Ok(self.store.load_consumer(key).await?)
	}

	/// Lists every registered consumer.
	pub async fn consumers(&self) -> Result<Vec<Consumer>> {
		Ok(self.store.list_consumers().await?)
	}

	/// Deletes a consumer and everything stored under it.
	pub async fn delete_consumer(&self, key: &ConsumerKey) -> Result<bool> {
		observe("delete_consumer", async move { Ok(self.store.delete_consumer(key).await?) }).await
	}

	/// Issues a share key that lets another link share into `primary`.
	pub async fn create_share_key(
		&self,
		primary: &ResourceLinkKey,
		request: ShareKeyRequest,
	) -> Result<ShareKey> {
		observe("create_share_key", async move {
			self.require_link(primary).await?;

			let key = ShareKey::issue(primary.clone(), &request, OffsetDateTime::now_utc());

			self.store.save_share_key(key.clone()).await?;

			Ok(key)
		})
		.await
	}

	/// Lists the links sharing into `primary`.
	pub async fn list_shares(&self, primary: &ResourceLinkKey) -> Result<Vec<ResourceLinkShare>> {
		Ok(self.store.list_shares(primary).await?)
	}

	/// Approves or suspends a sharing link.
	///
	/// Returns `false` when the link does not share into another link.
	pub async fn set_share_approval(&self, link: &ResourceLinkKey, approved: bool) -> Result<bool> {
		observe("set_share_approval", async move {
			let mut stored = self.require_link(link).await?;

			if stored.primary().is_none() {
				return Ok(false);
			}

			stored.set_share_approved(Some(approved));
			stored.updated = OffsetDateTime::now_utc();
			self.store.save_resource_link(stored).await?;

			Ok(true)
		})
		.await
	}

	/// Ends a sharing arrangement; the link launches on its own again.
	pub async fn cancel_share(&self, link: &ResourceLinkKey) -> Result<bool> {
		observe("cancel_share", async move {
			let mut stored = self.require_link(link).await?;

			if stored.primary().is_none() {
				return Ok(false);
			}

			stored.clear_share();
			stored.updated = OffsetDateTime::now_utc();
			self.store.save_resource_link(stored).await?;

			Ok(true)
		})
		.await
	}

	async fn require_link(&self, key: &ResourceLinkKey) -> Result<ResourceLink> {
		self.store
			.load_resource_link(key)
			.await?
			.ok_or_else(|| Error::UnknownResourceLink { key: key.to_string() })
	}
}

async fn observe<T, F>(stage: &'static str, operation: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	let span = OperationSpan::new(KIND, stage);

	obs::record_operation_outcome(KIND, OperationOutcome::Attempt);

	let result = span.instrument(operation).await;

	match &result {
		Ok(_) => obs::record_operation_outcome(KIND, OperationOutcome::Success),
		Err(e) => {
			obs::warn_event(KIND, e);
			obs::record_operation_outcome(KIND, OperationOutcome::Failure);
		},
	}

	result
}
