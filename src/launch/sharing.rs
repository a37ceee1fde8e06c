//! Resolution of resource-link sharing during a launch.
//!
//! A link either launches on its own, redeems a share key to start sharing into a primary
//! link, or keeps using an approved arrangement. While an arrangement is in effect the
//! primary link becomes the effective link of the launch.

// self
use crate::{
	_prelude::*,
	http::MessageHttpClient,
	launch::{LaunchRequest, RejectionKind, RejectionReason},
	model::{ResourceLink, SHARE_KEY_MAX_LEN, SHARE_KEY_MIN_LEN},
	tool::ToolProvider,
};

/// Launch parameter carrying a share key.
pub const SHARE_KEY_PARAM: &str = "custom_share_key";

/// Outcome of a successful resolution.
pub(crate) struct Sharing {
	/// Link the launch operates on.
	pub(crate) effective: ResourceLink,
	/// The launched link was already persisted during resolution.
	pub(crate) launched_saved: bool,
}

fn refused(message: &str) -> RejectionReason {
	RejectionReason::new(RejectionKind::Sharing, message)
}

impl<C> ToolProvider<C>
where
	C: ?Sized + MessageHttpClient,
{
	pub(crate) async fn resolve_sharing(
		&self,
		request: &LaunchRequest,
		link: &mut ResourceLink,
		now: OffsetDateTime,
	) -> Result<Result<Sharing, RejectionReason>> {
		let Some(share_key) = request.value(SHARE_KEY_PARAM) else {
			if link.primary().is_some() {
				return Ok(Err(refused(
					"You have not requested to share a resource link but an arrangement is currently in place.",
				)));
			}

			return Ok(Ok(Sharing { effective: link.clone(), launched_saved: false }));
		};

		if !self.config.allow_sharing {
			return Ok(Err(refused(
				"Your sharing request has been refused because sharing is not being permitted.",
			)));
		}

		let guard = self.share_guard(share_key);
		let redeemed = {
			let _redeeming = guard.lock().await;

			self.redeem_share_key(share_key, link, now).await
		};

		drop(guard);
		self.release_share_guard(share_key);

		let launched_saved = match redeemed? {
			Ok(saved) => saved,
			Err(reason) => return Ok(Err(reason)),
		};
		let Some(primary) = link.primary().cloned() else {
			return Ok(Err(refused(
				"You have requested to share a resource link but none is available.",
			)));
		};

		if !link.is_share_approved() {
			return Ok(Err(refused("Your share request is waiting to be approved.")));
		}

		let Some(effective) = self.store.load_resource_link(&primary).await? else {
			return Ok(Err(refused("Unable to load resource link being shared.")));
		};

		if !launched_saved {
			link.updated = now;
			self.store.save_resource_link(link.clone()).await?;
		}

		Ok(Ok(Sharing { effective, launched_saved: true }))
	}

	/// Rebinds `link` to the key's primary link when the key is valid.
	///
	/// Returns whether `link` was saved. An unknown or expired key leaves the link as it is.
	async fn redeem_share_key(
		&self,
		share_key: &str,
		link: &mut ResourceLink,
		now: OffsetDateTime,
	) -> Result<Result<bool, RejectionReason>> {
		if !(SHARE_KEY_MIN_LEN..=SHARE_KEY_MAX_LEN).contains(&share_key.len()) {
			return Ok(Ok(false));
		}

		let Some(key) = self.store.load_share_key(share_key, now).await? else {
			return Ok(Ok(false));
		};

		if &key.primary == link.key() {
			return Ok(Err(refused("It is not possible to share your resource link with yourself.")));
		}
		if self.store.load_resource_link(&key.primary).await?.is_none() {
			return Ok(Err(refused("Unable to load resource link being shared.")));
		}

		link.share_with(key.primary.clone(), Some(key.auto_approve))?;
		link.updated = now;
		self.store.save_resource_link(link.clone()).await?;
		self.store.delete_share_key(&key.id).await?;

		Ok(Ok(true))
	}
}
