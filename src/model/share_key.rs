//! Short-lived tokens that let one resource link share another's roster and outcomes.

// self
use crate::{_prelude::*, auth::nonce, model::ResourceLinkKey};

/// Shortest accepted share key id.
pub const SHARE_KEY_MIN_LEN: usize = 5;
/// Longest (and default) share key id.
pub const SHARE_KEY_MAX_LEN: usize = 32;
/// Lifetime applied when none is requested.
pub const SHARE_KEY_DEFAULT_LIFE_HOURS: u32 = 24;
/// Upper bound on a requested lifetime.
pub const SHARE_KEY_MAX_LIFE_HOURS: u32 = 168;

/// Parameters for issuing a share key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareKeyRequest {
	/// Requested lifetime in hours; clamped into `[0, 168]`, defaulting to 24.
	pub life_hours: Option<i64>,
	/// Approve the arrangement as soon as the key is redeemed.
	pub auto_approve: bool,
	/// Requested id length; clamped into `[5, 32]`, defaulting to 32.
	pub length: Option<usize>,
}

/// Issued share key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareKey {
	/// Token handed to the sharing platform as `custom_share_key`.
	pub id: String,
	/// Link being shared.
	pub primary: ResourceLinkKey,
	/// Approve on redemption.
	pub auto_approve: bool,
	/// Effective lifetime in hours.
	pub life_hours: u32,
	/// Instant after which the key is treated as absent.
	pub expires_at: OffsetDateTime,
}
impl ShareKey {
	/// Issues a key for `primary` with a freshly generated id.
	pub fn issue(primary: ResourceLinkKey, request: &ShareKeyRequest, now: OffsetDateTime) -> Self {
		let length = request
			.length
			.filter(|len| *len > 0)
			.map_or(SHARE_KEY_MAX_LEN, |len| len.clamp(SHARE_KEY_MIN_LEN, SHARE_KEY_MAX_LEN));
		let life_hours = clamp_life(request.life_hours);

		Self {
			id: nonce::random_string(length),
			primary,
			auto_approve: request.auto_approve,
			life_hours,
			expires_at: now + Duration::hours(life_hours.into()),
		}
	}

	/// Returns `true` once the key may no longer be redeemed.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}
}

/// Clamps a requested lifetime into the accepted range.
pub fn clamp_life(life_hours: Option<i64>) -> u32 {
	match life_hours {
		None => SHARE_KEY_DEFAULT_LIFE_HOURS,
		Some(hours) => hours.clamp(0, SHARE_KEY_MAX_LIFE_HOURS.into()) as u32,
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::auth::{ConsumerKey, ResourceLinkId};

	fn primary() -> ResourceLinkKey {
		ResourceLinkKey::new(
			ConsumerKey::new("K1").expect("Consumer key fixture should be valid."),
			ResourceLinkId::new("R1").expect("Resource link id fixture should be valid."),
		)
	}

	#[test]
	fn life_is_clamped() {
		assert_eq!(clamp_life(None), 24);
		assert_eq!(clamp_life(Some(-5)), 0);
		assert_eq!(clamp_life(Some(72)), 72);
		assert_eq!(clamp_life(Some(1_000)), 168);
	}

	#[test]
	fn issued_keys_respect_length_bounds() {
		let now = macros::datetime!(2025-03-01 12:00 UTC);
		let short = ShareKey::issue(
			primary(),
			&ShareKeyRequest { length: Some(2), ..Default::default() },
			now,
		);
		let default = ShareKey::issue(primary(), &ShareKeyRequest::default(), now);

		assert_eq!(short.id.len(), SHARE_KEY_MIN_LEN);
		assert_eq!(default.id.len(), SHARE_KEY_MAX_LEN);
		assert_eq!(default.expires_at, macros::datetime!(2025-03-02 12:00 UTC));
	}

	#[test]
	fn zero_life_expires_immediately() {
		let now = macros::datetime!(2025-03-01 12:00 UTC);
		let key = ShareKey::issue(
			primary(),
			&ShareKeyRequest { life_hours: Some(0), ..Default::default() },
			now,
		);

		assert!(key.is_expired_at(now));
	}
}
