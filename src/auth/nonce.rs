//! Random string generation and the persisted nonce record used for replay protection.

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{_prelude::*, auth::ConsumerKey};

/// Default validity window for a consumed nonce.
pub const NONCE_LIFETIME: Duration = Duration::minutes(30);

/// Returns a random alphanumeric string of `len` characters.
pub fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

/// Nonce value seen for a consumer, kept until `expires_at` to reject replays.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceRecord {
	/// Consumer that signed the request carrying the nonce.
	pub consumer_key: ConsumerKey,
	/// Raw `oauth_nonce` value.
	pub value: String,
	/// Instant after which the value may be forgotten.
	pub expires_at: OffsetDateTime,
}
impl NonceRecord {
	/// Creates a record that stays valid for `lifetime` from `now`.
	pub fn new(
		consumer_key: ConsumerKey,
		value: impl Into<String>,
		now: OffsetDateTime,
		lifetime: Duration,
	) -> Self {
		Self { consumer_key, value: value.into(), expires_at: now + lifetime }
	}

	/// Returns `true` once the record no longer blocks replays.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn random_strings_are_alphanumeric() {
		let value = random_string(40);

		assert_eq!(value.len(), 40);
		assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
	}

	#[test]
	fn nonce_expiry_uses_window() {
		let key = ConsumerKey::new("K1").expect("Consumer key fixture should be valid.");
		let now = macros::datetime!(2025-03-01 12:00 UTC);
		let record = NonceRecord::new(key, "abc", now, NONCE_LIFETIME);

		assert_eq!(record.expires_at, macros::datetime!(2025-03-01 12:30 UTC));
		assert!(!record.is_expired_at(macros::datetime!(2025-03-01 12:29 UTC)));
		assert!(record.is_expired_at(macros::datetime!(2025-03-01 12:30 UTC)));
	}
}
