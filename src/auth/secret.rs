//! Consumer secret wrapper that redacts sensitive material.

// self
use crate::{_prelude::*, auth::nonce};

const GENERATED_SECRET_LEN: usize = 32;

/// Shared signing secret for a platform; redacted in `Debug` and `Display` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerSecret(String);
impl ConsumerSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Generates a random alphanumeric secret suitable for a new registration.
	pub fn generate() -> Self {
		Self(nonce::random_string(GENERATED_SECRET_LEN))
	}

	/// Returns the inner secret value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for ConsumerSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for ConsumerSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ConsumerSecret").field(&"<redacted>").finish()
	}
}
impl Display for ConsumerSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
