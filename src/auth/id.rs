//! Strongly typed identifiers enforced across the LTI domain.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 255;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (consumer, resource link, user).
		kind: &'static str,
	},
	/// The identifier contains control characters.
	#[error("{kind} identifier contains control characters.")]
	ContainsControl {
		/// Kind of identifier (consumer, resource link, user).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed byte count.
	#[error("{kind} identifier exceeds {max} bytes.")]
	TooLong {
		/// Kind of identifier (consumer, resource link, user).
		kind: &'static str,
		/// Maximum permitted byte count.
		max: usize,
	},
}

def_id! { ConsumerKey, "OAuth consumer key identifying a registered platform.", "Consumer" }
def_id! { ResourceLinkId, "Platform identifier of a resource link placement.", "ResourceLink" }
def_id! { UserId, "Raw platform-supplied user identifier.", "User" }

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_control) {
		return Err(IdentifierError::ContainsControl { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_validate() {
		assert!(ConsumerKey::new("").is_err(), "Empty keys must be rejected.");
		assert!(UserId::new("line\nbreak").is_err(), "Control characters must be rejected.");

		let key = ConsumerKey::new("moodle.example.edu")
			.expect("Consumer key fixture should be considered valid.");

		assert_eq!(key.as_ref(), "moodle.example.edu");
		assert!(ResourceLinkId::new("429785226").is_ok());
		assert!(UserId::new("jane doe").is_ok(), "Inner spaces are legal in platform ids.");
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let key: ConsumerKey =
			serde_json::from_str("\"K1\"").expect("Consumer key should deserialize successfully.");

		assert_eq!(key.as_ref(), "K1");
		assert!(serde_json::from_str::<ConsumerKey>("\"\"").is_err());
	}

	#[test]
	fn length_limits() {
		let exact = "a".repeat(IDENTIFIER_MAX_LEN);

		UserId::new(&exact).expect("Exact length should succeed.");

		let too_long = "a".repeat(IDENTIFIER_MAX_LEN + 1);

		assert!(matches!(UserId::new(&too_long), Err(IdentifierError::TooLong { .. })));
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let map: HashMap<ConsumerKey, u8> = HashMap::from_iter([(
			ConsumerKey::new("K1").expect("Consumer key used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("K1"), Some(&7));
	}
}
