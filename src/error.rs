//! Crate-level error types shared across launches, services, and stores.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// Launch rejections and service failures are values, not errors.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// No consumer is registered under the key.
	#[error("Consumer `{key}` is not registered.")]
	UnknownConsumer {
		/// Requested consumer key.
		key: String,
	},
	/// A consumer is already registered under the key.
	#[error("Consumer `{key}` is already registered.")]
	DuplicateConsumer {
		/// Conflicting consumer key.
		key: String,
	},
	/// The resource link is not stored.
	#[error("Resource link `{key}` does not exist.")]
	UnknownResourceLink {
		/// Requested link, rendered as `consumer/link`.
		key: String,
	},
	/// A sharing change would break the sharing invariants.
	#[error(transparent)]
	Share(#[from] crate::model::ShareError),
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Configuration file could not be read.
	#[error("Configuration file could not be read.")]
	Io(#[from] std::io::Error),
	/// Configuration document failed to deserialize.
	#[error("Configuration is invalid at `{path}`: {message}.")]
	Parse {
		/// JSON path of the offending value.
		path: String,
		/// Parser message.
		message: String,
	},
	/// Consumer registration data is invalid.
	#[error("Consumer registration is invalid.")]
	Consumer(#[from] crate::model::ConsumerBuilderError),
	/// No signature method is accepted.
	#[error("At least one signature method must be accepted.")]
	NoSignatureMethods,
	/// A duration setting is zero or negative.
	#[error("The {field} setting must be positive.")]
	NonPositiveDuration {
		/// Offending setting.
		field: &'static str,
	},
	/// A parameter constraint is malformed.
	#[error("Parameter constraint for `{name}` is invalid: {reason}.")]
	InvalidConstraint {
		/// Constrained parameter.
		name: String,
		/// What is wrong with it.
		reason: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the platform.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the platform.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Recoverable failure of an outbound service call.
///
/// Service operations report these through their `false`/`None` results and the exchange
/// slot; they never surface as [`Error`].
#[derive(Debug, ThisError)]
pub enum ServiceError {
	/// The link does not advertise the service.
	#[error("The platform does not offer the {service} service for this resource link.")]
	Unavailable {
		/// Service label.
		service: &'static str,
	},
	/// A value the request needs is missing.
	#[error("Missing {0}.")]
	MissingValue(&'static str),
	/// Outbound request could not be signed.
	#[error("Request signing failed.")]
	Signing(#[from] crate::oauth::OAuthError),
	/// Outcome cannot be expressed in a type the platform accepts.
	#[error(transparent)]
	Coercion(#[from] crate::model::CoercionError),
	/// Transport failed before a response arrived.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Platform answered with a non-success HTTP status.
	#[error("Platform responded with HTTP {status}.")]
	Status {
		/// HTTP status code.
		status: u16,
	},
	/// Response body is not the expected XML document.
	#[error("Response could not be decoded: {message}.")]
	Decode {
		/// Decoder message.
		message: String,
	},
	/// Platform reported a non-success status code.
	#[error("Platform reported {code_major}{}.", description_suffix(description))]
	Rejected {
		/// `codeMajor` value.
		code_major: String,
		/// Optional description supplied by the platform.
		description: Option<String>,
	},
}
impl From<quick_xml::DeError> for ServiceError {
	fn from(e: quick_xml::DeError) -> Self {
		Self::Decode { message: e.to_string() }
	}
}

fn description_suffix(description: &Option<String>) -> String {
	description
		.as_deref()
		.map(|d| format!(": {}", d.trim_end_matches('.')))
		.unwrap_or_default()
}
