//! OAuth 1.0a HMAC signing and verification for LTI messages.
//!
//! Inbound launches are checked with [`verify_request`]; outbound service calls are signed
//! either as form parameters ([`sign_parameters`]) or, for body-hashed XML payloads, as an
//! `Authorization` header ([`sign_body`]). Only two-legged signing is supported, so the
//! HMAC key is always `encode(secret)&`.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use sha1::{Digest, Sha1};
use sha2::Sha256;
// self
use crate::{
	_prelude::*,
	auth::{ConsumerKey, ConsumerSecret, nonce},
	model::LtiVersion,
};

/// Value required in `oauth_version` when present.
pub const OAUTH_VERSION: &str = "1.0";
/// Accepted clock skew between platform and tool.
pub const DEFAULT_TIMESTAMP_TOLERANCE: Duration = Duration::seconds(300);
/// Callback sent with every outbound signed request.
pub const OAUTH_CALLBACK: &str = "about:blank";

const RFC3986: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');
const OUTBOUND_NONCE_LEN: usize = 32;

/// HMAC variants accepted in `oauth_signature_method`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureMethod {
	/// `HMAC-SHA1`, the LTI 1.x baseline.
	#[default]
	#[serde(rename = "HMAC-SHA1")]
	HmacSha1,
	/// `HMAC-SHA256`.
	#[serde(rename = "HMAC-SHA256")]
	HmacSha256,
}
impl SignatureMethod {
	/// Returns the wire value.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::HmacSha1 => "HMAC-SHA1",
			Self::HmacSha256 => "HMAC-SHA256",
		}
	}
}
impl Display for SignatureMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for SignatureMethod {
	type Err = OAuthError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"HMAC-SHA1" => Ok(Self::HmacSha1),
			"HMAC-SHA256" => Ok(Self::HmacSha256),
			_ => Err(OAuthError::UnsupportedSignatureMethod(s.to_owned())),
		}
	}
}

/// Reasons a request fails OAuth verification.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum OAuthError {
	/// `oauth_version` is present but not `1.0`.
	#[error("OAuth version {0} is not supported.")]
	UnsupportedVersion(String),
	/// Signature method is unknown or not accepted.
	#[error("Signature method {0} is not supported.")]
	UnsupportedSignatureMethod(String),
	/// A mandatory OAuth parameter is absent.
	#[error("Missing {0} parameter.")]
	MissingParameter(&'static str),
	/// `oauth_timestamp` is not an integer.
	#[error("Invalid timestamp `{0}`.")]
	InvalidTimestamp(String),
	/// `oauth_timestamp` is outside the tolerance window.
	#[error("Expired timestamp, yours {timestamp}, ours {server_time}.")]
	ExpiredTimestamp {
		/// Timestamp supplied by the caller.
		timestamp: i64,
		/// Server clock at verification.
		server_time: i64,
	},
	/// Supplied signature does not match.
	#[error("Invalid signature.")]
	SignatureMismatch {
		/// Signature computed by the tool.
		expected: String,
		/// Signature base string the tool signed.
		base_string: String,
	},
	/// HMAC key could not be initialised.
	#[error("Signing key was rejected.")]
	InvalidKey,
}

/// Verification knobs taken from the tool configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyPolicy {
	/// Accepted signature methods.
	pub methods: Vec<SignatureMethod>,
	/// Accepted clock skew.
	pub timestamp_tolerance: Duration,
}
impl Default for VerifyPolicy {
	fn default() -> Self {
		Self {
			methods: vec![SignatureMethod::HmacSha1, SignatureMethod::HmacSha256],
			timestamp_tolerance: DEFAULT_TIMESTAMP_TOLERANCE,
		}
	}
}

/// Facts extracted from a request that passed verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedRequest {
	/// `oauth_nonce`, still to be consumed against the nonce store.
	pub nonce: String,
	/// `oauth_timestamp`.
	pub timestamp: i64,
	/// Method used to sign.
	pub method: SignatureMethod,
}

/// Signing identity for outbound requests.
#[derive(Clone, Copy, Debug)]
pub struct Credentials<'a> {
	/// Consumer key sent as `oauth_consumer_key`.
	pub key: &'a ConsumerKey,
	/// Shared secret.
	pub secret: &'a ConsumerSecret,
	/// Signature method to use.
	pub method: SignatureMethod,
}

/// Percent-encodes `value` per RFC 3986 unreserved characters.
pub fn encode(value: &str) -> String {
	utf8_percent_encode(value, RFC3986).to_string()
}

/// Returns `scheme://host[:port]/path` with default ports and the query removed.
pub fn normalize_url(url: &Url) -> String {
	let mut normalized = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());

	if let Some(port) = url.port() {
		normalized.push_str(&format!(":{port}"));
	}

	normalized.push_str(url.path());

	normalized
}

/// Encodes, sorts, and joins parameters, skipping `oauth_signature`.
pub fn normalize_parameters<K, V>(params: impl IntoIterator<Item = (K, V)>) -> String
where
	K: AsRef<str>,
	V: AsRef<str>,
{
	let mut pairs = params
		.into_iter()
		.filter(|(name, _)| name.as_ref() != "oauth_signature")
		.map(|(name, value)| (encode(name.as_ref()), encode(value.as_ref())))
		.collect::<Vec<_>>();

	pairs.sort();

	pairs.into_iter().map(|(name, value)| format!("{name}={value}")).collect::<Vec<_>>().join("&")
}

/// Builds `METHOD&url&params`; query parameters of `url` are part of the signed set.
pub fn base_string<K, V>(
	method: &str,
	url: &Url,
	params: impl IntoIterator<Item = (K, V)>,
) -> String
where
	K: AsRef<str>,
	V: AsRef<str>,
{
	let mut pairs = params
		.into_iter()
		.map(|(name, value)| (name.as_ref().to_owned(), value.as_ref().to_owned()))
		.collect::<Vec<_>>();

	pairs.extend(url.query_pairs().map(|(name, value)| (name.into_owned(), value.into_owned())));

	let normalized = normalize_parameters(pairs);

	format!("{}&{}&{}", method.to_ascii_uppercase(), encode(&normalize_url(url)), encode(&normalized))
}

fn signing_key(secret: &ConsumerSecret) -> Vec<u8> {
	format!("{}&", encode(secret.expose())).into_bytes()
}

/// Signs `base` and returns the base64 signature.
pub fn sign(
	method: SignatureMethod,
	secret: &ConsumerSecret,
	base: &str,
) -> Result<String, OAuthError> {
	let key = signing_key(secret);
	let digest = match method {
		SignatureMethod::HmacSha1 => {
			let mut mac =
				<Hmac<Sha1> as Mac>::new_from_slice(&key).map_err(|_| OAuthError::InvalidKey)?;

			mac.update(base.as_bytes());
			mac.finalize().into_bytes().to_vec()
		},
		SignatureMethod::HmacSha256 => {
			let mut mac =
				<Hmac<Sha256> as Mac>::new_from_slice(&key).map_err(|_| OAuthError::InvalidKey)?;

			mac.update(base.as_bytes());
			mac.finalize().into_bytes().to_vec()
		},
	};

	Ok(STANDARD.encode(digest))
}

fn signature_matches(
	method: SignatureMethod,
	secret: &ConsumerSecret,
	base: &str,
	supplied: &str,
) -> Result<bool, OAuthError> {
	let Ok(supplied) = STANDARD.decode(supplied) else {
		return Ok(false);
	};
	let key = signing_key(secret);
	let matches = match method {
		SignatureMethod::HmacSha1 => {
			let mut mac =
				<Hmac<Sha1> as Mac>::new_from_slice(&key).map_err(|_| OAuthError::InvalidKey)?;

			mac.update(base.as_bytes());
			mac.verify_slice(&supplied).is_ok()
		},
		SignatureMethod::HmacSha256 => {
			let mut mac =
				<Hmac<Sha256> as Mac>::new_from_slice(&key).map_err(|_| OAuthError::InvalidKey)?;

			mac.update(base.as_bytes());
			mac.verify_slice(&supplied).is_ok()
		},
	};

	Ok(matches)
}

fn required<'a>(params: &'a [(String, String)], name: &'static str) -> Result<&'a str, OAuthError> {
	params
		.iter()
		.find(|(key, _)| key == name)
		.map(|(_, value)| value.as_str())
		.filter(|value| !value.is_empty())
		.ok_or(OAuthError::MissingParameter(name))
}

/// Verifies an inbound request signed with `secret`.
///
/// `params` holds the body (or header) parameters; parameters in the query string of `url`
/// are folded in by [`base_string`]. The nonce is returned unconsumed.
pub fn verify_request(
	method: &str,
	url: &Url,
	params: &[(String, String)],
	secret: &ConsumerSecret,
	policy: &VerifyPolicy,
	now: OffsetDateTime,
) -> Result<VerifiedRequest, OAuthError> {
	if let Some((_, version)) = params.iter().find(|(name, _)| name == "oauth_version")
		&& version != OAUTH_VERSION
	{
		return Err(OAuthError::UnsupportedVersion(version.clone()));
	}

	let signature_method = required(params, "oauth_signature_method")?.parse::<SignatureMethod>()?;

	if !policy.methods.contains(&signature_method) {
		return Err(OAuthError::UnsupportedSignatureMethod(signature_method.to_string()));
	}

	let raw_timestamp = required(params, "oauth_timestamp")?;
	let timestamp = raw_timestamp
		.parse::<i64>()
		.map_err(|_| OAuthError::InvalidTimestamp(raw_timestamp.to_owned()))?;
	let server_time = now.unix_timestamp();

	if (server_time - timestamp).abs() > policy.timestamp_tolerance.whole_seconds() {
		return Err(OAuthError::ExpiredTimestamp { timestamp, server_time });
	}

	let nonce = required(params, "oauth_nonce")?.to_owned();
	let supplied = required(params, "oauth_signature")?;
	let base = base_string(method, url, params.iter().map(|(k, v)| (k.as_str(), v.as_str())));

	if !signature_matches(signature_method, secret, &base, supplied)? {
		let expected = sign(signature_method, secret, &base)?;

		return Err(OAuthError::SignatureMismatch { expected, base_string: base });
	}

	Ok(VerifiedRequest { nonce, timestamp, method: signature_method })
}

fn oauth_parameters(
	credentials: &Credentials<'_>,
	now: OffsetDateTime,
) -> BTreeMap<String, String> {
	BTreeMap::from([
		("oauth_version".to_owned(), OAUTH_VERSION.to_owned()),
		("oauth_nonce".to_owned(), nonce::random_string(OUTBOUND_NONCE_LEN)),
		("oauth_timestamp".to_owned(), now.unix_timestamp().to_string()),
		("oauth_consumer_key".to_owned(), credentials.key.to_string()),
		("oauth_signature_method".to_owned(), credentials.method.as_str().to_owned()),
	])
}

fn sign_map(
	url: &Url,
	params: &mut BTreeMap<String, String>,
	credentials: &Credentials<'_>,
) -> Result<(), OAuthError> {
	let base = base_string("POST", url, params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
	let signature = sign(credentials.method, credentials.secret, &base)?;

	params.insert("oauth_signature".into(), signature);

	Ok(())
}

/// Signs an outbound form-encoded LTI message.
///
/// Adds `lti_version`, `lti_message_type`, `oauth_callback`, and the OAuth parameters,
/// signs over the union with the query parameters of `url`, then removes those query
/// parameters again so they are not duplicated in the body.
pub fn sign_parameters(
	url: &Url,
	message_type: &str,
	version: LtiVersion,
	mut params: BTreeMap<String, String>,
	credentials: &Credentials<'_>,
	now: OffsetDateTime,
) -> Result<BTreeMap<String, String>, OAuthError> {
	params.insert("lti_version".into(), version.as_str().into());
	params.insert("lti_message_type".into(), message_type.into());
	params.insert("oauth_callback".into(), OAUTH_CALLBACK.into());
	params.extend(oauth_parameters(credentials, now));
	sign_map(url, &mut params, credentials)?;

	for (name, _) in url.query_pairs() {
		params.remove(name.as_ref());
	}

	Ok(params)
}

/// Returns `base64(sha1(body))` for `oauth_body_hash`.
pub fn body_hash(body: &str) -> String {
	STANDARD.encode(Sha1::digest(body.as_bytes()))
}

/// Signs a raw request body and returns the `Authorization` header value.
pub fn sign_body(
	url: &Url,
	body: &str,
	credentials: &Credentials<'_>,
	now: OffsetDateTime,
) -> Result<String, OAuthError> {
	let mut params = oauth_parameters(credentials, now);

	params.insert("oauth_body_hash".into(), body_hash(body));
	sign_map(url, &mut params, credentials)?;

	let fields = params
		.iter()
		.filter(|(name, _)| name.starts_with("oauth"))
		.map(|(name, value)| format!("{}=\"{}\"", encode(name), encode(value)))
		.collect::<Vec<_>>();

	Ok(format!("OAuth {}", fields.join(",")))
}

/// Parses an `Authorization: OAuth ...` header into decoded parameters, dropping `realm`.
pub fn parse_authorization_header(header: &str) -> Option<Vec<(String, String)>> {
	let fields = header.trim().strip_prefix("OAuth ")?;
	let mut params = Vec::new();

	for field in fields.split(',') {
		let Some((name, value)) = field.trim().split_once('=') else {
			continue;
		};
		let name = percent_decode_str(name.trim()).decode_utf8_lossy().into_owned();

		if name == "realm" {
			continue;
		}

		let value = value.trim().trim_matches('"');

		params.push((name, percent_decode_str(value).decode_utf8_lossy().into_owned()));
	}

	Some(params)
}
