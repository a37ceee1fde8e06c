//! Immutable inbound launch request.

// crates.io
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	model::{LtiVersion, PlatformReport},
	oauth,
};

/// Inbound launch parameters with the method and URL they were posted to.
///
/// The request owns its parameters; nothing is read from ambient state. OAuth parameters
/// may arrive in the body or in an `Authorization: OAuth ...` header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchRequest {
	method: String,
	url: Url,
	params: Vec<(String, String)>,
	header_params: Vec<(String, String)>,
}
impl LaunchRequest {
	/// Creates a request from its method, URL, and body parameters.
	pub fn new<K, V>(
		method: impl Into<String>,
		url: Url,
		params: impl IntoIterator<Item = (K, V)>,
	) -> Self
	where
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			method: method.into().to_ascii_uppercase(),
			url,
			params: params.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
			header_params: Vec::new(),
		}
	}

	/// Creates a `POST` request from parameter pairs.
	pub fn from_pairs<K, V>(url: Url, params: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<String>,
	{
		Self::new("POST", url, params)
	}

	/// Creates a `POST` request from an `application/x-www-form-urlencoded` body.
	pub fn from_form_body(url: Url, body: &str) -> Self {
		Self::from_pairs(url, form_urlencoded::parse(body.as_bytes()).into_owned())
	}

	/// Attaches the OAuth parameters carried by an `Authorization` header.
	///
	/// Headers that are not OAuth headers are ignored.
	pub fn with_authorization(mut self, header: &str) -> Self {
		if let Some(params) = oauth::parse_authorization_header(header) {
			self.header_params = params;
		}

		self
	}

	/// HTTP method, upper-cased.
	pub fn method(&self) -> &str {
		&self.method
	}

	/// URL the launch was posted to.
	pub fn url(&self) -> &Url {
		&self.url
	}

	/// Returns the first value of `name`, looking at body parameters before header ones.
	pub fn param(&self, name: &str) -> Option<&str> {
		self.params
			.iter()
			.chain(&self.header_params)
			.find(|(key, _)| key == name)
			.map(|(_, value)| value.as_str())
	}

	/// Returns the trimmed value of `name` unless it is blank.
	pub fn value(&self, name: &str) -> Option<&str> {
		self.param(name).map(str::trim).filter(|value| !value.is_empty())
	}

	/// Returns `true` when `name` was sent, even with an empty value.
	pub fn contains(&self, name: &str) -> bool {
		self.param(name).is_some()
	}

	/// Every parameter covered by the OAuth signature, header parameters included.
	pub fn signed_parameters(&self) -> Vec<(String, String)> {
		self.params.iter().chain(&self.header_params).cloned().collect()
	}

	/// Body parameters keyed by name; the first occurrence of a repeated name wins.
	pub fn parameters(&self) -> BTreeMap<String, String> {
		let mut map = BTreeMap::new();

		for (name, value) in &self.params {
			map.entry(name.clone()).or_insert_with(|| value.clone());
		}

		map
	}

	/// Splits a comma-separated parameter into trimmed, non-empty items.
	pub fn list(&self, name: &str) -> Vec<String> {
		self.param(name)
			.map(|raw| {
				raw.split(',').map(str::trim).filter(|v| !v.is_empty()).map(str::to_owned).collect()
			})
			.unwrap_or_default()
	}

	/// Extracts the platform's self-description.
	pub fn platform_report(&self, version: LtiVersion) -> PlatformReport {
		let product_version = match (
			self.value("tool_consumer_info_product_family_code"),
			self.value("tool_consumer_info_version"),
		) {
			(Some(family), Some(version)) => Some(format!("{family}-{version}")),
			(Some(family), None) => Some(family.to_owned()),
			_ => self.value("ext_lms").map(str::to_owned),
		};

		PlatformReport {
			lti_version: version,
			instance_name: self.value("tool_consumer_instance_name").map(str::to_owned),
			product_version,
			instance_guid: self.value("tool_consumer_instance_guid").map(str::to_owned),
			css_url: self
				.value("launch_presentation_css_url")
				.or_else(|| self.value("ext_launch_presentation_css_url"))
				.map(str::to_owned),
		}
	}
}
