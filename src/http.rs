//! Transport primitives for outbound service calls.
//!
//! The module exposes [`MessageHttpClient`] alongside [`ServiceExchange`] and
//! [`ExchangeSlot`] so hosts can plug in their own HTTP stack without losing the tool's
//! diagnostics. The tool records every service call in the slot: the request it sent, the
//! reply it got, and why it counted the call as failed.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
#[cfg(feature = "reqwest")] use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use url::form_urlencoded;
// self
use crate::_prelude::*;

/// Boxed future returned by [`MessageHttpClient::send`].
pub type HttpFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + 'a + Send>>;

/// Content type of extension-protocol requests.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
/// Content type of POX requests.
pub const XML_CONTENT_TYPE: &str = "application/xml";

/// Abstraction over HTTP transports that POST signed messages to a platform.
///
/// The transport must not retry, follow the tool's timeouts, or interpret the status: the
/// tool decides what a reply means. Implementations must be `Send + Sync + 'static` so they
/// can be shared across tool instances, and their futures must be `Send`.
pub trait MessageHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// POSTs `message` and returns the reply, whatever its status.
	fn send(&self, message: HttpMessage) -> HttpFuture<'_, HttpReply, Self::TransportError>;
}

/// Outbound POST request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpMessage {
	/// Target endpoint.
	pub url: Url,
	/// `Content-Type` header value.
	pub content_type: &'static str,
	/// `Authorization` header value, if any.
	pub authorization: Option<String>,
	/// Request body.
	pub body: String,
}
impl HttpMessage {
	/// Builds a form-encoded POST.
	pub fn form(url: Url, params: &BTreeMap<String, String>) -> Self {
		let body = form_urlencoded::Serializer::new(String::new()).extend_pairs(params).finish();

		Self { url, content_type: FORM_CONTENT_TYPE, authorization: None, body }
	}

	/// Builds an XML POST carrying an OAuth `Authorization` header.
	pub fn xml(url: Url, body: String, authorization: String) -> Self {
		Self { url, content_type: XML_CONTENT_TYPE, authorization: Some(authorization), body }
	}
}

/// Reply received from the platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpReply {
	/// HTTP status code.
	pub status: u16,
	/// Response body decoded as text.
	pub body: String,
}
impl HttpReply {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Record of the most recent service call.
///
/// Additional fields may be added in future releases, so downstream code should read fields
/// by name instead of destructuring.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceExchange {
	/// Protocol operation, for example `replaceResult` or `basic-lti-loadsetting`.
	pub operation: String,
	/// Endpoint called.
	pub url: Option<Url>,
	/// Body sent.
	pub request_body: Option<String>,
	/// HTTP status received.
	pub status: Option<u16>,
	/// Body received.
	pub response_body: Option<String>,
	/// Why the call counted as failed.
	pub failure: Option<String>,
}
impl ServiceExchange {
	/// Starts a record for `operation`.
	pub fn new(operation: impl Into<String>) -> Self {
		Self { operation: operation.into(), ..Default::default() }
	}

	/// Returns `true` when the call succeeded.
	pub fn is_ok(&self) -> bool {
		self.failure.is_none()
	}
}

/// Thread-safe slot holding the last [`ServiceExchange`].
#[derive(Clone, Debug, Default)]
pub struct ExchangeSlot(Arc<Mutex<Option<ServiceExchange>>>);
impl ExchangeSlot {
	/// Stores the exchange, replacing the previous one.
	pub fn store(&self, exchange: ServiceExchange) {
		*self.0.lock() = Some(exchange);
	}

	/// Returns the captured exchange, consuming it from the slot.
	pub fn take(&self) -> Option<ServiceExchange> {
		self.0.lock().take()
	}

	/// Returns a copy of the captured exchange.
	pub fn last(&self) -> Option<ServiceExchange> {
		self.0.lock().clone()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl MessageHttpClient for ReqwestHttpClient {
	type TransportError = ReqwestError;

	fn send(&self, message: HttpMessage) -> HttpFuture<'_, HttpReply, Self::TransportError> {
		let client = self.0.clone();

		Box::pin(async move {
			let mut request = client
				.post(message.url)
				.header(CONTENT_TYPE, message.content_type)
				.body(message.body);

			if let Some(authorization) = message.authorization {
				request = request.header(AUTHORIZATION, authorization);
			}

			let response = request.send().await?;
			let status = response.status().as_u16();
			let body = response.text().await?;

			Ok(HttpReply { status, body })
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn form_messages_are_url_encoded() {
		let url = Url::parse("https://lms.test/ext").expect("URL fixture should parse.");
		let params = BTreeMap::from([
			("id".to_owned(), "a b&c".to_owned()),
			("lti_message_type".to_owned(), "basic-lti-loadsetting".to_owned()),
		]);
		let message = HttpMessage::form(url, &params);

		assert_eq!(message.body, "id=a+b%26c&lti_message_type=basic-lti-loadsetting");
		assert_eq!(message.content_type, FORM_CONTENT_TYPE);
		assert!(message.authorization.is_none());
	}

	#[test]
	fn slot_keeps_last_exchange() {
		let slot = ExchangeSlot::default();
		let mut exchange = ServiceExchange::new("readResult");

		exchange.failure = Some("HTTP 500".into());
		slot.store(exchange);

		assert_eq!(slot.last().map(|e| e.is_ok()), Some(false));
		assert_eq!(slot.take().map(|e| e.operation), Some("readResult".into()));
		assert!(slot.take().is_none());
	}

	#[test]
	fn only_2xx_replies_succeed() {
		assert!(HttpReply { status: 204, body: String::new() }.is_success());
		assert!(!HttpReply { status: 302, body: String::new() }.is_success());
	}
}
