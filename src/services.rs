//! Outbound service clients: Outcomes, Memberships, and tool Setting.
//!
//! Every call is signed with the consumer's secret, sent once through the
//! [`MessageHttpClient`], and recorded in the provider's exchange slot. Protocol failures
//! come back as `false`/`None`; `Err` is reserved for storage faults.

pub mod memberships;
pub mod outcomes;
pub mod setting;

mod ext;
mod pox;

pub use memberships::*;

// self
use crate::{
	_prelude::*,
	auth,
	error::{ServiceError, TransportError},
	http::{HttpMessage, MessageHttpClient, ServiceExchange},
	model::{Consumer, ResourceLink},
	oauth::{self, Credentials, SignatureMethod},
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
	services::{ext::ExtResponse, pox::PoxEnvelope},
	tool::ToolProvider,
};

/// A service call in progress.
pub(crate) struct ServiceCall {
	kind: OperationKind,
	exchange: ServiceExchange,
}
impl ServiceCall {
	pub(crate) fn new(kind: OperationKind, operation: &str) -> Self {
		Self { kind, exchange: ServiceExchange::new(operation) }
	}
}

fn credentials(consumer: &Consumer) -> Credentials<'_> {
	Credentials { key: consumer.key(), secret: &consumer.secret, method: SignatureMethod::HmacSha1 }
}

impl<C> ToolProvider<C>
where
	C: ?Sized + MessageHttpClient,
{
	/// Wraps a service operation in a span and records its outcome; `None` counts as failure.
	pub(crate) async fn observe_service<T, F>(
		&self,
		kind: OperationKind,
		stage: &'static str,
		operation: F,
	) -> Result<Option<T>>
	where
		F: Future<Output = Result<Option<T>>>,
	{
		let span = OperationSpan::new(kind, stage);

		obs::record_operation_outcome(kind, OperationOutcome::Attempt);

		let result = span.instrument(operation).await;

		match &result {
			Ok(Some(_)) => obs::record_operation_outcome(kind, OperationOutcome::Success),
			Ok(None) => obs::record_operation_outcome(kind, OperationOutcome::Failure),
			Err(e) => {
				obs::warn_event(kind, e);
				obs::record_operation_outcome(kind, OperationOutcome::Failure);
			},
		}

		result
	}

	/// Loads the consumer that owns `link`.
	pub(crate) async fn service_consumer(&self, link: &ResourceLink) -> Result<Consumer> {
		self.store
			.load_consumer(link.consumer_key())
			.await?
			.ok_or_else(|| Error::UnknownConsumer { key: link.consumer_key().to_string() })
	}

	/// Records the call in the exchange slot and turns a failure into `None`.
	pub(crate) fn settle<T>(
		&self,
		mut call: ServiceCall,
		result: Result<T, ServiceError>,
	) -> Option<T> {
		let value = match result {
			Ok(value) => Some(value),
			Err(e) => {
				obs::warn_event(
					call.kind,
					&format_args!("{} call failed: {e}", call.exchange.operation),
				);
				call.exchange.failure = Some(e.to_string());

				None
			},
		};

		self.exchange_slot().store(call.exchange);

		value
	}

	async fn post(
		&self,
		call: &mut ServiceCall,
		message: HttpMessage,
	) -> Result<String, ServiceError> {
		call.exchange.url = Some(message.url.clone());
		call.exchange.request_body = Some(message.body.clone());

		let reply = self.http_client.send(message).await.map_err(TransportError::network)?;

		obs::debug_event(
			call.kind,
			&format_args!("{} answered with HTTP {}.", call.exchange.operation, reply.status),
		);
		call.exchange.status = Some(reply.status);
		call.exchange.response_body = Some(reply.body.clone());

		if !reply.is_success() {
			return Err(ServiceError::Status { status: reply.status });
		}

		Ok(reply.body)
	}

	/// Sends a form-encoded extension message and decodes the reply.
	pub(crate) async fn send_ext(
		&self,
		call: &mut ServiceCall,
		url: Url,
		message_type: &'static str,
		consumer: &Consumer,
		params: BTreeMap<String, String>,
	) -> Result<ExtResponse, ServiceError> {
		call.exchange.operation = message_type.into();

		let signed = oauth::sign_parameters(
			&url,
			message_type,
			consumer.lti_version.unwrap_or_default(),
			params,
			&credentials(consumer),
			OffsetDateTime::now_utc(),
		)?;
		let body = self.post(call, HttpMessage::form(url, &signed)).await?;

		ext::decode(&body)
	}

	/// Sends a body-signed POX envelope and decodes the reply.
	pub(crate) async fn send_pox(
		&self,
		call: &mut ServiceCall,
		url: Url,
		operation: pox::PoxOperation,
		consumer: &Consumer,
		sourcedid: &str,
		score: Option<pox::PoxScore<'_>>,
	) -> Result<PoxEnvelope, ServiceError> {
		call.exchange.operation = operation.as_str().into();

		let message_id = auth::random_string(32);
		let body = pox::request_body(operation, &message_id, sourcedid, score);
		let authorization =
			oauth::sign_body(&url, &body, &credentials(consumer), OffsetDateTime::now_utc())?;
		let reply = self.post(call, HttpMessage::xml(url, body, authorization)).await?;

		pox::decode(&reply)
	}
}
