//! The tool-provider facade shared by launches, service calls, and administration.

mod admin;

// self
use crate::{
	_prelude::*,
	config::ToolConfig,
	http::{ExchangeSlot, MessageHttpClient, ServiceExchange},
	store::DataConnector,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Tool provider specialized for the crate's default reqwest transport.
pub type ReqwestToolProvider = ToolProvider<ReqwestHttpClient>;

/// Accepts launches from registered platforms and calls back into their services.
///
/// The provider owns the store, the validated configuration, and the HTTP transport, so
/// launch authentication and the Outcomes/Memberships/Setting clients only deal with
/// protocol logic. Every outbound call is recorded in an [`ExchangeSlot`] that hosts can
/// inspect through [`ToolProvider::last_exchange`].
#[derive(Clone)]
pub struct ToolProvider<C>
where
	C: ?Sized + MessageHttpClient,
{
	/// HTTP client used for every outbound platform request.
	pub http_client: Arc<C>,
	/// Persistence backend.
	pub store: Arc<dyn DataConnector>,
	/// Validated tool configuration.
	pub config: ToolConfig,
	exchange: ExchangeSlot,
	share_guards: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}
impl<C> ToolProvider<C>
where
	C: ?Sized + MessageHttpClient,
{
	/// Creates a provider that reuses the caller-provided transport.
	pub fn with_http_client(
		store: Arc<dyn DataConnector>,
		config: ToolConfig,
		http_client: impl Into<Arc<C>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			store,
			config,
			exchange: Default::default(),
			share_guards: Default::default(),
		}
	}

	/// Returns the record of the most recent service call, if any.
	pub fn last_exchange(&self) -> Option<ServiceExchange> {
		self.exchange.last()
	}

	pub(crate) fn exchange_slot(&self) -> &ExchangeSlot {
		&self.exchange
	}

	/// Returns (and creates on demand) the redemption guard for a share key.
	pub(crate) fn share_guard(&self, share_key: &str) -> Arc<AsyncMutex<()>> {
		let mut guards = self.share_guards.lock();

		guards.entry(share_key.to_owned()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	/// Drops the guard for a share key once no redemption holds it.
	pub(crate) fn release_share_guard(&self, share_key: &str) {
		let mut guards = self.share_guards.lock();

		if guards.get(share_key).is_some_and(|guard| Arc::strong_count(guard) == 1) {
			guards.remove(share_key);
		}
	}
}
#[cfg(feature = "reqwest")]
impl ToolProvider<ReqwestHttpClient> {
	/// Creates a provider with its own reqwest-backed transport.
	pub fn new(store: Arc<dyn DataConnector>, config: ToolConfig) -> Self {
		Self::with_http_client(store, config, ReqwestHttpClient::default())
	}
}
impl<C> Debug for ToolProvider<C>
where
	C: ?Sized + MessageHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ToolProvider")
			.field("config", &self.config)
			.field("pending_share_guards", &self.share_guards.lock().len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		http::{HttpFuture, HttpMessage, HttpReply},
		store::MemoryStore,
	};

	struct NoopHttpClient;
	impl MessageHttpClient for NoopHttpClient {
		type TransportError = std::io::Error;

		fn send(&self, _: HttpMessage) -> HttpFuture<'_, HttpReply, Self::TransportError> {
			Box::pin(async { Ok(HttpReply { status: 200, body: String::new() }) })
		}
	}

	#[test]
	fn share_guards_are_shared_then_released() {
		let tool = ToolProvider::<NoopHttpClient>::with_http_client(
			Arc::new(MemoryStore::default()),
			ToolConfig::default(),
			NoopHttpClient,
		);
		let first = tool.share_guard("abcde");
		let second = tool.share_guard("abcde");

		assert!(Arc::ptr_eq(&first, &second));

		drop((first, second));
		tool.release_share_guard("abcde");

		assert_eq!(tool.share_guards.lock().len(), 0);
	}
}
