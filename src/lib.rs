//! IMS LTI 1.x tool-provider engine: verify signed launches, reject replays, share resource
//! links across platforms, and call back into Outcomes, Memberships, and Setting services
//! over pluggable stores.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod launch;
pub mod model;
pub mod oauth;
pub mod obs;
pub mod services;
pub mod store;
pub mod tool;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{ConsumerKey, ConsumerSecret, random_string},
		config::ToolConfig,
		http::ReqwestHttpClient,
		launch::LaunchRequest,
		model::Consumer,
		oauth::{self, SignatureMethod},
		store::{DataConnector, MemoryStore},
		tool::ReqwestToolProvider,
	};

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Constructs a [`ReqwestToolProvider`] backed by an in-memory store and the reqwest
	/// transport used across integration tests.
	pub fn build_reqwest_test_tool(config: ToolConfig) -> (ReqwestToolProvider, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn DataConnector> = store_backend.clone();
		let tool = ReqwestToolProvider::with_http_client(store, config, test_reqwest_http_client());

		(tool, store_backend)
	}

	/// Registers an enabled LTI 1.0 consumer with the given key and secret.
	pub async fn register_test_consumer(
		tool: &ReqwestToolProvider,
		key: &str,
		secret: &str,
	) -> Consumer {
		let consumer = Consumer::builder(
			ConsumerKey::new(key).expect("Consumer key fixture should be valid."),
			format!("{key} platform"),
		)
		.secret(secret)
		.build()
		.expect("Consumer fixture should build.");

		tool.register_consumer(consumer.clone())
			.await
			.expect("Consumer fixture should register.");

		consumer
	}

	/// Signs `params` as a form-encoded POST to `url` the way a platform would.
	///
	/// The OAuth protocol parameters are filled in with a fresh nonce and `now` as the
	/// timestamp; query parameters of `url` are covered by the signature.
	pub fn signed_launch(
		url: &str,
		key: &str,
		secret: &str,
		params: &[(&str, &str)],
		now: OffsetDateTime,
	) -> LaunchRequest {
		let url = Url::parse(url).expect("Launch URL fixture should parse.");
		let mut signed = params
			.iter()
			.map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
			.collect::<BTreeMap<_, _>>();

		for (name, value) in [
			("oauth_consumer_key", key.to_owned()),
			("oauth_nonce", random_string(24)),
			("oauth_timestamp", now.unix_timestamp().to_string()),
			("oauth_signature_method", SignatureMethod::HmacSha1.as_str().to_owned()),
			("oauth_version", "1.0".to_owned()),
		] {
			signed.entry(name.to_owned()).or_insert(value);
		}

		let base = oauth::base_string("POST", &url, &signed);
		let signature = oauth::sign(SignatureMethod::HmacSha1, &ConsumerSecret::new(secret), &base)
			.expect("Launch signature should compute.");

		signed.insert("oauth_signature".into(), signature);

		LaunchRequest::from_pairs(url, signed)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _, tokio as _};
