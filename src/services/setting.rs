//! Tool setting service: one opaque value stored by the platform per link.

// self
use crate::{
	_prelude::*,
	error::ServiceError,
	http::MessageHttpClient,
	model::{Consumer, ResourceLink, TOOL_SETTING, TOOL_SETTING_ID},
	obs::OperationKind,
	services::{
		ServiceCall,
		ext::{DELETE_SETTING, ExtResponse, LOAD_SETTING, SAVE_SETTING},
	},
	tool::ToolProvider,
};

const KIND: OperationKind = OperationKind::Setting;

impl<C> ToolProvider<C>
where
	C: ?Sized + MessageHttpClient,
{
	/// Reads the value the platform stores for `link`.
	pub async fn read_setting(&self, link: &ResourceLink) -> Result<Option<String>> {
		self.observe_service(KIND, "read_setting", async move {
			let consumer = self.service_consumer(link).await?;
			let mut call = ServiceCall::new(KIND, LOAD_SETTING);
			let result = self
				.setting_call(&mut call, link, &consumer, LOAD_SETTING, BTreeMap::new())
				.await
				.map(|response| response.setting_value().unwrap_or_default());

			Ok(self.settle(call, result))
		})
		.await
	}

	/// Stores `value` with the platform and mirrors it in the link's settings.
	pub async fn write_setting(&self, link: &mut ResourceLink, value: &str) -> Result<bool> {
		let written = self
			.observe_service(KIND, "write_setting", async move {
				let consumer = self.service_consumer(link).await?;
				let mut call = ServiceCall::new(KIND, SAVE_SETTING);
				let params = BTreeMap::from([("setting".to_owned(), value.to_owned())]);
				let result =
					self.setting_call(&mut call, link, &consumer, SAVE_SETTING, params).await;

				if self.settle(call, result).is_none() {
					return Ok(None);
				}

				link.set_setting(TOOL_SETTING, Some(value.to_owned()));
				link.updated = OffsetDateTime::now_utc();
				self.store.save_resource_link(link.clone()).await?;

				Ok(Some(()))
			})
			.await?;

		Ok(written.is_some())
	}

	/// Deletes the value the platform stores for `link`.
	pub async fn delete_setting(&self, link: &ResourceLink) -> Result<bool> {
		let deleted = self
			.observe_service(KIND, "delete_setting", async move {
				let consumer = self.service_consumer(link).await?;
				let mut call = ServiceCall::new(KIND, DELETE_SETTING);
				let result = self
					.setting_call(&mut call, link, &consumer, DELETE_SETTING, BTreeMap::new())
					.await;

				Ok(self.settle(call, result))
			})
			.await?;

		Ok(deleted.is_some())
	}

	async fn setting_call(
		&self,
		call: &mut ServiceCall,
		link: &ResourceLink,
		consumer: &Consumer,
		message_type: &'static str,
		mut params: BTreeMap<String, String>,
	) -> Result<ExtResponse, ServiceError> {
		let Some(url) = link.setting_service_url() else {
			return Err(ServiceError::Unavailable { service: "setting" });
		};
		let Some(id) = link.setting(TOOL_SETTING_ID) else {
			return Err(ServiceError::MissingValue("setting id"));
		};

		params.insert("id".into(), id.to_owned());

		self.send_ext(call, url, message_type, consumer, params).await
	}
}
