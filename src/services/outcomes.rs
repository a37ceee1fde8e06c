//! Outcomes service: read, write, and delete a user's result.
//!
//! The LTI 1.1 POX protocol is used when the link advertises `lis_outcome_service_url` and
//! the value is, or coerces to, a decimal. Otherwise the extension protocol at
//! `ext_ims_lis_basic_outcome_url` receives the value coerced to a type the platform
//! lists in `ext_ims_lis_resultvalue_sourcedids`.

// self
use crate::{
	_prelude::*,
	error::ServiceError,
	http::MessageHttpClient,
	model::{Consumer, Outcome, OutcomeType, ResourceLink, User},
	obs::OperationKind,
	services::{
		ServiceCall,
		ext::{DELETE_RESULT, READ_RESULT, UPDATE_RESULT},
		pox::{PoxOperation, PoxScore},
	},
	tool::ToolProvider,
};

const KIND: OperationKind = OperationKind::Outcomes;
const SERVICE: &str = "outcomes";
const SOURCEDID_SETTING: &str = "lis_result_sourcedid";

impl<C> ToolProvider<C>
where
	C: ?Sized + MessageHttpClient,
{
	/// Reads a result.
	///
	/// With a `user`, the user's own link supplies the service URL and its sourcedid is used;
	/// otherwise the link's `lis_result_sourcedid` setting is. Returns `None` when the call
	/// failed; a platform without a stored result yields an [`Outcome`] without a value.
	pub async fn read_outcome(
		&self,
		link: &ResourceLink,
		user: Option<&User>,
	) -> Result<Option<Outcome>> {
		self.observe_service(KIND, "read_outcome", async move {
			let link = self.outcome_link(link, user).await?;
			let consumer = self.service_consumer(&link).await?;
			let mut call = ServiceCall::new(KIND, "read_outcome");
			let result = self.read_outcome_via(&mut call, &link, &consumer, user).await;

			Ok(self.settle(call, result))
		})
		.await
	}

	/// Writes a result, coercing it to a type the platform accepts first.
	///
	/// Returns `false` without contacting the platform when the value cannot be coerced.
	pub async fn write_outcome(
		&self,
		link: &ResourceLink,
		user: Option<&User>,
		outcome: &Outcome,
	) -> Result<bool> {
		let written = self
			.observe_service(KIND, "write_outcome", async move {
				let link = self.outcome_link(link, user).await?;
				let consumer = self.service_consumer(&link).await?;
				let mut call = ServiceCall::new(KIND, "write_outcome");
				let result =
					self.write_outcome_via(&mut call, &link, &consumer, user, outcome).await;

				Ok(self.settle(call, result))
			})
			.await?;

		Ok(written.is_some())
	}

	/// Deletes a result.
	pub async fn delete_outcome(&self, link: &ResourceLink, user: Option<&User>) -> Result<bool> {
		let deleted = self
			.observe_service(KIND, "delete_outcome", async move {
				let link = self.outcome_link(link, user).await?;
				let consumer = self.service_consumer(&link).await?;
				let mut call = ServiceCall::new(KIND, "delete_outcome");
				let result = self.delete_outcome_via(&mut call, &link, &consumer, user).await;

				Ok(self.settle(call, result))
			})
			.await?;

		Ok(deleted.is_some())
	}

	/// Link whose service URLs apply: the user's own link when a user is given.
	async fn outcome_link(&self, link: &ResourceLink, user: Option<&User>) -> Result<ResourceLink> {
		match user {
			Some(user) if &user.key().link != link.key() => self
				.store
				.load_resource_link(&user.key().link)
				.await?
				.ok_or_else(|| Error::UnknownResourceLink { key: user.key().link.to_string() }),
			_ => Ok(link.clone()),
		}
	}

	async fn read_outcome_via(
		&self,
		call: &mut ServiceCall,
		link: &ResourceLink,
		consumer: &Consumer,
		user: Option<&User>,
	) -> Result<Outcome, ServiceError> {
		let sourcedid = sourcedid(link, user)?;

		if let Some(url) = link.outcomes_service_url() {
			let envelope =
				self.send_pox(call, url, PoxOperation::Read, consumer, &sourcedid, None).await?;
			let mut outcome = Outcome::empty();

			if let Some((language, value)) = envelope.result_score() {
				outcome.value = Some(value.to_owned());

				if let Some(language) = language {
					outcome.language = language.to_owned();
				}
			}

			return Ok(outcome);
		}
		if let Some(url) = link.ext_outcomes_url() {
			let response = self
				.send_ext(call, url, READ_RESULT, consumer, ext_params(sourcedid))
				.await?;
			let mut outcome = Outcome::empty();

			outcome.value = response.result_text().map(str::to_owned);

			return Ok(outcome);
		}

		Err(ServiceError::Unavailable { service: SERVICE })
	}

	async fn write_outcome_via(
		&self,
		call: &mut ServiceCall,
		link: &ResourceLink,
		consumer: &Consumer,
		user: Option<&User>,
		outcome: &Outcome,
	) -> Result<(), ServiceError> {
		if outcome.value.as_deref().is_none_or(str::is_empty) {
			return Err(ServiceError::MissingValue("outcome value"));
		}

		let sourcedid = sourcedid(link, user)?;

		if let Some(url) = link.outcomes_service_url() {
			match outcome.coerce(&[OutcomeType::Decimal]) {
				Ok(decimal) => {
					let score = PoxScore {
						language: &decimal.language,
						value: decimal.value.as_deref().unwrap_or_default(),
					};

					self.send_pox(call, url, PoxOperation::Replace, consumer, &sourcedid, Some(score))
						.await?;

					return Ok(());
				},
				Err(e) if link.ext_outcomes_url().is_none() => return Err(e.into()),
				Err(_) => {},
			}
		}

		let Some(url) = link.ext_outcomes_url() else {
			return Err(ServiceError::Unavailable { service: SERVICE });
		};
		let coerced = outcome.coerce(&link.supported_result_types())?;
		let mut params = ext_params(sourcedid);

		params.insert(
			"result_resultscore_textstring".into(),
			coerced.value.clone().unwrap_or_default(),
		);
		params.insert("result_resultvaluesourcedid".into(), coerced.kind.as_str().into());

		for (name, value) in [
			("result_resultscore_language", Some(&coerced.language)),
			("result_statusofresult", coerced.status.as_ref()),
			("result_date", coerced.date.as_ref()),
			("result_datasource", coerced.data_source.as_ref()),
		] {
			if let Some(value) = value.filter(|v| !v.is_empty()) {
				params.insert(name.into(), value.clone());
			}
		}

		self.send_ext(call, url, UPDATE_RESULT, consumer, params).await?;

		Ok(())
	}

	async fn delete_outcome_via(
		&self,
		call: &mut ServiceCall,
		link: &ResourceLink,
		consumer: &Consumer,
		user: Option<&User>,
	) -> Result<(), ServiceError> {
		let sourcedid = sourcedid(link, user)?;

		if let Some(url) = link.outcomes_service_url() {
			self.send_pox(call, url, PoxOperation::Delete, consumer, &sourcedid, None).await?;

			return Ok(());
		}
		if let Some(url) = link.ext_outcomes_url() {
			self.send_ext(call, url, DELETE_RESULT, consumer, ext_params(sourcedid)).await?;

			return Ok(());
		}

		Err(ServiceError::Unavailable { service: SERVICE })
	}
}

fn sourcedid(link: &ResourceLink, user: Option<&User>) -> Result<String, ServiceError> {
	let sourcedid = match user {
		Some(user) => user.result_sourcedid.as_deref(),
		None => link.setting(SOURCEDID_SETTING),
	};

	sourcedid
		.filter(|s| !s.is_empty())
		.map(str::to_owned)
		.ok_or(ServiceError::MissingValue("result sourcedid"))
}

fn ext_params(sourcedid: String) -> BTreeMap<String, String> {
	BTreeMap::from([("sourcedid".to_owned(), sourcedid)])
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::{ConsumerKey, ResourceLinkId, UserId},
		model::{ResourceLinkKey, UserKey},
	};

	#[test]
	fn sourcedid_prefers_the_user() {
		let now = OffsetDateTime::UNIX_EPOCH;
		let key = ResourceLinkKey::new(
			ConsumerKey::new("K1").expect("Consumer key fixture should be valid."),
			ResourceLinkId::new("R1").expect("Link id fixture should be valid."),
		);
		let mut link = ResourceLink::new(key.clone(), now);

		link.set_setting(SOURCEDID_SETTING, Some("link-sourcedid".into()));

		let mut user = User::new(
			UserKey::new(key, UserId::new("U1").expect("User id fixture should be valid.")),
			now,
		);

		assert!(matches!(
			sourcedid(&link, Some(&user)),
			Err(ServiceError::MissingValue("result sourcedid"))
		));

		user.result_sourcedid = Some("user-sourcedid".into());

		assert_eq!(sourcedid(&link, Some(&user)).ok().as_deref(), Some("user-sourcedid"));
		assert_eq!(sourcedid(&link, None).ok().as_deref(), Some("link-sourcedid"));
	}
}
