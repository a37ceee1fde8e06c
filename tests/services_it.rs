// crates.io
use httpmock::prelude::*;
// self
use lti_provider::{
	_preludet::*,
	auth::{ConsumerKey, ResourceLinkId, UserId},
	config::ToolConfig,
	model::{
		EXT_OUTCOME_URL, MEMBERSHIPS_ID, MEMBERSHIPS_URL, OUTCOME_SERVICE_URL, Outcome,
		OutcomeType, RESULT_TYPES, ResourceLink, ResourceLinkKey, TOOL_SETTING, TOOL_SETTING_ID,
		TOOL_SETTING_URL, User, UserKey,
	},
	services::MembershipOptions,
	store::{DataConnector, MemoryStore},
	tool::ReqwestToolProvider,
};

const KEY: &str = "K1";
const SECRET: &str = "service-secret";

fn pox_response(code_major: &str, body: &str) -> String {
	format!(
		"<?xml version=\"1.0\" encoding=\"UTF-8\"?>
<imsx_POXEnvelopeResponse xmlns=\"http://www.imsglobal.org/services/ltiv1p1/xsd/imsoms_v1p0\">
  <imsx_POXHeader>
    <imsx_POXResponseHeaderInfo>
      <imsx_version>V1.0</imsx_version>
      <imsx_messageIdentifier>reply-1</imsx_messageIdentifier>
      <imsx_statusInfo>
        <imsx_codeMajor>{code_major}</imsx_codeMajor>
        <imsx_severity>status</imsx_severity>
        <imsx_description>Unknown sourcedid</imsx_description>
      </imsx_statusInfo>
    </imsx_POXResponseHeaderInfo>
  </imsx_POXHeader>
  <imsx_POXBody>{body}</imsx_POXBody>
</imsx_POXEnvelopeResponse>"
	)
}

fn ext_response(code_major: &str, body: &str) -> String {
	format!(
		"<message_response>
  <lti_message_type>reply</lti_message_type>
  <statusinfo>
    <codemajor>{code_major}</codemajor>
    <severity>Status</severity>
    <codeminor>fullsuccess</codeminor>
  </statusinfo>
  {body}
</message_response>"
	)
}

fn link_key(link: &str) -> ResourceLinkKey {
	ResourceLinkKey::new(
		ConsumerKey::new(KEY).expect("Consumer key fixture should be valid."),
		ResourceLinkId::new(link).expect("Link id fixture should be valid."),
	)
}

fn user_key(user: &str) -> UserKey {
	UserKey::new(link_key("R1"), UserId::new(user).expect("User id fixture should be valid."))
}

async fn seed(
	settings: &[(&str, String)],
) -> (ReqwestToolProvider, Arc<MemoryStore>, ResourceLink, User) {
	let (tool, store) = build_reqwest_test_tool(ToolConfig::default());
	let now = OffsetDateTime::now_utc();

	register_test_consumer(&tool, KEY, SECRET).await;

	let mut link = ResourceLink::new(link_key("R1"), now);

	for (name, value) in settings {
		link.set_setting(*name, Some(value.clone()));
	}

	store.save_resource_link(link.clone()).await.expect("Link fixture should be stored.");

	let mut user = User::new(user_key("U1"), now);

	user.result_sourcedid = Some("S1".into());
	store.save_user(user.clone()).await.expect("User fixture should be stored.");

	(tool, store, link, user)
}

#[tokio::test]
async fn pox_outcomes_are_written_as_decimals() {
	let server = MockServer::start_async().await;
	let (tool, _store, link, user) = seed(&[(OUTCOME_SERVICE_URL, server.url("/pox"))]).await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/pox")
				.header("content-type", "application/xml")
				.header_exists("authorization")
				.body_includes("<replaceResultRequest>")
				.body_includes("<sourcedId>S1</sourcedId>")
				.body_includes("<textString>0.75</textString>");
			then.status(200)
				.header("content-type", "application/xml")
				.body(pox_response("success", "<replaceResultResponse/>"));
		})
		.await;
	let written = tool
		.write_outcome(&link, Some(&user), &Outcome::typed("75%", OutcomeType::Percentage))
		.await
		.expect("Outcome write should not hit a storage fault.");

	assert!(written);

	mock.assert_async().await;

	let exchange = tool.last_exchange().expect("The call should be recorded.");

	assert!(exchange.is_ok());
	assert_eq!(exchange.operation, "replaceResult");
	assert_eq!(exchange.status, Some(200));
}

#[tokio::test]
async fn pox_reads_return_the_platform_score() {
	let server = MockServer::start_async().await;
	let (tool, _store, link, user) = seed(&[(OUTCOME_SERVICE_URL, server.url("/pox"))]).await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/pox").body_includes("<readResultRequest>");
			then.status(200).header("content-type", "application/xml").body(pox_response(
				"success",
				"<readResultResponse><result><resultScore><language>en</language>\
				<textString>0.91</textString></resultScore></result></readResultResponse>",
			));
		})
		.await;
	let outcome = tool
		.read_outcome(&link, Some(&user))
		.await
		.expect("Outcome read should not hit a storage fault.")
		.expect("Outcome read should succeed.");

	assert_eq!(outcome.value.as_deref(), Some("0.91"));
	assert_eq!(outcome.language, "en");

	mock.assert_async().await;
}

#[tokio::test]
async fn pox_failures_are_recorded() {
	let server = MockServer::start_async().await;
	let (tool, _store, link, user) = seed(&[(OUTCOME_SERVICE_URL, server.url("/pox"))]).await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/pox").body_includes("<deleteResultRequest>");
			then.status(200)
				.header("content-type", "application/xml")
				.body(pox_response("failure", "<deleteResultResponse/>"));
		})
		.await;
	let deleted = tool
		.delete_outcome(&link, Some(&user))
		.await
		.expect("Outcome delete should not hit a storage fault.");

	assert!(!deleted);

	mock.assert_async().await;

	let exchange = tool.last_exchange().expect("The failed call should be recorded.");

	assert!(!exchange.is_ok());
	assert_eq!(exchange.failure.as_deref(), Some("Platform reported failure: Unknown sourcedid."));
	assert!(exchange.response_body.is_some_and(|body| body.contains("imsx_codeMajor")));
}

#[tokio::test]
async fn extension_outcomes_keep_supported_types() {
	let server = MockServer::start_async().await;
	let (tool, _store, link, user) = seed(&[
		(EXT_OUTCOME_URL, server.url("/ext")),
		(RESULT_TYPES, "decimal,ratio".into()),
	])
	.await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/ext")
				.header("content-type", "application/x-www-form-urlencoded")
				.body_includes("lti_message_type=basic-lis-updateresult")
				.body_includes("result_resultscore_textstring=3%2F4")
				.body_includes("result_resultvaluesourcedid=ratio")
				.body_includes("sourcedid=S1")
				.body_includes("oauth_signature=");
			then.status(200).body(ext_response("Success", ""));
		})
		.await;
	let written = tool
		.write_outcome(&link, Some(&user), &Outcome::typed("3/4", OutcomeType::Ratio))
		.await
		.expect("Outcome write should not hit a storage fault.");

	assert!(written);

	mock.assert_async().await;
}

#[tokio::test]
async fn links_without_outcome_services_fail_quietly() {
	let (tool, _store, link, user) = seed(&[]).await;
	let read = tool
		.read_outcome(&link, Some(&user))
		.await
		.expect("Outcome read should not hit a storage fault.");

	assert!(read.is_none());
	assert_eq!(
		tool.last_exchange().and_then(|exchange| exchange.failure),
		Some("The platform does not offer the outcomes service for this resource link.".into())
	);
}

#[tokio::test]
async fn memberships_replace_the_cached_roster() {
	let server = MockServer::start_async().await;
	let (tool, store, link, _user) = seed(&[
		(MEMBERSHIPS_URL, server.url("/memberships")),
		(MEMBERSHIPS_ID, "roster-1".into()),
	])
	.await;
	let mut stale = User::new(user_key("U9"), OffsetDateTime::now_utc());

	stale.result_sourcedid = Some("S9".into());
	store.save_user(stale).await.expect("Stale user fixture should be stored.");

	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/memberships")
				.body_includes("id=roster-1")
				.body_includes("lti_message_type=basic-lis-readmembershipsforcontextwithgroups");
			then.status(200).body(ext_response(
				"Success",
				"<memberships>
  <member>
    <user_id>U1</user_id>
    <roles>Instructor</roles>
    <person_name_full>Ada Lovelace</person_name_full>
    <lis_result_sourcedid>S1</lis_result_sourcedid>
    <groups>
      <group><id>G1</id><title>Group 1</title><set><id>GS1</id><title>Set A</title></set></group>
    </groups>
  </member>
  <member>
    <user_id>U2</user_id>
    <roles>Learner</roles>
  </member>
</memberships>",
			));
		})
		.await;
	let roster = tool
		.read_memberships(&link, MembershipOptions { with_groups: true, include_shared: false })
		.await
		.expect("Roster read should not hit a storage fault.")
		.expect("Roster read should succeed.");

	mock.assert_async().await;

	assert_eq!(roster.users.len(), 2);
	assert_eq!(roster.users[0].fullname, "Ada Lovelace");
	assert_eq!(roster.users[0].groups, vec!["G1".to_owned()]);
	assert_eq!(roster.group_sets["GS1"].groups, vec!["G1".to_owned()]);
	assert_eq!(roster.groups["G1"].set.as_deref(), Some("GS1"));

	let cached = store.list_users(link.key(), false).await.expect("Users should list.");

	assert_eq!(cached.len(), 1);
	assert_eq!(cached[0].key(), &user_key("U1"));
	assert!(cached[0].is_staff());
}

#[tokio::test]
async fn memberships_fall_back_to_the_plain_roster() {
	let server = MockServer::start_async().await;
	let (tool, _store, link, _user) = seed(&[
		(MEMBERSHIPS_URL, server.url("/memberships")),
		(MEMBERSHIPS_ID, "roster-1".into()),
	])
	.await;
	let grouped = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/memberships")
				.body_includes("lti_message_type=basic-lis-readmembershipsforcontextwithgroups");
			then.status(500).body("unsupported");
		})
		.await;
	let plain = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/memberships")
				.body_includes("lti_message_type=basic-lis-readmembershipsforcontext&");
			then.status(200).body(ext_response(
				"Success",
				"<memberships><member><user_id>U1</user_id>\
				<lis_result_sourcedid>S1</lis_result_sourcedid></member></memberships>",
			));
		})
		.await;
	let roster = tool
		.read_memberships(&link, MembershipOptions { with_groups: true, include_shared: false })
		.await
		.expect("Roster read should not hit a storage fault.")
		.expect("Plain roster should succeed.");

	grouped.assert_async().await;
	plain.assert_async().await;

	assert_eq!(roster.users.len(), 1);
	assert!(roster.groups.is_empty());
}

#[tokio::test]
async fn shared_roster_keeps_sharing_users_still_listed() {
	let server = MockServer::start_async().await;
	let (tool, store, link, _user) = seed(&[
		(MEMBERSHIPS_URL, server.url("/memberships")),
		(MEMBERSHIPS_ID, "roster-1".into()),
	])
	.await;
	let now = OffsetDateTime::now_utc();
	let mut sharing = ResourceLink::new(link_key("R2"), now);

	sharing.share_with(link.key().clone(), Some(true)).expect("Sharing fixture should be valid.");
	store.save_resource_link(sharing).await.expect("Sharing link should be stored.");

	for (id, sourcedid) in [("U1", "S21"), ("U7", "S27")] {
		let id = UserId::new(id).expect("User id fixture should be valid.");
		let mut shared = User::new(UserKey::new(link_key("R2"), id), now);

		shared.result_sourcedid = Some(sourcedid.into());
		store.save_user(shared).await.expect("Sharing user fixture should be stored.");
	}

	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/memberships")
				.body_includes("lti_message_type=basic-lis-readmembershipsforcontext&");
			then.status(200).body(ext_response(
				"Success",
				"<memberships><member><user_id>U1</user_id>\
				<lis_result_sourcedid>S1</lis_result_sourcedid></member></memberships>",
			));
		})
		.await;
	let roster = tool
		.read_memberships(&link, MembershipOptions { with_groups: false, include_shared: true })
		.await
		.expect("Roster read should not hit a storage fault.")
		.expect("Roster read should succeed.");

	mock.assert_async().await;

	assert_eq!(roster.users.len(), 1);

	let shared_ids = store
		.list_users(&link_key("R2"), false)
		.await
		.expect("Users should list.")
		.iter()
		.map(|user| user.raw_id().to_string())
		.collect::<Vec<_>>();

	assert_eq!(shared_ids, vec!["U1".to_owned()]);

	let own = store.list_users(link.key(), false).await.expect("Users should list.");

	assert_eq!(own.len(), 1);
	assert_eq!(own[0].key(), &user_key("U1"));
}

#[tokio::test]
async fn settings_are_read_written_and_deleted() {
	let server = MockServer::start_async().await;
	let (tool, store, mut link, _user) = seed(&[
		(TOOL_SETTING_URL, server.url("/setting")),
		(TOOL_SETTING_ID, "setting-1".into()),
	])
	.await;
	let load = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/setting")
				.body_includes("id=setting-1")
				.body_includes("lti_message_type=basic-lti-loadsetting");
			then.status(200)
				.body(ext_response("Success", "<setting><value>dark-mode</value></setting>"));
		})
		.await;
	let save = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/setting")
				.body_includes("lti_message_type=basic-lti-savesetting")
				.body_includes("setting=light-mode");
			then.status(200).body(ext_response("Success", ""));
		})
		.await;
	let delete = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/setting")
				.body_includes("lti_message_type=basic-lti-deletesetting");
			then.status(200).body(ext_response("Failure", ""));
		})
		.await;

	assert_eq!(
		tool.read_setting(&link).await.expect("Setting read should not fault."),
		Some("dark-mode".into())
	);
	assert!(
		tool.write_setting(&mut link, "light-mode").await.expect("Setting write should not fault.")
	);
	assert_eq!(link.setting(TOOL_SETTING), Some("light-mode"));

	let stored = store
		.load_resource_link(link.key())
		.await
		.expect("Link lookup should succeed.")
		.expect("Link should remain stored.");

	assert_eq!(stored.setting(TOOL_SETTING), Some("light-mode"));
	assert!(!tool.delete_setting(&link).await.expect("Setting delete should not fault."));

	load.assert_async().await;
	save.assert_async().await;
	delete.assert_async().await;
}
