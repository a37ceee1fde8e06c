// self
use lti_provider::{
	_preludet::*,
	auth::{ConsumerKey, ResourceLinkId},
	config::ToolConfig,
	launch::{LaunchOutcome, RejectionKind, SHARE_KEY_PARAM},
	model::{ResourceLinkKey, ShareKeyRequest},
	store::DataConnector,
	tool::ReqwestToolProvider,
};

const LAUNCH_URL: &str = "https://tool.test/launch";
const SECRET: &str = "shared-secret";

fn link_key(consumer: &str, link: &str) -> ResourceLinkKey {
	ResourceLinkKey::new(
		ConsumerKey::new(consumer).expect("Consumer key fixture should be valid."),
		ResourceLinkId::new(link).expect("Link id fixture should be valid."),
	)
}

async fn launch(
	tool: &ReqwestToolProvider,
	consumer: &str,
	link: &str,
	share_key: Option<&str>,
) -> LaunchOutcome {
	let mut params = vec![
		("lti_message_type", "basic-lti-launch-request"),
		("lti_version", "LTI-1p0"),
		("resource_link_id", link),
		("user_id", "U1"),
		("roles", "Learner"),
		("lis_result_sourcedid", "S1"),
	];

	if let Some(share_key) = share_key {
		params.push((SHARE_KEY_PARAM, share_key));
	}

	let request = signed_launch(LAUNCH_URL, consumer, SECRET, &params, OffsetDateTime::now_utc());

	tool.authenticate(&request).await.expect("Launch should not hit a fault.")
}

fn refusal(outcome: LaunchOutcome) -> String {
	match outcome {
		LaunchOutcome::Rejected(rejection) => {
			assert_eq!(rejection.reason.kind, RejectionKind::Sharing);

			rejection.reason.message
		},
		LaunchOutcome::Accepted(launch) => panic!("Launch should be refused, got {launch:?}."),
	}
}

async fn sharing_tool() -> (ReqwestToolProvider, Arc<lti_provider::store::MemoryStore>) {
	let config =
		ToolConfig::builder().allow_sharing(true).build().expect("Tool configuration should build.");
	let (tool, store) = build_reqwest_test_tool(config);

	register_test_consumer(&tool, "K1", SECRET).await;
	register_test_consumer(&tool, "K2", SECRET).await;

	assert!(launch(&tool, "K1", "R1", None).await.is_accepted());

	(tool, store)
}

#[tokio::test]
async fn auto_approved_keys_share_the_primary_link() {
	let (tool, store) = sharing_tool().await;
	let primary = link_key("K1", "R1");
	let share = tool
		.create_share_key(&primary, ShareKeyRequest { auto_approve: true, ..Default::default() })
		.await
		.expect("Share key should be issued for a stored link.");

	assert_eq!(share.id.len(), 32);
	assert_eq!(store.share_key_count(), 1);

	let outcome = launch(&tool, "K2", "R9", Some(&share.id)).await;
	let launch = outcome.launch().expect("Redeeming launch should be accepted.");

	assert!(launch.is_shared());
	assert_eq!(launch.resource_link.as_ref().map(|link| link.key()), Some(&primary));
	assert_eq!(launch.launched_link.as_ref().and_then(|link| link.primary()), Some(&primary));
	assert_eq!(
		launch.user.as_ref().map(|user| &user.key().link),
		Some(&link_key("K2", "R9"))
	);
	assert_eq!(store.share_key_count(), 0);

	let shares = tool.list_shares(&primary).await.expect("Shares should list.");

	assert_eq!(shares.len(), 1);
	assert_eq!(shares[0].key, link_key("K2", "R9"));
	assert_eq!(shares[0].approved, Some(true));

	let roster = store.list_users(&primary, true).await.expect("Users should list.");

	assert_eq!(roster.len(), 2);
}

#[tokio::test]
async fn pending_shares_wait_for_approval() {
	let (tool, _store) = sharing_tool().await;
	let primary = link_key("K1", "R1");
	let sharing = link_key("K2", "R9");
	let share = tool
		.create_share_key(&primary, ShareKeyRequest::default())
		.await
		.expect("Share key should be issued for a stored link.");

	assert_eq!(
		refusal(launch(&tool, "K2", "R9", Some(&share.id)).await),
		"Your share request is waiting to be approved."
	);
	assert!(tool.set_share_approval(&sharing, true).await.expect("Approval should be stored."));
	assert!(launch(&tool, "K2", "R9", Some(&share.id)).await.is_accepted());
	assert_eq!(
		refusal(launch(&tool, "K2", "R9", None).await),
		"You have not requested to share a resource link but an arrangement is currently in place."
	);
	assert!(tool.cancel_share(&sharing).await.expect("Cancellation should be stored."));
	assert!(launch(&tool, "K2", "R9", None).await.is_accepted());
	assert!(!tool.cancel_share(&sharing).await.expect("Cancellation should be stored."));
}

#[tokio::test]
async fn links_cannot_share_with_themselves() {
	let (tool, _store) = sharing_tool().await;
	let primary = link_key("K1", "R1");
	let share = tool
		.create_share_key(&primary, ShareKeyRequest { auto_approve: true, ..Default::default() })
		.await
		.expect("Share key should be issued for a stored link.");

	assert_eq!(
		refusal(launch(&tool, "K1", "R1", Some(&share.id)).await),
		"It is not possible to share your resource link with yourself."
	);
}

#[tokio::test]
async fn unknown_keys_leave_nothing_to_share() {
	let (tool, _store) = sharing_tool().await;

	assert_eq!(
		refusal(launch(&tool, "K2", "R9", Some("no-such-key")).await),
		"You have requested to share a resource link but none is available."
	);
}

#[tokio::test]
async fn sharing_can_be_switched_off() {
	let (tool, _store) = build_reqwest_test_tool(ToolConfig::default());

	register_test_consumer(&tool, "K2", SECRET).await;

	assert_eq!(
		refusal(launch(&tool, "K2", "R9", Some("abcdefgh")).await),
		"Your sharing request has been refused because sharing is not being permitted."
	);
}

#[tokio::test]
async fn share_keys_need_a_stored_link() {
	let (tool, _store) = sharing_tool().await;
	let err = tool
		.create_share_key(&link_key("K1", "missing"), ShareKeyRequest::default())
		.await
		.expect_err("Share keys for unknown links should be refused.");

	assert!(matches!(err, Error::UnknownResourceLink { .. }));
}

#[tokio::test]
async fn deleting_the_primary_consumer_releases_sharing_links() {
	let (tool, store) = sharing_tool().await;
	let primary = link_key("K1", "R1");
	let share = tool
		.create_share_key(&primary, ShareKeyRequest { auto_approve: true, ..Default::default() })
		.await
		.expect("Share key should be issued for a stored link.");

	assert!(launch(&tool, "K2", "R9", Some(&share.id)).await.is_accepted());
	assert!(
		tool.delete_consumer(&primary.consumer)
			.await
			.expect("Consumer deletion should succeed.")
	);

	let released = store
		.load_resource_link(&link_key("K2", "R9"))
		.await
		.expect("Link lookup should succeed.")
		.expect("Sharing link should survive the primary consumer.");

	assert!(released.primary().is_none());
	assert!(launch(&tool, "K2", "R9", None).await.is_accepted());
}
