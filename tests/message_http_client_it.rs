// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use lti_provider::{
	_preludet::*,
	http::{HttpMessage, MessageHttpClient},
};

#[tokio::test]
async fn form_messages_carry_their_content_type() -> Result<()> {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/ext")
				.header("content-type", "application/x-www-form-urlencoded")
				.body("id=a+b%26c&lti_message_type=basic-lti-loadsetting");
			then.status(200).body("<message_response/>");
		})
		.await;
	let url = Url::parse(&server.url("/ext"))?;
	let params = BTreeMap::from([
		("id".to_owned(), "a b&c".to_owned()),
		("lti_message_type".to_owned(), "basic-lti-loadsetting".to_owned()),
	]);
	let reply = test_reqwest_http_client().send(HttpMessage::form(url, &params)).await?;

	assert!(reply.is_success());
	assert_eq!(reply.body, "<message_response/>");

	mock.assert_async().await;

	Ok(())
}

#[tokio::test]
async fn xml_messages_carry_the_authorization_header() -> Result<()> {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/pox")
				.header("content-type", "application/xml")
				.header("authorization", "OAuth oauth_version=\"1.0\"")
				.body("<envelope/>");
			then.status(503).body("busy");
		})
		.await;
	let url = Url::parse(&server.url("/pox"))?;
	let reply = test_reqwest_http_client()
		.send(HttpMessage::xml(url, "<envelope/>".into(), "OAuth oauth_version=\"1.0\"".into()))
		.await
		.expect("Non-2xx replies should still be returned.");

	assert!(!reply.is_success());
	assert_eq!(reply.status, 503);
	assert_eq!(reply.body, "busy");

	mock.assert_async().await;

	Ok(())
}
