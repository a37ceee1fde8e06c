//! LTI 1.1 Outcomes POX envelopes.

// crates.io
use quick_xml::escape::escape;
// self
use crate::{_prelude::*, error::ServiceError};

const POX_NAMESPACE: &str = "http://www.imsglobal.org/services/ltiv1p1/xsd/imsoms_v1p0";
const POX_VERSION: &str = "V1.0";

/// POX result operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PoxOperation {
	Read,
	Replace,
	Delete,
}
impl PoxOperation {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Read => "readResult",
			Self::Replace => "replaceResult",
			Self::Delete => "deleteResult",
		}
	}
}

/// Score carried by `replaceResult`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PoxScore<'a> {
	pub(crate) language: &'a str,
	pub(crate) value: &'a str,
}

/// Renders a request envelope.
pub(crate) fn request_body(
	operation: PoxOperation,
	message_id: &str,
	sourcedid: &str,
	score: Option<PoxScore<'_>>,
) -> String {
	let result = score
		.map(|score| {
			format!(
				"<result><resultScore><language>{}</language>\
				<textString>{}</textString></resultScore></result>",
				escape(score.language),
				escape(score.value)
			)
		})
		.unwrap_or_default();

	format!(
		"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
		<imsx_POXEnvelopeRequest xmlns=\"{POX_NAMESPACE}\">\
		<imsx_POXHeader><imsx_POXRequestHeaderInfo>\
		<imsx_version>{POX_VERSION}</imsx_version>\
		<imsx_messageIdentifier>{}</imsx_messageIdentifier>\
		</imsx_POXRequestHeaderInfo></imsx_POXHeader>\
		<imsx_POXBody><{op}Request><resultRecord>\
		<sourcedGUID><sourcedId>{}</sourcedId></sourcedGUID>{result}\
		</resultRecord></{op}Request></imsx_POXBody>\
		</imsx_POXEnvelopeRequest>",
		escape(message_id),
		escape(sourcedid),
		op = operation.as_str(),
	)
}

#[derive(Debug, Deserialize)]
pub(crate) struct PoxEnvelope {
	#[serde(rename = "imsx_POXHeader")]
	header: PoxHeader,
	#[serde(rename = "imsx_POXBody", default)]
	body: Option<PoxBody>,
}
impl PoxEnvelope {
	/// Score of a `readResult` reply: `(language, text)`.
	pub(crate) fn result_score(&self) -> Option<(Option<&str>, &str)> {
		let score = &self.body.as_ref()?.read_result.as_ref()?.result.as_ref()?.score;
		let text = score.text_string.as_deref().filter(|text| !text.is_empty())?;

		Some((score.language.as_deref().filter(|l| !l.is_empty()), text))
	}
}

#[derive(Debug, Deserialize)]
struct PoxHeader {
	#[serde(rename = "imsx_POXResponseHeaderInfo")]
	info: PoxResponseHeaderInfo,
}

#[derive(Debug, Deserialize)]
struct PoxResponseHeaderInfo {
	#[serde(rename = "imsx_statusInfo")]
	status: PoxStatusInfo,
}

#[derive(Debug, Deserialize)]
struct PoxStatusInfo {
	#[serde(rename = "imsx_codeMajor")]
	code_major: String,
	#[serde(rename = "imsx_description", default)]
	description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PoxBody {
	#[serde(rename = "readResultResponse", default)]
	read_result: Option<ReadResultResponse>,
}

#[derive(Debug, Deserialize)]
struct ReadResultResponse {
	#[serde(default)]
	result: Option<PoxResult>,
}

#[derive(Debug, Deserialize)]
struct PoxResult {
	#[serde(rename = "resultScore")]
	score: PoxResultScore,
}

#[derive(Debug, Deserialize)]
struct PoxResultScore {
	#[serde(default)]
	language: Option<String>,
	#[serde(rename = "textString", default)]
	text_string: Option<String>,
}

/// Decodes a reply and requires `imsx_codeMajor` to be `success`.
pub(crate) fn decode(body: &str) -> Result<PoxEnvelope, ServiceError> {
	let envelope: PoxEnvelope = quick_xml::de::from_str(body)?;
	let status = &envelope.header.info.status;

	if !status.code_major.trim().eq_ignore_ascii_case("success") {
		return Err(ServiceError::Rejected {
			code_major: status.code_major.trim().to_owned(),
			description: status.description.clone().filter(|d| !d.trim().is_empty()),
		});
	}

	Ok(envelope)
}
