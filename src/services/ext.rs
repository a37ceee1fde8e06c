//! Typed decoding of extension-protocol (`message_response`) replies.

// self
use crate::{_prelude::*, error::ServiceError};

/// `basic-lis-readresult`.
pub(crate) const READ_RESULT: &str = "basic-lis-readresult";
/// `basic-lis-updateresult`.
pub(crate) const UPDATE_RESULT: &str = "basic-lis-updateresult";
/// `basic-lis-deleteresult`.
pub(crate) const DELETE_RESULT: &str = "basic-lis-deleteresult";
/// Roster request including group structure.
pub(crate) const READ_MEMBERSHIPS_WITH_GROUPS: &str =
	"basic-lis-readmembershipsforcontextwithgroups";
/// Plain roster request.
pub(crate) const READ_MEMBERSHIPS: &str = "basic-lis-readmembershipsforcontext";
/// `basic-lti-loadsetting`.
pub(crate) const LOAD_SETTING: &str = "basic-lti-loadsetting";
/// `basic-lti-savesetting`.
pub(crate) const SAVE_SETTING: &str = "basic-lti-savesetting";
/// `basic-lti-deletesetting`.
pub(crate) const DELETE_SETTING: &str = "basic-lti-deletesetting";

#[derive(Debug, Deserialize)]
pub(crate) struct ExtResponse {
	pub(crate) statusinfo: ExtStatusInfo,
	#[serde(default)]
	pub(crate) result: Option<ExtResult>,
	#[serde(default)]
	pub(crate) memberships: Option<ExtMemberships>,
	#[serde(default)]
	pub(crate) setting: Option<ExtSetting>,
}
impl ExtResponse {
	/// Score text of a `basic-lis-readresult` reply.
	pub(crate) fn result_text(&self) -> Option<&str> {
		self.result
			.as_ref()
			.and_then(|result| result.resultscore.as_ref())
			.and_then(|score| score.textstring.as_deref())
			.filter(|text| !text.is_empty())
	}

	/// Value of a `basic-lti-loadsetting` reply; a missing value reads as empty.
	pub(crate) fn setting_value(&self) -> Option<String> {
		self.setting.as_ref().map(|setting| setting.value.clone().unwrap_or_default())
	}
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtStatusInfo {
	pub(crate) codemajor: String,
	#[serde(default)]
	pub(crate) description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtResult {
	#[serde(default)]
	pub(crate) resultscore: Option<ExtResultScore>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtResultScore {
	#[serde(default)]
	pub(crate) textstring: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ExtMemberships {
	#[serde(default, rename = "member")]
	pub(crate) members: Vec<ExtMember>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtMember {
	pub(crate) user_id: String,
	#[serde(default)]
	pub(crate) roles: Option<String>,
	#[serde(default)]
	pub(crate) person_name_given: Option<String>,
	#[serde(default)]
	pub(crate) person_name_family: Option<String>,
	#[serde(default)]
	pub(crate) person_name_full: Option<String>,
	#[serde(default)]
	pub(crate) person_contact_email_primary: Option<String>,
	#[serde(default)]
	pub(crate) lis_result_sourcedid: Option<String>,
	#[serde(default)]
	pub(crate) groups: Option<ExtGroups>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ExtGroups {
	#[serde(default, rename = "group")]
	pub(crate) groups: Vec<ExtGroup>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtGroup {
	pub(crate) id: String,
	#[serde(default)]
	pub(crate) title: Option<String>,
	#[serde(default)]
	pub(crate) set: Option<ExtGroupSet>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtGroupSet {
	pub(crate) id: String,
	#[serde(default)]
	pub(crate) title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtSetting {
	#[serde(default)]
	pub(crate) value: Option<String>,
}

/// Decodes a reply and requires `statusinfo/codemajor` to be `Success`.
pub(crate) fn decode(body: &str) -> Result<ExtResponse, ServiceError> {
	let response: ExtResponse = quick_xml::de::from_str(body)?;

	if !response.statusinfo.codemajor.trim().eq_ignore_ascii_case("success") {
		return Err(ServiceError::Rejected {
			code_major: response.statusinfo.codemajor.trim().to_owned(),
			description: response.statusinfo.description.filter(|d| !d.trim().is_empty()),
		});
	}

	Ok(response)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn roster_replies_decode_members_and_groups() {
		let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<message_response>
  <lti_message_type>basic-lis-readmembershipsforcontextwithgroups</lti_message_type>
  <statusinfo><codemajor>Success</codemajor><severity>Status</severity></statusinfo>
  <memberships>
    <member>
      <user_id>U1</user_id>
      <roles>Learner</roles>
      <person_name_full>Ada Lovelace</person_name_full>
      <lis_result_sourcedid>S1</lis_result_sourcedid>
      <groups>
        <group><id>G1</id><title>Red</title><set><id>SET1</id><title>Teams</title></set></group>
        <group><id>G2</id><title>Blue</title></group>
      </groups>
    </member>
    <member><user_id>U2</user_id><roles>Instructor</roles></member>
  </memberships>
</message_response>"#;
		let response = decode(body).expect("Roster reply should decode.");
		let members = response.memberships.expect("Roster reply should carry memberships.").members;

		assert_eq!(members.len(), 2);
		assert_eq!(members[0].lis_result_sourcedid.as_deref(), Some("S1"));

		let groups = &members[0].groups.as_ref().expect("First member should have groups.").groups;

		assert_eq!(groups.len(), 2);
		assert_eq!(groups[0].set.as_ref().map(|s| s.id.as_str()), Some("SET1"));
		assert!(members[1].groups.is_none());
	}

	#[test]
	fn failure_codes_are_rejections() {
		let body = "<message_response><statusinfo><codemajor>Failure</codemajor>\
			<description>Unknown sourcedid</description></statusinfo></message_response>";

		match decode(body) {
			Err(ServiceError::Rejected { code_major, description }) => {
				assert_eq!(code_major, "Failure");
				assert_eq!(description.as_deref(), Some("Unknown sourcedid"));
			},
			other => panic!("Unexpected decode result: {other:?}."),
		}
	}

	#[test]
	fn malformed_replies_fail_to_decode() {
		assert!(matches!(decode("<html>oops</html>"), Err(ServiceError::Decode { .. })));
	}

	#[test]
	fn setting_and_result_accessors() {
		let body = "<message_response><statusinfo><codemajor>success</codemajor></statusinfo>\
			<result><resultscore><textstring>0.8</textstring></resultscore></result>\
			<setting><value>blue</value></setting></message_response>";
		let response = decode(body).expect("Reply should decode.");

		assert_eq!(response.result_text(), Some("0.8"));
		assert_eq!(response.setting_value().as_deref(), Some("blue"));
	}
}
