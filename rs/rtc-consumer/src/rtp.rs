use serde::{Deserialize, Serialize};

/// The negotiated RTP parameters for a consumer.
///
/// These are carried verbatim from signaling; the consumer never interprets them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RtpParameters {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub mid: Option<String>,

	pub codecs: Vec<RtpCodecParameters>,

	pub header_extensions: Vec<RtpHeaderExtensionParameters>,

	pub encodings: Vec<RtpEncodingParameters>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub rtcp: Option<RtcpParameters>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RtpCodecParameters {
	pub mime_type: String,
	pub payload_type: u8,
	pub clock_rate: u32,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub channels: Option<u8>,

	/// Codec-specific format parameters (fmtp), kept as arbitrary JSON.
	pub parameters: serde_json::Map<String, serde_json::Value>,

	pub rtcp_feedback: Vec<RtcpFeedback>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtcpFeedback {
	#[serde(rename = "type")]
	pub kind: String,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub parameter: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RtpHeaderExtensionParameters {
	pub uri: String,
	pub id: u8,
	pub encrypt: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RtpEncodingParameters {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub ssrc: Option<u32>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub rid: Option<String>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub max_bitrate: Option<u64>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub scalability_mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RtcpParameters {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cname: Option<String>,

	pub reduced_size: bool,
}
