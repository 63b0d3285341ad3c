use aigw_core::prelude::*;

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub model: Option<Strng>,
	/// The value sent as Cohere's `input_type`; embeddings for retrieval default to documents.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub input_type: Option<Strng>,
}

impl super::Provider for Provider {
	const NAME: Strng = strng::literal!("cohere");
}
pub const DEFAULT_HOST_STR: &str = "api.cohere.com";
pub const DEFAULT_HOST: Strng = strng::literal!(DEFAULT_HOST_STR);
pub const EMBED_PATH: &str = "/v2/embed";
pub const DEFAULT_INPUT_TYPE: &str = "search_document";
