use aigw_core::prelude::*;

use crate::llm::RouteType;

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub model: Option<Strng>,
}

impl super::Provider for Provider {
	const NAME: Strng = strng::literal!("openai");
}
pub const DEFAULT_HOST_STR: &str = "api.openai.com";
pub const DEFAULT_HOST: Strng = strng::literal!(DEFAULT_HOST_STR);

pub fn path(route: RouteType) -> &'static str {
	match route {
		RouteType::Completions => "/v1/completions",
		RouteType::Responses => "/v1/responses",
		RouteType::Embeddings => "/v1/embeddings",
		RouteType::Models => "/v1/models",
		// Anthropic-format input gets translated down to chat completions
		_ => "/v1/chat/completions",
	}
}
