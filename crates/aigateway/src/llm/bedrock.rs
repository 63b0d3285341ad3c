use aigw_core::prelude::*;

use crate::llm::RouteType;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub model: Option<Strng>, // Optional: model override for the Bedrock API path
	pub region: Strng, // Required: AWS region
}

impl super::Provider for Provider {
	const NAME: Strng = strng::literal!("aws.bedrock");
}

impl Provider {
	pub fn get_path_for_route(&self, route_type: RouteType, streaming: bool, model: &str) -> Strng {
		let model = self.model.as_deref().unwrap_or(model);
		match route_type {
			RouteType::Embeddings => strng::format!("/model/{model}/invoke"),
			_ if streaming => strng::format!("/model/{model}/converse-stream"),
			_ => strng::format!("/model/{model}/converse"),
		}
	}

	pub fn get_host(&self) -> Strng {
		strng::format!("bedrock-runtime.{}.amazonaws.com", self.region)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn paths_select_converse_variant() {
		let p = Provider {
			model: None,
			region: strng::literal!("us-east-1"),
		};
		assert_eq!(
			p.get_path_for_route(RouteType::ChatCompletions, false, "anthropic.claude-3-sonnet"),
			"/model/anthropic.claude-3-sonnet/converse"
		);
		assert_eq!(
			p.get_path_for_route(RouteType::ChatCompletions, true, "anthropic.claude-3-sonnet"),
			"/model/anthropic.claude-3-sonnet/converse-stream"
		);
		assert_eq!(
			p.get_path_for_route(RouteType::Embeddings, false, "amazon.titan-embed-text-v2:0"),
			"/model/amazon.titan-embed-text-v2:0/invoke"
		);
		assert_eq!(p.get_host(), "bedrock-runtime.us-east-1.amazonaws.com");
	}
}
