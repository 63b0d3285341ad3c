use aigw_core::prelude::*;

use crate::llm::RouteType;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub model: Option<Strng>, // the Azure OpenAI model deployment name
	pub host: Strng, // required
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub api_version: Option<Strng>, // optional, defaults to "v1"
}

impl super::Provider for Provider {
	const NAME: Strng = strng::literal!("azure.openai");
}

impl Provider {
	pub fn get_path_for_model(&self, route: RouteType, model: &str) -> Strng {
		let t = match route {
			RouteType::Embeddings => strng::literal!("embeddings"),
			RouteType::Responses => strng::literal!("responses"),
			RouteType::Completions => strng::literal!("completions"),
			_ => strng::literal!("chat/completions"),
		};
		let api_version = self.api_version();
		if api_version == "v1" {
			strng::format!("/openai/v1/{t}")
		} else if api_version == "preview" {
			// v1 preview API
			strng::format!("/openai/v1/{t}?api-version=preview")
		} else {
			let model = self.model.as_deref().unwrap_or(model);
			strng::format!(
				"/openai/deployments/{}/{t}?api-version={}",
				model,
				api_version
			)
		}
	}

	pub fn get_host(&self) -> Strng {
		self.host.clone()
	}

	/// Deployment-path API versions carry the model in the URL; the body must not repeat it.
	pub fn strips_model_from_body(&self) -> bool {
		!matches!(self.api_version(), "v1" | "preview")
	}

	fn api_version(&self) -> &str {
		self.api_version.as_deref().unwrap_or("v1")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn deployment_path_carries_model_and_version() {
		let p = Provider {
			model: None,
			host: strng::literal!("example.openai.azure.com"),
			api_version: Some(strng::literal!("2024-02-01")),
		};
		assert_eq!(
			p.get_path_for_model(RouteType::ChatCompletions, "gpt-4"),
			"/openai/deployments/gpt-4/chat/completions?api-version=2024-02-01"
		);
		assert!(p.strips_model_from_body());
	}

	#[test]
	fn v1_path_keeps_model_in_body() {
		let p = Provider {
			model: None,
			host: strng::literal!("example.openai.azure.com"),
			api_version: None,
		};
		assert_eq!(
			p.get_path_for_model(RouteType::Embeddings, "text-embedding-3-small"),
			"/openai/v1/embeddings"
		);
		assert!(!p.strips_model_from_body());
	}
}
