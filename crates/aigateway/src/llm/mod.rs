use aigw_core::prelude::*;

use crate::http::StatusCode;
use crate::types::agent::SchemaName;

pub mod anthropic;
pub mod azureopenai;
pub mod bedrock;
pub mod cohere;
pub mod openai;
pub mod vertex;

pub mod translator;
pub mod types;

/// RouteType identifies which client-facing endpoint a request arrived on. Each endpoint picks
/// a different translator from the registry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteType {
	/// OpenAI /v1/chat/completions
	ChatCompletions,
	/// OpenAI /v1/completions (legacy)
	Completions,
	/// OpenAI /v1/embeddings
	Embeddings,
	/// OpenAI /v1/models
	Models,
	/// OpenAI /v1/responses
	Responses,
	/// Anthropic /v1/messages
	Messages,
	/// Send the request to the upstream LLM provider as-is
	Passthrough,
}

impl RouteType {
	pub fn from_path(path: &str) -> Option<RouteType> {
		let path = path.split('?').next().unwrap_or(path);
		match path {
			"/v1/chat/completions" => Some(RouteType::ChatCompletions),
			"/v1/completions" => Some(RouteType::Completions),
			"/v1/embeddings" => Some(RouteType::Embeddings),
			"/v1/models" => Some(RouteType::Models),
			"/v1/responses" => Some(RouteType::Responses),
			"/v1/messages" => Some(RouteType::Messages),
			_ => None,
		}
	}

	/// The `gen_ai.operation.name` attribute value for this endpoint.
	pub fn operation_name(&self) -> Strng {
		match self {
			RouteType::ChatCompletions | RouteType::Messages => strng::literal!("chat"),
			RouteType::Completions => strng::literal!("text_completion"),
			RouteType::Embeddings => strng::literal!("embeddings"),
			RouteType::Responses => strng::literal!("responses"),
			RouteType::Models | RouteType::Passthrough => strng::literal!("unknown"),
		}
	}
}

trait Provider {
	const NAME: Strng;
}

/// AIProvider pairs a backend schema with its per-provider settings. It drives host/path
/// defaults and translator selection.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AIProvider {
	OpenAI(openai::Provider),
	AzureOpenAI(azureopenai::Provider),
	Anthropic(anthropic::Provider),
	GcpAnthropic(vertex::Provider),
	Bedrock(bedrock::Provider),
	Vertex(vertex::Provider),
	Cohere(cohere::Provider),
}

impl AIProvider {
	pub fn provider(&self) -> Strng {
		match self {
			AIProvider::OpenAI(_) => openai::Provider::NAME,
			AIProvider::AzureOpenAI(_) => azureopenai::Provider::NAME,
			AIProvider::Anthropic(_) => anthropic::Provider::NAME,
			AIProvider::GcpAnthropic(_) => strng::literal!("gcp.anthropic"),
			AIProvider::Bedrock(_) => bedrock::Provider::NAME,
			AIProvider::Vertex(_) => vertex::Provider::NAME,
			AIProvider::Cohere(_) => cohere::Provider::NAME,
		}
	}

	pub fn schema(&self) -> SchemaName {
		match self {
			AIProvider::OpenAI(_) => SchemaName::OpenAI,
			AIProvider::AzureOpenAI(_) => SchemaName::AzureOpenAI,
			AIProvider::Anthropic(_) => SchemaName::Anthropic,
			AIProvider::GcpAnthropic(_) => SchemaName::GCPAnthropic,
			AIProvider::Bedrock(_) => SchemaName::AWSBedrock,
			AIProvider::Vertex(_) => SchemaName::GCPVertexAI,
			AIProvider::Cohere(_) => SchemaName::Cohere,
		}
	}

	/// Backend virtualization: a provider may pin the concrete upstream model regardless of
	/// what the client asked for.
	pub fn override_model(&self) -> Option<Strng> {
		match self {
			AIProvider::OpenAI(p) => p.model.clone(),
			AIProvider::AzureOpenAI(p) => p.model.clone(),
			AIProvider::Anthropic(p) => p.model.clone(),
			AIProvider::GcpAnthropic(p) => p.model.clone(),
			AIProvider::Bedrock(p) => p.model.clone(),
			AIProvider::Vertex(p) => p.model.clone(),
			AIProvider::Cohere(p) => p.model.clone(),
		}
	}

	pub fn default_host(&self) -> Strng {
		match self {
			AIProvider::OpenAI(_) => openai::DEFAULT_HOST,
			AIProvider::AzureOpenAI(p) => p.get_host(),
			AIProvider::Anthropic(_) => anthropic::DEFAULT_HOST,
			AIProvider::GcpAnthropic(p) | AIProvider::Vertex(p) => p.get_host(),
			AIProvider::Bedrock(p) => p.get_host(),
			AIProvider::Cohere(_) => cohere::DEFAULT_HOST,
		}
	}
}

#[derive(thiserror::Error, Debug)]
pub enum AIError {
	// The two user-facing sentinels. Their rendered prefixes are the wire contract; everything
	// else is internal and must not reach the client verbatim.
	#[error("MalformedRequest: {0}")]
	MalformedRequest(String),
	#[error("InvalidRequestBody: {0}")]
	InvalidRequestBody(String),

	#[error("missing field: {0}")]
	MissingField(Strng),
	#[error("unsupported conversion to {0}")]
	UnsupportedConversion(Strng),
	#[error("request was too large")]
	RequestTooLarge,
	#[error("response was too large")]
	ResponseTooLarge,
	#[error("failed to marshal request: {0}")]
	RequestMarshal(serde_json::Error),
	#[error("failed to parse response: {0}")]
	ResponseParsing(serde_json::Error),
	#[error("failed to marshal response: {0}")]
	ResponseMarshal(serde_json::Error),
	#[error("upstream returned status {0}")]
	UpstreamError(u16),
	#[error("internal: {0}")]
	Internal(String),
}

impl AIError {
	/// classify_request_parse turns a body-parse failure into the right user-facing sentinel:
	/// broken JSON is a malformed request, well-formed JSON that violates the schema is an
	/// invalid body.
	pub fn classify_request_parse(e: serde_json::Error) -> AIError {
		use serde_json::error::Category;
		match e.classify() {
			Category::Syntax | Category::Eof => AIError::MalformedRequest(e.to_string()),
			_ => AIError::InvalidRequestBody(e.to_string()),
		}
	}

	pub fn status(&self) -> StatusCode {
		match self {
			AIError::MalformedRequest(_) | AIError::RequestTooLarge => StatusCode::BAD_REQUEST,
			AIError::InvalidRequestBody(_) | AIError::MissingField(_) => {
				StatusCode::UNPROCESSABLE_ENTITY
			},
			AIError::UpstreamError(code) => {
				StatusCode::from_u16(*code).unwrap_or(StatusCode::BAD_GATEWAY)
			},
			_ => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// User-facing errors flow to the client verbatim; everything else is replaced with a
	/// generic message at the boundary.
	pub fn is_user_facing(&self) -> bool {
		matches!(
			self,
			AIError::MalformedRequest(_)
				| AIError::InvalidRequestBody(_)
				| AIError::MissingField(_)
				| AIError::RequestTooLarge
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn route_type_from_path() {
		assert_eq!(
			RouteType::from_path("/v1/chat/completions"),
			Some(RouteType::ChatCompletions)
		);
		assert_eq!(
			RouteType::from_path("/v1/embeddings?foo=1"),
			Some(RouteType::Embeddings)
		);
		assert_eq!(RouteType::from_path("/v1/messages"), Some(RouteType::Messages));
		assert_eq!(RouteType::from_path("/v2/other"), None);
	}

	#[test]
	fn parse_errors_classify_by_category() {
		let syntax = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
		assert!(matches!(
			AIError::classify_request_parse(syntax),
			AIError::MalformedRequest(_)
		));

		#[derive(serde::Deserialize, Debug)]
		#[allow(dead_code)]
		struct Strict {
			model: String,
		}
		let data = serde_json::from_str::<Strict>("{}").unwrap_err();
		let err = AIError::classify_request_parse(data);
		assert!(matches!(err, AIError::InvalidRequestBody(_)));
		assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
	}

	#[test]
	fn sentinel_prefix_composition() {
		let err = AIError::InvalidRequestBody("messages[0]: content is required".into());
		assert_eq!(
			err.to_string(),
			"InvalidRequestBody: messages[0]: content is required"
		);
		assert!(err.is_user_facing());
		assert!(!AIError::Internal("boom".into()).is_user_facing());
	}
}
