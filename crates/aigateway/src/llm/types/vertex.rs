use serde::{Deserialize, Serialize};
use serde_json::Value;

// generateContent request/response. Field casing is camelCase throughout, with one exception
// noted on Statistics below.

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
	pub contents: Vec<Content>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub system_instruction: Option<Content>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub generation_config: Option<GenerationConfig>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tools: Option<Vec<GeminiTool>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tool_config: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Content {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub role: Option<String>,
	pub parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub enum Part {
	Text(String),
	InlineData(Blob),
	FunctionCall(FunctionCall),
	FunctionResponse(FunctionResponse),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
	pub mime_type: String,
	pub data: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FunctionCall {
	pub name: String,
	pub args: Value,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FunctionResponse {
	pub name: String,
	pub response: Value,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub temperature: Option<f32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub top_p: Option<f32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub top_k: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub max_output_tokens: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub candidate_count: Option<u32>,
	#[serde(skip_serializing_if = "Vec::is_empty", default)]
	pub stop_sequences: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GeminiTool {
	pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclaration {
	pub name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub parameters: Option<Value>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
	pub candidates: Vec<Candidate>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub usage_metadata: Option<UsageMetadata>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub model_version: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub response_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
	pub content: Option<Content>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub finish_reason: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub index: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
	#[serde(default)]
	pub prompt_token_count: u64,
	#[serde(default)]
	pub candidates_token_count: u64,
	#[serde(default)]
	pub total_token_count: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cached_content_token_count: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GeminiErrorResponse {
	pub error: GeminiError,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GeminiError {
	pub code: i32,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
}

// :predict embedding request/response.

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PredictRequest {
	pub instances: Vec<Instance>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub parameters: Option<Parameters>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Instance {
	pub content: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub task_type: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Parameters {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub auto_truncate: Option<bool>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub output_dimensionality: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PredictResponse {
	pub predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Prediction {
	pub embeddings: EmbeddingsResult,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingsResult {
	pub values: Vec<f32>,
	pub statistics: Option<Statistics>,
}

/// The predict statistics come back snake_case (`token_count`), unlike the rest of the Vertex
/// surface; do not "fix" the casing.
#[derive(Debug, Deserialize, Clone)]
pub struct Statistics {
	pub token_count: u64,
	#[serde(default)]
	pub truncated: bool,
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn parts_round_trip_camel_case_tags() {
		let p: Part = serde_json::from_value(json!({
			"functionCall": {"name": "f", "args": {"a": 1}}
		}))
		.unwrap();
		assert!(matches!(&p, Part::FunctionCall(fc) if fc.name == "f"));
		assert_eq!(
			serde_json::to_value(&p).unwrap(),
			json!({"functionCall": {"name": "f", "args": {"a": 1}}})
		);
	}

	#[test]
	fn statistics_parse_snake_case() {
		let resp: PredictResponse = serde_json::from_value(json!({
			"predictions": [{
				"embeddings": {"values": [0.5], "statistics": {"token_count": 3, "truncated": false}}
			}]
		}))
		.unwrap();
		assert_eq!(
			resp.predictions[0]
				.embeddings
				.statistics
				.as_ref()
				.unwrap()
				.token_count,
			3
		);
	}
}
