use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cohere v2 embed request. The OpenAI `input` array maps onto `texts`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EmbedRequest {
	pub model: String,
	pub texts: Vec<String>,
	pub input_type: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub embedding_types: Option<Vec<String>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub truncate: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbedResponse {
	pub id: String,
	pub embeddings: Embeddings,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub meta: Option<Meta>,
}

/// Embeddings keyed by requested type; only `float` is requested by the gateway.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Embeddings {
	#[serde(default)]
	pub float: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Meta {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub billed_units: Option<BilledUnits>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct BilledUnits {
	#[serde(default)]
	pub input_tokens: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CohereErrorResponse {
	pub message: String,
	#[serde(flatten, default)]
	pub rest: Value,
}
