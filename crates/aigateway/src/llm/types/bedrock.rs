use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::types::TokenUsage;

#[derive(Copy, Clone, Deserialize, Serialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Role {
	#[default]
	User,
	Assistant,
}

#[derive(Clone, Deserialize, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub enum ContentBlock {
	Text(String),
	Image(ImageBlock),
	ToolResult(ToolResultBlock),
	ToolUse(ToolUseBlock),
	ReasoningContent(ReasoningContentBlock),
}

#[derive(Clone, Deserialize, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ImageBlock {
	pub format: String,
	pub source: ImageSource,
}

#[derive(Clone, Deserialize, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ImageSource {
	pub bytes: String,
}

#[derive(Clone, Deserialize, Serialize, Debug)]
#[serde(untagged)]
pub enum ReasoningContentBlock {
	// Structured form: { "reasoningText": { "text": "...", "signature": "..." } }
	Structured {
		#[serde(rename = "reasoningText")]
		reasoning_text: ReasoningText,
	},
	// Simple form: { "text": "..." }
	Simple {
		text: String,
	},
}

#[derive(Clone, Deserialize, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningText {
	pub text: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub signature: Option<String>,
}

#[derive(Clone, Deserialize, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultBlock {
	pub tool_use_id: String,
	pub content: Vec<ToolResultContentBlock>,
	/// Only supported by Anthropic Claude 3 models.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<ToolResultStatus>,
}

#[derive(Clone, Deserialize, Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ToolResultStatus {
	Error,
	Success,
}

#[derive(Clone, Deserialize, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ToolUseBlock {
	pub tool_use_id: String,
	pub name: String,
	pub input: Value,
}

#[derive(Clone, Deserialize, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub enum ToolResultContentBlock {
	Text(String),
	Image(ImageBlock),
	Json(Value),
}

#[derive(Clone, Deserialize, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SystemContentBlock {
	pub text: String,
}

#[derive(Clone, Deserialize, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Message {
	pub role: Role,
	pub content: Vec<ContentBlock>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InferenceConfiguration {
	pub max_tokens: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub temperature: Option<f32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub top_p: Option<f32>,
	#[serde(skip_serializing_if = "Vec::is_empty", default)]
	pub stop_sequences: Vec<String>,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ConverseRequest {
	pub model_id: String,
	pub messages: Vec<Message>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub system: Option<Vec<SystemContentBlock>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub inference_config: Option<InferenceConfiguration>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tool_config: Option<ToolConfiguration>,
	/// Model-specific request fields with no Converse equivalent (e.g. top_k).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub additional_model_request_fields: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub request_metadata: Option<HashMap<String, String>>,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfiguration {
	pub tools: Vec<Tool>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tool_choice: Option<ToolChoice>,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub enum Tool {
	ToolSpec(ToolSpecification),
}

#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpecification {
	pub name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub input_schema: Option<ToolInputSchema>,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub enum ToolInputSchema {
	Json(Value),
}

#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub enum ToolChoice {
	/// The model must request at least one tool (no text is generated).
	Any(EmptyObject),
	/// (Default) the model decides whether to call a tool.
	Auto(EmptyObject),
	/// The model must request the specified tool.
	Tool { name: String },
}

#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct EmptyObject {}

/// Response from the Converse API (matches the AWS SDK ConverseOutput shape).
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ConverseResponse {
	pub output: Option<ConverseOutput>,
	pub stop_reason: StopReason,
	pub usage: Option<BedrockTokenUsage>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub metrics: Option<ConverseMetrics>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub enum ConverseOutput {
	Message(Message),
	#[serde(other)]
	Unknown,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConverseErrorResponse {
	// Sometimes capitalized, sometimes not.
	#[serde(alias = "Message")]
	pub message: String,
}

#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BedrockTokenUsage {
	pub input_tokens: u64,
	pub output_tokens: u64,
	pub total_tokens: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cache_read_input_tokens: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cache_write_input_tokens: Option<u64>,
}

impl BedrockTokenUsage {
	/// Bedrock reports usage with Anthropic's accounting: cached tokens are excluded from
	/// `input_tokens` and must be summed back in.
	pub fn token_usage(&self) -> TokenUsage {
		TokenUsage::from_anthropic(
			self.input_tokens,
			self.output_tokens,
			self.cache_write_input_tokens,
			self.cache_read_input_tokens,
		)
	}
}

#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverseMetrics {
	pub latency_ms: u64,
}

#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
	ContentFiltered,
	EndTurn,
	GuardrailIntervened,
	MaxTokens,
	ModelContextWindowExceeded,
	StopSequence,
	ToolUse,
}

// Stream events. These are NOT deserialized directly from JSON; the binary event-stream frame
// carries the event name in the `:event-type` header and the JSON payload separately. See the
// associated method.
#[derive(Clone, Debug)]
pub enum ConverseStreamOutput {
	ContentBlockDelta(ContentBlockDeltaEvent),
	ContentBlockStart(ContentBlockStartEvent),
	ContentBlockStop(ContentBlockStopEvent),
	MessageStart(MessageStartEvent),
	MessageStop(MessageStopEvent),
	Metadata(ConverseStreamMetadataEvent),
}

impl ConverseStreamOutput {
	pub fn deserialize(m: &aws_smithy_types::event_stream::Message) -> anyhow::Result<Self> {
		let get_header = |name: &str| -> Option<String> {
			m.headers()
				.iter()
				.find(|h| h.name().as_str() == name)
				.and_then(|h| h.value().as_string().ok())
				.map(|s| s.as_str().to_owned())
		};

		// AWS EventStream distinguishes exceptions from normal events with :message-type.
		let message_type = get_header(":message-type");
		if message_type.as_deref() == Some("exception") {
			let exception_type = get_header(":exception-type").unwrap_or_else(|| "unknown".to_owned());
			let error_message = String::from_utf8_lossy(m.payload()).to_string();
			anyhow::bail!("{exception_type}: {error_message}");
		}

		let Some(event_type) = get_header(":event-type") else {
			anyhow::bail!("no event type header")
		};

		let payload = m.payload();
		Ok(match event_type.as_str() {
			"contentBlockDelta" => {
				ConverseStreamOutput::ContentBlockDelta(serde_json::from_slice(payload)?)
			},
			"contentBlockStart" => {
				ConverseStreamOutput::ContentBlockStart(serde_json::from_slice(payload)?)
			},
			"contentBlockStop" => {
				ConverseStreamOutput::ContentBlockStop(serde_json::from_slice(payload)?)
			},
			"messageStart" => ConverseStreamOutput::MessageStart(serde_json::from_slice(payload)?),
			"messageStop" => ConverseStreamOutput::MessageStop(serde_json::from_slice(payload)?),
			"metadata" => ConverseStreamOutput::Metadata(serde_json::from_slice(payload)?),
			other => anyhow::bail!("unexpected event type: {other}"),
		})
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlockDeltaEvent {
	pub delta: Option<ContentBlockDelta>,
	pub content_block_index: i32,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlockStartEvent {
	pub start: Option<ContentBlockStart>,
	pub content_block_index: i32,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlockStopEvent {
	pub content_block_index: i32,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStartEvent {
	pub role: Role,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStopEvent {
	pub stop_reason: StopReason,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverseStreamMetadataEvent {
	pub usage: Option<BedrockTokenUsage>,
	pub metrics: Option<ConverseMetrics>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentBlockDelta {
	ReasoningContent(ReasoningContentBlockDelta),
	Text(String),
	ToolUse(ToolUseBlockDelta),
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUseBlockDelta {
	pub input: String,
}

#[derive(Clone, Debug, Deserialize)]
pub enum ReasoningContentBlockDelta {
	#[serde(rename = "signature")]
	Signature(String),
	#[serde(rename = "text")]
	Text(String),
	#[serde(rename = "redactedContent")]
	RedactedContent(String),
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentBlockStart {
	ToolUse(ToolUseBlockStart),
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUseBlockStart {
	pub tool_use_id: String,
	pub name: String,
}

// InvokeModel embedding bodies. Bedrock embeddings go through per-model-family JSON rather
// than Converse.

#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TitanEmbeddingRequest {
	pub input_text: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub dimensions: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub normalize: Option<bool>,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TitanEmbeddingResponse {
	#[serde(default)]
	pub embedding: Vec<f32>,
	pub input_text_token_count: u64,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct CohereEmbeddingRequest {
	pub texts: Vec<String>,
	pub input_type: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub truncate: Option<String>,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct CohereEmbeddingResponse {
	pub embeddings: Vec<Vec<f32>>,
	pub id: String,
	pub texts: Vec<String>,
}
