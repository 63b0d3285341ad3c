use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::llm::types::TokenUsage;

/// Request is the routing view of an Anthropic Messages body.
#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct Request {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub model: Option<String>,
	pub messages: Vec<RequestMessage>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub system: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stream: Option<bool>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub max_tokens: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub temperature: Option<f32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub top_p: Option<f32>,

	#[serde(flatten, default)]
	pub rest: Value,
}

impl Request {
	pub fn streaming(&self) -> bool {
		self.stream.unwrap_or_default()
	}
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct RequestMessage {
	pub role: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub content: Option<Value>,
	#[serde(flatten, default)]
	pub rest: Value,
}

/// 'typed' provides a strictly-typed model of the Anthropic Messages API. Bedrock and the GCP
/// Anthropic surface are converted through these structs.
pub mod typed {
	use super::*;
	use crate::serdes::is_default;

	#[derive(Copy, Clone, Deserialize, Serialize, Debug, PartialEq, Eq, Default)]
	#[serde(rename_all = "snake_case")]
	pub enum Role {
		#[default]
		User,
		Assistant,
	}

	#[derive(Clone, Deserialize, Serialize, Debug, PartialEq, Eq)]
	#[serde(rename_all = "snake_case", tag = "type")]
	pub enum CacheControlEphemeral {
		Ephemeral {
			#[serde(default, skip_serializing_if = "Option::is_none")]
			ttl: Option<String>,
		},
	}

	#[derive(Clone, Deserialize, Serialize, Debug)]
	pub struct ContentTextBlock {
		pub text: String,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub citations: Option<Value>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub cache_control: Option<CacheControlEphemeral>,
	}

	#[derive(Clone, Deserialize, Serialize, Debug)]
	#[serde(rename_all = "snake_case", tag = "type")]
	pub enum ContentBlock {
		Text(ContentTextBlock),
		Image {
			source: Value,
			#[serde(skip_serializing_if = "Option::is_none")]
			cache_control: Option<CacheControlEphemeral>,
		},
		Document {
			source: Value,
			#[serde(skip_serializing_if = "Option::is_none")]
			cache_control: Option<CacheControlEphemeral>,
		},
		Thinking {
			thinking: String,
			signature: String,
		},
		RedactedThinking {
			data: String,
		},
		ToolUse {
			id: String,
			name: String,
			input: Value,
			#[serde(skip_serializing_if = "Option::is_none")]
			cache_control: Option<CacheControlEphemeral>,
		},
		ToolResult {
			tool_use_id: String,
			content: ToolResultContent,
			#[serde(skip_serializing_if = "Option::is_none")]
			cache_control: Option<CacheControlEphemeral>,
			#[serde(skip_serializing_if = "Option::is_none")]
			is_error: Option<bool>,
		},
		ServerToolUse {
			id: String,
			name: String,
			input: Value,
			#[serde(skip_serializing_if = "Option::is_none")]
			cache_control: Option<CacheControlEphemeral>,
		},
		WebSearchToolResult {
			tool_use_id: String,
			#[serde(skip_serializing_if = "Option::is_none")]
			content: Option<Value>,
		},
		// There are LOTs of possible values; since we don't support them all, just allow them
		// without failing
		#[serde(other)]
		Unknown,
	}

	#[derive(Debug, Serialize, Deserialize, Clone)]
	#[serde(untagged)]
	pub enum ToolResultContent {
		Text(String),
		Array(Vec<ToolResultContentPart>),
	}

	impl From<String> for ToolResultContent {
		fn from(t: String) -> Self {
			ToolResultContent::Text(t)
		}
	}

	#[derive(Debug, Serialize, Deserialize, Clone)]
	#[serde(tag = "type", rename_all = "snake_case")]
	pub enum ToolResultContentPart {
		Text {
			text: String,
			#[serde(skip_serializing_if = "Option::is_none")]
			cache_control: Option<CacheControlEphemeral>,
		},
		Image {
			source: Value,
			#[serde(skip_serializing_if = "Option::is_none")]
			cache_control: Option<CacheControlEphemeral>,
		},
	}

	#[derive(Clone, Deserialize, Serialize, Debug)]
	pub struct Message {
		pub role: Role,
		#[serde(deserialize_with = "deserialize_content")]
		pub content: Vec<ContentBlock>,
	}

	// Content arrives as either a bare string or an array of blocks.
	fn deserialize_content<'de, D>(deserializer: D) -> Result<Vec<ContentBlock>, D::Error>
	where
		D: Deserializer<'de>,
	{
		use serde::de::Error;

		let value = Value::deserialize(deserializer)?;
		match value {
			Value::String(text) => Ok(vec![ContentBlock::Text(ContentTextBlock {
				text,
				citations: None,
				cache_control: None,
			})]),
			Value::Array(_) => Vec::<ContentBlock>::deserialize(value).map_err(D::Error::custom),
			_ => Err(D::Error::custom(
				"content must be either a string or an array",
			)),
		}
	}

	/// System prompt: a bare string or an array of content blocks.
	#[derive(Clone, Debug, Serialize, Deserialize)]
	#[serde(untagged)]
	pub enum SystemPrompt {
		Text(String),
		Blocks(Vec<SystemContentBlock>),
	}

	#[derive(Clone, Debug, Serialize, Deserialize)]
	#[serde(tag = "type", rename_all = "snake_case")]
	pub enum SystemContentBlock {
		Text {
			text: String,
			#[serde(skip_serializing_if = "Option::is_none")]
			cache_control: Option<CacheControlEphemeral>,
		},
	}

	#[derive(Clone, Serialize, Deserialize, Debug, Eq, PartialEq)]
	#[serde(rename_all = "snake_case", tag = "type")]
	pub enum ThinkingInput {
		Enabled { budget_tokens: u64 },
		Disabled {},
	}

	#[derive(Debug, Serialize, Deserialize)]
	pub struct Tool {
		pub name: String,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub description: Option<String>,
		pub input_schema: Value,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub cache_control: Option<CacheControlEphemeral>,
	}

	#[derive(Debug, Serialize, Deserialize)]
	#[serde(tag = "type", rename_all = "snake_case")]
	pub enum ToolChoice {
		Auto,
		Any,
		Tool { name: String },
		None,
	}

	#[derive(Debug, Serialize, Deserialize, Default)]
	pub struct Metadata {
		#[serde(flatten)]
		pub fields: std::collections::HashMap<String, String>,
	}

	#[derive(Deserialize, Serialize, Default, Debug)]
	pub struct Request {
		pub model: String,
		pub messages: Vec<Message>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub system: Option<SystemPrompt>,
		/// The maximum number of tokens to generate before stopping.
		pub max_tokens: usize,
		#[serde(default, skip_serializing_if = "Vec::is_empty")]
		pub stop_sequences: Vec<String>,
		#[serde(default, skip_serializing_if = "is_default")]
		pub stream: bool,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub temperature: Option<f32>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub top_p: Option<f32>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub top_k: Option<usize>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub tools: Option<Vec<Tool>>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub tool_choice: Option<ToolChoice>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub metadata: Option<Metadata>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub thinking: Option<ThinkingInput>,
	}

	/// Reason the model stopped generating.
	#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
	#[serde(rename_all = "snake_case")]
	pub enum StopReason {
		EndTurn,
		MaxTokens,
		StopSequence,
		ToolUse,
		Refusal,
		PauseTurn,
		ModelContextWindowExceeded,
	}

	/// Billing usage. `input_tokens` excludes cached tokens; see [`Usage::token_usage`].
	#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
	pub struct Usage {
		pub input_tokens: u64,
		pub output_tokens: u64,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub cache_creation_input_tokens: Option<u64>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub cache_read_input_tokens: Option<u64>,
	}

	impl Usage {
		pub fn token_usage(&self) -> TokenUsage {
			TokenUsage::from_anthropic(
				self.input_tokens,
				self.output_tokens,
				self.cache_creation_input_tokens,
				self.cache_read_input_tokens,
			)
		}
	}

	#[derive(Debug, Serialize, Deserialize, Clone)]
	pub struct MessagesResponse {
		pub id: String,
		pub r#type: String,
		pub role: Role,
		pub content: Vec<ContentBlock>,
		pub model: String,
		/// Null only in the streaming message_start event.
		pub stop_reason: Option<StopReason>,
		pub stop_sequence: Option<String>,
		pub usage: Usage,
	}

	#[derive(Clone, Serialize, Deserialize, Debug)]
	#[serde(rename_all = "snake_case", tag = "type")]
	pub enum MessagesStreamEvent {
		MessageStart {
			message: MessagesResponse,
		},
		ContentBlockStart {
			index: usize,
			content_block: ContentBlock,
		},
		ContentBlockDelta {
			index: usize,
			delta: ContentBlockDelta,
		},
		ContentBlockStop {
			index: usize,
		},
		MessageDelta {
			delta: MessageDelta,
			usage: MessageDeltaUsage,
		},
		MessageStop,
		Ping,
	}

	impl MessagesStreamEvent {
		/// SSE event name for this event type.
		pub fn event_name(&self) -> &'static str {
			match self {
				Self::MessageStart { .. } => "message_start",
				Self::ContentBlockStart { .. } => "content_block_start",
				Self::ContentBlockDelta { .. } => "content_block_delta",
				Self::ContentBlockStop { .. } => "content_block_stop",
				Self::MessageDelta { .. } => "message_delta",
				Self::MessageStop => "message_stop",
				Self::Ping => "ping",
			}
		}
	}

	#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
	#[serde(rename_all = "snake_case", tag = "type")]
	#[allow(clippy::enum_variant_names)]
	pub enum ContentBlockDelta {
		TextDelta {
			text: String,
		},
		InputJsonDelta {
			partial_json: String,
		},
		ThinkingDelta {
			thinking: String,
		},
		SignatureDelta {
			signature: String,
		},
		CitationsDelta {
			#[serde(default)]
			citations: Vec<Value>,
		},
	}

	#[derive(Clone, Serialize, Deserialize, Debug, Eq, PartialEq)]
	pub struct MessageDeltaUsage {
		/// Cumulative input tokens
		pub input_tokens: u64,
		/// Cumulative output tokens
		pub output_tokens: u64,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub cache_creation_input_tokens: Option<u64>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub cache_read_input_tokens: Option<u64>,
	}

	#[derive(Clone, Serialize, Deserialize, Debug, Eq, PartialEq)]
	pub struct MessageDelta {
		pub stop_reason: Option<StopReason>,
		pub stop_sequence: Option<String>,
	}

	#[derive(Debug, Deserialize, Serialize, Clone)]
	pub struct MessagesErrorResponse {
		pub r#type: String,
		pub error: MessagesError,
	}

	#[derive(Debug, Deserialize, Serialize, Clone)]
	pub struct MessagesError {
		pub r#type: String,
		pub message: String,
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::typed::*;

	#[test]
	fn content_block_string_shorthand() {
		let m: Message = serde_json::from_value(json!({"role": "user", "content": "hi"})).unwrap();
		assert!(matches!(&m.content[0], ContentBlock::Text(t) if t.text == "hi"));
	}

	#[test]
	fn unknown_content_block_is_tolerated() {
		let m: Message = serde_json::from_value(json!({
			"role": "assistant",
			"content": [{"type": "code_execution_tool_result", "tool_use_id": "x"}]
		}))
		.unwrap();
		assert!(matches!(&m.content[0], ContentBlock::Unknown));
	}

	#[test]
	fn stream_event_round_trips() {
		let v = json!({
			"type": "content_block_delta",
			"index": 0,
			"delta": {"type": "text_delta", "text": "Hel"}
		});
		let ev: MessagesStreamEvent = serde_json::from_value(v.clone()).unwrap();
		assert_eq!(ev.event_name(), "content_block_delta");
		assert_eq!(serde_json::to_value(&ev).unwrap(), v);
	}

	#[test]
	fn usage_applies_cache_summation() {
		let u: Usage = serde_json::from_value(json!({
			"input_tokens": 5, "output_tokens": 7,
			"cache_read_input_tokens": 2, "cache_creation_input_tokens": 3
		}))
		.unwrap();
		let tu = u.token_usage();
		assert_eq!(tu.input_tokens, Some(10));
		assert_eq!(tu.cached_input_tokens, Some(5));
		assert_eq!(tu.total_tokens, Some(17));
	}
}
