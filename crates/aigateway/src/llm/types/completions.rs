use serde::{Deserialize, Serialize};

use crate::llm::AIError;

/// Request is the routing view of a chat completions body: the fields the gateway reads or
/// rewrites are typed, everything else passes through unchanged.
#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct Request {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub model: Option<String>,
	pub messages: Vec<RequestMessage>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stream: Option<bool>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stream_options: Option<StreamOptions>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub max_tokens: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub max_completion_tokens: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub temperature: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub top_p: Option<f64>,

	#[serde(flatten, default)]
	pub rest: serde_json::Value,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct RequestMessage {
	pub role: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub content: Option<serde_json::Value>,
	#[serde(flatten, default)]
	pub rest: serde_json::Value,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct StreamOptions {
	pub include_usage: bool,
	#[serde(flatten, default)]
	pub rest: serde_json::Value,
}

impl Request {
	/// validate rejects bodies that parse as JSON but violate the schema in ways every backend
	/// would reject anyway.
	pub fn validate(&self) -> Result<(), AIError> {
		for (i, m) in self.messages.iter().enumerate() {
			match m.role.as_str() {
				"system" | "developer" | "user" | "assistant" | "tool" => {},
				other => {
					return Err(AIError::InvalidRequestBody(format!(
						"messages[{i}]: unknown role {other:?}"
					)));
				},
			}
			if m.content.is_none() && m.role != "assistant" {
				return Err(AIError::InvalidRequestBody(format!(
					"messages[{i}]: content is required for role {:?}",
					m.role
				)));
			}
		}
		Ok(())
	}

	pub fn streaming(&self) -> bool {
		self.stream.unwrap_or_default()
	}
}

/// 'typed' provides a strictly-typed model of the chat completions API. Non-OpenAI providers
/// are converted through these structs; the top-level passthrough structs are used when the
/// body is forwarded as-is.
pub mod typed {
	use serde::{Deserialize, Deserializer, Serialize};
	use serde_json::Value;

	pub const SYSTEM_ROLE: &str = "system";
	pub const ASSISTANT_ROLE: &str = "assistant";

	#[derive(Copy, Clone, Deserialize, Serialize, Debug, PartialEq, Eq, Default)]
	#[serde(rename_all = "snake_case")]
	pub enum Role {
		#[default]
		User,
		System,
		Developer,
		Assistant,
		Tool,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	#[serde(tag = "role", rename_all = "snake_case")]
	pub enum RequestMessage {
		System(RequestSystemMessage),
		Developer(RequestDeveloperMessage),
		User(RequestUserMessage),
		Assistant(RequestAssistantMessage),
		Tool(RequestToolMessage),
	}

	impl RequestMessage {
		pub fn role(&self) -> &'static str {
			match self {
				RequestMessage::System(_) => "system",
				RequestMessage::Developer(_) => "developer",
				RequestMessage::User(_) => "user",
				RequestMessage::Assistant(_) => "assistant",
				RequestMessage::Tool(_) => "tool",
			}
		}

		/// text returns the plain-text content, joining multi-part content with newlines.
		pub fn text(&self) -> Option<String> {
			let content = match self {
				RequestMessage::System(m) => Some(&m.content),
				RequestMessage::Developer(m) => Some(&m.content),
				RequestMessage::User(m) => Some(&m.content),
				RequestMessage::Tool(m) => Some(&m.content),
				RequestMessage::Assistant(m) => m.content.as_ref(),
			}?;
			content.text()
		}
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct RequestSystemMessage {
		pub content: RequestContent,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub name: Option<String>,
	}

	impl From<String> for RequestSystemMessage {
		fn from(content: String) -> Self {
			RequestSystemMessage {
				content: RequestContent::Text(content),
				name: None,
			}
		}
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct RequestDeveloperMessage {
		pub content: RequestContent,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub name: Option<String>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct RequestUserMessage {
		pub content: RequestContent,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub name: Option<String>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize, Default)]
	pub struct RequestAssistantMessage {
		#[serde(skip_serializing_if = "Option::is_none")]
		pub content: Option<RequestContent>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub name: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub refusal: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub tool_calls: Option<Vec<MessageToolCalls>>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct RequestToolMessage {
		pub tool_call_id: String,
		pub content: RequestContent,
	}

	impl From<RequestUserMessage> for RequestMessage {
		fn from(m: RequestUserMessage) -> Self {
			RequestMessage::User(m)
		}
	}
	impl From<RequestSystemMessage> for RequestMessage {
		fn from(m: RequestSystemMessage) -> Self {
			RequestMessage::System(m)
		}
	}
	impl From<RequestAssistantMessage> for RequestMessage {
		fn from(m: RequestAssistantMessage) -> Self {
			RequestMessage::Assistant(m)
		}
	}
	impl From<RequestToolMessage> for RequestMessage {
		fn from(m: RequestToolMessage) -> Self {
			RequestMessage::Tool(m)
		}
	}

	/// Content is either a bare string or an array of typed parts.
	#[derive(Debug, Deserialize, Clone, Serialize)]
	#[serde(untagged)]
	pub enum RequestContent {
		Text(String),
		Array(Vec<ContentPart>),
	}

	impl RequestContent {
		pub fn text(&self) -> Option<String> {
			match self {
				RequestContent::Text(t) => Some(t.clone()),
				RequestContent::Array(parts) => {
					let texts: Vec<&str> = parts
						.iter()
						.filter_map(|p| match p {
							ContentPart::Text { text } => Some(text.as_str()),
							_ => None,
						})
						.collect();
					if texts.is_empty() {
						None
					} else {
						Some(texts.join("\n"))
					}
				},
			}
		}
	}

	impl From<String> for RequestContent {
		fn from(t: String) -> Self {
			RequestContent::Text(t)
		}
	}

	#[derive(Debug, Deserialize, Clone, Serialize, PartialEq)]
	#[serde(tag = "type", rename_all = "snake_case")]
	pub enum ContentPart {
		Text {
			text: String,
		},
		ImageUrl {
			image_url: ImageUrl,
		},
		InputAudio {
			input_audio: InputAudio,
		},
	}

	#[derive(Debug, Deserialize, Clone, Serialize, PartialEq)]
	pub struct ImageUrl {
		pub url: String,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub detail: Option<String>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize, PartialEq)]
	pub struct InputAudio {
		pub data: String,
		pub format: String,
	}

	#[derive(Debug, Deserialize, Clone, Serialize, PartialEq)]
	#[serde(tag = "type", rename_all = "snake_case")]
	pub enum ResponseFormat {
		Text,
		JsonObject,
		JsonSchema { json_schema: JsonSchemaFormat },
	}

	#[derive(Debug, Deserialize, Clone, Serialize, PartialEq)]
	pub struct JsonSchemaFormat {
		pub name: String,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub description: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub schema: Option<Value>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub strict: Option<bool>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	#[serde(untagged)]
	pub enum Stop {
		String(String),
		StringArray(Vec<String>),
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	#[serde(tag = "type", rename_all = "snake_case")]
	pub enum Tool {
		Function(FunctionTool),
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct FunctionTool {
		pub function: FunctionObject,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct FunctionObject {
		pub name: String,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub description: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub parameters: Option<Value>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub strict: Option<bool>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	#[serde(untagged)]
	pub enum ToolChoiceOption {
		Mode(ToolChoiceOptions),
		Function(NamedToolChoice),
	}

	#[derive(Debug, Deserialize, Clone, Copy, Serialize, PartialEq, Eq)]
	#[serde(rename_all = "snake_case")]
	pub enum ToolChoiceOptions {
		None,
		Auto,
		Required,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct NamedToolChoice {
		pub function: FunctionName,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct FunctionName {
		pub name: String,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	#[serde(tag = "type", rename_all = "snake_case")]
	pub enum MessageToolCalls {
		Function(MessageToolCall),
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct MessageToolCall {
		pub id: String,
		pub function: FunctionCall,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct FunctionCall {
		pub name: String,
		/// JSON-encoded arguments, as produced by the model.
		pub arguments: String,
	}

	/// Provider-specific knobs that have no OpenAI equivalent. These ride along on the request
	/// and are consumed by the translators that understand them.
	#[derive(Debug, Deserialize, Clone, Serialize, Default)]
	pub struct RequestVendorExtensions {
		#[serde(skip_serializing_if = "Option::is_none")]
		pub top_k: Option<usize>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub thinking_budget_tokens: Option<u64>,
	}

	#[derive(Debug, Deserialize, Clone, Copy, Serialize, PartialEq, Eq)]
	#[serde(rename_all = "snake_case")]
	pub enum ReasoningEffort {
		None,
		Minimal,
		Low,
		Medium,
		High,
		Xhigh,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct StreamOptions {
		pub include_usage: bool,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct Request {
		#[serde(skip_serializing_if = "Option::is_none")]
		pub model: Option<String>,
		pub messages: Vec<RequestMessage>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub stream: Option<bool>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub stream_options: Option<StreamOptions>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub temperature: Option<f32>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub top_p: Option<f32>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub n: Option<u32>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub max_completion_tokens: Option<u32>,
		/// Deprecated in favor of max_completion_tokens, still widely sent.
		#[serde(skip_serializing_if = "Option::is_none")]
		pub max_tokens: Option<u32>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub stop: Option<Stop>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub presence_penalty: Option<f32>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub frequency_penalty: Option<f32>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub logit_bias: Option<Value>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub logprobs: Option<bool>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub top_logprobs: Option<u32>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub response_format: Option<ResponseFormat>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub seed: Option<i64>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub tools: Option<Vec<Tool>>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub tool_choice: Option<ToolChoiceOption>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub parallel_tool_calls: Option<bool>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub user: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub metadata: Option<Value>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub service_tier: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub reasoning_effort: Option<ReasoningEffort>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub store: Option<bool>,
		#[serde(flatten, default)]
		pub vendor_extensions: RequestVendorExtensions,
	}

	impl Request {
		/// max_tokens resolves the deprecated and current field, defaulting as Anthropic-style
		/// providers require a value.
		pub fn max_tokens(&self) -> usize {
			self
				.max_completion_tokens
				.or(self.max_tokens)
				.unwrap_or(4096) as usize
		}

		pub fn stop_sequences(&self) -> Vec<String> {
			match &self.stop {
				Some(Stop::String(s)) => vec![s.clone()],
				Some(Stop::StringArray(v)) => v.clone(),
				None => vec![],
			}
		}
	}

	#[derive(Debug, Deserialize, Clone, Copy, Serialize, PartialEq, Eq)]
	#[serde(rename_all = "snake_case")]
	pub enum FinishReason {
		Stop,
		Length,
		ToolCalls,
		ContentFilter,
		FunctionCall,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct Response {
		pub id: String,
		pub object: String,
		#[serde(with = "crate::serdes::unix_seconds")]
		pub created: i64,
		pub model: String,
		pub choices: Vec<ChatChoice>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub usage: Option<Usage>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub service_tier: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub system_fingerprint: Option<String>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct ChatChoice {
		pub index: u32,
		pub message: ResponseMessage,
		pub finish_reason: Option<FinishReason>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub logprobs: Option<Value>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct ResponseMessage {
		pub role: Role,
		pub content: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub tool_calls: Option<Vec<MessageToolCalls>>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub refusal: Option<String>,
		/// Reasoning text surfaced by providers that stream thinking content.
		#[serde(skip_serializing_if = "Option::is_none")]
		pub reasoning_content: Option<String>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize, Default, PartialEq, Eq)]
	pub struct Usage {
		pub prompt_tokens: u64,
		pub completion_tokens: u64,
		pub total_tokens: u64,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub prompt_tokens_details: Option<PromptTokensDetails>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub completion_tokens_details: Option<CompletionTokensDetails>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize, Default, PartialEq, Eq)]
	pub struct PromptTokensDetails {
		#[serde(skip_serializing_if = "Option::is_none")]
		pub cached_tokens: Option<u64>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub audio_tokens: Option<u64>,
		/// Non-standard: some providers report cache writes separately.
		#[serde(skip_serializing_if = "Option::is_none")]
		pub cache_creation_tokens: Option<u64>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize, Default, PartialEq, Eq)]
	pub struct CompletionTokensDetails {
		#[serde(skip_serializing_if = "Option::is_none")]
		pub reasoning_tokens: Option<u64>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub audio_tokens: Option<u64>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct StreamResponse {
		pub id: String,
		pub object: String,
		#[serde(with = "crate::serdes::unix_seconds")]
		pub created: i64,
		pub model: String,
		pub choices: Vec<ChatChoiceStream>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub usage: Option<Usage>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub service_tier: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub system_fingerprint: Option<String>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct ChatChoiceStream {
		pub index: u32,
		pub delta: StreamResponseDelta,
		pub finish_reason: Option<FinishReason>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub logprobs: Option<Value>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize, Default)]
	pub struct StreamResponseDelta {
		#[serde(skip_serializing_if = "Option::is_none")]
		pub role: Option<Role>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub content: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub reasoning_content: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub refusal: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub tool_calls: Option<Vec<MessageToolCallChunk>>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct MessageToolCallChunk {
		pub index: u32,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub id: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none", rename = "type")]
		pub kind: Option<String>,
		pub function: FunctionCallChunk,
	}

	#[derive(Debug, Deserialize, Clone, Serialize, Default)]
	pub struct FunctionCallChunk {
		#[serde(skip_serializing_if = "Option::is_none")]
		pub name: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub arguments: Option<String>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct ChatCompletionErrorResponse {
		pub error: ChatCompletionError,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct ChatCompletionError {
		pub r#type: String,
		pub message: String,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub param: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub code: Option<String>,
	}

	/// Prompt is the legacy completions `prompt` union. Candidates are tried in a fixed order;
	/// the order is part of the wire contract.
	#[derive(Debug, Clone, Serialize, PartialEq)]
	#[serde(untagged)]
	pub enum Prompt {
		String(String),
		StringArray(Vec<String>),
		IntArray(Vec<i64>),
		IntArrayArray(Vec<Vec<i64>>),
	}

	impl<'de> Deserialize<'de> for Prompt {
		fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
		where
			D: Deserializer<'de>,
		{
			use serde::de::Error;
			let value = Value::deserialize(deserializer)?;
			// string -> []string -> []int -> [][]int, first success wins
			if let Value::String(s) = value {
				return Ok(Prompt::String(s));
			}
			let Value::Array(_) = &value else {
				return Err(D::Error::custom(
					"prompt must be a string or an array of strings or tokens",
				));
			};
			if let Ok(v) = serde_json::from_value::<Vec<String>>(value.clone()) {
				return Ok(Prompt::StringArray(v));
			}
			if let Ok(v) = serde_json::from_value::<Vec<i64>>(value.clone()) {
				return Ok(Prompt::IntArray(v));
			}
			if let Ok(v) = serde_json::from_value::<Vec<Vec<i64>>>(value) {
				return Ok(Prompt::IntArrayArray(v));
			}
			Err(D::Error::custom("cannot unmarshal prompt as []T"))
		}
	}

	/// Legacy completions request; only forwarded, never translated.
	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct TextCompletionRequest {
		#[serde(skip_serializing_if = "Option::is_none")]
		pub model: Option<String>,
		pub prompt: Prompt,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub max_tokens: Option<u32>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub stream: Option<bool>,
		#[serde(flatten, default)]
		pub rest: Value,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct TextCompletionResponse {
		pub id: String,
		pub object: String,
		#[serde(with = "crate::serdes::unix_seconds")]
		pub created: i64,
		pub model: String,
		pub choices: Vec<TextCompletionChoice>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub usage: Option<Usage>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct TextCompletionChoice {
		pub index: u32,
		pub text: String,
		pub finish_reason: Option<FinishReason>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub logprobs: Option<Value>,
	}
}

#[cfg(test)]
#[path = "completions_tests.rs"]
mod tests;
