use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Request is the routing view of a Responses API body. Fields the gateway reads or rewrites
/// are typed; everything else passes through unchanged.
#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct Request {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub model: Option<String>,
	pub input: ResponseInput,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub instructions: Option<Instructions>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub max_output_tokens: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub temperature: Option<f32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub top_p: Option<f32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stream: Option<bool>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tools: Option<Vec<ResponseTool>>,

	#[serde(flatten, default)]
	pub rest: Value,
}

impl Request {
	pub fn streaming(&self) -> bool {
		self.stream.unwrap_or_default()
	}
}

/// Input accepts either a bare string (shorthand for a single user message) or a list of
/// input items. Candidate order is part of the contract: string first.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ResponseInput {
	Text(String),
	Items(Vec<ResponseInputItem>),
}

impl<'de> Deserialize<'de> for ResponseInput {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = Value::deserialize(deserializer)?;
		match value {
			Value::String(s) => Ok(ResponseInput::Text(s)),
			Value::Array(_) => Ok(ResponseInput::Items(
				serde_json::from_value(value).map_err(D::Error::custom)?,
			)),
			_ => Err(D::Error::custom("input must be a string or an array")),
		}
	}
}

/// Instructions accepts either a bare string or a list of input items.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Instructions {
	Text(String),
	Items(Vec<ResponseInputItem>),
}

impl<'de> Deserialize<'de> for Instructions {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = Value::deserialize(deserializer)?;
		match value {
			Value::String(s) => Ok(Instructions::Text(s)),
			Value::Array(_) => Ok(Instructions::Items(
				serde_json::from_value(value).map_err(D::Error::custom)?,
			)),
			_ => Err(D::Error::custom("instructions must be a string or an array")),
		}
	}
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseRole {
	#[default]
	User,
	Assistant,
	System,
	Developer,
}

/// A message item's content: a bare string or typed parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
	Text(String),
	Parts(Vec<MessageContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContentPart {
	InputText {
		text: String,
	},
	InputImage {
		#[serde(skip_serializing_if = "Option::is_none")]
		image_url: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		file_id: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		detail: Option<String>,
	},
	InputAudio {
		input_audio: InputAudioData,
	},
	InputFile {
		#[serde(skip_serializing_if = "Option::is_none")]
		file_id: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		filename: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		file_data: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		file_url: Option<String>,
	},
	OutputText(OutputText),
	Refusal {
		refusal: String,
	},
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputAudioData {
	pub data: String,
	pub format: String,
}

/// OutputText keeps `annotations` behind an Option so a present-but-empty array round-trips
/// as `[]` while an absent one stays absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputText {
	pub text: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub annotations: Option<Vec<Annotation>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub logprobs: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Annotation {
	UrlCitation {
		url: String,
		title: String,
		start_index: u64,
		end_index: u64,
	},
	FileCitation {
		file_id: String,
		#[serde(skip_serializing_if = "Option::is_none")]
		filename: Option<String>,
		index: u64,
	},
	FilePath {
		file_id: String,
		index: u64,
	},
	ContainerFileCitation {
		container_id: String,
		file_id: String,
		#[serde(skip_serializing_if = "Option::is_none")]
		filename: Option<String>,
		start_index: u64,
		end_index: u64,
	},
}

// ---------------------------------------------------------------------------
// Input items
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageItem {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	pub role: ResponseRole,
	pub content: MessageContent,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCallItem {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	pub call_id: String,
	pub name: String,
	pub arguments: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCallOutputItem {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	pub call_id: String,
	pub output: Value,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileSearchCallItem {
	pub id: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub queries: Option<Vec<String>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub results: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComputerCallItem {
	pub id: String,
	pub call_id: String,
	pub action: Value,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub pending_safety_checks: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComputerCallOutputItem {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	pub call_id: String,
	pub output: Value,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub acknowledged_safety_checks: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebSearchCallItem {
	pub id: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub action: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReasoningItem {
	pub id: String,
	pub summary: Vec<ReasoningSummaryPart>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub content: Option<Vec<ReasoningContentPart>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub encrypted_content: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReasoningSummaryPart {
	SummaryText { text: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReasoningContentPart {
	ReasoningText { text: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageGenerationCallItem {
	pub id: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeInterpreterCallItem {
	pub id: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub code: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub container_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub outputs: Option<Vec<Value>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalShellCallItem {
	pub id: String,
	pub call_id: String,
	pub action: Value,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalShellCallOutputItem {
	pub id: String,
	pub output: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShellCallItem {
	pub id: String,
	pub call_id: String,
	pub action: Value,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShellCallOutputItem {
	pub id: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub call_id: Option<String>,
	pub output: Value,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplyPatchCallItem {
	pub id: String,
	pub call_id: String,
	pub operation: Value,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplyPatchCallOutputItem {
	pub id: String,
	pub call_id: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub output: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpListToolsItem {
	pub id: String,
	pub server_label: String,
	pub tools: Vec<McpToolDescription>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpToolDescription {
	pub name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub input_schema: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub annotations: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpApprovalRequestItem {
	pub id: String,
	pub server_label: String,
	pub name: String,
	pub arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpApprovalResponseItem {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	pub approval_request_id: String,
	pub approve: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpCallItem {
	pub id: String,
	pub server_label: String,
	pub name: String,
	pub arguments: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub output: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub approval_request_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomToolCallItem {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	pub call_id: String,
	pub name: String,
	pub input: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomToolCallOutputItem {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	pub call_id: String,
	pub output: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemReference {
	pub id: String,
}

/// ResponseInputItem is the discriminated union of everything that may appear in a request's
/// `input` array. The variant is selected by the `"type"` field; a payload without `"type"` but
/// with both `role` and `content` is treated as a `message` (the only shape heuristic honored).
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseInputItem {
	Message(MessageItem),
	FunctionCall(FunctionCallItem),
	FunctionCallOutput(FunctionCallOutputItem),
	FileSearchCall(FileSearchCallItem),
	ComputerCall(ComputerCallItem),
	ComputerCallOutput(ComputerCallOutputItem),
	WebSearchCall(WebSearchCallItem),
	Reasoning(ReasoningItem),
	ImageGenerationCall(ImageGenerationCallItem),
	CodeInterpreterCall(CodeInterpreterCallItem),
	LocalShellCall(LocalShellCallItem),
	LocalShellCallOutput(LocalShellCallOutputItem),
	ShellCall(ShellCallItem),
	ShellCallOutput(ShellCallOutputItem),
	ApplyPatchCall(ApplyPatchCallItem),
	ApplyPatchCallOutput(ApplyPatchCallOutputItem),
	McpListTools(McpListToolsItem),
	McpApprovalRequest(McpApprovalRequestItem),
	McpApprovalResponse(McpApprovalResponseItem),
	McpCall(McpCallItem),
	CustomToolCall(CustomToolCallItem),
	CustomToolCallOutput(CustomToolCallOutputItem),
	ItemReference(ItemReference),
}

impl<'de> Deserialize<'de> for ResponseInputItem {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = Value::deserialize(deserializer)?;
		let Some(obj) = value.as_object() else {
			return Err(D::Error::custom("input item must be an object"));
		};
		let tag = match obj.get("type").and_then(|t| t.as_str()) {
			Some(t) => t.to_string(),
			None => {
				if obj.contains_key("role") && obj.contains_key("content") {
					"message".to_string()
				} else {
					return Err(D::Error::custom("unknown variant: missing \"type\""));
				}
			},
		};
		fn parse<T: serde::de::DeserializeOwned, E: serde::de::Error>(v: Value) -> Result<T, E> {
			serde_json::from_value(v).map_err(E::custom)
		}
		// The static tag registry. An unlisted tag is an unknown variant.
		Ok(match tag.as_str() {
			"message" => ResponseInputItem::Message(parse(value)?),
			"function_call" => ResponseInputItem::FunctionCall(parse(value)?),
			"function_call_output" => ResponseInputItem::FunctionCallOutput(parse(value)?),
			"file_search_call" => ResponseInputItem::FileSearchCall(parse(value)?),
			"computer_call" => ResponseInputItem::ComputerCall(parse(value)?),
			"computer_call_output" => ResponseInputItem::ComputerCallOutput(parse(value)?),
			"web_search_call" => ResponseInputItem::WebSearchCall(parse(value)?),
			"reasoning" => ResponseInputItem::Reasoning(parse(value)?),
			"image_generation_call" => ResponseInputItem::ImageGenerationCall(parse(value)?),
			"code_interpreter_call" => ResponseInputItem::CodeInterpreterCall(parse(value)?),
			"local_shell_call" => ResponseInputItem::LocalShellCall(parse(value)?),
			"local_shell_call_output" => ResponseInputItem::LocalShellCallOutput(parse(value)?),
			"shell_call" => ResponseInputItem::ShellCall(parse(value)?),
			"shell_call_output" => ResponseInputItem::ShellCallOutput(parse(value)?),
			"apply_patch_call" => ResponseInputItem::ApplyPatchCall(parse(value)?),
			"apply_patch_call_output" => ResponseInputItem::ApplyPatchCallOutput(parse(value)?),
			"mcp_list_tools" => ResponseInputItem::McpListTools(parse(value)?),
			"mcp_approval_request" => ResponseInputItem::McpApprovalRequest(parse(value)?),
			"mcp_approval_response" => ResponseInputItem::McpApprovalResponse(parse(value)?),
			"mcp_call" => ResponseInputItem::McpCall(parse(value)?),
			"custom_tool_call" => ResponseInputItem::CustomToolCall(parse(value)?),
			"custom_tool_call_output" => ResponseInputItem::CustomToolCallOutput(parse(value)?),
			"item_reference" => ResponseInputItem::ItemReference(parse(value)?),
			other => {
				return Err(D::Error::custom(format!("unknown variant: {other:?}")));
			},
		})
	}
}

/// ResponseOutputItem is the union of items appearing in a response's `output` array.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseOutputItem {
	Message(MessageItem),
	FunctionCall(FunctionCallItem),
	FileSearchCall(FileSearchCallItem),
	WebSearchCall(WebSearchCallItem),
	ComputerCall(ComputerCallItem),
	Reasoning(ReasoningItem),
	ImageGenerationCall(ImageGenerationCallItem),
	CodeInterpreterCall(CodeInterpreterCallItem),
	LocalShellCall(LocalShellCallItem),
	ShellCall(ShellCallItem),
	ApplyPatchCall(ApplyPatchCallItem),
	McpCall(McpCallItem),
	McpListTools(McpListToolsItem),
	McpApprovalRequest(McpApprovalRequestItem),
	CustomToolCall(CustomToolCallItem),
}

impl ResponseOutputItem {
	/// The text a human would read out of this item, if any.
	pub fn output_text(&self) -> Option<String> {
		match self {
			ResponseOutputItem::Message(m) => match &m.content {
				MessageContent::Text(t) => Some(t.clone()),
				MessageContent::Parts(parts) => {
					let texts: Vec<&str> = parts
						.iter()
						.filter_map(|p| match p {
							MessageContentPart::OutputText(t) => Some(t.text.as_str()),
							_ => None,
						})
						.collect();
					(!texts.is_empty()).then(|| texts.join("\n"))
				},
			},
			_ => None,
		}
	}
}

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionToolDef {
	pub name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub parameters: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub strict: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileSearchToolDef {
	pub vector_store_ids: Vec<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub filters: Option<Filter>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub max_num_results: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub ranking_options: Option<Value>,
}

/// A file-search filter: either a comparison leaf or a boolean combination.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Filter {
	Comparison(ComparisonFilter),
	Compound(CompoundFilter),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonFilter {
	pub key: String,
	pub r#type: String,
	pub value: ComparisonFilterValue,
}

/// Shape union: string, number, bool, or array, tried in that order.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ComparisonFilterValue {
	String(String),
	Number(f64),
	Bool(bool),
	Array(Vec<Value>),
}

impl<'de> Deserialize<'de> for ComparisonFilterValue {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		Ok(match Value::deserialize(deserializer)? {
			Value::String(s) => ComparisonFilterValue::String(s),
			Value::Number(n) => {
				// Integers widen silently into the float representation.
				ComparisonFilterValue::Number(n.as_f64().ok_or_else(|| {
					D::Error::custom("comparison filter value out of range")
				})?)
			},
			Value::Bool(b) => ComparisonFilterValue::Bool(b),
			Value::Array(a) => ComparisonFilterValue::Array(a),
			_ => return Err(D::Error::custom("unsupported comparison filter value")),
		})
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompoundFilter {
	pub r#type: String,
	pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComputerUseToolDef {
	pub display_width: u32,
	pub display_height: u32,
	pub environment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct WebSearchToolDef {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub filters: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub search_context_size: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub user_location: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpToolDef {
	pub server_label: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub server_url: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub server_description: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub headers: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub allowed_tools: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub require_approval: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub authorization: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeInterpreterToolDef {
	pub container: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ImageGenerationToolDef {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub model: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub size: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub quality: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub output_format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomToolDef {
	pub name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub format: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EmptyToolDef {}

/// ResponseTool is the union of tool definitions a request may carry. The two date-stamped
/// web-search tags are aliases of their plain counterparts but must round-trip under the tag
/// they arrived with, so each alias is its own variant sharing the payload struct.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseTool {
	Function(FunctionToolDef),
	FileSearch(FileSearchToolDef),
	ComputerUsePreview(ComputerUseToolDef),
	WebSearch(WebSearchToolDef),
	#[serde(rename = "web_search_2025_08_26")]
	WebSearch20250826(WebSearchToolDef),
	Mcp(McpToolDef),
	CodeInterpreter(CodeInterpreterToolDef),
	ImageGeneration(ImageGenerationToolDef),
	Custom(CustomToolDef),
	LocalShell(EmptyToolDef),
	Shell(EmptyToolDef),
	WebSearchPreview(WebSearchToolDef),
	#[serde(rename = "web_search_preview_2025_03_11")]
	WebSearchPreview20250311(WebSearchToolDef),
	ApplyPatch(EmptyToolDef),
}

// ---------------------------------------------------------------------------
// Response object
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ResponseUsage {
	pub input_tokens: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub input_tokens_details: Option<InputTokensDetails>,
	pub output_tokens: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub output_tokens_details: Option<OutputTokensDetails>,
	pub total_tokens: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct InputTokensDetails {
	pub cached_tokens: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct OutputTokensDetails {
	pub reasoning_tokens: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseError {
	pub code: String,
	pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
	pub id: String,
	pub object: String,
	#[serde(with = "crate::serdes::unix_seconds")]
	pub created_at: i64,
	pub status: String,
	pub model: String,
	pub output: Vec<ResponseOutputItem>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub usage: Option<ResponseUsage>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<ResponseError>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub incomplete_details: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub instructions: Option<Instructions>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub max_output_tokens: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub parallel_tool_calls: Option<bool>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub previous_response_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reasoning: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub temperature: Option<f32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tool_choice: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tools: Option<Vec<ResponseTool>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub top_p: Option<f32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub truncation: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub metadata: Option<Value>,
}

// ---------------------------------------------------------------------------
// Stream events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseEvent {
	pub response: Response,
	pub sequence_number: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputItemEvent {
	pub item: ResponseOutputItem,
	pub output_index: u32,
	pub sequence_number: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentPartEvent {
	pub item_id: String,
	pub output_index: u32,
	pub content_index: u32,
	pub part: MessageContentPart,
	pub sequence_number: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextDeltaEvent {
	pub item_id: String,
	pub output_index: u32,
	pub content_index: u32,
	pub delta: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub logprobs: Option<Value>,
	pub sequence_number: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextDoneEvent {
	pub item_id: String,
	pub output_index: u32,
	pub content_index: u32,
	pub text: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub logprobs: Option<Value>,
	pub sequence_number: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnnotationAddedEvent {
	pub item_id: String,
	pub output_index: u32,
	pub content_index: u32,
	pub annotation_index: u32,
	pub annotation: Annotation,
	pub sequence_number: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefusalDeltaEvent {
	pub item_id: String,
	pub output_index: u32,
	pub content_index: u32,
	pub delta: String,
	pub sequence_number: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefusalDoneEvent {
	pub item_id: String,
	pub output_index: u32,
	pub content_index: u32,
	pub refusal: String,
	pub sequence_number: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArgumentsDeltaEvent {
	pub item_id: String,
	pub output_index: u32,
	pub delta: String,
	pub sequence_number: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArgumentsDoneEvent {
	pub item_id: String,
	pub output_index: u32,
	pub arguments: String,
	pub sequence_number: u64,
}

/// Shared by the per-tool lifecycle notifications (`*.in_progress`, `*.searching`, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallStateEvent {
	pub item_id: String,
	pub output_index: u32,
	pub sequence_number: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReasoningSummaryPartEvent {
	pub item_id: String,
	pub output_index: u32,
	pub summary_index: u32,
	pub part: ReasoningSummaryPart,
	pub sequence_number: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReasoningSummaryTextEvent {
	pub item_id: String,
	pub output_index: u32,
	pub summary_index: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub delta: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub text: Option<String>,
	pub sequence_number: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReasoningTextEvent {
	pub item_id: String,
	pub output_index: u32,
	pub content_index: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub delta: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub text: Option<String>,
	pub sequence_number: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartialImageEvent {
	pub item_id: String,
	pub output_index: u32,
	pub partial_image_index: u32,
	pub partial_image_b64: String,
	pub sequence_number: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeDeltaEvent {
	pub item_id: String,
	pub output_index: u32,
	pub delta: String,
	pub sequence_number: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeDoneEvent {
	pub item_id: String,
	pub output_index: u32,
	pub code: String,
	pub sequence_number: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomToolInputDeltaEvent {
	pub item_id: String,
	pub output_index: u32,
	pub delta: String,
	pub sequence_number: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomToolInputDoneEvent {
	pub item_id: String,
	pub output_index: u32,
	pub input: String,
	pub sequence_number: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpStateEvent {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub item_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub output_index: Option<u32>,
	pub sequence_number: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorEvent {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub code: Option<String>,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub param: Option<String>,
	pub sequence_number: u64,
}

/// ResponseStreamEvent is the union of every SSE event a Responses stream may carry. Each
/// event's `"type"` tag is the dotted wire name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ResponseStreamEvent {
	#[serde(rename = "response.created")]
	Created(ResponseEvent),
	#[serde(rename = "response.in_progress")]
	InProgress(ResponseEvent),
	#[serde(rename = "response.completed")]
	Completed(ResponseEvent),
	#[serde(rename = "response.failed")]
	Failed(ResponseEvent),
	#[serde(rename = "response.incomplete")]
	Incomplete(ResponseEvent),
	#[serde(rename = "response.queued")]
	Queued(ResponseEvent),
	#[serde(rename = "error")]
	Error(ErrorEvent),
	#[serde(rename = "response.output_item.added")]
	OutputItemAdded(OutputItemEvent),
	#[serde(rename = "response.output_item.done")]
	OutputItemDone(OutputItemEvent),
	#[serde(rename = "response.content_part.added")]
	ContentPartAdded(ContentPartEvent),
	#[serde(rename = "response.content_part.done")]
	ContentPartDone(ContentPartEvent),
	#[serde(rename = "response.output_text.delta")]
	OutputTextDelta(TextDeltaEvent),
	#[serde(rename = "response.output_text.done")]
	OutputTextDone(TextDoneEvent),
	#[serde(rename = "response.output_text.annotation.added")]
	OutputTextAnnotationAdded(AnnotationAddedEvent),
	#[serde(rename = "response.refusal.delta")]
	RefusalDelta(RefusalDeltaEvent),
	#[serde(rename = "response.refusal.done")]
	RefusalDone(RefusalDoneEvent),
	#[serde(rename = "response.function_call_arguments.delta")]
	FunctionCallArgumentsDelta(ArgumentsDeltaEvent),
	#[serde(rename = "response.function_call_arguments.done")]
	FunctionCallArgumentsDone(ArgumentsDoneEvent),
	#[serde(rename = "response.file_search_call.in_progress")]
	FileSearchCallInProgress(ToolCallStateEvent),
	#[serde(rename = "response.file_search_call.searching")]
	FileSearchCallSearching(ToolCallStateEvent),
	#[serde(rename = "response.file_search_call.completed")]
	FileSearchCallCompleted(ToolCallStateEvent),
	#[serde(rename = "response.web_search_call.in_progress")]
	WebSearchCallInProgress(ToolCallStateEvent),
	#[serde(rename = "response.web_search_call.searching")]
	WebSearchCallSearching(ToolCallStateEvent),
	#[serde(rename = "response.web_search_call.completed")]
	WebSearchCallCompleted(ToolCallStateEvent),
	#[serde(rename = "response.reasoning_summary_part.added")]
	ReasoningSummaryPartAdded(ReasoningSummaryPartEvent),
	#[serde(rename = "response.reasoning_summary_part.done")]
	ReasoningSummaryPartDone(ReasoningSummaryPartEvent),
	#[serde(rename = "response.reasoning_summary_text.delta")]
	ReasoningSummaryTextDelta(ReasoningSummaryTextEvent),
	#[serde(rename = "response.reasoning_summary_text.done")]
	ReasoningSummaryTextDone(ReasoningSummaryTextEvent),
	#[serde(rename = "response.reasoning_text.delta")]
	ReasoningTextDelta(ReasoningTextEvent),
	#[serde(rename = "response.reasoning_text.done")]
	ReasoningTextDone(ReasoningTextEvent),
	#[serde(rename = "response.image_generation_call.in_progress")]
	ImageGenerationCallInProgress(ToolCallStateEvent),
	#[serde(rename = "response.image_generation_call.generating")]
	ImageGenerationCallGenerating(ToolCallStateEvent),
	#[serde(rename = "response.image_generation_call.partial_image")]
	ImageGenerationCallPartialImage(PartialImageEvent),
	#[serde(rename = "response.image_generation_call.completed")]
	ImageGenerationCallCompleted(ToolCallStateEvent),
	#[serde(rename = "response.mcp_call_arguments.delta")]
	McpCallArgumentsDelta(ArgumentsDeltaEvent),
	#[serde(rename = "response.mcp_call_arguments.done")]
	McpCallArgumentsDone(ArgumentsDoneEvent),
	#[serde(rename = "response.mcp_call.in_progress")]
	McpCallInProgress(ToolCallStateEvent),
	#[serde(rename = "response.mcp_call.completed")]
	McpCallCompleted(McpStateEvent),
	#[serde(rename = "response.mcp_call.failed")]
	McpCallFailed(McpStateEvent),
	#[serde(rename = "response.mcp_list_tools.in_progress")]
	McpListToolsInProgress(McpStateEvent),
	#[serde(rename = "response.mcp_list_tools.completed")]
	McpListToolsCompleted(McpStateEvent),
	#[serde(rename = "response.mcp_list_tools.failed")]
	McpListToolsFailed(McpStateEvent),
	#[serde(rename = "response.code_interpreter_call.in_progress")]
	CodeInterpreterCallInProgress(ToolCallStateEvent),
	#[serde(rename = "response.code_interpreter_call.interpreting")]
	CodeInterpreterCallInterpreting(ToolCallStateEvent),
	#[serde(rename = "response.code_interpreter_call.completed")]
	CodeInterpreterCallCompleted(ToolCallStateEvent),
	#[serde(rename = "response.code_interpreter_call_code.delta")]
	CodeInterpreterCallCodeDelta(CodeDeltaEvent),
	#[serde(rename = "response.code_interpreter_call_code.done")]
	CodeInterpreterCallCodeDone(CodeDoneEvent),
	#[serde(rename = "response.custom_tool_call_input.delta")]
	CustomToolCallInputDelta(CustomToolInputDeltaEvent),
	#[serde(rename = "response.custom_tool_call_input.done")]
	CustomToolCallInputDone(CustomToolInputDoneEvent),
	#[serde(rename = "response.apply_patch_call.in_progress")]
	ApplyPatchCallInProgress(ToolCallStateEvent),
	#[serde(rename = "response.apply_patch_call.completed")]
	ApplyPatchCallCompleted(ToolCallStateEvent),
	#[serde(rename = "response.apply_patch_call.failed")]
	ApplyPatchCallFailed(ToolCallStateEvent),
}

impl ResponseStreamEvent {
	/// usage carried by terminal events, if any.
	pub fn usage(&self) -> Option<&ResponseUsage> {
		match self {
			ResponseStreamEvent::Created(e)
			| ResponseStreamEvent::InProgress(e)
			| ResponseStreamEvent::Completed(e)
			| ResponseStreamEvent::Failed(e)
			| ResponseStreamEvent::Incomplete(e)
			| ResponseStreamEvent::Queued(e) => e.response.usage.as_ref(),
			_ => None,
		}
	}

	pub fn response_model(&self) -> Option<&str> {
		match self {
			ResponseStreamEvent::Created(e)
			| ResponseStreamEvent::InProgress(e)
			| ResponseStreamEvent::Completed(e)
			| ResponseStreamEvent::Failed(e)
			| ResponseStreamEvent::Incomplete(e)
			| ResponseStreamEvent::Queued(e) => Some(e.response.model.as_str()),
			_ => None,
		}
	}

	/// True for events that carry model-visible output (used for time-to-first-token).
	pub fn carries_output(&self) -> bool {
		matches!(
			self,
			ResponseStreamEvent::OutputTextDelta(_)
				| ResponseStreamEvent::RefusalDelta(_)
				| ResponseStreamEvent::FunctionCallArgumentsDelta(_)
				| ResponseStreamEvent::ReasoningTextDelta(_)
				| ResponseStreamEvent::ReasoningSummaryTextDelta(_)
		)
	}
}

#[cfg(test)]
#[path = "responses_tests.rs"]
mod tests;
