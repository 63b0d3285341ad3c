use std::collections::HashMap;

use aigw_core::prelude::*;
use bytes::{Bytes, BytesMut};
use itertools::Itertools;

use crate::http::{HeaderMap, HeaderMutation, header_str};
use crate::llm::translator::{
	BodyMutation, RequestTransform, ResponseTransform, Translator, message_id, now_unix,
	parse_request, route_to,
};
use crate::llm::types::bedrock as converse;
use crate::llm::types::completions::typed as completions;
use crate::llm::types::messages::typed as messages;
use crate::llm::types::{TokenUsage, completions as completions_api, embeddings, messages as messages_api};
use crate::llm::{AIError, RouteType, bedrock};
use crate::parse;

const EVENT_STREAM_CONTENT_TYPE: &str = "application/vnd.amazon.eventstream";

fn is_aws_event_stream(headers: &HeaderMap) -> bool {
	header_str(headers, "content-type")
		.map(|ct| ct.starts_with(EVENT_STREAM_CONTENT_TYPE))
		.unwrap_or(false)
}

/// Reframe headers: the AWS binary event-stream becomes SSE for the client.
fn sse_response_headers() -> HeaderMutation {
	HeaderMutation::default()
		.set(strng::literal!("content-type"), strng::literal!("text/event-stream"))
		.remove(strng::literal!("content-length"))
}

/// ChatToConverse translates OpenAI chat completions to the Bedrock Converse API, including
/// re-framing the binary event stream into OpenAI SSE chunks.
pub struct ChatToConverse {
	provider: bedrock::Provider,
	streaming: bool,
	request_model: Strng,
	decoder: parse::aws_sse::Parser,
	// Streaming state
	stream_id: String,
	created: i64,
	tool_blocks: HashMap<i32, String>,
	done: bool,
}

impl ChatToConverse {
	pub fn new(provider: bedrock::Provider) -> Self {
		ChatToConverse {
			provider,
			streaming: false,
			request_model: Strng::default(),
			decoder: parse::aws_sse::Parser::new(),
			stream_id: message_id("chatcmpl"),
			created: 0,
			tool_blocks: HashMap::new(),
			done: false,
		}
	}

	fn mk(
		&self,
		choices: Vec<completions::ChatChoiceStream>,
		usage: Option<completions::Usage>,
	) -> completions::StreamResponse {
		completions::StreamResponse {
			id: self.stream_id.clone(),
			model: self.request_model.to_string(),
			object: "chat.completion.chunk".to_string(),
			created: self.created,
			choices,
			usage,
			service_tier: None,
			system_fingerprint: None,
		}
	}

	fn translate_stream_event(
		&mut self,
		ev: converse::ConverseStreamOutput,
		out: &mut ResponseTransform,
	) -> Option<completions::StreamResponse> {
		match ev {
			converse::ConverseStreamOutput::MessageStart(start) => {
				let choice = completions::ChatChoiceStream {
					index: 0,
					delta: completions::StreamResponseDelta {
						role: Some(match start.role {
							converse::Role::Assistant => completions::Role::Assistant,
							converse::Role::User => completions::Role::User,
						}),
						..Default::default()
					},
					finish_reason: None,
					logprobs: None,
				};
				Some(self.mk(vec![choice], None))
			},
			converse::ConverseStreamOutput::ContentBlockStart(start) => {
				// Only tool-call starts carry information the chat schema needs up front
				let converse::ContentBlockStart::ToolUse(tu) = start.start?;
				self.tool_blocks.insert(start.content_block_index, String::new());
				out.saw_output = true;
				let delta = completions::StreamResponseDelta {
					tool_calls: Some(vec![completions::MessageToolCallChunk {
						index: start.content_block_index as u32,
						id: Some(tu.tool_use_id),
						kind: Some("function".to_string()),
						function: completions::FunctionCallChunk {
							name: Some(tu.name),
							arguments: None,
						},
					}]),
					..Default::default()
				};
				Some(self.mk(
					vec![completions::ChatChoiceStream {
						index: 0,
						delta,
						finish_reason: None,
						logprobs: None,
					}],
					None,
				))
			},
			converse::ConverseStreamOutput::ContentBlockDelta(d) => {
				let delta = d.delta?;
				let mut dr = completions::StreamResponseDelta::default();
				match delta {
					converse::ContentBlockDelta::Text(t) => {
						out.saw_output = true;
						dr.content = Some(t);
					},
					converse::ContentBlockDelta::ReasoningContent(
						converse::ReasoningContentBlockDelta::Text(t),
					) => {
						out.saw_output = true;
						dr.reasoning_content = Some(t);
					},
					converse::ContentBlockDelta::ReasoningContent(_) => return None,
					converse::ContentBlockDelta::ToolUse(tu) => {
						out.saw_output = true;
						if let Some(buffer) = self.tool_blocks.get_mut(&d.content_block_index) {
							buffer.push_str(&tu.input);
						}
						dr.tool_calls = Some(vec![completions::MessageToolCallChunk {
							index: d.content_block_index as u32,
							id: None, // Only sent in the first chunk
							kind: None,
							function: completions::FunctionCallChunk {
								name: None,
								arguments: Some(tu.input),
							},
						}]);
					},
				}
				Some(self.mk(
					vec![completions::ChatChoiceStream {
						index: 0,
						delta: dr,
						finish_reason: None,
						logprobs: None,
					}],
					None,
				))
			},
			converse::ConverseStreamOutput::ContentBlockStop(stop) => {
				self.tool_blocks.remove(&stop.content_block_index);
				None
			},
			converse::ConverseStreamOutput::MessageStop(stop) => {
				let choice = completions::ChatChoiceStream {
					index: 0,
					delta: Default::default(),
					finish_reason: Some(stop_reason_to_finish(&stop.stop_reason)),
					logprobs: None,
				};
				Some(self.mk(vec![choice], None))
			},
			converse::ConverseStreamOutput::Metadata(metadata) => {
				let usage = metadata.usage?;
				let tu = usage.token_usage();
				out.usage = out.usage.override_with(&tu);
				Some(self.mk(
					vec![],
					Some(completions::Usage {
						prompt_tokens: tu.input_tokens.unwrap_or_default(),
						completion_tokens: tu.output_tokens.unwrap_or_default(),
						total_tokens: tu.total_tokens.unwrap_or_default(),
						prompt_tokens_details: tu.cached_input_tokens.map(|cached| {
							completions::PromptTokensDetails {
								cached_tokens: Some(cached),
								audio_tokens: None,
								cache_creation_tokens: tu.cache_creation_input_tokens,
							}
						}),
						completion_tokens_details: None,
					}),
				))
			},
		}
	}
}

impl Translator for ChatToConverse {
	fn request_body(
		&mut self,
		_headers: &HeaderMap,
		body: &Bytes,
		_force_body_mutation: bool,
	) -> Result<RequestTransform, AIError> {
		let routing: completions_api::Request = parse_request(body)?;
		routing.validate()?;
		let typed: completions::Request =
			serde_json::from_slice(body).map_err(AIError::classify_request_parse)?;

		let original_model = strng::new(typed.model.as_deref().unwrap_or_default());
		let request_model = self
			.provider
			.model
			.clone()
			.unwrap_or_else(|| original_model.clone());
		if request_model.is_empty() {
			return Err(AIError::MissingField(strng::literal!("model")));
		}
		self.streaming = typed.stream.unwrap_or_default();
		self.request_model = request_model.clone();
		self.created = now_unix();

		let converse_req = chat_to_converse(typed, request_model.to_string());
		let bytes = serde_json::to_vec(&converse_req).map_err(AIError::RequestMarshal)?;

		let path =
			self
				.provider
				.get_path_for_route(RouteType::ChatCompletions, self.streaming, &request_model);
		Ok(RequestTransform {
			headers: route_to(path.as_str()),
			body: BodyMutation::Replace(Bytes::from(bytes)),
			original_model,
			request_model,
			override_host: Some(self.provider.get_host()),
			streaming: self.streaming,
		})
	}

	fn response_headers(&mut self, headers: &HeaderMap) -> Result<HeaderMutation, AIError> {
		if self.streaming || is_aws_event_stream(headers) {
			return Ok(sse_response_headers());
		}
		Ok(HeaderMutation::default())
	}

	fn response_body(
		&mut self,
		headers: &HeaderMap,
		chunk: &Bytes,
		end_of_stream: bool,
	) -> Result<ResponseTransform, AIError> {
		if self.streaming || is_aws_event_stream(headers) {
			let mut out = ResponseTransform::passthrough();
			let frames = self
				.decoder
				.push(chunk)
				.map_err(|e| AIError::Internal(e.to_string()))?;
			let mut body = BytesMut::new();
			for frame in frames {
				let ev = converse::ConverseStreamOutput::deserialize(&frame)
					.map_err(|e| AIError::Internal(e.to_string()))?;
				if let Some(resp) = self.translate_stream_event(ev, &mut out)
					&& let Some(encoded) = parse::sse::encode_json_event("", &resp)
				{
					body.extend_from_slice(&encoded);
				}
			}
			if end_of_stream && !self.done {
				self.done = true;
				body.extend_from_slice(&parse::sse::done_frame());
			}
			out.body = BodyMutation::Replace(body.freeze());
			return Ok(out);
		}
		if !end_of_stream {
			return Ok(ResponseTransform::passthrough());
		}
		let resp: converse::ConverseResponse =
			serde_json::from_slice(chunk).map_err(AIError::ResponseParsing)?;
		let usage = resp.usage.map(|u| u.token_usage()).unwrap_or_default();
		let openai = converse_response_to_chat(resp, self.request_model.as_str())?;
		let body = serde_json::to_vec(&openai).map_err(AIError::ResponseMarshal)?;
		Ok(ResponseTransform {
			headers: HeaderMutation::default(),
			body: BodyMutation::Replace(Bytes::from(body)),
			usage,
			response_model: Some(self.request_model.clone()),
			saw_output: false,
		})
	}

	fn response_error(
		&mut self,
		_headers: &HeaderMap,
		body: &Bytes,
	) -> Result<(HeaderMutation, BodyMutation), AIError> {
		let res: converse::ConverseErrorResponse =
			serde_json::from_slice(body).map_err(AIError::ResponseMarshal)?;
		let m = completions::ChatCompletionErrorResponse {
			error: completions::ChatCompletionError {
				r#type: "invalid_request_error".to_string(),
				message: res.message,
				param: None,
				code: None,
			},
		};
		let body = serde_json::to_vec(&m).map_err(AIError::ResponseMarshal)?;
		Ok((HeaderMutation::default(), BodyMutation::Replace(Bytes::from(body))))
	}
}

/// Translate an OpenAI chat completions request into a Bedrock Converse request.
pub(crate) fn chat_to_converse(
	req: completions::Request,
	model_id: String,
) -> converse::ConverseRequest {
	// Extract and join system prompts
	let system_text = req
		.messages
		.iter()
		.filter(|m| matches!(m.role(), "system" | "developer"))
		.filter_map(|m| m.text())
		.collect::<Vec<String>>()
		.join("\n");

	let mut msgs: Vec<converse::Message> = Vec::new();
	for msg in &req.messages {
		match msg {
			completions::RequestMessage::System(_) | completions::RequestMessage::Developer(_) => {},
			completions::RequestMessage::User(_) => {
				if let Some(text) = msg.text().filter(|s| !s.trim().is_empty()) {
					msgs.push(converse::Message {
						role: converse::Role::User,
						content: vec![converse::ContentBlock::Text(text)],
					});
				}
			},
			completions::RequestMessage::Tool(m) => {
				msgs.push(converse::Message {
					role: converse::Role::User,
					content: vec![converse::ContentBlock::ToolResult(converse::ToolResultBlock {
						tool_use_id: m.tool_call_id.clone(),
						content: vec![converse::ToolResultContentBlock::Text(
							m.content.text().unwrap_or_default(),
						)],
						status: None,
					})],
				});
			},
			completions::RequestMessage::Assistant(m) => {
				let mut content: Vec<converse::ContentBlock> = Vec::new();
				if let Some(text) = m.content.as_ref().and_then(|c| c.text()) {
					content.push(converse::ContentBlock::Text(text));
				}
				for tc in m.tool_calls.iter().flatten() {
					let completions::MessageToolCalls::Function(call) = tc;
					content.push(converse::ContentBlock::ToolUse(converse::ToolUseBlock {
						tool_use_id: call.id.clone(),
						name: call.function.name.clone(),
						input: serde_json::from_str(&call.function.arguments)
							.unwrap_or(serde_json::Value::Null),
					}));
				}
				if !content.is_empty() {
					msgs.push(converse::Message {
						role: converse::Role::Assistant,
						content,
					});
				}
			},
		}
	}

	let inference_config = converse::InferenceConfiguration {
		max_tokens: req.max_tokens(),
		temperature: req.temperature,
		top_p: req.top_p,
		stop_sequences: req.stop_sequences(),
	};

	let tool_choice = match req.tool_choice {
		Some(completions::ToolChoiceOption::Function(completions::NamedToolChoice { function })) => {
			Some(converse::ToolChoice::Tool {
				name: function.name,
			})
		},
		Some(completions::ToolChoiceOption::Mode(completions::ToolChoiceOptions::Auto)) => {
			Some(converse::ToolChoice::Auto(Default::default()))
		},
		Some(completions::ToolChoiceOption::Mode(completions::ToolChoiceOptions::Required)) => {
			Some(converse::ToolChoice::Any(Default::default()))
		},
		Some(completions::ToolChoiceOption::Mode(completions::ToolChoiceOptions::None)) => None,
		None => None,
	};
	let tools = req.tools.map(|tools| {
		tools
			.into_iter()
			.map(|completions::Tool::Function(t)| {
				converse::Tool::ToolSpec(converse::ToolSpecification {
					name: t.function.name,
					description: t.function.description,
					input_schema: t.function.parameters.map(converse::ToolInputSchema::Json),
				})
			})
			.collect_vec()
	});
	let tool_config = tools.map(|tools| converse::ToolConfiguration { tools, tool_choice });

	// Model-specific knobs ride in additionalModelRequestFields
	let mut additional = serde_json::Map::new();
	if let Some(k) = req.vendor_extensions.top_k {
		additional.insert("top_k".to_string(), k.into());
	}
	let thinking_budget = req.vendor_extensions.thinking_budget_tokens.or(match &req
		.reasoning_effort
	{
		Some(completions::ReasoningEffort::Minimal) | Some(completions::ReasoningEffort::Low) => {
			Some(1024)
		},
		Some(completions::ReasoningEffort::Medium) => Some(2048),
		Some(completions::ReasoningEffort::High) | Some(completions::ReasoningEffort::Xhigh) => {
			Some(4096)
		},
		Some(completions::ReasoningEffort::None) | None => None,
	});
	if let Some(budget) = thinking_budget {
		additional.insert(
			"thinking".to_string(),
			serde_json::json!({"type": "enabled", "budget_tokens": budget}),
		);
	}

	let metadata = req
		.user
		.map(|user| HashMap::from([("user_id".to_string(), user)]));

	converse::ConverseRequest {
		model_id,
		messages: msgs,
		system: if system_text.is_empty() {
			None
		} else {
			Some(vec![converse::SystemContentBlock { text: system_text }])
		},
		inference_config: Some(inference_config),
		tool_config,
		additional_model_request_fields: if additional.is_empty() {
			None
		} else {
			Some(serde_json::Value::Object(additional))
		},
		request_metadata: metadata,
	}
}

/// Translate a Converse response into an OpenAI chat completion.
pub(crate) fn converse_response_to_chat(
	resp: converse::ConverseResponse,
	model: &str,
) -> Result<completions::Response, AIError> {
	let message = match resp.output {
		Some(converse::ConverseOutput::Message(msg)) => msg,
		_ => {
			return Err(AIError::Internal(
				"converse response was missing output".to_string(),
			));
		},
	};

	let mut tool_calls: Vec<completions::MessageToolCalls> = Vec::new();
	let mut content = None;
	let mut reasoning_content = None;
	for block in &message.content {
		match block {
			converse::ContentBlock::Text(text) => {
				content = Some(text.clone());
			},
			converse::ContentBlock::ReasoningContent(reasoning) => {
				let text = match reasoning {
					converse::ReasoningContentBlock::Structured { reasoning_text } => {
						reasoning_text.text.clone()
					},
					converse::ReasoningContentBlock::Simple { text } => text.clone(),
				};
				reasoning_content = Some(text);
			},
			converse::ContentBlock::ToolUse(tu) => {
				let Ok(args) = serde_json::to_string(&tu.input) else {
					continue;
				};
				tool_calls.push(completions::MessageToolCalls::Function(
					completions::MessageToolCall {
						id: tu.tool_use_id.clone(),
						function: completions::FunctionCall {
							name: tu.name.clone(),
							arguments: args,
						},
					},
				));
			},
			converse::ContentBlock::Image(_) | converse::ContentBlock::ToolResult(_) => {},
		}
	}

	let usage = resp
		.usage
		.map(|u| {
			let tu = u.token_usage();
			completions::Usage {
				prompt_tokens: tu.input_tokens.unwrap_or_default(),
				completion_tokens: tu.output_tokens.unwrap_or_default(),
				total_tokens: tu.total_tokens.unwrap_or_default(),
				prompt_tokens_details: tu.cached_input_tokens.map(|cached| {
					completions::PromptTokensDetails {
						cached_tokens: Some(cached),
						audio_tokens: None,
						cache_creation_tokens: tu.cache_creation_input_tokens,
					}
				}),
				completion_tokens_details: None,
			}
		})
		.unwrap_or_default();

	Ok(completions::Response {
		id: message_id("chatcmpl"),
		object: "chat.completion".to_string(),
		created: now_unix(),
		model: model.to_string(),
		choices: vec![completions::ChatChoice {
			index: 0,
			message: completions::ResponseMessage {
				role: completions::Role::Assistant,
				content,
				tool_calls: if tool_calls.is_empty() {
					None
				} else {
					Some(tool_calls)
				},
				refusal: None,
				reasoning_content,
			},
			finish_reason: Some(stop_reason_to_finish(&resp.stop_reason)),
			logprobs: None,
		}],
		usage: Some(usage),
		service_tier: None,
		system_fingerprint: None,
	})
}

pub(crate) fn stop_reason_to_finish(resp: &converse::StopReason) -> completions::FinishReason {
	match resp {
		converse::StopReason::EndTurn => completions::FinishReason::Stop,
		converse::StopReason::MaxTokens => completions::FinishReason::Length,
		converse::StopReason::StopSequence => completions::FinishReason::Stop,
		converse::StopReason::ContentFiltered => completions::FinishReason::ContentFilter,
		converse::StopReason::GuardrailIntervened => completions::FinishReason::ContentFilter,
		converse::StopReason::ToolUse => completions::FinishReason::ToolCalls,
		converse::StopReason::ModelContextWindowExceeded => completions::FinishReason::Length,
	}
}

/// MessagesToConverse serves Anthropic-native clients against Bedrock: the Messages request
/// becomes a Converse envelope and the Converse response (or stream) is rendered back in the
/// Messages schema.
pub struct MessagesToConverse {
	provider: bedrock::Provider,
	streaming: bool,
	request_model: Strng,
	decoder: parse::aws_sse::Parser,
	stream_id: String,
	stop_reason: Option<messages::StopReason>,
}

impl MessagesToConverse {
	pub fn new(provider: bedrock::Provider) -> Self {
		MessagesToConverse {
			provider,
			streaming: false,
			request_model: Strng::default(),
			decoder: parse::aws_sse::Parser::new(),
			stream_id: message_id("msg"),
			stop_reason: None,
		}
	}

	fn translate_stream_event(
		&mut self,
		ev: converse::ConverseStreamOutput,
		out: &mut ResponseTransform,
	) -> Vec<messages::MessagesStreamEvent> {
		match ev {
			converse::ConverseStreamOutput::MessageStart(start) => {
				vec![messages::MessagesStreamEvent::MessageStart {
					message: messages::MessagesResponse {
						id: self.stream_id.clone(),
						r#type: "message".to_string(),
						role: match start.role {
							converse::Role::Assistant => messages::Role::Assistant,
							converse::Role::User => messages::Role::User,
						},
						content: vec![],
						model: self.request_model.to_string(),
						stop_reason: None,
						stop_sequence: None,
						usage: Default::default(),
					},
				}]
			},
			converse::ConverseStreamOutput::ContentBlockStart(start) => {
				let block = match start.start {
					Some(converse::ContentBlockStart::ToolUse(tu)) => messages::ContentBlock::ToolUse {
						id: tu.tool_use_id,
						name: tu.name,
						input: serde_json::json!({}),
						cache_control: None,
					},
					None => messages::ContentBlock::Text(messages::ContentTextBlock {
						text: String::new(),
						citations: None,
						cache_control: None,
					}),
				};
				vec![messages::MessagesStreamEvent::ContentBlockStart {
					index: start.content_block_index as usize,
					content_block: block,
				}]
			},
			converse::ConverseStreamOutput::ContentBlockDelta(d) => {
				let Some(delta) = d.delta else { return vec![] };
				let delta = match delta {
					converse::ContentBlockDelta::Text(text) => {
						out.saw_output = true;
						messages::ContentBlockDelta::TextDelta { text }
					},
					converse::ContentBlockDelta::ToolUse(tu) => {
						out.saw_output = true;
						messages::ContentBlockDelta::InputJsonDelta {
							partial_json: tu.input,
						}
					},
					converse::ContentBlockDelta::ReasoningContent(
						converse::ReasoningContentBlockDelta::Text(thinking),
					) => {
						out.saw_output = true;
						messages::ContentBlockDelta::ThinkingDelta { thinking }
					},
					converse::ContentBlockDelta::ReasoningContent(
						converse::ReasoningContentBlockDelta::Signature(signature),
					) => messages::ContentBlockDelta::SignatureDelta { signature },
					converse::ContentBlockDelta::ReasoningContent(_) => return vec![],
				};
				vec![messages::MessagesStreamEvent::ContentBlockDelta {
					index: d.content_block_index as usize,
					delta,
				}]
			},
			converse::ConverseStreamOutput::ContentBlockStop(stop) => {
				vec![messages::MessagesStreamEvent::ContentBlockStop {
					index: stop.content_block_index as usize,
				}]
			},
			converse::ConverseStreamOutput::MessageStop(stop) => {
				// Bedrock sends messageStop before the usage metadata; hold the stop reason so
				// message_delta can carry both, as the Messages stream shape requires.
				self.stop_reason = Some(bedrock_stop_to_messages(&stop.stop_reason));
				vec![]
			},
			converse::ConverseStreamOutput::Metadata(metadata) => {
				let usage = metadata.usage.unwrap_or_default();
				out.usage = out.usage.override_with(&usage.token_usage());
				vec![
					messages::MessagesStreamEvent::MessageDelta {
						delta: messages::MessageDelta {
							stop_reason: self.stop_reason,
							stop_sequence: None,
						},
						usage: messages::MessageDeltaUsage {
							input_tokens: usage.input_tokens,
							output_tokens: usage.output_tokens,
							cache_creation_input_tokens: usage.cache_write_input_tokens,
							cache_read_input_tokens: usage.cache_read_input_tokens,
						},
					},
					messages::MessagesStreamEvent::MessageStop,
				]
			},
		}
	}
}

impl Translator for MessagesToConverse {
	fn request_body(
		&mut self,
		_headers: &HeaderMap,
		body: &Bytes,
		_force_body_mutation: bool,
	) -> Result<RequestTransform, AIError> {
		let routing: messages_api::Request = parse_request(body)?;
		let typed: messages::Request =
			serde_json::from_slice(body).map_err(AIError::classify_request_parse)?;

		let original_model = strng::new(&typed.model);
		let request_model = self
			.provider
			.model
			.clone()
			.unwrap_or_else(|| original_model.clone());
		if request_model.is_empty() {
			return Err(AIError::MissingField(strng::literal!("model")));
		}
		self.streaming = routing.streaming();
		self.request_model = request_model.clone();

		let converse_req = messages_to_converse(typed, request_model.to_string());
		let bytes = serde_json::to_vec(&converse_req).map_err(AIError::RequestMarshal)?;
		let path =
			self
				.provider
				.get_path_for_route(RouteType::Messages, self.streaming, &request_model);
		Ok(RequestTransform {
			headers: route_to(path.as_str()),
			body: BodyMutation::Replace(Bytes::from(bytes)),
			original_model,
			request_model,
			override_host: Some(self.provider.get_host()),
			streaming: self.streaming,
		})
	}

	fn response_headers(&mut self, headers: &HeaderMap) -> Result<HeaderMutation, AIError> {
		if self.streaming || is_aws_event_stream(headers) {
			return Ok(sse_response_headers());
		}
		Ok(HeaderMutation::default())
	}

	fn response_body(
		&mut self,
		headers: &HeaderMap,
		chunk: &Bytes,
		end_of_stream: bool,
	) -> Result<ResponseTransform, AIError> {
		if self.streaming || is_aws_event_stream(headers) {
			let mut out = ResponseTransform::passthrough();
			let frames = self
				.decoder
				.push(chunk)
				.map_err(|e| AIError::Internal(e.to_string()))?;
			let mut body = BytesMut::new();
			for frame in frames {
				let ev = converse::ConverseStreamOutput::deserialize(&frame)
					.map_err(|e| AIError::Internal(e.to_string()))?;
				for msg in self.translate_stream_event(ev, &mut out) {
					if let Some(encoded) = parse::sse::encode_json_event(msg.event_name(), &msg) {
						body.extend_from_slice(&encoded);
					}
				}
			}
			out.body = BodyMutation::Replace(body.freeze());
			return Ok(out);
		}
		if !end_of_stream {
			return Ok(ResponseTransform::passthrough());
		}
		let resp: converse::ConverseResponse =
			serde_json::from_slice(chunk).map_err(AIError::ResponseParsing)?;
		let usage = resp.usage.map(|u| u.token_usage()).unwrap_or_default();
		let translated = converse_response_to_messages(resp, self.request_model.as_str())?;
		let body = serde_json::to_vec(&translated).map_err(AIError::ResponseMarshal)?;
		Ok(ResponseTransform {
			headers: HeaderMutation::default(),
			body: BodyMutation::Replace(Bytes::from(body)),
			usage,
			response_model: Some(self.request_model.clone()),
			saw_output: false,
		})
	}

	fn response_error(
		&mut self,
		_headers: &HeaderMap,
		body: &Bytes,
	) -> Result<(HeaderMutation, BodyMutation), AIError> {
		let res: converse::ConverseErrorResponse =
			serde_json::from_slice(body).map_err(AIError::ResponseMarshal)?;
		let m = messages::MessagesErrorResponse {
			r#type: "error".to_string(),
			error: messages::MessagesError {
				r#type: "invalid_request_error".to_string(),
				message: res.message,
			},
		};
		let body = serde_json::to_vec(&m).map_err(AIError::ResponseMarshal)?;
		Ok((HeaderMutation::default(), BodyMutation::Replace(Bytes::from(body))))
	}
}

/// Translate an Anthropic Messages request into a Bedrock Converse request.
pub(crate) fn messages_to_converse(
	req: messages::Request,
	model_id: String,
) -> converse::ConverseRequest {
	let system = req.system.map(|system| match system {
		messages::SystemPrompt::Text(text) => vec![converse::SystemContentBlock { text }],
		messages::SystemPrompt::Blocks(blocks) => blocks
			.into_iter()
			.map(|messages::SystemContentBlock::Text { text, .. }| converse::SystemContentBlock {
				text,
			})
			.collect(),
	});

	let msgs = req
		.messages
		.into_iter()
		.filter_map(|m| {
			let role = match m.role {
				messages::Role::User => converse::Role::User,
				messages::Role::Assistant => converse::Role::Assistant,
			};
			let content: Vec<converse::ContentBlock> = m
				.content
				.into_iter()
				.filter_map(|block| match block {
					messages::ContentBlock::Text(t) => Some(converse::ContentBlock::Text(t.text)),
					messages::ContentBlock::ToolUse {
						id, name, input, ..
					} => Some(converse::ContentBlock::ToolUse(converse::ToolUseBlock {
						tool_use_id: id,
						name,
						input,
					})),
					messages::ContentBlock::ToolResult {
						tool_use_id,
						content,
						is_error,
						..
					} => Some(converse::ContentBlock::ToolResult(converse::ToolResultBlock {
						tool_use_id,
						content: match content {
							messages::ToolResultContent::Text(t) => {
								vec![converse::ToolResultContentBlock::Text(t)]
							},
							messages::ToolResultContent::Array(parts) => parts
								.into_iter()
								.filter_map(|p| match p {
									messages::ToolResultContentPart::Text { text, .. } => {
										Some(converse::ToolResultContentBlock::Text(text))
									},
									messages::ToolResultContentPart::Image { .. } => None,
								})
								.collect(),
						},
						status: is_error.and_then(|e| e.then_some(converse::ToolResultStatus::Error)),
					})),
					messages::ContentBlock::Thinking {
						thinking,
						signature,
					} => Some(converse::ContentBlock::ReasoningContent(
						converse::ReasoningContentBlock::Structured {
							reasoning_text: converse::ReasoningText {
								text: thinking,
								signature: Some(signature),
							},
						},
					)),
					// Images require a byte source on Converse; unsupported shapes are dropped
					_ => None,
				})
				.collect();
			if content.is_empty() {
				None
			} else {
				Some(converse::Message { role, content })
			}
		})
		.collect();

	let tool_config = req.tools.map(|tools| converse::ToolConfiguration {
		tools: tools
			.into_iter()
			.map(|t| {
				converse::Tool::ToolSpec(converse::ToolSpecification {
					name: t.name,
					description: t.description,
					input_schema: Some(converse::ToolInputSchema::Json(t.input_schema)),
				})
			})
			.collect(),
		tool_choice: req.tool_choice.map(|choice| match choice {
			messages::ToolChoice::Auto => converse::ToolChoice::Auto(Default::default()),
			messages::ToolChoice::Any => converse::ToolChoice::Any(Default::default()),
			messages::ToolChoice::Tool { name } => converse::ToolChoice::Tool { name },
			messages::ToolChoice::None => converse::ToolChoice::Auto(Default::default()),
		}),
	});

	let mut additional = serde_json::Map::new();
	if let Some(messages::ThinkingInput::Enabled { budget_tokens }) = req.thinking {
		additional.insert(
			"thinking".to_string(),
			serde_json::json!({"type": "enabled", "budget_tokens": budget_tokens}),
		);
	}
	if let Some(k) = req.top_k {
		additional.insert("top_k".to_string(), k.into());
	}

	converse::ConverseRequest {
		model_id,
		messages: msgs,
		system,
		inference_config: Some(converse::InferenceConfiguration {
			max_tokens: req.max_tokens,
			temperature: req.temperature,
			top_p: req.top_p,
			stop_sequences: req.stop_sequences,
		}),
		tool_config,
		additional_model_request_fields: if additional.is_empty() {
			None
		} else {
			Some(serde_json::Value::Object(additional))
		},
		request_metadata: req.metadata.map(|m| m.fields),
	}
}

/// Translate a Converse response into an Anthropic Messages response.
pub(crate) fn converse_response_to_messages(
	resp: converse::ConverseResponse,
	model: &str,
) -> Result<messages::MessagesResponse, AIError> {
	let message = match resp.output {
		Some(converse::ConverseOutput::Message(msg)) => msg,
		_ => {
			return Err(AIError::Internal(
				"converse response was missing output".to_string(),
			));
		},
	};
	let content = message
		.content
		.into_iter()
		.filter_map(|block| match block {
			converse::ContentBlock::Text(text) => {
				Some(messages::ContentBlock::Text(messages::ContentTextBlock {
					text,
					citations: None,
					cache_control: None,
				}))
			},
			converse::ContentBlock::ToolUse(tu) => Some(messages::ContentBlock::ToolUse {
				id: tu.tool_use_id,
				name: tu.name,
				input: tu.input,
				cache_control: None,
			}),
			converse::ContentBlock::ReasoningContent(reasoning) => {
				let (text, signature) = match reasoning {
					converse::ReasoningContentBlock::Structured { reasoning_text } => {
						(reasoning_text.text, reasoning_text.signature)
					},
					converse::ReasoningContentBlock::Simple { text } => (text, None),
				};
				Some(messages::ContentBlock::Thinking {
					thinking: text,
					signature: signature.unwrap_or_default(),
				})
			},
			converse::ContentBlock::Image(_) | converse::ContentBlock::ToolResult(_) => None,
		})
		.collect();

	let usage = resp.usage.unwrap_or_default();
	Ok(messages::MessagesResponse {
		id: message_id("msg"),
		r#type: "message".to_string(),
		role: messages::Role::Assistant,
		content,
		model: model.to_string(),
		stop_reason: Some(bedrock_stop_to_messages(&resp.stop_reason)),
		stop_sequence: None,
		usage: messages::Usage {
			input_tokens: usage.input_tokens,
			output_tokens: usage.output_tokens,
			cache_creation_input_tokens: usage.cache_write_input_tokens,
			cache_read_input_tokens: usage.cache_read_input_tokens,
		},
	})
}

fn bedrock_stop_to_messages(stop: &converse::StopReason) -> messages::StopReason {
	match stop {
		converse::StopReason::EndTurn => messages::StopReason::EndTurn,
		converse::StopReason::MaxTokens => messages::StopReason::MaxTokens,
		converse::StopReason::StopSequence => messages::StopReason::StopSequence,
		converse::StopReason::ToolUse => messages::StopReason::ToolUse,
		converse::StopReason::ContentFiltered | converse::StopReason::GuardrailIntervened => {
			messages::StopReason::Refusal
		},
		converse::StopReason::ModelContextWindowExceeded => {
			messages::StopReason::ModelContextWindowExceeded
		},
	}
}

/// EmbeddingsToInvoke serves OpenAI embeddings against Bedrock's per-model InvokeModel JSON.
/// The body shape depends on the model family (Titan or Cohere).
pub struct EmbeddingsToInvoke {
	provider: bedrock::Provider,
	request_model: Strng,
	family: ModelFamily,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ModelFamily {
	Titan,
	Cohere,
}

impl EmbeddingsToInvoke {
	pub fn new(provider: bedrock::Provider) -> Self {
		EmbeddingsToInvoke {
			provider,
			request_model: Strng::default(),
			family: ModelFamily::Titan,
		}
	}
}

impl Translator for EmbeddingsToInvoke {
	fn request_body(
		&mut self,
		_headers: &HeaderMap,
		body: &Bytes,
		_force_body_mutation: bool,
	) -> Result<RequestTransform, AIError> {
		let req: embeddings::Request = parse_request(body)?;
		let original_model = strng::new(req.model.as_deref().unwrap_or_default());
		let request_model = self
			.provider
			.model
			.clone()
			.unwrap_or_else(|| original_model.clone());
		if request_model.is_empty() {
			return Err(AIError::MissingField(strng::literal!("model")));
		}
		let Some(texts) = req.input.as_texts() else {
			return Err(AIError::InvalidRequestBody(
				"token-id embedding inputs are not supported by this backend".to_string(),
			));
		};
		self.request_model = request_model.clone();
		self.family = if request_model.starts_with("cohere.") {
			ModelFamily::Cohere
		} else {
			ModelFamily::Titan
		};

		let bytes = match self.family {
			ModelFamily::Titan => {
				// Titan embeds one text per invocation
				let [text] = texts.as_slice() else {
					return Err(AIError::InvalidRequestBody(
						"this model accepts exactly one input text".to_string(),
					));
				};
				serde_json::to_vec(&converse::TitanEmbeddingRequest {
					input_text: text.clone(),
					dimensions: req.dimensions,
					normalize: None,
				})
				.map_err(AIError::RequestMarshal)?
			},
			ModelFamily::Cohere => serde_json::to_vec(&converse::CohereEmbeddingRequest {
				texts,
				input_type: "search_document".to_string(),
				truncate: None,
			})
			.map_err(AIError::RequestMarshal)?,
		};

		let path = self
			.provider
			.get_path_for_route(RouteType::Embeddings, false, &request_model);
		Ok(RequestTransform {
			headers: route_to(path.as_str()),
			body: BodyMutation::Replace(Bytes::from(bytes)),
			original_model,
			request_model,
			override_host: Some(self.provider.get_host()),
			streaming: false,
		})
	}

	fn response_body(
		&mut self,
		_headers: &HeaderMap,
		chunk: &Bytes,
		end_of_stream: bool,
	) -> Result<ResponseTransform, AIError> {
		if !end_of_stream {
			return Ok(ResponseTransform::passthrough());
		}
		let (data, prompt_tokens): (Vec<Vec<f32>>, u64) = match self.family {
			ModelFamily::Titan => {
				let resp: converse::TitanEmbeddingResponse =
					serde_json::from_slice(chunk).map_err(AIError::ResponseParsing)?;
				(vec![resp.embedding], resp.input_text_token_count)
			},
			ModelFamily::Cohere => {
				let resp: converse::CohereEmbeddingResponse =
					serde_json::from_slice(chunk).map_err(AIError::ResponseParsing)?;
				(resp.embeddings, 0)
			},
		};
		let openai = embeddings::Response {
			object: "list".to_string(),
			model: self.request_model.to_string(),
			data: data
				.into_iter()
				.enumerate()
				.map(|(i, embedding)| embeddings::Embedding {
					index: i as u32,
					object: "embedding".to_string(),
					embedding,
					rest: Default::default(),
				})
				.collect(),
			usage: embeddings::Usage {
				prompt_tokens,
				total_tokens: prompt_tokens,
				rest: Default::default(),
			},
			rest: Default::default(),
		};
		let body = serde_json::to_vec(&openai).map_err(AIError::ResponseMarshal)?;
		Ok(ResponseTransform {
			headers: HeaderMutation::default(),
			body: BodyMutation::Replace(Bytes::from(body)),
			usage: TokenUsage {
				input_tokens: Some(prompt_tokens),
				total_tokens: Some(prompt_tokens),
				..Default::default()
			},
			response_model: Some(self.request_model.clone()),
			saw_output: false,
		})
	}
}

#[cfg(test)]
#[path = "bedrock_tests.rs"]
mod tests;
