use std::collections::HashMap;

use aigw_core::prelude::*;
use bytes::{Bytes, BytesMut};

use crate::http::{HeaderMap, HeaderMutation, header_str, is_event_stream};
use crate::llm::translator::{
	BodyMutation, RequestTransform, ResponseTransform, Translator, message_id, now_unix,
	parse_request, route_to,
};
use crate::llm::types::completions::typed as completions;
use crate::llm::types::messages::typed as messages;
use crate::llm::types::{completions as completions_api, messages as messages_api};
use crate::llm::{AIError, RouteType, anthropic, vertex};
use crate::parse;

/// Header mutations every Anthropic-bound request needs: the bearer token moves into
/// `x-api-key` and the API version header is pinned.
fn anthropic_headers(headers: &HeaderMap) -> HeaderMutation {
	let mut m = HeaderMutation::default().set(
		strng::literal!("anthropic-version"),
		strng::new(anthropic::VERSION),
	);
	if let Some(auth) = header_str(headers, "authorization")
		&& let Some(token) = auth.strip_prefix("Bearer ")
	{
		m = m
			.set(strng::literal!("x-api-key"), strng::new(token))
			.remove(strng::literal!("authorization"));
	}
	m
}

/// ChatToMessages translates OpenAI chat completions to the Anthropic Messages API. With a
/// Vertex provider attached it targets the GCP Anthropic surface instead (model in the URL,
/// `anthropic_version` in the body).
pub struct ChatToMessages {
	model_override: Option<Strng>,
	gcp: Option<vertex::Provider>,
	streaming: bool,
	request_model: Strng,
	state: StreamState,
}

#[derive(Default)]
struct StreamState {
	sse: parse::sse::Parser,
	message_id: Option<String>,
	model: String,
	created: i64,
	start_usage: messages::Usage,
	// Tool-call argument fragments accumulate per content-block index
	tool_calls: HashMap<usize, String>,
	next_tool_index: u32,
	tool_indexes: HashMap<usize, u32>,
	done: bool,
}

impl ChatToMessages {
	pub fn new(model_override: Option<Strng>, gcp: Option<vertex::Provider>) -> Self {
		ChatToMessages {
			model_override,
			gcp,
			streaming: false,
			request_model: Strng::default(),
			state: StreamState::default(),
		}
	}
}

impl Translator for ChatToMessages {
	fn request_body(
		&mut self,
		headers: &HeaderMap,
		body: &Bytes,
		_force_body_mutation: bool,
	) -> Result<RequestTransform, AIError> {
		let routing: completions_api::Request = parse_request(body)?;
		routing.validate()?;
		let typed: completions::Request =
			serde_json::from_slice(body).map_err(AIError::classify_request_parse)?;

		let original_model = strng::new(typed.model.as_deref().unwrap_or_default());
		let request_model = self
			.model_override
			.clone()
			.unwrap_or_else(|| original_model.clone());
		if request_model.is_empty() {
			return Err(AIError::MissingField(strng::literal!("model")));
		}
		self.streaming = typed.stream.unwrap_or_default();
		self.request_model = request_model.clone();

		let translated = chat_to_messages(typed, request_model.to_string());
		let mut bytes = serde_json::to_vec(&translated).map_err(AIError::RequestMarshal)?;

		let (mutation, override_host) = match &self.gcp {
			None => (
				anthropic_headers(headers).merge(route_to(anthropic::DEFAULT_PATH)),
				Some(strng::new(anthropic::DEFAULT_HOST_STR)),
			),
			Some(p) => {
				bytes = p.prepare_anthropic_request_body(bytes)?;
				let path = p.get_path_for_model(
					RouteType::ChatCompletions,
					Some(request_model.as_str()),
					self.streaming,
				);
				(route_to(path.as_str()), Some(p.get_host()))
			},
		};

		Ok(RequestTransform {
			headers: mutation,
			body: BodyMutation::Replace(Bytes::from(bytes)),
			original_model,
			request_model,
			override_host,
			streaming: self.streaming,
		})
	}

	fn response_body(
		&mut self,
		headers: &HeaderMap,
		chunk: &Bytes,
		end_of_stream: bool,
	) -> Result<ResponseTransform, AIError> {
		if self.streaming || is_event_stream(headers) {
			return Ok(self.state.translate_chunk(chunk, end_of_stream));
		}
		if !end_of_stream {
			return Ok(ResponseTransform::passthrough());
		}
		let resp: messages::MessagesResponse =
			serde_json::from_slice(chunk).map_err(AIError::ResponseParsing)?;
		let usage = resp.usage.token_usage();
		let response_model = strng::new(&resp.model);
		let openai = messages_response_to_chat(resp);
		let body = serde_json::to_vec(&openai).map_err(AIError::ResponseMarshal)?;
		Ok(ResponseTransform {
			headers: HeaderMutation::default(),
			body: BodyMutation::Replace(Bytes::from(body)),
			usage,
			response_model: Some(response_model),
			saw_output: false,
		})
	}

	fn response_error(
		&mut self,
		_headers: &HeaderMap,
		body: &Bytes,
	) -> Result<(HeaderMutation, BodyMutation), AIError> {
		let res: messages::MessagesErrorResponse =
			serde_json::from_slice(body).map_err(AIError::ResponseMarshal)?;
		let m = completions::ChatCompletionErrorResponse {
			error: completions::ChatCompletionError {
				r#type: "invalid_request_error".to_string(),
				message: res.error.message,
				param: None,
				code: None,
			},
		};
		let body = serde_json::to_vec(&m).map_err(AIError::ResponseMarshal)?;
		Ok((HeaderMutation::default(), BodyMutation::Replace(Bytes::from(body))))
	}
}

impl StreamState {
	/// translate_chunk re-frames Anthropic SSE events as OpenAI chat completion chunks.
	/// https://docs.anthropic.com/en/docs/build-with-claude/streaming
	fn translate_chunk(&mut self, chunk: &Bytes, end_of_stream: bool) -> ResponseTransform {
		if self.created == 0 {
			self.created = now_unix();
		}
		let mut events = self.sse.push(chunk);
		if end_of_stream && let Some(tail) = self.sse.flush() {
			events.push(tail);
		}

		let mut out = ResponseTransform::passthrough();
		let mut frames = BytesMut::new();
		for ev in events {
			let Ok(parsed) = serde_json::from_str::<messages::MessagesStreamEvent>(&ev.data) else {
				tracing::debug!("failed to parse messages stream event");
				continue;
			};
			for resp in self.translate_event(parsed, &mut out) {
				if let Some(frame) = parse::sse::encode_json_event("", &resp) {
					frames.extend_from_slice(&frame);
				}
			}
		}
		if end_of_stream && !self.done {
			self.done = true;
			frames.extend_from_slice(&parse::sse::done_frame());
		}
		out.body = BodyMutation::Replace(frames.freeze());
		out
	}

	fn mk(
		&self,
		choices: Vec<completions::ChatChoiceStream>,
		usage: Option<completions::Usage>,
	) -> completions::StreamResponse {
		completions::StreamResponse {
			id: self
				.message_id
				.clone()
				.unwrap_or_else(|| "unknown".to_string()),
			model: self.model.clone(),
			object: "chat.completion.chunk".to_string(),
			created: self.created,
			choices,
			usage,
			service_tier: None,
			system_fingerprint: None,
		}
	}

	fn translate_event(
		&mut self,
		event: messages::MessagesStreamEvent,
		out: &mut ResponseTransform,
	) -> Vec<completions::StreamResponse> {
		match event {
			messages::MessagesStreamEvent::MessageStart { message } => {
				self.message_id = Some(message.id);
				self.model = message.model.clone();
				self.start_usage = message.usage;
				out.response_model = Some(strng::new(&message.model));
				out.usage = out.usage.override_with(&message.usage.token_usage());
				let choice = completions::ChatChoiceStream {
					index: 0,
					delta: completions::StreamResponseDelta {
						role: Some(completions::Role::Assistant),
						..Default::default()
					},
					finish_reason: None,
					logprobs: None,
				};
				vec![self.mk(vec![choice], None)]
			},
			messages::MessagesStreamEvent::ContentBlockStart {
				index,
				content_block,
			} => {
				// Only tool-use starts carry information the chat schema needs up front
				if let messages::ContentBlock::ToolUse { id, name, .. } = content_block {
					let tool_index = self.next_tool_index;
					self.next_tool_index += 1;
					self.tool_indexes.insert(index, tool_index);
					self.tool_calls.insert(index, String::new());
					out.saw_output = true;
					let delta = completions::StreamResponseDelta {
						tool_calls: Some(vec![completions::MessageToolCallChunk {
							index: tool_index,
							id: Some(id),
							kind: Some("function".to_string()),
							function: completions::FunctionCallChunk {
								name: Some(name),
								arguments: None,
							},
						}]),
						..Default::default()
					};
					let choice = completions::ChatChoiceStream {
						index: 0,
						delta,
						finish_reason: None,
						logprobs: None,
					};
					vec![self.mk(vec![choice], None)]
				} else {
					vec![]
				}
			},
			messages::MessagesStreamEvent::ContentBlockDelta { index, delta } => {
				let mut dr = completions::StreamResponseDelta::default();
				match delta {
					messages::ContentBlockDelta::TextDelta { text } => {
						out.saw_output = true;
						dr.content = Some(text);
					},
					messages::ContentBlockDelta::ThinkingDelta { thinking } => {
						out.saw_output = true;
						dr.reasoning_content = Some(thinking);
					},
					messages::ContentBlockDelta::InputJsonDelta { partial_json } => {
						out.saw_output = true;
						if let Some(buffer) = self.tool_calls.get_mut(&index) {
							buffer.push_str(&partial_json);
						}
						let tool_index = self.tool_indexes.get(&index).copied().unwrap_or_default();
						dr.tool_calls = Some(vec![completions::MessageToolCallChunk {
							index: tool_index,
							id: None,
							kind: None,
							function: completions::FunctionCallChunk {
								name: None,
								arguments: Some(partial_json),
							},
						}]);
					},
					messages::ContentBlockDelta::SignatureDelta { .. }
					| messages::ContentBlockDelta::CitationsDelta { .. } => return vec![],
				};
				let choice = completions::ChatChoiceStream {
					index: 0,
					delta: dr,
					finish_reason: None,
					logprobs: None,
				};
				vec![self.mk(vec![choice], None)]
			},
			messages::MessagesStreamEvent::MessageDelta { delta, usage } => {
				let full = messages::Usage {
					input_tokens: self.start_usage.input_tokens,
					output_tokens: usage.output_tokens,
					cache_creation_input_tokens: usage
						.cache_creation_input_tokens
						.or(self.start_usage.cache_creation_input_tokens),
					cache_read_input_tokens: usage
						.cache_read_input_tokens
						.or(self.start_usage.cache_read_input_tokens),
				};
				let token_usage = full.token_usage();
				out.usage = out.usage.override_with(&token_usage);
				let finish = delta.stop_reason.as_ref().map(stop_reason_to_finish);
				let choice = completions::ChatChoiceStream {
					index: 0,
					delta: Default::default(),
					finish_reason: finish,
					logprobs: None,
				};
				vec![self.mk(
					vec![choice],
					Some(completions::Usage {
						prompt_tokens: token_usage.input_tokens.unwrap_or_default(),
						completion_tokens: token_usage.output_tokens.unwrap_or_default(),
						total_tokens: token_usage.total_tokens.unwrap_or_default(),
						prompt_tokens_details: token_usage.cached_input_tokens.map(|cached| {
							completions::PromptTokensDetails {
								cached_tokens: Some(cached),
								audio_tokens: None,
								cache_creation_tokens: token_usage.cache_creation_input_tokens,
							}
						}),
						completion_tokens_details: None,
					}),
				)]
			},
			messages::MessagesStreamEvent::ContentBlockStop { index } => {
				self.tool_calls.remove(&index);
				vec![]
			},
			messages::MessagesStreamEvent::MessageStop | messages::MessagesStreamEvent::Ping => {
				vec![]
			},
		}
	}
}

/// MessagesNative forwards the Anthropic Messages wire format to Anthropic itself or to the
/// GCP Anthropic surface, extracting usage without translating the payload schema.
pub struct MessagesNative {
	model_override: Option<Strng>,
	gcp: Option<vertex::Provider>,
	streaming: bool,
	sse: parse::sse::Parser,
	start_usage: messages::Usage,
}

impl MessagesNative {
	pub fn new(model_override: Option<Strng>, gcp: Option<vertex::Provider>) -> Self {
		MessagesNative {
			model_override,
			gcp,
			streaming: false,
			sse: parse::sse::Parser::new(),
			start_usage: Default::default(),
		}
	}
}

impl Translator for MessagesNative {
	fn request_body(
		&mut self,
		headers: &HeaderMap,
		body: &Bytes,
		force_body_mutation: bool,
	) -> Result<RequestTransform, AIError> {
		let mut req: messages_api::Request = parse_request(body)?;
		let original_model = strng::new(req.model.as_deref().unwrap_or_default());
		let request_model = self
			.model_override
			.clone()
			.unwrap_or_else(|| original_model.clone());
		if request_model.is_empty() {
			return Err(AIError::MissingField(strng::literal!("model")));
		}
		self.streaming = req.streaming();

		let (mutation, body_mutation, override_host) = match &self.gcp {
			None => {
				let mutation = anthropic_headers(headers).merge(route_to(anthropic::DEFAULT_PATH));
				let body_mutation = if force_body_mutation || self.model_override.is_some() {
					req.model = Some(request_model.to_string());
					BodyMutation::Replace(Bytes::from(
						serde_json::to_vec(&req).map_err(AIError::RequestMarshal)?,
					))
				} else {
					BodyMutation::Passthrough
				};
				(
					mutation,
					body_mutation,
					Some(strng::new(anthropic::DEFAULT_HOST_STR)),
				)
			},
			Some(p) => {
				// The GCP surface always needs a rewritten body: version marker in, model out.
				let bytes =
					p.prepare_anthropic_request_body(serde_json::to_vec(&req).map_err(AIError::RequestMarshal)?)?;
				let path = p.get_path_for_model(
					RouteType::Messages,
					Some(request_model.as_str()),
					self.streaming,
				);
				(
					route_to(path.as_str()),
					BodyMutation::Replace(Bytes::from(bytes)),
					Some(p.get_host()),
				)
			},
		};

		Ok(RequestTransform {
			headers: mutation,
			body: body_mutation,
			original_model,
			request_model,
			override_host,
			streaming: self.streaming,
		})
	}

	fn response_body(
		&mut self,
		headers: &HeaderMap,
		chunk: &Bytes,
		end_of_stream: bool,
	) -> Result<ResponseTransform, AIError> {
		let mut out = ResponseTransform::passthrough();
		if self.streaming || is_event_stream(headers) {
			let mut events = self.sse.push(chunk);
			if end_of_stream && let Some(tail) = self.sse.flush() {
				events.push(tail);
			}
			for ev in events {
				let Ok(parsed) = serde_json::from_str::<messages::MessagesStreamEvent>(&ev.data) else {
					continue;
				};
				match parsed {
					messages::MessagesStreamEvent::MessageStart { message } => {
						self.start_usage = message.usage;
						out.response_model = Some(strng::new(&message.model));
						out.usage = out.usage.override_with(&message.usage.token_usage());
					},
					messages::MessagesStreamEvent::ContentBlockDelta { .. } => {
						out.saw_output = true;
					},
					messages::MessagesStreamEvent::MessageDelta { usage, .. } => {
						let full = messages::Usage {
							input_tokens: self.start_usage.input_tokens,
							output_tokens: usage.output_tokens,
							cache_creation_input_tokens: usage
								.cache_creation_input_tokens
								.or(self.start_usage.cache_creation_input_tokens),
							cache_read_input_tokens: usage
								.cache_read_input_tokens
								.or(self.start_usage.cache_read_input_tokens),
						};
						out.usage = out.usage.override_with(&full.token_usage());
					},
					_ => {},
				}
			}
			return Ok(out);
		}
		if !end_of_stream {
			return Ok(out);
		}
		let resp: messages::MessagesResponse =
			serde_json::from_slice(chunk).map_err(AIError::ResponseParsing)?;
		out.usage = resp.usage.token_usage();
		out.response_model = Some(strng::new(&resp.model));
		Ok(out)
	}
}

/// Translate an OpenAI chat completions request into an Anthropic Messages request.
pub(crate) fn chat_to_messages(
	req: completions::Request,
	model_id: String,
) -> messages::Request {
	let max_tokens = req.max_tokens();
	let stop_sequences = req.stop_sequences();
	// Anthropic has all system prompts in a single field. Join them
	let system = req
		.messages
		.iter()
		.filter(|m| matches!(m.role(), "system" | "developer"))
		.filter_map(|m| m.text())
		.collect::<Vec<String>>()
		.join("\n");

	let mut msgs: Vec<messages::Message> = Vec::new();
	for msg in &req.messages {
		match msg {
			completions::RequestMessage::System(_) | completions::RequestMessage::Developer(_) => {},
			completions::RequestMessage::User(m) => {
				if let Some(text) = m.content.text() {
					msgs.push(messages::Message {
						role: messages::Role::User,
						content: vec![text_block(text)],
					});
				}
			},
			completions::RequestMessage::Tool(m) => {
				msgs.push(messages::Message {
					role: messages::Role::User,
					content: vec![messages::ContentBlock::ToolResult {
						tool_use_id: m.tool_call_id.clone(),
						content: messages::ToolResultContent::Text(
							m.content.text().unwrap_or_default(),
						),
						cache_control: None,
						is_error: None,
					}],
				});
			},
			completions::RequestMessage::Assistant(m) => {
				let mut content: Vec<messages::ContentBlock> = Vec::new();
				if let Some(text) = m.content.as_ref().and_then(|c| c.text()) {
					content.push(text_block(text));
				}
				for tc in m.tool_calls.iter().flatten() {
					let completions::MessageToolCalls::Function(call) = tc;
					content.push(messages::ContentBlock::ToolUse {
						id: call.id.clone(),
						name: call.function.name.clone(),
						input: serde_json::from_str(&call.function.arguments)
							.unwrap_or(serde_json::Value::Null),
						cache_control: None,
					});
				}
				if !content.is_empty() {
					msgs.push(messages::Message {
						role: messages::Role::Assistant,
						content,
					});
				}
			},
		}
	}

	let tools = req.tools.map(|tools| {
		tools
			.into_iter()
			.map(|completions::Tool::Function(t)| messages::Tool {
				name: t.function.name,
				description: t.function.description,
				input_schema: t.function.parameters.unwrap_or_default(),
				cache_control: None,
			})
			.collect()
	});

	let tool_choice = req.tool_choice.map(|choice| match choice {
		completions::ToolChoiceOption::Function(completions::NamedToolChoice { function }) => {
			messages::ToolChoice::Tool {
				name: function.name,
			}
		},
		completions::ToolChoiceOption::Mode(completions::ToolChoiceOptions::Auto) => {
			messages::ToolChoice::Auto
		},
		completions::ToolChoiceOption::Mode(completions::ToolChoiceOptions::Required) => {
			messages::ToolChoice::Any
		},
		completions::ToolChoiceOption::Mode(completions::ToolChoiceOptions::None) => {
			messages::ToolChoice::None
		},
	});

	let metadata = req.user.map(|user| messages::Metadata {
		fields: HashMap::from([("user_id".to_string(), user)]),
	});

	let thinking = if let Some(budget) = req.vendor_extensions.thinking_budget_tokens {
		Some(messages::ThinkingInput::Enabled {
			budget_tokens: budget,
		})
	} else {
		// Budget constants follow common router defaults; Anthropic's minimum is 1024
		match &req.reasoning_effort {
			Some(completions::ReasoningEffort::Minimal) | Some(completions::ReasoningEffort::Low) => {
				Some(messages::ThinkingInput::Enabled { budget_tokens: 1024 })
			},
			Some(completions::ReasoningEffort::Medium) => {
				Some(messages::ThinkingInput::Enabled { budget_tokens: 2048 })
			},
			Some(completions::ReasoningEffort::High) | Some(completions::ReasoningEffort::Xhigh) => {
				Some(messages::ThinkingInput::Enabled { budget_tokens: 4096 })
			},
			Some(completions::ReasoningEffort::None) | None => None,
		}
	};

	messages::Request {
		model: model_id,
		messages: msgs,
		system: if system.is_empty() {
			None
		} else {
			Some(messages::SystemPrompt::Text(system))
		},
		max_tokens,
		stop_sequences,
		stream: req.stream.unwrap_or(false),
		temperature: req.temperature,
		top_p: req.top_p,
		top_k: req.vendor_extensions.top_k,
		tools,
		tool_choice,
		metadata,
		thinking,
	}
}

fn text_block(text: String) -> messages::ContentBlock {
	messages::ContentBlock::Text(messages::ContentTextBlock {
		text,
		citations: None,
		cache_control: None,
	})
}

/// Translate an Anthropic Messages response into an OpenAI chat completion.
pub(crate) fn messages_response_to_chat(
	resp: messages::MessagesResponse,
) -> completions::Response {
	let mut tool_calls: Vec<completions::MessageToolCalls> = Vec::new();
	let mut content = None;
	let mut reasoning_content = None;
	for block in resp.content {
		match block {
			messages::ContentBlock::Text(messages::ContentTextBlock { text, .. }) => {
				content = Some(text);
			},
			messages::ContentBlock::ToolUse {
				id, name, input, ..
			}
			| messages::ContentBlock::ServerToolUse {
				id, name, input, ..
			} => {
				let Ok(args) = serde_json::to_string(&input) else {
					continue;
				};
				tool_calls.push(completions::MessageToolCalls::Function(
					completions::MessageToolCall {
						id,
						function: completions::FunctionCall {
							name,
							arguments: args,
						},
					},
				));
			},
			messages::ContentBlock::Thinking { thinking, .. } => {
				reasoning_content = Some(thinking);
			},
			// Request-path and unsupported blocks do not surface in the chat schema
			_ => {},
		}
	}

	let usage = resp.usage.token_usage();
	let message = completions::ResponseMessage {
		role: completions::Role::Assistant,
		content,
		tool_calls: if tool_calls.is_empty() {
			None
		} else {
			Some(tool_calls)
		},
		refusal: None,
		reasoning_content,
	};
	let choice = completions::ChatChoice {
		index: 0,
		message,
		finish_reason: resp.stop_reason.as_ref().map(stop_reason_to_finish),
		logprobs: None,
	};

	completions::Response {
		id: if resp.id.is_empty() {
			message_id("chatcmpl")
		} else {
			resp.id
		},
		object: "chat.completion".to_string(),
		// No date in the anthropic response so just call it "now"
		created: now_unix(),
		model: resp.model,
		choices: vec![choice],
		usage: Some(completions::Usage {
			prompt_tokens: usage.input_tokens.unwrap_or_default(),
			completion_tokens: usage.output_tokens.unwrap_or_default(),
			total_tokens: usage.total_tokens.unwrap_or_default(),
			prompt_tokens_details: usage.cached_input_tokens.map(|cached| {
				completions::PromptTokensDetails {
					cached_tokens: Some(cached),
					audio_tokens: None,
					cache_creation_tokens: usage.cache_creation_input_tokens,
				}
			}),
			completion_tokens_details: None,
		}),
		service_tier: None,
		system_fingerprint: None,
	}
}

fn stop_reason_to_finish(resp: &messages::StopReason) -> completions::FinishReason {
	match resp {
		messages::StopReason::EndTurn => completions::FinishReason::Stop,
		messages::StopReason::MaxTokens => completions::FinishReason::Length,
		messages::StopReason::StopSequence => completions::FinishReason::Stop,
		messages::StopReason::ToolUse => completions::FinishReason::ToolCalls,
		messages::StopReason::Refusal => completions::FinishReason::ContentFilter,
		messages::StopReason::PauseTurn => completions::FinishReason::Stop,
		messages::StopReason::ModelContextWindowExceeded => completions::FinishReason::Length,
	}
}

#[cfg(test)]
#[path = "anthropic_tests.rs"]
mod tests;
