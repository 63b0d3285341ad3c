use std::collections::HashMap;

use aigw_core::prelude::*;
use bytes::{Bytes, BytesMut};

use crate::http::{HeaderMap, HeaderMutation, is_event_stream};
use crate::llm::translator::{
	BodyMutation, RequestTransform, ResponseTransform, Translator, message_id, now_unix,
	parse_request, route_to,
};
use crate::llm::types::completions::typed as completions;
use crate::llm::types::vertex as gemini;
use crate::llm::types::{TokenUsage, completions as completions_api, embeddings};
use crate::llm::{AIError, RouteType, vertex};
use crate::parse;

/// ChatToGemini translates OpenAI chat completions to Vertex AI `generateContent`, mapping
/// Gemini `candidates[]` onto OpenAI `choices[]` and function-call parts onto tool calls.
pub struct ChatToGemini {
	provider: vertex::Provider,
	streaming: bool,
	request_model: Strng,
	sse: parse::sse::Parser,
	stream_id: String,
	created: i64,
	next_tool_call: u32,
	done: bool,
}

impl ChatToGemini {
	pub fn new(provider: vertex::Provider) -> Self {
		ChatToGemini {
			provider,
			streaming: false,
			request_model: Strng::default(),
			sse: parse::sse::Parser::new(),
			stream_id: message_id("chatcmpl"),
			created: 0,
			next_tool_call: 0,
			done: false,
		}
	}

	fn stream_chunk(&mut self, chunk: &Bytes, end_of_stream: bool) -> ResponseTransform {
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
			let Ok(parsed) = serde_json::from_str::<gemini::GenerateContentResponse>(&ev.data) else {
				tracing::debug!("failed to parse generateContent stream chunk");
				continue;
			};
			if let Some(model) = &parsed.model_version {
				out.response_model = Some(strng::new(model));
			}
			if let Some(usage) = &parsed.usage_metadata {
				out.usage = out.usage.override_with(&gemini_usage(usage));
			}
			let choices: Vec<completions::ChatChoiceStream> = parsed
				.candidates
				.iter()
				.map(|c| {
					let mut delta = completions::StreamResponseDelta::default();
					if let Some(content) = &c.content {
						for part in &content.parts {
							match part {
								gemini::Part::Text(t) => {
									out.saw_output = true;
									delta.content = Some(match delta.content.take() {
										Some(prev) => prev + t,
										None => t.clone(),
									});
								},
								gemini::Part::FunctionCall(fc) => {
									out.saw_output = true;
									let index = self.next_tool_call;
									self.next_tool_call += 1;
									delta.tool_calls.get_or_insert_with(Vec::new).push(
										completions::MessageToolCallChunk {
											index,
											id: Some(format!("call_{index}")),
											kind: Some("function".to_string()),
											function: completions::FunctionCallChunk {
												name: Some(fc.name.clone()),
												arguments: Some(
													serde_json::to_string(&fc.args).unwrap_or_default(),
												),
											},
										},
									);
								},
								_ => {},
							}
						}
					}
					completions::ChatChoiceStream {
						index: c.index.unwrap_or_default(),
						delta,
						finish_reason: c.finish_reason.as_deref().map(finish_reason),
						logprobs: None,
					}
				})
				.collect();

			let resp = completions::StreamResponse {
				id: self.stream_id.clone(),
				object: "chat.completion.chunk".to_string(),
				created: self.created,
				model: self.request_model.to_string(),
				choices,
				usage: parsed.usage_metadata.as_ref().map(usage_to_chat),
				service_tier: None,
				system_fingerprint: None,
			};
			if let Some(frame) = parse::sse::encode_json_event("", &resp) {
				frames.extend_from_slice(&frame);
			}
		}
		if end_of_stream && !self.done {
			self.done = true;
			frames.extend_from_slice(&parse::sse::done_frame());
		}
		out.body = BodyMutation::Replace(frames.freeze());
		out
	}
}

impl Translator for ChatToGemini {
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

		let gemini_req = chat_to_generate_content(typed)?;
		let bytes = serde_json::to_vec(&gemini_req).map_err(AIError::RequestMarshal)?;
		let path = self.provider.get_path_for_model(
			RouteType::ChatCompletions,
			Some(request_model.as_str()),
			self.streaming,
		);
		Ok(RequestTransform {
			headers: route_to(path.as_str()),
			body: BodyMutation::Replace(Bytes::from(bytes)),
			original_model,
			request_model,
			override_host: Some(self.provider.get_host()),
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
			return Ok(self.stream_chunk(chunk, end_of_stream));
		}
		if !end_of_stream {
			return Ok(ResponseTransform::passthrough());
		}
		let resp: gemini::GenerateContentResponse =
			serde_json::from_slice(chunk).map_err(AIError::ResponseParsing)?;
		let usage = resp
			.usage_metadata
			.as_ref()
			.map(gemini_usage)
			.unwrap_or_default();
		let response_model = resp
			.model_version
			.as_deref()
			.map(strng::new)
			.unwrap_or_else(|| self.request_model.clone());
		let openai = generate_content_to_chat(resp, self.request_model.as_str());
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
		let res: gemini::GeminiErrorResponse =
			serde_json::from_slice(body).map_err(AIError::ResponseMarshal)?;
		let m = completions::ChatCompletionErrorResponse {
			error: completions::ChatCompletionError {
				r#type: "invalid_request_error".to_string(),
				message: res.error.message,
				param: None,
				code: res.error.status,
			},
		};
		let body = serde_json::to_vec(&m).map_err(AIError::ResponseMarshal)?;
		Ok((HeaderMutation::default(), BodyMutation::Replace(Bytes::from(body))))
	}
}

/// Translate an OpenAI chat completions request into a `generateContent` request.
pub(crate) fn chat_to_generate_content(
	req: completions::Request,
) -> Result<gemini::GenerateContentRequest, AIError> {
	let system_text = req
		.messages
		.iter()
		.filter(|m| matches!(m.role(), "system" | "developer"))
		.filter_map(|m| m.text())
		.collect::<Vec<String>>()
		.join("\n");

	// Gemini's functionResponse parts are keyed by function name, not call id; remember the
	// mapping the assistant's earlier tool calls established.
	let mut call_names: HashMap<String, String> = HashMap::new();
	for msg in &req.messages {
		if let completions::RequestMessage::Assistant(m) = msg {
			for tc in m.tool_calls.iter().flatten() {
				let completions::MessageToolCalls::Function(call) = tc;
				call_names.insert(call.id.clone(), call.function.name.clone());
			}
		}
	}

	let mut contents: Vec<gemini::Content> = Vec::new();
	for msg in &req.messages {
		match msg {
			completions::RequestMessage::System(_) | completions::RequestMessage::Developer(_) => {},
			completions::RequestMessage::User(m) => {
				if let Some(text) = m.content.text() {
					contents.push(gemini::Content {
						role: Some("user".to_string()),
						parts: vec![gemini::Part::Text(text)],
					});
				}
			},
			completions::RequestMessage::Tool(m) => {
				let name = call_names
					.get(&m.tool_call_id)
					.cloned()
					.unwrap_or_else(|| m.tool_call_id.clone());
				let response = m
					.content
					.text()
					.and_then(|t| serde_json::from_str::<serde_json::Value>(&t).ok().or_else(|| {
						Some(serde_json::json!({"result": t}))
					}))
					.unwrap_or_default();
				contents.push(gemini::Content {
					role: Some("user".to_string()),
					parts: vec![gemini::Part::FunctionResponse(gemini::FunctionResponse {
						name,
						response,
					})],
				});
			},
			completions::RequestMessage::Assistant(m) => {
				let mut parts: Vec<gemini::Part> = Vec::new();
				if let Some(text) = m.content.as_ref().and_then(|c| c.text()) {
					parts.push(gemini::Part::Text(text));
				}
				for tc in m.tool_calls.iter().flatten() {
					let completions::MessageToolCalls::Function(call) = tc;
					parts.push(gemini::Part::FunctionCall(gemini::FunctionCall {
						name: call.function.name.clone(),
						args: serde_json::from_str(&call.function.arguments)
							.unwrap_or(serde_json::Value::Null),
					}));
				}
				if !parts.is_empty() {
					contents.push(gemini::Content {
						role: Some("model".to_string()),
						parts,
					});
				}
			},
		}
	}

	let tools = req.tools.clone().map(|tools| {
		vec![gemini::GeminiTool {
			function_declarations: tools
				.into_iter()
				.map(|completions::Tool::Function(t)| gemini::FunctionDeclaration {
					name: t.function.name,
					description: t.function.description,
					parameters: t.function.parameters,
				})
				.collect(),
		}]
	});

	Ok(gemini::GenerateContentRequest {
		contents,
		system_instruction: if system_text.is_empty() {
			None
		} else {
			Some(gemini::Content {
				role: None,
				parts: vec![gemini::Part::Text(system_text)],
			})
		},
		generation_config: Some(gemini::GenerationConfig {
			temperature: req.temperature,
			top_p: req.top_p,
			top_k: req.vendor_extensions.top_k.map(|k| k as u32),
			max_output_tokens: req.max_completion_tokens.or(req.max_tokens),
			candidate_count: req.n,
			stop_sequences: req.stop_sequences(),
		}),
		tools,
		tool_config: None,
	})
}

/// Translate a `generateContent` response into an OpenAI chat completion.
pub(crate) fn generate_content_to_chat(
	resp: gemini::GenerateContentResponse,
	model: &str,
) -> completions::Response {
	let mut next_call = 0u32;
	let choices = resp
		.candidates
		.iter()
		.enumerate()
		.map(|(i, c)| {
			let mut content: Option<String> = None;
			let mut tool_calls: Vec<completions::MessageToolCalls> = Vec::new();
			if let Some(cc) = &c.content {
				for part in &cc.parts {
					match part {
						gemini::Part::Text(t) => {
							content = Some(match content.take() {
								Some(prev) => prev + t,
								None => t.clone(),
							});
						},
						gemini::Part::FunctionCall(fc) => {
							let id = format!("call_{next_call}");
							next_call += 1;
							tool_calls.push(completions::MessageToolCalls::Function(
								completions::MessageToolCall {
									id,
									function: completions::FunctionCall {
										name: fc.name.clone(),
										arguments: serde_json::to_string(&fc.args).unwrap_or_default(),
									},
								},
							));
						},
						_ => {},
					}
				}
			}
			completions::ChatChoice {
				index: c.index.unwrap_or(i as u32),
				message: completions::ResponseMessage {
					role: completions::Role::Assistant,
					content,
					tool_calls: if tool_calls.is_empty() {
						None
					} else {
						Some(tool_calls)
					},
					refusal: None,
					reasoning_content: None,
				},
				finish_reason: c.finish_reason.as_deref().map(finish_reason),
				logprobs: None,
			}
		})
		.collect();

	completions::Response {
		id: resp
			.response_id
			.clone()
			.unwrap_or_else(|| message_id("chatcmpl")),
		object: "chat.completion".to_string(),
		created: now_unix(),
		model: resp.model_version.unwrap_or_else(|| model.to_string()),
		choices,
		usage: resp.usage_metadata.as_ref().map(usage_to_chat),
		service_tier: None,
		system_fingerprint: None,
	}
}

fn finish_reason(reason: &str) -> completions::FinishReason {
	match reason {
		"STOP" => completions::FinishReason::Stop,
		"MAX_TOKENS" => completions::FinishReason::Length,
		"SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => {
			completions::FinishReason::ContentFilter
		},
		"MALFORMED_FUNCTION_CALL" => completions::FinishReason::ToolCalls,
		_ => completions::FinishReason::Stop,
	}
}

fn gemini_usage(u: &gemini::UsageMetadata) -> TokenUsage {
	TokenUsage {
		input_tokens: Some(u.prompt_token_count),
		output_tokens: Some(u.candidates_token_count),
		total_tokens: Some(u.total_token_count),
		cached_input_tokens: u.cached_content_token_count,
		cache_creation_input_tokens: None,
	}
}

fn usage_to_chat(u: &gemini::UsageMetadata) -> completions::Usage {
	completions::Usage {
		prompt_tokens: u.prompt_token_count,
		completion_tokens: u.candidates_token_count,
		total_tokens: u.total_token_count,
		prompt_tokens_details: u.cached_content_token_count.map(|cached| {
			completions::PromptTokensDetails {
				cached_tokens: Some(cached),
				audio_tokens: None,
				cache_creation_tokens: None,
			}
		}),
		completion_tokens_details: None,
	}
}

/// EmbeddingsToPredict serves OpenAI embeddings against the Vertex `:predict` surface.
pub struct EmbeddingsToPredict {
	provider: vertex::Provider,
	request_model: Strng,
}

impl EmbeddingsToPredict {
	pub fn new(provider: vertex::Provider) -> Self {
		EmbeddingsToPredict {
			provider,
			request_model: Strng::default(),
		}
	}
}

impl Translator for EmbeddingsToPredict {
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
		self.request_model = request_model.clone();

		let Some(input) = req.input.as_texts() else {
			return Err(AIError::InvalidRequestBody(
				"token-id embedding inputs are not supported by this backend".to_string(),
			));
		};

		let task_type = req
			.rest
			.get("task_type")
			.and_then(|v| v.as_str())
			.unwrap_or("RETRIEVAL_QUERY")
			.to_string();

		// Vertex natively supports batching via the instances array, so each input string
		// maps to an Instance directly.
		let instances = input
			.into_iter()
			.map(|content| gemini::Instance {
				content,
				task_type: Some(task_type.clone()),
				title: req
					.rest
					.get("title")
					.and_then(|v| v.as_str().map(|s| s.to_string())),
			})
			.collect();

		let auto_truncate = req.rest.get("auto_truncate").and_then(|v| v.as_bool());
		let output_dimensionality = req.dimensions.map(|d| d as u64);
		let parameters = if auto_truncate.is_some() || output_dimensionality.is_some() {
			Some(gemini::Parameters {
				auto_truncate,
				output_dimensionality,
			})
		} else {
			None
		};

		let vertex_req = gemini::PredictRequest {
			instances,
			parameters,
		};
		let bytes = serde_json::to_vec(&vertex_req).map_err(AIError::RequestMarshal)?;
		let path = self.provider.get_path_for_model(
			RouteType::Embeddings,
			Some(request_model.as_str()),
			false,
		);
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
		let resp: gemini::PredictResponse =
			serde_json::from_slice(chunk).map_err(AIError::ResponseParsing)?;

		let mut total_prompt_tokens = 0;
		let mut data = Vec::new();
		for (i, pred) in resp.predictions.into_iter().enumerate() {
			let mut embeddings_result = pred.embeddings;
			if let Some(stats) = &embeddings_result.statistics {
				total_prompt_tokens += stats.token_count;
			}
			data.push(embeddings::Embedding {
				object: "embedding".to_string(),
				// Move the large vector out of the response body rather than cloning it
				embedding: std::mem::take(&mut embeddings_result.values),
				index: i as u32,
				rest: Default::default(),
			});
		}

		let openai = embeddings::Response {
			object: "list".to_string(),
			data,
			model: self.request_model.to_string(),
			usage: embeddings::Usage {
				prompt_tokens: total_prompt_tokens,
				total_tokens: total_prompt_tokens,
				rest: Default::default(),
			},
			rest: Default::default(),
		};
		let body = serde_json::to_vec(&openai).map_err(AIError::ResponseMarshal)?;
		Ok(ResponseTransform {
			headers: HeaderMutation::default(),
			body: BodyMutation::Replace(Bytes::from(body)),
			usage: TokenUsage {
				input_tokens: Some(total_prompt_tokens),
				total_tokens: Some(total_prompt_tokens),
				..Default::default()
			},
			response_model: Some(self.request_model.clone()),
			saw_output: false,
		})
	}
}

#[cfg(test)]
#[path = "vertex_tests.rs"]
mod tests;
