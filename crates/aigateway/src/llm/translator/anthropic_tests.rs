use serde_json::json;

use super::*;

fn body(v: serde_json::Value) -> Bytes {
	Bytes::from(serde_json::to_vec(&v).unwrap())
}

fn bearer_headers() -> HeaderMap {
	let mut h = HeaderMap::new();
	h.insert("authorization", "Bearer sk-test-123".parse().unwrap());
	h
}

#[test]
fn chat_request_becomes_messages() {
	let mut t = ChatToMessages::new(None, None);
	let out = t
		.request_body(
			&bearer_headers(),
			&body(json!({
				"model": "claude-sonnet-4",
				"max_completion_tokens": 100,
				"stop": ["END"],
				"user": "u-1",
				"messages": [
					{"role": "system", "content": "be brief"},
					{"role": "user", "content": "hi"},
					{"role": "assistant", "tool_calls": [
						{"type": "function", "id": "call_1",
						 "function": {"name": "get_weather", "arguments": "{\"city\":\"SF\"}"}}
					]},
					{"role": "tool", "tool_call_id": "call_1", "content": "sunny"}
				],
				"tools": [{"type": "function", "function": {"name": "get_weather", "parameters": {"type": "object"}}}],
				"tool_choice": "auto"
			})),
			false,
		)
		.unwrap();

	assert_eq!(out.original_model, "claude-sonnet-4");
	assert_eq!(out.headers.get(":path"), Some("/v1/messages"));
	assert_eq!(out.headers.get("x-api-key"), Some("sk-test-123"));
	assert_eq!(out.headers.get("anthropic-version"), Some("2023-06-01"));
	assert_eq!(out.override_host.as_deref(), Some("api.anthropic.com"));

	let v: serde_json::Value = serde_json::from_slice(out.body.replaced().unwrap()).unwrap();
	assert_eq!(v["model"], "claude-sonnet-4");
	assert_eq!(v["system"], "be brief");
	assert_eq!(v["max_tokens"], 100);
	assert_eq!(v["stop_sequences"], json!(["END"]));
	assert_eq!(v["metadata"]["user_id"], "u-1");
	assert_eq!(v["tool_choice"]["type"], "auto");
	// Messages: user text, assistant tool_use, user tool_result
	assert_eq!(v["messages"][0]["content"][0]["text"], "hi");
	assert_eq!(v["messages"][1]["content"][0]["type"], "tool_use");
	assert_eq!(v["messages"][1]["content"][0]["input"]["city"], "SF");
	assert_eq!(v["messages"][2]["content"][0]["type"], "tool_result");
}

#[test]
fn messages_response_translates_to_chat_with_cache_usage() {
	let mut t = ChatToMessages::new(None, None);
	let _ = t.request_body(
		&bearer_headers(),
		&body(json!({"model": "claude-sonnet-4", "messages": [{"role": "user", "content": "hi"}]})),
	false,
	);
	let out = t
		.response_body(
			&HeaderMap::new(),
			&body(json!({
				"id": "msg_1", "type": "message", "role": "assistant",
				"model": "claude-sonnet-4-20250514",
				"content": [{"type": "text", "text": "hello"}],
				"stop_reason": "end_turn", "stop_sequence": null,
				"usage": {"input_tokens": 5, "output_tokens": 7,
				          "cache_read_input_tokens": 2, "cache_creation_input_tokens": 3}
			})),
			true,
		)
		.unwrap();
	assert_eq!(out.usage.input_tokens, Some(10));
	assert_eq!(out.usage.output_tokens, Some(7));
	assert_eq!(out.usage.cached_input_tokens, Some(5));
	assert_eq!(out.response_model.as_deref(), Some("claude-sonnet-4-20250514"));

	let v: serde_json::Value = serde_json::from_slice(out.body.replaced().unwrap()).unwrap();
	assert_eq!(v["object"], "chat.completion");
	assert_eq!(v["choices"][0]["message"]["content"], "hello");
	assert_eq!(v["choices"][0]["finish_reason"], "stop");
	assert_eq!(v["usage"]["prompt_tokens"], 10);
	assert_eq!(v["usage"]["total_tokens"], 17);
	assert_eq!(v["usage"]["prompt_tokens_details"]["cached_tokens"], 5);
}

#[test]
fn stream_translates_to_chat_chunks() {
	let mut t = ChatToMessages::new(None, None);
	let _ = t.request_body(
		&bearer_headers(),
		&body(json!({
			"model": "claude-sonnet-4", "stream": true,
			"messages": [{"role": "user", "content": "hi"}]
		})),
		false,
	);
	let mut sse_headers = HeaderMap::new();
	sse_headers.insert("content-type", "text/event-stream".parse().unwrap());

	let frame = |name: &str, v: serde_json::Value| {
		format!("event: {name}\ndata: {}\n\n", serde_json::to_string(&v).unwrap())
	};

	let start = t
		.response_body(
			&sse_headers,
			&Bytes::from(frame(
				"message_start",
				json!({"type": "message_start", "message": {
					"id": "msg_1", "type": "message", "role": "assistant", "content": [],
					"model": "claude-sonnet-4-20250514", "stop_reason": null, "stop_sequence": null,
					"usage": {"input_tokens": 5, "output_tokens": 0}
				}}),
			)),
			false,
		)
		.unwrap();
	assert_eq!(start.response_model.as_deref(), Some("claude-sonnet-4-20250514"));
	assert!(!start.saw_output);
	let text = String::from_utf8(start.body.replaced().unwrap().to_vec()).unwrap();
	assert!(text.contains("chat.completion.chunk"), "{text}");

	let delta = t
		.response_body(
			&sse_headers,
			&Bytes::from(frame(
				"content_block_delta",
				json!({"type": "content_block_delta", "index": 0,
				       "delta": {"type": "text_delta", "text": "Hel"}}),
			)),
			false,
		)
		.unwrap();
	assert!(delta.saw_output);
	let text = String::from_utf8(delta.body.replaced().unwrap().to_vec()).unwrap();
	assert!(text.contains("\"content\":\"Hel\""), "{text}");

	let end = t
		.response_body(
			&sse_headers,
			&Bytes::from(
				frame(
					"message_delta",
					json!({"type": "message_delta",
					       "delta": {"stop_reason": "end_turn", "stop_sequence": null},
					       "usage": {"input_tokens": 5, "output_tokens": 9}}),
				) + &frame("message_stop", json!({"type": "message_stop"})),
			),
			true,
		)
		.unwrap();
	assert_eq!(end.usage.input_tokens, Some(5));
	assert_eq!(end.usage.output_tokens, Some(9));
	let text = String::from_utf8(end.body.replaced().unwrap().to_vec()).unwrap();
	assert!(text.contains("\"finish_reason\":\"stop\""), "{text}");
	assert!(text.ends_with("data: [DONE]\n\n"), "{text}");
}

#[test]
fn tool_call_fragments_accumulate_with_stable_indexes() {
	let mut t = ChatToMessages::new(None, None);
	let _ = t.request_body(
		&bearer_headers(),
		&body(json!({
			"model": "claude-sonnet-4", "stream": true,
			"messages": [{"role": "user", "content": "hi"}]
		})),
		false,
	);
	let mut sse_headers = HeaderMap::new();
	sse_headers.insert("content-type", "text/event-stream".parse().unwrap());
	let push = |t: &mut ChatToMessages, v: serde_json::Value| {
		let b = Bytes::from(format!("data: {}\n\n", serde_json::to_string(&v).unwrap()));
		t.response_body(&sse_headers, &b, false).unwrap()
	};

	let start = push(
		&mut t,
		json!({"type": "content_block_start", "index": 1, "content_block":
		       {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {}}}),
	);
	let text = String::from_utf8(start.body.replaced().unwrap().to_vec()).unwrap();
	assert!(text.contains("\"id\":\"toolu_1\""), "{text}");
	assert!(text.contains("\"name\":\"get_weather\""), "{text}");

	let frag = push(
		&mut t,
		json!({"type": "content_block_delta", "index": 1,
		       "delta": {"type": "input_json_delta", "partial_json": "{\"city\":"}}),
	);
	let text = String::from_utf8(frag.body.replaced().unwrap().to_vec()).unwrap();
	// The fragment is attributed to the same tool-call index that the start event created
	assert!(text.contains("\"index\":0"), "{text}");
	assert!(text.contains("{\\\"city\\\":"), "{text}");
}

#[test]
fn gcp_anthropic_targets_vertex() {
	let provider = vertex::Provider {
		model: None,
		region: Some(aigw_core::strng::literal!("us-east5")),
		project_id: aigw_core::strng::literal!("proj-1"),
	};
	let mut t = ChatToMessages::new(None, Some(provider));
	let out = t
		.request_body(
			&HeaderMap::new(),
			&body(json!({
				"model": "anthropic/claude-sonnet-4",
				"messages": [{"role": "user", "content": "hi"}]
			})),
			false,
		)
		.unwrap();
	assert_eq!(
		out.headers.get(":path"),
		Some(
			"/v1/projects/proj-1/locations/us-east5/publishers/anthropic/models/claude-sonnet-4:rawPredict"
		)
	);
	assert_eq!(
		out.override_host.as_deref(),
		Some("us-east5-aiplatform.googleapis.com")
	);
	let v: serde_json::Value = serde_json::from_slice(out.body.replaced().unwrap()).unwrap();
	assert_eq!(v["anthropic_version"], "vertex-2023-10-16");
	assert!(v.get("model").is_none());
}

#[test]
fn native_messages_passthrough_keeps_body() {
	let mut t = MessagesNative::new(None, None);
	let input = body(json!({
		"model": "claude-sonnet-4", "max_tokens": 10,
		"messages": [{"role": "user", "content": "hi"}]
	}));
	let out = t.request_body(&bearer_headers(), &input, false).unwrap();
	assert_eq!(out.body, BodyMutation::Passthrough);
	assert_eq!(out.headers.get("x-api-key"), Some("sk-test-123"));

	let resp = t
		.response_body(
			&HeaderMap::new(),
			&body(json!({
				"id": "msg_1", "type": "message", "role": "assistant",
				"model": "claude-sonnet-4-20250514",
				"content": [{"type": "text", "text": "hello"}],
				"stop_reason": "end_turn", "stop_sequence": null,
				"usage": {"input_tokens": 3, "output_tokens": 4}
			})),
			true,
		)
		.unwrap();
	assert_eq!(resp.body, BodyMutation::Passthrough);
	assert_eq!(resp.usage.input_tokens, Some(3));
	assert_eq!(resp.usage.total_tokens, Some(7));
}

#[test]
fn error_bodies_translate_to_openai_shape() {
	let mut t = ChatToMessages::new(None, None);
	let (_, body_mutation) = t
		.response_error(
			&HeaderMap::new(),
			&body(json!({
				"type": "error",
				"error": {"type": "invalid_request_error", "message": "max_tokens required"}
			})),
		)
		.unwrap();
	let v: serde_json::Value = serde_json::from_slice(body_mutation.replaced().unwrap()).unwrap();
	assert_eq!(v["error"]["message"], "max_tokens required");
	assert_eq!(v["error"]["type"], "invalid_request_error");
}
