use aws_smithy_eventstream::frame::write_message_to;
use aws_smithy_types::event_stream::{Header, HeaderValue, Message as Frame};
use serde_json::json;

use super::*;

fn body(v: serde_json::Value) -> Bytes {
	Bytes::from(serde_json::to_vec(&v).unwrap())
}

fn provider() -> bedrock::Provider {
	bedrock::Provider {
		model: None,
		region: strng::literal!("us-east-1"),
	}
}

fn event_frame(event_type: &str, payload: serde_json::Value) -> Vec<u8> {
	let msg = Frame::new(serde_json::to_vec(&payload).unwrap())
		.add_header(Header::new(
			":message-type",
			HeaderValue::String("event".into()),
		))
		.add_header(Header::new(
			":event-type",
			HeaderValue::String(event_type.to_string().into()),
		));
	let mut out = Vec::new();
	write_message_to(&msg, &mut out).unwrap();
	out
}

#[test]
fn chat_request_becomes_converse_envelope() {
	let mut t = ChatToConverse::new(provider());
	let out = t
		.request_body(
			&HeaderMap::new(),
			&body(json!({
				"model": "anthropic.claude-3-sonnet",
				"max_tokens": 50,
				"temperature": 0.5,
				"messages": [
					{"role": "system", "content": "be brief"},
					{"role": "user", "content": "hi"}
				]
			})),
			false,
		)
		.unwrap();
	assert_eq!(
		out.headers.get(":path"),
		Some("/model/anthropic.claude-3-sonnet/converse")
	);
	assert_eq!(
		out.override_host.as_deref(),
		Some("bedrock-runtime.us-east-1.amazonaws.com")
	);
	let v: serde_json::Value = serde_json::from_slice(out.body.replaced().unwrap()).unwrap();
	assert_eq!(v["modelId"], "anthropic.claude-3-sonnet");
	assert_eq!(v["system"][0]["text"], "be brief");
	assert_eq!(v["messages"][0]["content"][0]["text"], "hi");
	assert_eq!(v["inferenceConfig"]["maxTokens"], 50);
	assert_eq!(v["inferenceConfig"]["temperature"], 0.5);
}

#[test]
fn streaming_requests_use_converse_stream_path() {
	let mut t = ChatToConverse::new(provider());
	let out = t
		.request_body(
			&HeaderMap::new(),
			&body(json!({
				"model": "anthropic.claude-3-sonnet",
				"stream": true,
				"messages": [{"role": "user", "content": "hi"}]
			})),
			false,
		)
		.unwrap();
	assert!(out.streaming);
	assert_eq!(
		out.headers.get(":path"),
		Some("/model/anthropic.claude-3-sonnet/converse-stream")
	);
}

#[test]
fn converse_response_translates_with_anthropic_accounting() {
	let mut t = ChatToConverse::new(provider());
	let _ = t.request_body(
		&HeaderMap::new(),
		&body(json!({
			"model": "anthropic.claude-3-sonnet",
			"messages": [{"role": "user", "content": "hi"}]
		})),
		false,
	);
	let out = t
		.response_body(
			&HeaderMap::new(),
			&body(json!({
				"output": {"message": {"role": "assistant", "content": [{"text": "hello"}]}},
				"stopReason": "end_turn",
				"usage": {"inputTokens": 5, "outputTokens": 7, "totalTokens": 12,
				          "cacheReadInputTokens": 2, "cacheWriteInputTokens": 3}
			})),
			true,
		)
		.unwrap();
	// input = 5 + 2 + 3, cached = 5, total = 17
	assert_eq!(out.usage.input_tokens, Some(10));
	assert_eq!(out.usage.output_tokens, Some(7));
	assert_eq!(out.usage.cached_input_tokens, Some(5));
	assert_eq!(out.usage.total_tokens, Some(17));

	let v: serde_json::Value = serde_json::from_slice(out.body.replaced().unwrap()).unwrap();
	assert_eq!(v["object"], "chat.completion");
	assert_eq!(v["model"], "anthropic.claude-3-sonnet");
	assert_eq!(v["choices"][0]["message"]["content"], "hello");
	assert_eq!(v["usage"]["prompt_tokens"], 10);
}

#[test]
fn event_stream_reframes_to_sse_chunks() {
	let mut t = ChatToConverse::new(provider());
	let _ = t.request_body(
		&HeaderMap::new(),
		&body(json!({
			"model": "anthropic.claude-3-sonnet", "stream": true,
			"messages": [{"role": "user", "content": "hi"}]
		})),
		false,
	);

	let mut headers = HeaderMap::new();
	headers.insert(
		"content-type",
		"application/vnd.amazon.eventstream".parse().unwrap(),
	);
	// Response headers are rewritten to SSE
	let hm = t.response_headers(&headers).unwrap();
	assert_eq!(hm.get("content-type"), Some("text/event-stream"));

	let mut stream = event_frame("messageStart", json!({"role": "assistant"}));
	stream.extend(event_frame(
		"contentBlockDelta",
		json!({"delta": {"text": "Hel"}, "contentBlockIndex": 0}),
	));
	let out = t
		.response_body(&headers, &Bytes::from(stream), false)
		.unwrap();
	assert!(out.saw_output);
	let text = String::from_utf8(out.body.replaced().unwrap().to_vec()).unwrap();
	assert!(text.contains("\"role\":\"assistant\""), "{text}");
	assert!(text.contains("\"content\":\"Hel\""), "{text}");

	let mut tail = event_frame("messageStop", json!({"stopReason": "end_turn"}));
	tail.extend(event_frame(
		"metadata",
		json!({"usage": {"inputTokens": 5, "outputTokens": 7, "totalTokens": 12,
		                 "cacheReadInputTokens": 2, "cacheWriteInputTokens": 3}}),
	));
	let out = t.response_body(&headers, &Bytes::from(tail), true).unwrap();
	assert_eq!(out.usage.input_tokens, Some(10));
	assert_eq!(out.usage.cached_input_tokens, Some(5));
	let text = String::from_utf8(out.body.replaced().unwrap().to_vec()).unwrap();
	assert!(text.contains("\"finish_reason\":\"stop\""), "{text}");
	assert!(text.contains("\"prompt_tokens\":10"), "{text}");
	assert!(text.ends_with("data: [DONE]\n\n"), "{text}");
}

#[test]
fn messages_to_converse_round_trips_tools() {
	let req: messages::Request = serde_json::from_value(json!({
		"model": "anthropic.claude-3-sonnet",
		"max_tokens": 100,
		"messages": [
			{"role": "user", "content": "weather?"},
			{"role": "assistant", "content": [
				{"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"city": "SF"}}
			]},
			{"role": "user", "content": [
				{"type": "tool_result", "tool_use_id": "toolu_1", "content": "sunny", "is_error": false}
			]}
		],
		"tools": [{"name": "get_weather", "input_schema": {"type": "object"}}]
	}))
	.unwrap();
	let out = messages_to_converse(req, "anthropic.claude-3-sonnet".to_string());
	let v = serde_json::to_value(&out).unwrap();
	assert_eq!(v["messages"][1]["content"][0]["toolUse"]["name"], "get_weather");
	assert_eq!(
		v["messages"][2]["content"][0]["toolResult"]["toolUseId"],
		"toolu_1"
	);
	assert_eq!(
		v["toolConfig"]["tools"][0]["toolSpec"]["name"],
		"get_weather"
	);
}

#[test]
fn messages_stream_orders_delta_before_stop() {
	let mut t = MessagesToConverse::new(provider());
	let _ = t.request_body(
		&HeaderMap::new(),
		&body(json!({
			"model": "anthropic.claude-3-sonnet", "max_tokens": 10, "stream": true,
			"messages": [{"role": "user", "content": "hi"}]
		})),
		false,
	);
	let mut headers = HeaderMap::new();
	headers.insert(
		"content-type",
		"application/vnd.amazon.eventstream".parse().unwrap(),
	);

	let mut stream = event_frame("messageStop", json!({"stopReason": "max_tokens"}));
	stream.extend(event_frame(
		"metadata",
		json!({"usage": {"inputTokens": 4, "outputTokens": 6, "totalTokens": 10}}),
	));
	let out = t
		.response_body(&headers, &Bytes::from(stream), true)
		.unwrap();
	let text = String::from_utf8(out.body.replaced().unwrap().to_vec()).unwrap();
	let delta_pos = text.find("event: message_delta").unwrap();
	let stop_pos = text.find("event: message_stop").unwrap();
	assert!(delta_pos < stop_pos, "{text}");
	assert!(text.contains("\"stop_reason\":\"max_tokens\""), "{text}");
	assert_eq!(out.usage.output_tokens, Some(6));
}

#[test]
fn titan_embeddings_translate_both_ways() {
	let mut t = EmbeddingsToInvoke::new(provider());
	let out = t
		.request_body(
			&HeaderMap::new(),
			&body(json!({"model": "amazon.titan-embed-text-v2:0", "input": "hello", "dimensions": 256})),
			false,
		)
		.unwrap();
	assert_eq!(
		out.headers.get(":path"),
		Some("/model/amazon.titan-embed-text-v2:0/invoke")
	);
	let v: serde_json::Value = serde_json::from_slice(out.body.replaced().unwrap()).unwrap();
	assert_eq!(v["inputText"], "hello");
	assert_eq!(v["dimensions"], 256);

	let resp = t
		.response_body(
			&HeaderMap::new(),
			&body(json!({"embedding": [0.1, 0.2], "inputTextTokenCount": 2})),
			true,
		)
		.unwrap();
	assert_eq!(resp.usage.input_tokens, Some(2));
	let v: serde_json::Value = serde_json::from_slice(resp.body.replaced().unwrap()).unwrap();
	assert_eq!(v["object"], "list");
	assert_eq!(v["data"][0]["embedding"], json!([0.1, 0.2]));
}

#[test]
fn cohere_embeddings_map_input_to_texts() {
	let mut t = EmbeddingsToInvoke::new(provider());
	let out = t
		.request_body(
			&HeaderMap::new(),
			&body(json!({"model": "cohere.embed-english-v3", "input": ["a", "b"]})),
			false,
		)
		.unwrap();
	let v: serde_json::Value = serde_json::from_slice(out.body.replaced().unwrap()).unwrap();
	assert_eq!(v["texts"], json!(["a", "b"]));
	assert_eq!(v["input_type"], "search_document");
}

#[test]
fn token_inputs_are_rejected() {
	let mut t = EmbeddingsToInvoke::new(provider());
	let err = t
		.request_body(
			&HeaderMap::new(),
			&body(json!({"model": "amazon.titan-embed-text-v2:0", "input": [[1, 2, 3]]})),
			false,
		)
		.unwrap_err();
	assert!(err.to_string().starts_with("InvalidRequestBody: "), "{err}");
}
