use serde_json::json;

use super::*;

fn body(v: serde_json::Value) -> Bytes {
	Bytes::from(serde_json::to_vec(&v).unwrap())
}

fn provider() -> vertex::Provider {
	vertex::Provider {
		model: None,
		region: Some(strng::literal!("us-central1")),
		project_id: strng::literal!("proj-1"),
	}
}

#[test]
fn chat_request_becomes_generate_content() {
	let mut t = ChatToGemini::new(provider());
	let out = t
		.request_body(
			&HeaderMap::new(),
			&body(json!({
				"model": "gemini-2.0-flash",
				"temperature": 0.2,
				"max_tokens": 64,
				"messages": [
					{"role": "system", "content": "be brief"},
					{"role": "user", "content": "hi"},
					{"role": "assistant", "tool_calls": [
						{"type": "function", "id": "call_0",
						 "function": {"name": "get_weather", "arguments": "{\"city\":\"SF\"}"}}
					]},
					{"role": "tool", "tool_call_id": "call_0", "content": "{\"temp\": 20}"}
				],
				"tools": [{"type": "function", "function": {"name": "get_weather"}}]
			})),
			false,
		)
		.unwrap();
	assert_eq!(
		out.headers.get(":path"),
		Some(
			"/v1/projects/proj-1/locations/us-central1/publishers/google/models/gemini-2.0-flash:generateContent"
		)
	);
	let v: serde_json::Value = serde_json::from_slice(out.body.replaced().unwrap()).unwrap();
	assert_eq!(v["systemInstruction"]["parts"][0]["text"], "be brief");
	assert_eq!(v["contents"][0]["role"], "user");
	assert_eq!(v["contents"][1]["parts"][0]["functionCall"]["name"], "get_weather");
	// The tool response is rejoined to its function by name, not call id
	assert_eq!(
		v["contents"][2]["parts"][0]["functionResponse"]["name"],
		"get_weather"
	);
	assert_eq!(
		v["contents"][2]["parts"][0]["functionResponse"]["response"]["temp"],
		20
	);
	assert_eq!(v["generationConfig"]["maxOutputTokens"], 64);
	assert_eq!(
		v["tools"][0]["functionDeclarations"][0]["name"],
		"get_weather"
	);
}

#[test]
fn candidates_map_to_choices() {
	let mut t = ChatToGemini::new(provider());
	let _ = t.request_body(
		&HeaderMap::new(),
		&body(json!({
			"model": "gemini-2.0-flash",
			"messages": [{"role": "user", "content": "hi"}]
		})),
		false,
	);
	let out = t
		.response_body(
			&HeaderMap::new(),
			&body(json!({
				"candidates": [{
					"content": {"role": "model", "parts": [
						{"text": "hello "}, {"text": "there"},
						{"functionCall": {"name": "get_weather", "args": {"city": "SF"}}}
					]},
					"finishReason": "STOP",
					"index": 0
				}],
				"usageMetadata": {
					"promptTokenCount": 4, "candidatesTokenCount": 6, "totalTokenCount": 10,
					"cachedContentTokenCount": 1
				},
				"modelVersion": "gemini-2.0-flash-001"
			})),
			true,
		)
		.unwrap();
	assert_eq!(out.usage.input_tokens, Some(4));
	assert_eq!(out.usage.cached_input_tokens, Some(1));
	assert_eq!(out.response_model.as_deref(), Some("gemini-2.0-flash-001"));

	let v: serde_json::Value = serde_json::from_slice(out.body.replaced().unwrap()).unwrap();
	assert_eq!(v["choices"][0]["message"]["content"], "hello there");
	assert_eq!(
		v["choices"][0]["message"]["tool_calls"][0]["function"]["name"],
		"get_weather"
	);
	assert_eq!(v["choices"][0]["finish_reason"], "stop");
	assert_eq!(v["usage"]["prompt_tokens"], 4);
}

#[test]
fn gemini_stream_translates_to_chat_chunks() {
	let mut t = ChatToGemini::new(provider());
	let _ = t.request_body(
		&HeaderMap::new(),
		&body(json!({
			"model": "gemini-2.0-flash", "stream": true,
			"messages": [{"role": "user", "content": "hi"}]
		})),
		false,
	);
	let mut headers = HeaderMap::new();
	headers.insert("content-type", "text/event-stream".parse().unwrap());

	let chunk = body(json!({
		"candidates": [{"content": {"role": "model", "parts": [{"text": "Hel"}]}, "index": 0}]
	}));
	let out = t
		.response_body(
			&headers,
			&Bytes::from(format!("data: {}\n\n", String::from_utf8(chunk.to_vec()).unwrap())),
			false,
		)
		.unwrap();
	assert!(out.saw_output);
	let text = String::from_utf8(out.body.replaced().unwrap().to_vec()).unwrap();
	assert!(text.contains("chat.completion.chunk"), "{text}");
	assert!(text.contains("\"content\":\"Hel\""), "{text}");

	let tail = body(json!({
		"candidates": [{"content": {"role": "model", "parts": []}, "finishReason": "STOP", "index": 0}],
		"usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 2, "totalTokenCount": 5}
	}));
	let out = t
		.response_body(
			&headers,
			&Bytes::from(format!("data: {}\n\n", String::from_utf8(tail.to_vec()).unwrap())),
			true,
		)
		.unwrap();
	assert_eq!(out.usage.output_tokens, Some(2));
	let text = String::from_utf8(out.body.replaced().unwrap().to_vec()).unwrap();
	assert!(text.contains("\"finish_reason\":\"stop\""), "{text}");
	assert!(text.ends_with("data: [DONE]\n\n"), "{text}");
}

#[test]
fn embeddings_translate_with_snake_case_statistics() {
	let mut t = EmbeddingsToPredict::new(provider());
	let out = t
		.request_body(
			&HeaderMap::new(),
			&body(json!({
				"model": "text-embedding-004",
				"input": ["hello", "world"],
				"dimensions": 512,
				"task_type": "RETRIEVAL_DOCUMENT"
			})),
			false,
		)
		.unwrap();
	let v: serde_json::Value = serde_json::from_slice(out.body.replaced().unwrap()).unwrap();
	assert_eq!(v["instances"][0]["content"], "hello");
	assert_eq!(v["instances"][0]["task_type"], "RETRIEVAL_DOCUMENT");
	assert!(
		v["instances"][0].get("taskType").is_none(),
		"instance fields must be snake_case"
	);
	assert_eq!(v["parameters"]["outputDimensionality"], 512);

	let resp = t
		.response_body(
			&HeaderMap::new(),
			&body(json!({
				"predictions": [
					{"embeddings": {"values": [0.1, 0.2], "statistics": {"token_count": 3}}},
					{"embeddings": {"values": [0.3, 0.4], "statistics": {"token_count": 4}}}
				]
			})),
			true,
		)
		.unwrap();
	assert_eq!(resp.usage.input_tokens, Some(7));
	let v: serde_json::Value = serde_json::from_slice(resp.body.replaced().unwrap()).unwrap();
	assert_eq!(v["object"], "list");
	assert_eq!(v["data"][1]["index"], 1);
	assert_eq!(v["usage"]["prompt_tokens"], 7);
}

#[test]
fn gemini_errors_translate_to_openai_shape() {
	let mut t = ChatToGemini::new(provider());
	let (_, body_mutation) = t
		.response_error(
			&HeaderMap::new(),
			&body(json!({
				"error": {"code": 400, "message": "Invalid JSON payload", "status": "INVALID_ARGUMENT"}
			})),
		)
		.unwrap();
	let v: serde_json::Value = serde_json::from_slice(body_mutation.replaced().unwrap()).unwrap();
	assert_eq!(v["error"]["message"], "Invalid JSON payload");
	assert_eq!(v["error"]["code"], "INVALID_ARGUMENT");
}
