use serde_json::json;

use super::typed::*;

fn round_trip<T: serde::Serialize + serde::de::DeserializeOwned>(v: serde_json::Value) {
	let parsed: T = serde_json::from_value(v.clone()).unwrap();
	let back = serde_json::to_value(&parsed).unwrap();
	assert_eq!(v, back);
}

#[test]
fn content_part_round_trips() {
	round_trip::<ContentPart>(json!({"type": "text", "text": "hi"}));
	round_trip::<ContentPart>(json!({"type": "image_url", "image_url": {"url": "https://x/img.png"}}));
	round_trip::<ContentPart>(
		json!({"type": "input_audio", "input_audio": {"data": "AAAA", "format": "wav"}}),
	);
}

#[test]
fn content_part_rejects_unknown_tag() {
	let err = serde_json::from_value::<ContentPart>(json!({"type": "video_url"})).unwrap_err();
	assert!(err.to_string().contains("video_url"), "{err}");
}

#[test]
fn response_format_round_trips() {
	round_trip::<ResponseFormat>(json!({"type": "text"}));
	round_trip::<ResponseFormat>(json!({"type": "json_object"}));
	round_trip::<ResponseFormat>(json!({
		"type": "json_schema",
		"json_schema": {"name": "out", "schema": {"type": "object"}}
	}));
}

#[test]
fn message_roles_round_trip() {
	round_trip::<RequestMessage>(json!({"role": "system", "content": "be nice"}));
	round_trip::<RequestMessage>(json!({"role": "developer", "content": "be terse"}));
	round_trip::<RequestMessage>(json!({"role": "user", "content": [{"type": "text", "text": "hi"}]}));
	round_trip::<RequestMessage>(json!({"role": "tool", "tool_call_id": "call_1", "content": "42"}));
	round_trip::<RequestMessage>(json!({
		"role": "assistant",
		"tool_calls": [{"type": "function", "function": {"name": "f", "arguments": "{}"}, "id": "call_1"}]
	}));
}

#[test]
fn prompt_candidate_order() {
	assert_eq!(
		serde_json::from_value::<Prompt>(json!("hello")).unwrap(),
		Prompt::String("hello".into())
	);
	assert_eq!(
		serde_json::from_value::<Prompt>(json!(["a", "b"])).unwrap(),
		Prompt::StringArray(vec!["a".into(), "b".into()])
	);
	assert_eq!(
		serde_json::from_value::<Prompt>(json!([1, 2, 3])).unwrap(),
		Prompt::IntArray(vec![1, 2, 3])
	);
	assert_eq!(
		serde_json::from_value::<Prompt>(json!([[1], [2]])).unwrap(),
		Prompt::IntArrayArray(vec![vec![1], vec![2]])
	);
	// The empty array must resolve to the first array candidate deterministically.
	assert_eq!(
		serde_json::from_value::<Prompt>(json!([])).unwrap(),
		Prompt::StringArray(vec![])
	);
}

#[test]
fn prompt_rejects_mixed_elements() {
	let err = serde_json::from_value::<Prompt>(json!(["a", 1])).unwrap_err();
	assert!(err.to_string().contains("cannot unmarshal"), "{err}");
	let err = serde_json::from_value::<Prompt>(json!(42)).unwrap_err();
	assert!(err.to_string().contains("prompt must be"), "{err}");
}

#[test]
fn routing_view_preserves_unknown_fields() {
	let body = json!({
		"model": "gpt-4",
		"messages": [{"role": "user", "content": "hi"}],
		"safety_identifier": "u-1",
		"prediction": {"type": "content", "content": "x"}
	});
	let req: super::Request = serde_json::from_value(body.clone()).unwrap();
	assert_eq!(req.model.as_deref(), Some("gpt-4"));
	assert_eq!(serde_json::to_value(&req).unwrap(), body);
}

#[test]
fn validate_requires_content() {
	let req: super::Request =
		serde_json::from_value(json!({"messages": [{"role": "system"}]})).unwrap();
	let err = req.validate().unwrap_err();
	assert!(err.to_string().starts_with("InvalidRequestBody: "), "{err}");

	let req: super::Request =
		serde_json::from_value(json!({"messages": [{"role": "robot", "content": "x"}]})).unwrap();
	assert!(req.validate().is_err());

	// Assistant messages may omit content (tool calls only)
	let req: super::Request = serde_json::from_value(json!({
		"messages": [{"role": "assistant", "tool_calls": []}]
	}))
	.unwrap();
	assert!(req.validate().is_ok());
}

#[test]
fn usage_details_round_trip() {
	round_trip::<Usage>(json!({
		"prompt_tokens": 10,
		"completion_tokens": 5,
		"total_tokens": 15,
		"prompt_tokens_details": {"cached_tokens": 2}
	}));
}

#[test]
fn stream_chunk_parses_tool_call_fragments() {
	let chunk: StreamResponse = serde_json::from_value(json!({
		"id": "chatcmpl-1",
		"object": "chat.completion.chunk",
		"created": 1700000000,
		"model": "gpt-4",
		"choices": [{
			"index": 0,
			"delta": {"tool_calls": [{"index": 0, "function": {"arguments": "{\"a\":"}}]},
			"finish_reason": null
		}]
	}))
	.unwrap();
	let delta = &chunk.choices[0].delta;
	assert_eq!(
		delta.tool_calls.as_ref().unwrap()[0]
			.function
			.arguments
			.as_deref(),
		Some("{\"a\":")
	);
}
