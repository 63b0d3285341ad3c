use assert_matches::assert_matches;
use opentelemetry::metrics::MeterProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use serde_json::json;

use super::*;
use crate::llm::{azureopenai, bedrock, openai};
use crate::telemetry::metrics::MetricsFactory;
use crate::types::agent::{BackendAuthMethod, Schema, SchemaName};

struct FixedSelector(SelectedBackend);

impl BackendSelector for FixedSelector {
	fn select(&self, _original_model: &str) -> Result<SelectedBackend, AIError> {
		Ok(self.0.clone())
	}
}

fn backend(name: &str, schema: SchemaName, host: &str) -> Backend {
	Backend {
		name: strng::new(name),
		schema: Schema::new(schema),
		headers: vec![],
		auth: BackendAuthMethod::Passthrough,
		host: strng::new(host),
		port: 443,
		tls: true,
	}
}

fn processor(selected: SelectedBackend) -> Processor {
	let provider = SdkMeterProvider::builder().build();
	let factory = MetricsFactory::new(&provider.meter("test"), vec![]);
	Processor::new(
		Arc::new(FixedSelector(selected)),
		factory.metrics(&HeaderMap::new()),
		false,
	)
}

fn openai_backend() -> SelectedBackend {
	SelectedBackend {
		backend: backend("openai", SchemaName::OpenAI, "api.openai.com"),
		provider: AIProvider::OpenAI(openai::Provider::default()),
	}
}

fn body(v: serde_json::Value) -> Bytes {
	Bytes::from(serde_json::to_vec(&v).unwrap())
}

#[test]
fn openai_chat_passthrough() {
	let mut p = processor(openai_backend());
	p.on_request_headers(HeaderMap::new(), "/v1/chat/completions")
		.unwrap();
	assert_eq!(p.state(), State::ReceivedHeaders);

	let input = body(json!({"model": "gpt-4", "messages": [{"role": "user", "content": "hi"}]}));
	let action = p.on_request_body(&input, true).unwrap().unwrap();
	assert_eq!(p.state(), State::Translated);
	// Body passes through byte-for-byte; authority points at the backend
	assert_eq!(action.body, BodyMutation::Passthrough);
	assert_eq!(action.headers.get(":authority"), Some("api.openai.com"));

	let mut resp_headers = HeaderMap::new();
	resp_headers.insert("content-type", "application/json".parse().unwrap());
	p.on_response_headers(StatusCode::OK, &resp_headers).unwrap();
	assert_eq!(p.state(), State::Buffered);

	let resp = body(json!({
		"id": "chatcmpl-1", "object": "chat.completion", "created": 1700000000,
		"model": "gpt-4-0613",
		"choices": [{"index": 0, "message": {"role": "assistant", "content": "hey"}, "finish_reason": "stop"}],
		"usage": {"prompt_tokens": 9, "completion_tokens": 3, "total_tokens": 12}
	}));
	let out = p.on_response_body(&resp_headers, &resp, true).unwrap();
	assert_eq!(p.state(), State::Done);
	assert_eq!(out.body.replaced().unwrap(), &resp);
	assert_eq!(p.usage().input_tokens, Some(9));
	assert_eq!(p.usage().output_tokens, Some(3));
}

#[test]
fn request_body_chunks_accumulate() {
	let mut p = processor(openai_backend());
	p.on_request_headers(HeaderMap::new(), "/v1/chat/completions")
		.unwrap();
	let input = body(json!({"model": "gpt-4", "messages": [{"role": "user", "content": "hi"}]}));
	let (a, b) = input.split_at(20);
	assert!(p.on_request_body(a, false).unwrap().is_none());
	assert!(p.on_request_body(b, true).unwrap().is_some());
}

#[test]
fn bedrock_chat_rewrites_and_accounts_cache_tokens() {
	let selected = SelectedBackend {
		backend: backend(
			"bedrock",
			SchemaName::AWSBedrock,
			"bedrock-runtime.us-east-1.amazonaws.com",
		),
		provider: AIProvider::Bedrock(bedrock::Provider {
			model: None,
			region: strng::literal!("us-east-1"),
		}),
	};
	let mut p = processor(selected);
	p.on_request_headers(HeaderMap::new(), "/v1/chat/completions")
		.unwrap();
	let input = body(json!({
		"model": "anthropic.claude-3-sonnet",
		"messages": [{"role": "user", "content": "hi"}]
	}));
	let action = p.on_request_body(&input, true).unwrap().unwrap();
	let v: serde_json::Value = serde_json::from_slice(action.body.replaced().unwrap()).unwrap();
	assert_eq!(v["modelId"], "anthropic.claude-3-sonnet");
	assert_eq!(
		action.headers.get(":path"),
		Some("/model/anthropic.claude-3-sonnet/converse")
	);

	let resp_headers = HeaderMap::new();
	p.on_response_headers(StatusCode::OK, &resp_headers).unwrap();
	let resp = body(json!({
		"output": {"message": {"role": "assistant", "content": [{"text": "hello"}]}},
		"stopReason": "end_turn",
		"usage": {"inputTokens": 5, "outputTokens": 7, "totalTokens": 12,
		          "cacheReadInputTokens": 2, "cacheWriteInputTokens": 3}
	}));
	let _ = p.on_response_body(&resp_headers, &resp, true).unwrap();
	assert_eq!(p.usage().input_tokens, Some(10));
	assert_eq!(p.usage().output_tokens, Some(7));
	assert_eq!(p.usage().cached_input_tokens, Some(5));
	assert_eq!(p.usage().total_tokens, Some(17));
}

#[test]
fn azure_path_rewrite() {
	let selected = SelectedBackend {
		backend: backend(
			"azure",
			SchemaName::AzureOpenAI,
			"example.openai.azure.com",
		),
		provider: AIProvider::AzureOpenAI(azureopenai::Provider {
			model: None,
			host: strng::literal!("example.openai.azure.com"),
			api_version: Some(strng::literal!("2024-02-01")),
		}),
	};
	let mut p = processor(selected);
	p.on_request_headers(HeaderMap::new(), "/v1/chat/completions")
		.unwrap();
	let input = body(json!({"model": "gpt-4", "messages": [{"role": "user", "content": "hi"}]}));
	let action = p.on_request_body(&input, true).unwrap().unwrap();
	assert_eq!(
		action.headers.get(":path"),
		Some("/openai/deployments/gpt-4/chat/completions?api-version=2024-02-01")
	);
	let v: serde_json::Value = serde_json::from_slice(action.body.replaced().unwrap()).unwrap();
	assert!(v.get("model").is_none());
}

#[test]
fn invalid_body_fails_with_422() {
	let mut p = processor(openai_backend());
	p.on_request_headers(HeaderMap::new(), "/v1/chat/completions")
		.unwrap();
	let err = p
		.on_request_body(&body(json!({"messages": [{"role": "system"}]})), true)
		.unwrap_err();
	assert_eq!(p.state(), State::Failed);
	let (status, resp) = p.error_response(err);
	assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
	let v: serde_json::Value = serde_json::from_slice(&resp).unwrap();
	assert!(
		v["error"]["message"]
			.as_str()
			.unwrap()
			.starts_with("InvalidRequestBody: "),
		"{v}"
	);
}

#[test]
fn malformed_body_fails_with_400() {
	let mut p = processor(openai_backend());
	p.on_request_headers(HeaderMap::new(), "/v1/chat/completions")
		.unwrap();
	let err = p.on_request_body(b"{oops", true).unwrap_err();
	assert_matches!(&err, AIError::MalformedRequest(_));
	let (status, _) = p.error_response(err);
	assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[test]
fn internal_errors_are_not_leaked() {
	let mut p = processor(openai_backend());
	let (status, resp) = p.error_response(AIError::Internal("secret db password".into()));
	assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	let v: serde_json::Value = serde_json::from_slice(&resp).unwrap();
	assert_eq!(v["error"]["message"], "internal error");
}

#[test]
fn upstream_error_passes_status_through() {
	let mut p = processor(openai_backend());
	p.on_request_headers(HeaderMap::new(), "/v1/chat/completions")
		.unwrap();
	let input = body(json!({"model": "gpt-4", "messages": [{"role": "user", "content": "hi"}]}));
	let _ = p.on_request_body(&input, true).unwrap();

	let resp_headers = HeaderMap::new();
	p.on_response_headers(StatusCode::TOO_MANY_REQUESTS, &resp_headers)
		.unwrap();
	let err_body = body(json!({"error": {"type": "rate_limit", "message": "slow down"}}));
	let out = p
		.on_response_body(&resp_headers, &err_body, true)
		.unwrap();
	// Same-schema errors pass through; the processor records a failed completion
	assert_eq!(out.body.replaced().unwrap(), &err_body);
	assert_eq!(p.state(), State::Failed);
}

#[test]
fn streaming_tracks_first_token_and_output_counts() {
	let mut p = processor(openai_backend());
	p.on_request_headers(HeaderMap::new(), "/v1/chat/completions")
		.unwrap();
	let input = body(json!({
		"model": "gpt-4", "stream": true,
		"messages": [{"role": "user", "content": "hi"}]
	}));
	let _ = p.on_request_body(&input, true).unwrap();

	let mut resp_headers = HeaderMap::new();
	resp_headers.insert("content-type", "text/event-stream".parse().unwrap());
	p.on_response_headers(StatusCode::OK, &resp_headers).unwrap();
	assert_eq!(p.state(), State::Streaming);

	let chunk = |v: serde_json::Value| {
		Bytes::from(format!("data: {}\n\n", serde_json::to_string(&v).unwrap()))
	};
	let mid = p
		.on_response_body(
			&resp_headers,
			&chunk(json!({
				"id": "c", "object": "chat.completion.chunk", "created": 1, "model": "gpt-4",
				"choices": [{"index": 0, "delta": {"content": "He"}, "finish_reason": null}]
			})),
			false,
		)
		.unwrap();
	// Streaming chunks pass through unmodified for same-schema backends
	assert_eq!(mid.body, BodyMutation::Passthrough);
	assert_eq!(p.state(), State::Streaming);

	let mut tail = chunk(json!({
		"id": "c", "object": "chat.completion.chunk", "created": 1, "model": "gpt-4",
		"choices": [],
		"usage": {"prompt_tokens": 2, "completion_tokens": 5, "total_tokens": 7}
	}))
	.to_vec();
	tail.extend_from_slice(b"data: [DONE]\n\n");
	let _ = p
		.on_response_body(&resp_headers, &tail, true)
		.unwrap();
	assert_eq!(p.state(), State::Done);
	assert_eq!(p.usage().output_tokens, Some(5));
}

#[test]
fn inter_token_latency_formula() {
	// 5 tokens over 500ms with the first at 100ms: (500 - 100) / 4 = 100ms
	let itl = time_per_output_token(
		Duration::from_millis(500),
		Duration::from_millis(100),
		5,
	)
	.unwrap();
	assert_eq!(itl, Duration::from_millis(100));

	// A single token has no inter-token latency
	assert_eq!(
		time_per_output_token(Duration::from_millis(500), Duration::from_millis(100), 1),
		None
	);
}

#[test]
fn mid_stream_failure_emits_terminal_error_frame() {
	let selected = SelectedBackend {
		backend: backend(
			"bedrock",
			SchemaName::AWSBedrock,
			"bedrock-runtime.us-east-1.amazonaws.com",
		),
		provider: AIProvider::Bedrock(bedrock::Provider {
			model: None,
			region: strng::literal!("us-east-1"),
		}),
	};
	let mut p = processor(selected);
	p.on_request_headers(HeaderMap::new(), "/v1/chat/completions")
		.unwrap();
	let input = body(json!({
		"model": "anthropic.claude-3-sonnet", "stream": true,
		"messages": [{"role": "user", "content": "hi"}]
	}));
	let _ = p.on_request_body(&input, true).unwrap();

	let mut resp_headers = HeaderMap::new();
	resp_headers.insert(
		"content-type",
		"application/vnd.amazon.eventstream".parse().unwrap(),
	);
	p.on_response_headers(StatusCode::OK, &resp_headers).unwrap();
	assert_eq!(p.state(), State::Streaming);

	// Garbage that cannot be event-stream decoded fails the translator mid-stream
	let out = p
		.on_response_body(&resp_headers, &[0xff; 64], false)
		.unwrap();
	assert_eq!(p.state(), State::Failed);
	let text = String::from_utf8(out.body.replaced().unwrap().to_vec()).unwrap();
	assert!(text.contains("\"error\""), "{text}");
	assert!(text.ends_with("data: [DONE]\n\n"), "{text}");
}

#[test]
fn cancellation_records_failure() {
	let mut p = processor(openai_backend());
	p.on_request_headers(HeaderMap::new(), "/v1/chat/completions")
		.unwrap();
	let input = body(json!({"model": "gpt-4", "messages": [{"role": "user", "content": "hi"}]}));
	let _ = p.on_request_body(&input, true).unwrap();
	p.on_cancel();
	assert_eq!(p.state(), State::Failed);
}
