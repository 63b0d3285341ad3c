use std::time::Duration;

use aigw_core::prelude::*;
use opentelemetry::KeyValue;
use opentelemetry::metrics::{Histogram, Meter};

use crate::http::HeaderMap;
use crate::llm::types::TokenUsage;

// GenAI semantic convention names.
// https://opentelemetry.io/docs/specs/semconv/gen-ai/
pub const GEN_AI_CLIENT_TOKEN_USAGE: &str = "gen_ai.client.token.usage";
pub const GEN_AI_SERVER_REQUEST_DURATION: &str = "gen_ai.server.request.duration";
pub const GEN_AI_SERVER_TIME_TO_FIRST_TOKEN: &str = "gen_ai.server.time_to_first_token";
pub const GEN_AI_SERVER_TIME_PER_OUTPUT_TOKEN: &str = "gen_ai.server.time_per_output_token";

pub const GEN_AI_OPERATION_NAME: &str = "gen_ai.operation.name";
pub const GEN_AI_PROVIDER_NAME: &str = "gen_ai.provider.name";
pub const GEN_AI_REQUEST_MODEL: &str = "gen_ai.request.model";
pub const GEN_AI_RESPONSE_MODEL: &str = "gen_ai.response.model";
/// Non-standard: the model name the client sent before any virtualization.
pub const GEN_AI_ORIGINAL_MODEL: &str = "gen_ai.original_model";
pub const GEN_AI_TOKEN_TYPE: &str = "gen_ai.token.type";
pub const ERROR_TYPE: &str = "error.type";

/// The `error.type` value recorded for failures the taxonomy does not break out further.
pub const ERROR_TYPE_FALLBACK: &str = "_OTHER";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenType {
	Input,
	Output,
	CachedInput,
	CacheCreationInput,
}

impl TokenType {
	pub fn as_str(&self) -> &'static str {
		match self {
			TokenType::Input => "input",
			TokenType::Output => "output",
			TokenType::CachedInput => "cached_input",
			TokenType::CacheCreationInput => "cache_creation_input",
		}
	}
}

/// token_usage_points expands a usage aggregate into the per-type points recorded on the
/// token-usage histogram. Only fields the provider reported are emitted.
pub fn token_usage_points(usage: &TokenUsage) -> Vec<(TokenType, u64)> {
	let mut out = Vec::with_capacity(4);
	if let Some(v) = usage.input_tokens {
		out.push((TokenType::Input, v));
	}
	if let Some(v) = usage.output_tokens {
		out.push((TokenType::Output, v));
	}
	if let Some(v) = usage.cached_input_tokens {
		out.push((TokenType::CachedInput, v));
	}
	if let Some(v) = usage.cache_creation_input_tokens {
		out.push((TokenType::CacheCreationInput, v));
	}
	out
}

/// Maps request headers onto extra metric attributes, as declared by configuration.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderAttribute {
	pub header: Strng,
	pub attribute: Strng,
}

/// MetricsFactory owns the instruments. It is created once at startup; per-request [`Metrics`]
/// objects are created from it. No global state.
#[derive(Clone)]
pub struct MetricsFactory {
	token_usage: Histogram<u64>,
	request_duration: Histogram<f64>,
	time_to_first_token: Histogram<f64>,
	time_per_output_token: Histogram<f64>,
	header_attributes: Vec<HeaderAttribute>,
}

impl MetricsFactory {
	pub fn new(meter: &Meter, header_attributes: Vec<HeaderAttribute>) -> Self {
		MetricsFactory {
			token_usage: meter
				.u64_histogram(GEN_AI_CLIENT_TOKEN_USAGE)
				.with_unit("token")
				.with_description("Number of tokens used per request, by token type")
				.build(),
			request_duration: meter
				.f64_histogram(GEN_AI_SERVER_REQUEST_DURATION)
				.with_unit("s")
				.with_description("End to end request duration")
				.build(),
			time_to_first_token: meter
				.f64_histogram(GEN_AI_SERVER_TIME_TO_FIRST_TOKEN)
				.with_unit("s")
				.with_description("Time until the first output token of a streaming response")
				.build(),
			time_per_output_token: meter
				.f64_histogram(GEN_AI_SERVER_TIME_PER_OUTPUT_TOKEN)
				.with_unit("s")
				.with_description("Average inter-token latency of a streaming response")
				.build(),
			header_attributes,
		}
	}

	/// metrics builds the per-request recorder, capturing any configured request-header
	/// attributes up front.
	pub fn metrics(&self, headers: &HeaderMap) -> Metrics {
		let mut attributes = Vec::new();
		for mapping in &self.header_attributes {
			if let Some(v) = crate::http::header_str(headers, mapping.header.as_str()) {
				attributes.push(KeyValue::new(mapping.attribute.to_string(), v.to_string()));
			}
		}
		Metrics {
			factory: self.clone(),
			attributes,
		}
	}
}

impl std::fmt::Debug for MetricsFactory {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MetricsFactory")
			.field("header_attributes", &self.header_attributes)
			.finish()
	}
}

/// Metrics is the per-request recorder. Attributes accumulate as the request progresses
/// (operation at parse time, backend at translation time, response model at completion).
#[derive(Debug, Clone)]
pub struct Metrics {
	factory: MetricsFactory,
	attributes: Vec<KeyValue>,
}

impl Metrics {
	fn set_attr(&mut self, key: &'static str, value: Strng) {
		self.attributes.retain(|kv| kv.key.as_str() != key);
		self.attributes.push(KeyValue::new(key, value.to_string()));
	}

	pub fn set_operation(&mut self, operation: Strng) {
		self.set_attr(GEN_AI_OPERATION_NAME, operation);
	}

	pub fn set_provider(&mut self, provider: Strng) {
		self.set_attr(GEN_AI_PROVIDER_NAME, provider);
	}

	pub fn set_original_model(&mut self, model: Strng) {
		self.set_attr(GEN_AI_ORIGINAL_MODEL, model);
	}

	pub fn set_request_model(&mut self, model: Strng) {
		self.set_attr(GEN_AI_REQUEST_MODEL, model);
	}

	pub fn set_response_model(&mut self, model: Strng) {
		self.set_attr(GEN_AI_RESPONSE_MODEL, model);
	}

	pub fn attributes(&self) -> &[KeyValue] {
		&self.attributes
	}

	pub fn record_token_usage(&self, usage: &TokenUsage) {
		for (token_type, value) in token_usage_points(usage) {
			let mut attrs = self.attributes.clone();
			attrs.push(KeyValue::new(GEN_AI_TOKEN_TYPE, token_type.as_str()));
			self.factory.token_usage.record(value, &attrs);
		}
	}

	/// record_completion emits the request-duration histogram; failures carry `error.type`.
	pub fn record_completion(&self, duration: Duration, success: bool) {
		if success {
			self
				.factory
				.request_duration
				.record(duration.as_secs_f64(), &self.attributes);
		} else {
			let mut attrs = self.attributes.clone();
			attrs.push(KeyValue::new(ERROR_TYPE, ERROR_TYPE_FALLBACK));
			self
				.factory
				.request_duration
				.record(duration.as_secs_f64(), &attrs);
		}
	}

	pub fn record_time_to_first_token(&self, d: Duration) {
		self
			.factory
			.time_to_first_token
			.record(d.as_secs_f64(), &self.attributes);
	}

	pub fn record_time_per_output_token(&self, d: Duration) {
		self
			.factory
			.time_per_output_token
			.record(d.as_secs_f64(), &self.attributes);
	}
}
