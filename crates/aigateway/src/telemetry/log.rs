use std::time::Duration;

pub use aigw_core::log::AsyncLog;
use aigw_core::prelude::*;

use crate::llm::types::TokenUsage;
use crate::telemetry::redact::redact_string;

/// init_logging installs the fmt subscriber, honoring `RUST_LOG`. Safe to call more than
/// once; later calls are no-ops.
pub fn init_logging(json: bool) {
	use tracing_subscriber::EnvFilter;
	let builder = tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env());
	let result = if json {
		builder.json().try_init()
	} else {
		builder.try_init()
	};
	if result.is_err() {
		tracing::debug!("logging was already initialized");
	}
}

/// RequestLog is the per-request access-log record. Free-text fields that may carry prompt or
/// key material are stored redacted.
#[derive(Debug, Default, Clone)]
pub struct RequestLog {
	pub route: Option<Strng>,
	pub backend: Option<Strng>,
	pub provider: Option<Strng>,
	pub original_model: Option<Strng>,
	pub request_model: Option<Strng>,
	pub response_model: Option<Strng>,
	pub status: Option<u16>,
	pub streaming: bool,
	pub usage: TokenUsage,
	pub duration: Option<Duration>,
	/// Redacted preview of the first user message, for correlation only.
	pub prompt_digest: Option<String>,
	pub error: Option<String>,
}

impl RequestLog {
	pub fn set_prompt(&mut self, prompt: &str) {
		self.prompt_digest = Some(redact_string(prompt));
	}

	/// emit writes the access log line. Failures log at warn, successes at info.
	pub fn emit(&self) {
		let duration_ms = self.duration.map(|d| d.as_millis() as u64);
		if let Some(err) = &self.error {
			tracing::warn!(
				route = self.route.as_deref(),
				backend = self.backend.as_deref(),
				provider = self.provider.as_deref(),
				original_model = self.original_model.as_deref(),
				request_model = self.request_model.as_deref(),
				status = self.status,
				duration_ms,
				error = err.as_str(),
				"request failed"
			);
			return;
		}
		tracing::info!(
			route = self.route.as_deref(),
			backend = self.backend.as_deref(),
			provider = self.provider.as_deref(),
			original_model = self.original_model.as_deref(),
			request_model = self.request_model.as_deref(),
			response_model = self.response_model.as_deref(),
			status = self.status,
			streaming = self.streaming,
			input_tokens = self.usage.input_tokens,
			output_tokens = self.usage.output_tokens,
			total_tokens = self.usage.total_tokens,
			duration_ms,
			prompt = self.prompt_digest.as_deref(),
			"request complete"
		);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn prompt_is_stored_redacted() {
		let mut log = RequestLog::default();
		log.set_prompt("the launch codes are 0000");
		let stored = log.prompt_digest.unwrap();
		assert!(stored.starts_with("[REDACTED LENGTH=25 HASH="), "{stored}");
		assert!(!stored.contains("launch"));
	}
}
