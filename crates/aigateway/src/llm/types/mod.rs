pub mod bedrock;
pub mod cohere;
pub mod completions;
pub mod embeddings;
pub mod messages;
pub mod responses;
pub mod vertex;

/// TokenUsage aggregates provider-reported token counts. Every field tracks "set" separately
/// from its value; merging another usage replaces only the fields the other has set.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TokenUsage {
	pub input_tokens: Option<u64>,
	pub output_tokens: Option<u64>,
	pub total_tokens: Option<u64>,
	pub cached_input_tokens: Option<u64>,
	pub cache_creation_input_tokens: Option<u64>,
}

impl TokenUsage {
	pub fn new(input: u64, output: u64) -> Self {
		TokenUsage {
			input_tokens: Some(input),
			output_tokens: Some(output),
			total_tokens: Some(input + output),
			..Default::default()
		}
	}

	/// override_with replaces only the fields `other` has set.
	pub fn override_with(mut self, other: &TokenUsage) -> Self {
		if other.input_tokens.is_some() {
			self.input_tokens = other.input_tokens;
		}
		if other.output_tokens.is_some() {
			self.output_tokens = other.output_tokens;
		}
		if other.total_tokens.is_some() {
			self.total_tokens = other.total_tokens;
		}
		if other.cached_input_tokens.is_some() {
			self.cached_input_tokens = other.cached_input_tokens;
		}
		if other.cache_creation_input_tokens.is_some() {
			self.cache_creation_input_tokens = other.cache_creation_input_tokens;
		}
		self
	}

	/// from_anthropic applies Anthropic's accounting: the reported `input_tokens` excludes
	/// cached tokens, so the billable input is `input + cache_creation + cache_read` and the
	/// cached portion is `cache_read + cache_creation`.
	pub fn from_anthropic(
		input: u64,
		output: u64,
		cache_creation: Option<u64>,
		cache_read: Option<u64>,
	) -> Self {
		let creation = cache_creation.unwrap_or_default();
		let read = cache_read.unwrap_or_default();
		let total_input = input + creation + read;
		TokenUsage {
			input_tokens: Some(total_input),
			output_tokens: Some(output),
			total_tokens: Some(total_input + output),
			cached_input_tokens: (creation + read > 0).then_some(creation + read),
			cache_creation_input_tokens: cache_creation,
		}
	}

	pub fn is_empty(&self) -> bool {
		*self == TokenUsage::default()
	}
}
