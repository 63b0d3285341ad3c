use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Request is the routing view of an embeddings body.
#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct Request {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub model: Option<String>,
	pub input: EmbeddingInput,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub encoding_format: Option<EncodingFormat>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub dimensions: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub user: Option<String>,

	#[serde(flatten, default)]
	pub rest: Value,
}

#[derive(Debug, Serialize, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingFormat {
	#[default]
	Float,
	Base64,
}

/// EmbeddingInput accepts six shapes, tried in this order: a bare string, an array of strings,
/// an array of token ids, an array of token-id arrays, a single content object, or an array of
/// content objects. The order is part of the wire contract.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum EmbeddingInput {
	String(String),
	StringArray(Vec<String>),
	Tokens(Vec<i64>),
	TokenArrays(Vec<Vec<i64>>),
	Content(EmbeddingContent),
	ContentArray(Vec<EmbeddingContent>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingContent {
	pub text: String,
}

impl<'de> Deserialize<'de> for EmbeddingInput {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = Value::deserialize(deserializer)?;
		if let Value::String(s) = value {
			return Ok(EmbeddingInput::String(s));
		}
		if value.is_object() {
			return Ok(EmbeddingInput::Content(
				serde_json::from_value(value).map_err(D::Error::custom)?,
			));
		}
		if !value.is_array() {
			return Err(D::Error::custom(
				"input must be a string, array, or content object",
			));
		}
		if let Ok(v) = serde_json::from_value::<Vec<String>>(value.clone()) {
			return Ok(EmbeddingInput::StringArray(v));
		}
		if let Ok(v) = serde_json::from_value::<Vec<i64>>(value.clone()) {
			return Ok(EmbeddingInput::Tokens(v));
		}
		if let Ok(v) = serde_json::from_value::<Vec<Vec<i64>>>(value.clone()) {
			return Ok(EmbeddingInput::TokenArrays(v));
		}
		if let Ok(v) = serde_json::from_value::<Vec<EmbeddingContent>>(value) {
			return Ok(EmbeddingInput::ContentArray(v));
		}
		Err(D::Error::custom("cannot unmarshal input as []T"))
	}
}

impl EmbeddingInput {
	/// as_texts returns the plain-text inputs, if this input is textual.
	pub fn as_texts(&self) -> Option<Vec<String>> {
		match self {
			EmbeddingInput::String(s) => Some(vec![s.clone()]),
			EmbeddingInput::StringArray(v) => Some(v.clone()),
			EmbeddingInput::Content(c) => Some(vec![c.text.clone()]),
			EmbeddingInput::ContentArray(v) => Some(v.iter().map(|c| c.text.clone()).collect()),
			EmbeddingInput::Tokens(_) | EmbeddingInput::TokenArrays(_) => None,
		}
	}

	pub fn len(&self) -> usize {
		match self {
			EmbeddingInput::String(_) | EmbeddingInput::Content(_) => 1,
			EmbeddingInput::StringArray(v) => v.len(),
			EmbeddingInput::Tokens(_) => 1,
			EmbeddingInput::TokenArrays(v) => v.len(),
			EmbeddingInput::ContentArray(v) => v.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct Response {
	pub object: String,
	pub model: String,
	pub data: Vec<Embedding>,
	pub usage: Usage,
	#[serde(flatten, default)]
	pub rest: Value,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct Embedding {
	pub index: u32,
	pub object: String,
	pub embedding: Vec<f32>,
	#[serde(flatten, default)]
	pub rest: Value,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct Usage {
	pub prompt_tokens: u64,
	pub total_tokens: u64,
	#[serde(flatten, default)]
	pub rest: Value,
}
