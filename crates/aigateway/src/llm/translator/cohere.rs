use aigw_core::prelude::*;
use bytes::Bytes;

use crate::http::{HeaderMap, HeaderMutation};
use crate::llm::translator::{
	BodyMutation, RequestTransform, ResponseTransform, Translator, parse_request, route_to,
};
use crate::llm::types::cohere as wire;
use crate::llm::types::{TokenUsage, embeddings};
use crate::llm::{AIError, cohere};

/// EmbeddingsTranslator maps OpenAI embeddings onto Cohere's `/v2/embed`: `input[]` becomes
/// `texts[]` and the response embeddings come back as OpenAI `data[]`.
pub struct EmbeddingsTranslator {
	provider: cohere::Provider,
	request_model: Strng,
}

impl EmbeddingsTranslator {
	pub fn new(provider: cohere::Provider) -> Self {
		EmbeddingsTranslator {
			provider,
			request_model: Strng::default(),
		}
	}
}

impl Translator for EmbeddingsTranslator {
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

		let Some(texts) = req.input.as_texts() else {
			return Err(AIError::InvalidRequestBody(
				"token-id embedding inputs are not supported by this backend".to_string(),
			));
		};
		let cohere_req = wire::EmbedRequest {
			model: request_model.to_string(),
			texts,
			input_type: self
				.provider
				.input_type
				.as_deref()
				.unwrap_or(cohere::DEFAULT_INPUT_TYPE)
				.to_string(),
			embedding_types: Some(vec!["float".to_string()]),
			truncate: None,
		};
		let bytes = serde_json::to_vec(&cohere_req).map_err(AIError::RequestMarshal)?;
		Ok(RequestTransform {
			headers: route_to(cohere::EMBED_PATH),
			body: BodyMutation::Replace(Bytes::from(bytes)),
			original_model,
			request_model,
			override_host: Some(strng::new(cohere::DEFAULT_HOST_STR)),
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
		let resp: wire::EmbedResponse =
			serde_json::from_slice(chunk).map_err(AIError::ResponseParsing)?;
		let prompt_tokens = resp
			.meta
			.as_ref()
			.and_then(|m| m.billed_units.as_ref())
			.map(|b| b.input_tokens)
			.unwrap_or_default();
		let openai = embeddings::Response {
			object: "list".to_string(),
			model: self.request_model.to_string(),
			data: resp
				.embeddings
				.float
				.into_iter()
				.enumerate()
				.map(|(i, embedding)| embeddings::Embedding {
					index: i as u32,
					object: "embedding".to_string(),
					embedding,
					rest: Default::default(),
				})
				.collect(),
			usage: embeddings::Usage {
				prompt_tokens,
				total_tokens: prompt_tokens,
				rest: Default::default(),
			},
			rest: Default::default(),
		};
		let body = serde_json::to_vec(&openai).map_err(AIError::ResponseMarshal)?;
		Ok(ResponseTransform {
			headers: HeaderMutation::default(),
			body: BodyMutation::Replace(Bytes::from(body)),
			usage: TokenUsage {
				input_tokens: Some(prompt_tokens),
				total_tokens: Some(prompt_tokens),
				..Default::default()
			},
			response_model: Some(self.request_model.clone()),
			saw_output: false,
		})
	}

	fn response_error(
		&mut self,
		_headers: &HeaderMap,
		body: &Bytes,
	) -> Result<(HeaderMutation, BodyMutation), AIError> {
		let res: wire::CohereErrorResponse =
			serde_json::from_slice(body).map_err(AIError::ResponseMarshal)?;
		let out = serde_json::json!({
			"error": {
				"type": "invalid_request_error",
				"message": res.message,
			}
		});
		let body = serde_json::to_vec(&out).map_err(AIError::ResponseMarshal)?;
		Ok((HeaderMutation::default(), BodyMutation::Replace(Bytes::from(body))))
	}
}
