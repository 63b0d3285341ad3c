use bytes::Bytes;
use serde_json::{Map, Value};

use crate::http::{HeaderMap, HeaderMutation};
use crate::llm::translator::{
	BodyMutation, RequestTransform, ResponseTransform, Translator, openai, parse_request, route_to,
};
use crate::llm::{AIError, RouteType, azureopenai};

/// AzureTranslator speaks the OpenAI wire format against an Azure OpenAI deployment: the path
/// moves to `/openai/deployments/{model}/{endpoint}?api-version=...` and, for deployment-style
/// API versions, the model is stripped from the body (it is part of the URL).
pub struct AzureTranslator {
	provider: azureopenai::Provider,
	inner: openai::OpenAITranslator,
	route: RouteType,
}

impl AzureTranslator {
	pub fn new(route: RouteType, provider: azureopenai::Provider) -> Self {
		AzureTranslator {
			inner: openai::OpenAITranslator::new(route, provider.model.clone()),
			provider,
			route,
		}
	}
}

impl Translator for AzureTranslator {
	fn request_body(
		&mut self,
		headers: &HeaderMap,
		body: &Bytes,
		_force_body_mutation: bool,
	) -> Result<RequestTransform, AIError> {
		// The inner translator handles parsing, validation and model virtualization. Azure
		// always mutates: either the model moves into the URL or the body is re-marshaled.
		let mut out = self.inner.request_body(headers, body, true)?;

		let path = self
			.provider
			.get_path_for_model(self.route, out.request_model.as_str());
		out.headers = out.headers.merge(route_to(path.as_str()));
		out.override_host = Some(self.provider.get_host());

		if self.provider.strips_model_from_body() {
			let current = out.body.resolve(body);
			let mut map: Map<String, Value> = parse_request(current)?;
			map.remove("model");
			out.body = BodyMutation::Replace(Bytes::from(
				serde_json::to_vec(&map).map_err(AIError::RequestMarshal)?,
			));
		}
		Ok(out)
	}

	fn response_body(
		&mut self,
		headers: &HeaderMap,
		chunk: &Bytes,
		end_of_stream: bool,
	) -> Result<ResponseTransform, AIError> {
		self.inner.response_body(headers, chunk, end_of_stream)
	}

	fn response_error(
		&mut self,
		headers: &HeaderMap,
		body: &Bytes,
	) -> Result<(HeaderMutation, BodyMutation), AIError> {
		self.inner.response_error(headers, body)
	}
}
