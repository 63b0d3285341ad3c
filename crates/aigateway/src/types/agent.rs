use aigw_core::prelude::*;
use serde::{Deserialize, Serialize};

/// SchemaName identifies a wire format. The schema of a request's source and target surfaces
/// determines which translator pair applies.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaName {
	#[serde(rename = "OpenAI")]
	OpenAI,
	#[serde(rename = "AzureOpenAI")]
	AzureOpenAI,
	#[serde(rename = "AWSBedrock")]
	AWSBedrock,
	#[serde(rename = "GCPVertexAI")]
	GCPVertexAI,
	#[serde(rename = "GCPAnthropic")]
	GCPAnthropic,
	#[serde(rename = "Anthropic")]
	Anthropic,
	#[serde(rename = "Cohere")]
	Cohere,
	#[serde(rename = "MCP")]
	MCP,
}

/// Schema is a tagged wire-format identity, e.g. `AzureOpenAI` at API version `2024-02-01`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
	pub name: SchemaName,
	#[serde(default, skip_serializing_if = "Strng::is_empty")]
	pub version: Strng,
}

impl Schema {
	pub fn new(name: SchemaName) -> Self {
		Schema {
			name,
			version: Strng::default(),
		}
	}

	pub fn with_version(name: SchemaName, version: Strng) -> Self {
		Schema { name, version }
	}
}

impl SchemaName {
	/// The `gen_ai.provider.name` label derived from the backend schema.
	pub fn default_provider_label(&self) -> Strng {
		match self {
			SchemaName::OpenAI => strng::literal!("openai"),
			SchemaName::AzureOpenAI => strng::literal!("azure.openai"),
			SchemaName::AWSBedrock => strng::literal!("aws.bedrock"),
			SchemaName::GCPVertexAI => strng::literal!("gcp.vertex_ai"),
			SchemaName::GCPAnthropic => strng::literal!("gcp.anthropic"),
			SchemaName::Anthropic => strng::literal!("anthropic"),
			SchemaName::Cohere => strng::literal!("cohere"),
			SchemaName::MCP => strng::literal!("mcp"),
		}
	}
}

/// How the gateway authenticates to the upstream backend. Credential material itself is
/// provisioned by the host; this only selects the mechanism and header shaping.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BackendAuthMethod {
	/// Forward the client's Authorization header untouched.
	#[default]
	Passthrough,
	/// Static API key placed in the provider's expected header.
	ApiKey,
	/// AWS SigV4 request signing (applied by the host proxy).
	AwsSigV4,
	/// GCP access token attached by the host proxy.
	GcpToken,
}

/// Backend is a named upstream endpoint: the record handed back by the selector collaborator.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backend {
	pub name: Strng,
	pub schema: Schema,
	/// Extra headers to attach to every upstream request.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub headers: Vec<(Strng, Strng)>,
	#[serde(default)]
	pub auth: BackendAuthMethod,
	pub host: Strng,
	pub port: u16,
	#[serde(default)]
	pub tls: bool,
}

impl Backend {
	pub fn authority(&self) -> Strng {
		match (self.tls, self.port) {
			(true, 443) | (false, 80) => self.host.clone(),
			_ => strng::format!("{}:{}", self.host, self.port),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn schema_name_round_trips_wire_tags() {
		for (name, tag) in [
			(SchemaName::OpenAI, "\"OpenAI\""),
			(SchemaName::AWSBedrock, "\"AWSBedrock\""),
			(SchemaName::GCPVertexAI, "\"GCPVertexAI\""),
			(SchemaName::GCPAnthropic, "\"GCPAnthropic\""),
		] {
			assert_eq!(serde_json::to_string(&name).unwrap(), tag);
			assert_eq!(serde_json::from_str::<SchemaName>(tag).unwrap(), name);
		}
	}

	#[test]
	fn authority_elides_default_ports() {
		let mut b = Backend {
			name: strng::literal!("openai"),
			schema: Schema::new(SchemaName::OpenAI),
			headers: vec![],
			auth: Default::default(),
			host: strng::literal!("api.openai.com"),
			port: 443,
			tls: true,
		};
		assert_eq!(b.authority(), "api.openai.com");
		b.port = 8443;
		assert_eq!(b.authority(), "api.openai.com:8443");
	}
}
