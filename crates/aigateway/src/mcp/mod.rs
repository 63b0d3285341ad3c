use aigw_core::prelude::*;
use rmcp::model::RequestId;
use thiserror::Error;

pub mod rbac;
pub mod relay;
pub mod session;
pub mod streamablehttp;
pub mod upstream;

pub use rbac::{Action, Authorization, AuthorizationRule, Decision};

/// JSON-RPC error code for a missing or expired session.
pub const SESSION_EXPIRED_CODE: i32 = -32001;

/// The default separator between the backend name and the tool name in client-visible tool
/// names. Route-configurable; every upstream tool T of backend B shows up as `B__T`.
pub const DEFAULT_TOOL_DELIMITER: &str = "__";

#[derive(Error, Debug)]
pub enum Error {
	#[error("method not allowed; must be GET, POST, or DELETE")]
	MethodNotAllowed,
	#[error("client must accept both application/json and text/event-stream")]
	InvalidAccept,
	#[error("client must send application/json")]
	InvalidContentType,
	#[error("fail to deserialize request body: {0}")]
	Deserialize(serde_json::Error),
	#[error("session header is required for non-initialize requests")]
	MissingSessionHeader,
	#[error("session not found")]
	UnknownSession,
	#[error("unknown tool name {0:?}")]
	UnknownToolName(String),
	#[error("upstream {0} failed: {1}")]
	Upstream(Strng, String),
	#[error("send error: {1}")]
	SendError(Option<RequestId>, String),
	// Intentionally does NOT say it is unauthorized; the tool's existence is hidden
	#[error("unknown {0}: {1}")]
	Authorization(String, String),
}

/// McpRoute is the per-route configuration of the multiplexer.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpRoute {
	pub targets: Vec<McpTargetConfig>,
	#[serde(default = "default_delimiter")]
	pub delimiter: Strng,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub authorization: Option<Authorization>,
}

fn default_delimiter() -> Strng {
	strng::new(DEFAULT_TOOL_DELIMITER)
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpTargetConfig {
	pub name: Strng,
	pub url: Strng,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub headers: Vec<(Strng, Strng)>,
}

/// MCPInfo carries the per-request facts the access log and metrics want.
#[derive(Debug, Default, Clone)]
pub struct MCPInfo {
	pub method_name: Option<String>,
	/// Tool name, etc
	pub resource_name: Option<String>,
	pub target_name: Option<String>,
	pub session_id: Option<String>,
}
