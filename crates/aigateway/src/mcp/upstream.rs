use aigw_core::prelude::*;
use futures_util::StreamExt;
use rmcp::model::{ClientJsonRpcMessage, ServerJsonRpcMessage};

use crate::mcp::{Error, McpTargetConfig};
use crate::parse;

pub const MCP_SESSION_HEADER: &str = "mcp-session-id";
const JSON_MIME_TYPE: &str = "application/json";
const EVENT_STREAM_MIME_TYPE: &str = "text/event-stream";

/// What one upstream returned for one posted message: zero or more notifications followed by
/// the response, plus the session id the upstream assigned (initialize only).
#[derive(Debug, Default)]
pub struct UpstreamResponse {
	pub messages: Vec<ServerJsonRpcMessage>,
	pub session_id: Option<String>,
}

/// UpstreamClient speaks streamable HTTP to one or more upstream MCP servers.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
	client: reqwest::Client,
}

impl Default for UpstreamClient {
	fn default() -> Self {
		Self::new()
	}
}

impl UpstreamClient {
	pub fn new() -> Self {
		UpstreamClient {
			client: reqwest::Client::new(),
		}
	}

	/// send posts one JSON-RPC message. The upstream may answer with a bare JSON message, an
	/// SSE stream of messages, or 202 Accepted (notifications).
	pub async fn send(
		&self,
		target: &McpTargetConfig,
		session_id: Option<&str>,
		message: &ClientJsonRpcMessage,
	) -> Result<UpstreamResponse, Error> {
		let mut req = self
			.client
			.post(target.url.as_str())
			.header("accept", format!("{JSON_MIME_TYPE}, {EVENT_STREAM_MIME_TYPE}"))
			.json(message);
		if let Some(id) = session_id {
			req = req.header(MCP_SESSION_HEADER, id);
		}
		for (name, value) in &target.headers {
			req = req.header(name.as_str(), value.as_str());
		}
		let resp = req
			.send()
			.await
			.map_err(|e| Error::Upstream(target.name.clone(), e.to_string()))?;

		if !resp.status().is_success() {
			return Err(Error::Upstream(
				target.name.clone(),
				format!("status {}", resp.status()),
			));
		}
		let session_id = resp
			.headers()
			.get(MCP_SESSION_HEADER)
			.and_then(|v| v.to_str().ok())
			.map(|s| s.to_string());

		let content_type = resp
			.headers()
			.get("content-type")
			.and_then(|v| v.to_str().ok())
			.unwrap_or_default()
			.to_string();

		let mut out = UpstreamResponse {
			messages: vec![],
			session_id,
		};
		if resp.status().as_u16() == 202 || content_type.is_empty() {
			return Ok(out);
		}
		if content_type.starts_with(JSON_MIME_TYPE) {
			let message = resp
				.json::<ServerJsonRpcMessage>()
				.await
				.map_err(|e| Error::Upstream(target.name.clone(), e.to_string()))?;
			out.messages.push(message);
			return Ok(out);
		}
		if content_type.starts_with(EVENT_STREAM_MIME_TYPE) {
			let mut parser = parse::sse::Parser::new();
			let mut body = resp.bytes_stream();
			while let Some(chunk) = body.next().await {
				let chunk = chunk.map_err(|e| Error::Upstream(target.name.clone(), e.to_string()))?;
				for ev in parser.push(&chunk) {
					if let Ok(msg) = serde_json::from_str::<ServerJsonRpcMessage>(&ev.data) {
						out.messages.push(msg);
					}
				}
			}
			if let Some(tail) = parser.flush()
				&& let Ok(msg) = serde_json::from_str::<ServerJsonRpcMessage>(&tail.data)
			{
				out.messages.push(msg);
			}
			return Ok(out);
		}
		Err(Error::Upstream(
			target.name.clone(),
			format!("unexpected content-type {content_type:?}"),
		))
	}

	/// get_stream opens the upstream's server-push stream and forwards its messages (e.g.
	/// `notifications/tools/list_changed`) to the given channel until it closes.
	pub async fn get_stream(
		&self,
		target: McpTargetConfig,
		session_id: Option<String>,
		tx: tokio::sync::mpsc::Sender<(Strng, ServerJsonRpcMessage)>,
	) -> Result<(), Error> {
		let mut req = self
			.client
			.get(target.url.as_str())
			.header("accept", EVENT_STREAM_MIME_TYPE);
		if let Some(id) = &session_id {
			req = req.header(MCP_SESSION_HEADER, id);
		}
		for (name, value) in &target.headers {
			req = req.header(name.as_str(), value.as_str());
		}
		let resp = req
			.send()
			.await
			.map_err(|e| Error::Upstream(target.name.clone(), e.to_string()))?;
		if !resp.status().is_success() {
			return Err(Error::Upstream(
				target.name.clone(),
				format!("status {}", resp.status()),
			));
		}
		let mut parser = parse::sse::Parser::new();
		let mut body = resp.bytes_stream();
		while let Some(chunk) = body.next().await {
			let chunk = chunk.map_err(|e| Error::Upstream(target.name.clone(), e.to_string()))?;
			for ev in parser.push(&chunk) {
				if let Ok(msg) = serde_json::from_str::<ServerJsonRpcMessage>(&ev.data)
					&& tx.send((target.name.clone(), msg)).await.is_err()
				{
					// Client went away
					return Ok(());
				}
			}
		}
		Ok(())
	}

	/// delete_session tells one upstream to drop its session.
	pub async fn delete_session(&self, target: &McpTargetConfig, session_id: &str) {
		let mut req = self.client.delete(target.url.as_str());
		req = req.header(MCP_SESSION_HEADER, session_id);
		for (name, value) in &target.headers {
			req = req.header(name.as_str(), value.as_str());
		}
		// Best effort; some servers do not implement DELETE
		if let Err(e) = req.send().await {
			tracing::debug!("failed to delete upstream session on {}: {e}", target.name);
		}
	}
}
