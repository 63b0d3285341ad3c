use std::sync::Arc;

use aigw_core::prelude::*;
use bytes::Bytes;
use futures_util::StreamExt;
use rmcp::model::{
	ClientJsonRpcMessage, ClientRequest, InitializeResult, ProtocolVersion, RequestId,
	ServerCapabilities, ServerJsonRpcMessage,
};
use serde_json::json;
use tokio_stream::wrappers::ReceiverStream;

use crate::cel::{McpContext, RequestContext};
use crate::http::jwt::Claims;
use crate::http::{Body, Method, Request, Response, StatusCode, header_str};
use crate::mcp::relay::Relay;
use crate::mcp::session::{Session, SessionManager};
use crate::mcp::upstream::MCP_SESSION_HEADER;
use crate::mcp::{Error, MCPInfo, McpRoute, SESSION_EXPIRED_CODE};
use crate::telemetry::log::AsyncLog;

const JSON_MIME_TYPE: &str = "application/json";
const EVENT_STREAM_MIME_TYPE: &str = "text/event-stream";

/// App exposes one logical MCP endpoint multiplexing the route's upstream servers.
#[derive(Debug, Clone)]
pub struct App {
	route: Arc<McpRoute>,
	relay: Relay,
	sessions: Arc<SessionManager>,
}

impl App {
	pub fn new(route: McpRoute) -> Self {
		let relay = Relay::new(route.targets.clone(), route.delimiter.clone());
		App {
			route: Arc::new(route),
			relay,
			sessions: Arc::new(SessionManager::new()),
		}
	}

	pub fn sessions(&self) -> &Arc<SessionManager> {
		&self.sessions
	}

	/// handle serves one HTTP exchange on the MCP endpoint.
	pub async fn handle(&self, req: Request, log: AsyncLog<MCPInfo>) -> Response {
		log.store(Some(MCPInfo::default()));
		let method = req.method().clone();
		if method == Method::POST {
			self.handle_post(req, log).await
		} else if method == Method::GET {
			self.handle_get(req, log).await
		} else if method == Method::DELETE {
			self.handle_delete(req, log).await
		} else {
			error_response(
				StatusCode::METHOD_NOT_ALLOWED,
				None,
				rmcp::model::ErrorCode::INVALID_REQUEST.0,
				&Error::MethodNotAllowed.to_string(),
				None,
			)
		}
	}

	async fn handle_post(&self, req: Request, log: AsyncLog<MCPInfo>) -> Response {
		if !header_str(req.headers(), "content-type")
			.map(|ct| ct.starts_with(JSON_MIME_TYPE))
			.unwrap_or(false)
		{
			return error_response(
				StatusCode::UNSUPPORTED_MEDIA_TYPE,
				None,
				rmcp::model::ErrorCode::INVALID_REQUEST.0,
				&Error::InvalidContentType.to_string(),
				None,
			);
		}
		let (parts, body) = req.into_parts();
		let Ok(bytes) = axum::body::to_bytes(body, crate::http::BODY_BUFFER_LIMIT).await else {
			return error_response(
				StatusCode::PAYLOAD_TOO_LARGE,
				None,
				rmcp::model::ErrorCode::INVALID_REQUEST.0,
				"request too large",
				None,
			);
		};
		let message: ClientJsonRpcMessage = match serde_json::from_slice(&bytes) {
			Ok(m) => m,
			Err(e) => {
				return error_response(
					StatusCode::BAD_REQUEST,
					None,
					rmcp::model::ErrorCode::PARSE_ERROR.0,
					&Error::Deserialize(e).to_string(),
					None,
				);
			},
		};

		match message {
			ClientJsonRpcMessage::Request(r) => {
				let method = r.request.method().to_string();
				log.non_atomic_mutate(|l| l.method_name = Some(method.clone()));
				if let ClientRequest::InitializeRequest(ir) = &r.request {
					let protocol_version = ir.params.protocol_version.clone();
					return self
						.initialize(&parts, r.id.clone(), protocol_version, log)
						.await;
				}

				// Session affinity: everything after initialize is pinned by the session id.
				let Some(session_id) = header_str(&parts.headers, MCP_SESSION_HEADER) else {
					return error_response(
						StatusCode::BAD_REQUEST,
						Some(r.id.clone()),
						SESSION_EXPIRED_CODE,
						&Error::MissingSessionHeader.to_string(),
						None,
					);
				};
				let Some(session) = self.sessions.get_session(session_id) else {
					return error_response(
						StatusCode::NOT_FOUND,
						Some(r.id.clone()),
						SESSION_EXPIRED_CODE,
						&Error::UnknownSession.to_string(),
						None,
					);
				};
				log.non_atomic_mutate(|l| l.session_id = Some(session.id.to_string()));
				session.begin_request(&r.id, &method);
				let id = r.id.clone();

				let response = match &r.request {
					ClientRequest::ListToolsRequest(_) => {
						let forwarded = ClientJsonRpcMessage::Request(r.clone());
						self.list_tools(&parts, &session, &id, &forwarded).await
					},
					ClientRequest::CallToolRequest(ctr) => {
						let name = ctr.params.name.to_string();
						log.non_atomic_mutate(|l| l.resource_name = Some(name.clone()));
						match self.relay.parse_resource_name(&name) {
							Ok((backend, tool)) => {
								let backend = backend.to_string();
								let tool = tool.to_string();
								log.non_atomic_mutate(|l| l.target_name = Some(backend.clone()));
								match self.authorize(&parts, &backend, &tool, ctr) {
									crate::mcp::Decision::Allow => {
										// Un-mangle the tool name before dispatching upstream
										let mut forwarded = r.clone();
										if let ClientRequest::CallToolRequest(c) = &mut forwarded.request {
											c.params.name = tool.clone().into();
										}
										let forwarded = ClientJsonRpcMessage::Request(forwarded);
										self
											.forward_single(&session, &backend, &id, &forwarded)
											.await
									},
									crate::mcp::Decision::Deny { challenge } => error_response(
										StatusCode::FORBIDDEN,
										Some(id.clone()),
										rmcp::model::ErrorCode::INVALID_REQUEST.0,
										// Hide the tool's existence from unauthorized callers
										&Error::Authorization("tool".to_string(), name.clone()).to_string(),
										challenge.as_deref(),
									),
								}
							},
							Err(e) => error_response(
								StatusCode::NOT_FOUND,
								Some(id.clone()),
								rmcp::model::ErrorCode::METHOD_NOT_FOUND.0,
								&e.to_string(),
								None,
							),
						}
					},
					ClientRequest::PingRequest(_) => result_response(&id, json!({}), None),
					_ => {
						// Other requests forward only when exactly one upstream exists;
						// multiplexed fan-in has no stable id mapping for them.
						if self.relay.targets().len() != 1 {
							error_response(
								StatusCode::NOT_IMPLEMENTED,
								Some(id.clone()),
								rmcp::model::ErrorCode::METHOD_NOT_FOUND.0,
								&format!("method {method:?} is not supported with multiple upstreams"),
								None,
							)
						} else {
							let backend = self.relay.targets()[0].name.to_string();
							let forwarded = ClientJsonRpcMessage::Request(r.clone());
							self
								.forward_single(&session, &backend, &id, &forwarded)
								.await
						}
					},
				};
				session.finish_request(&id);
				response
			},
			ClientJsonRpcMessage::Notification(_) => {
				let Some(session_id) = header_str(&parts.headers, MCP_SESSION_HEADER) else {
					return accepted();
				};
				if let Some(session) = self.sessions.get_session(session_id) {
					log.non_atomic_mutate(|l| l.session_id = Some(session.id.to_string()));
					self.relay.fanout_notification(&session, &message).await;
				}
				accepted()
			},
			_ => error_response(
				StatusCode::BAD_REQUEST,
				None,
				rmcp::model::ErrorCode::INVALID_REQUEST.0,
				"unsupported message type",
				None,
			),
		}
	}

	async fn initialize(
		&self,
		_parts: &::http::request::Parts,
		id: RequestId,
		protocol_version: ProtocolVersion,
		log: AsyncLog<MCPInfo>,
	) -> Response {
		let session = self.sessions.create_session();
		log.non_atomic_mutate(|l| l.session_id = Some(session.id.to_string()));
		let init_request = rmcp::model::InitializeRequest::new(client_info(protocol_version.clone()));
		let init = ClientJsonRpcMessage::request(init_request.into(), id.clone());
		if let Err(e) = self.relay.fanout_initialize(&session, &init).await {
			self.sessions.remove(&session.id);
			return error_response(
				StatusCode::BAD_GATEWAY,
				Some(id),
				rmcp::model::ErrorCode::INTERNAL_ERROR.0,
				&e.to_string(),
				None,
			);
		}

		let mut result = InitializeResult::new(
			ServerCapabilities::builder()
				.enable_tools_with(rmcp::model::ToolsCapability {
					list_changed: Some(true),
				})
				.build(),
		);
		result.protocol_version = protocol_version;
		result.server_info = rmcp::model::Implementation::new(
			"aigateway",
			aigw_core::version::BuildInfo::new().version.to_string(),
		);
		result_response(
			&id,
			serde_json::to_value(result).unwrap_or_default(),
			Some(session.id.as_ref()),
		)
	}

	async fn list_tools(
		&self,
		parts: &::http::request::Parts,
		session: &Arc<Session>,
		id: &RequestId,
		message: &ClientJsonRpcMessage,
	) -> Response {
		let mut merged = self.relay.fanout_list_tools(session, message).await;
		// Authorization also prunes the listing so callers only discover what they may call
		if let Some(authz) = &self.route.authorization {
			let claims = Claims::from_headers(&parts.headers);
			let ctx = request_context(parts, None);
			merged.tools.retain(|tool| {
				let Some((backend, original)) = session.resolve_tool(tool.name.as_ref()) else {
					return false;
				};
				authz
					.evaluate_call(backend.as_str(), &original, claims.as_ref(), &ctx)
					.allowed()
			});
		}
		result_response(
			id,
			serde_json::to_value(merged).unwrap_or_default(),
			None,
		)
	}

	fn authorize(
		&self,
		parts: &::http::request::Parts,
		backend: &str,
		tool: &str,
		ctr: &rmcp::model::CallToolRequest,
	) -> crate::mcp::Decision {
		let Some(authz) = &self.route.authorization else {
			return crate::mcp::Decision::Allow;
		};
		let claims = Claims::from_headers(&parts.headers);
		// Params are JSON round-tripped so expressions see the wire names
		let params = serde_json::to_value(&ctr.params).unwrap_or_default();
		let ctx = request_context(
			parts,
			Some(McpContext {
				method: "tools/call".to_string(),
				backend: backend.to_string(),
				tool: tool.to_string(),
				params,
			}),
		);
		authz.evaluate_call(backend, tool, claims.as_ref(), &ctx)
	}

	async fn forward_single(
		&self,
		session: &Arc<Session>,
		backend: &str,
		id: &RequestId,
		message: &ClientJsonRpcMessage,
	) -> Response {
		match self.relay.send_single(session, backend, message).await {
			Ok(messages) => {
				// The response to our request is the last message; any notifications ahead of
				// it are forwarded on the same stream.
				sse_or_json(messages, id)
			},
			Err(e) => error_response(
				StatusCode::BAD_GATEWAY,
				Some(id.clone()),
				rmcp::model::ErrorCode::INTERNAL_ERROR.0,
				&Error::SendError(Some(id.clone()), e.to_string()).to_string(),
				None,
			),
		}
	}

	/// handle_get establishes the server-push stream: upstream `notifications/tools/list_changed`
	/// (and friends) from every subscribed upstream are aggregated onto one SSE stream.
	async fn handle_get(&self, req: Request, log: AsyncLog<MCPInfo>) -> Response {
		let Some(session_id) = header_str(req.headers(), MCP_SESSION_HEADER) else {
			return error_response(
				StatusCode::BAD_REQUEST,
				None,
				SESSION_EXPIRED_CODE,
				&Error::MissingSessionHeader.to_string(),
				None,
			);
		};
		let Some(session) = self.sessions.get_session(session_id) else {
			return error_response(
				StatusCode::NOT_FOUND,
				None,
				SESSION_EXPIRED_CODE,
				&Error::UnknownSession.to_string(),
				None,
			);
		};
		log.non_atomic_mutate(|l| l.session_id = Some(session.id.to_string()));

		let (tx, rx) = tokio::sync::mpsc::channel::<(Strng, ServerJsonRpcMessage)>(64);
		for target in self.relay.targets() {
			let client = self.relay.client().clone();
			let target = target.clone();
			let sid = session.upstream_session(target.name.as_str());
			let tx = tx.clone();
			tokio::spawn(async move {
				if let Err(e) = client.get_stream(target, sid, tx).await {
					tracing::debug!("upstream stream closed: {e}");
				}
			});
		}
		drop(tx);

		let stream = ReceiverStream::new(rx).map(|(_backend, message)| {
			Ok::<Bytes, std::convert::Infallible>(
				crate::parse::sse::encode_json_event("message", &message)
					.unwrap_or_else(|| Bytes::from_static(b": skip\n\n")),
			)
		});
		::http::Response::builder()
			.status(StatusCode::OK)
			.header("content-type", EVENT_STREAM_MIME_TYPE)
			.header("cache-control", "no-cache")
			.body(Body::from_stream(stream))
			.unwrap_or_else(|_| internal_error())
	}

	async fn handle_delete(&self, req: Request, log: AsyncLog<MCPInfo>) -> Response {
		let Some(session_id) = header_str(req.headers(), MCP_SESSION_HEADER) else {
			return error_response(
				StatusCode::BAD_REQUEST,
				None,
				SESSION_EXPIRED_CODE,
				&Error::MissingSessionHeader.to_string(),
				None,
			);
		};
		if let Some(session) = self.sessions.remove(session_id) {
			log.non_atomic_mutate(|l| l.session_id = Some(session.id.to_string()));
			self.relay.fanout_delete(&session).await;
		}
		accepted()
	}
}

fn client_info(protocol_version: ProtocolVersion) -> rmcp::model::ClientInfo {
	rmcp::model::ClientInfo::new(
		rmcp::model::ClientCapabilities::default(),
		rmcp::model::Implementation::new(
			"aigateway",
			aigw_core::version::BuildInfo::new().version.to_string(),
		),
	)
	.with_protocol_version(protocol_version)
}

fn request_context(
	parts: &::http::request::Parts,
	mcp: Option<McpContext>,
) -> RequestContext {
	let host = parts
		.uri
		.authority()
		.map(|a| a.to_string())
		.or_else(|| header_str(&parts.headers, "host").map(|h| h.to_string()))
		.unwrap_or_default();
	let ctx = RequestContext::build(&parts.method, &host, parts.uri.path(), &parts.headers);
	match mcp {
		Some(m) => ctx.with_mcp(m),
		None => ctx,
	}
}

fn json_body_response(status: StatusCode, body: serde_json::Value, session: Option<&str>) -> Response {
	let mut builder = ::http::Response::builder()
		.status(status)
		.header("content-type", JSON_MIME_TYPE);
	if let Some(session) = session {
		builder = builder.header(MCP_SESSION_HEADER, session);
	}
	builder
		.body(Body::from(
			serde_json::to_vec(&body).unwrap_or_default(),
		))
		.unwrap_or_else(|_| internal_error())
}

fn result_response(id: &RequestId, result: serde_json::Value, session: Option<&str>) -> Response {
	json_body_response(
		StatusCode::OK,
		json!({"jsonrpc": "2.0", "id": id, "result": result}),
		session,
	)
}

fn error_response(
	status: StatusCode,
	id: Option<RequestId>,
	code: i32,
	message: &str,
	www_authenticate: Option<&str>,
) -> Response {
	let body = json!({
		"jsonrpc": "2.0",
		"id": id,
		"error": {"code": code, "message": message}
	});
	let mut builder = ::http::Response::builder()
		.status(status)
		.header("content-type", JSON_MIME_TYPE);
	if let Some(value) = www_authenticate {
		builder = builder.header("www-authenticate", value);
	}
	builder
		.body(Body::from(serde_json::to_vec(&body).unwrap_or_default()))
		.unwrap_or_else(|_| internal_error())
}

fn accepted() -> Response {
	::http::Response::builder()
		.status(StatusCode::ACCEPTED)
		.body(Body::empty())
		.unwrap_or_else(|_| internal_error())
}

fn internal_error() -> Response {
	let mut resp = Response::new(Body::empty());
	*resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
	resp
}

/// sse_or_json renders an upstream's reply: a single response message as JSON, anything more
/// as an SSE stream preserving arrival order.
fn sse_or_json(messages: Vec<ServerJsonRpcMessage>, id: &RequestId) -> Response {
	match messages.len() {
		0 => error_response(
			StatusCode::BAD_GATEWAY,
			Some(id.clone()),
			rmcp::model::ErrorCode::INTERNAL_ERROR.0,
			"upstream returned no response",
			None,
		),
		1 => json_body_response(
			StatusCode::OK,
			serde_json::to_value(&messages[0]).unwrap_or_default(),
			None,
		),
		_ => {
			let mut body = bytes::BytesMut::new();
			for message in &messages {
				if let Some(frame) = crate::parse::sse::encode_json_event("message", message) {
					body.extend_from_slice(&frame);
				}
			}
			::http::Response::builder()
				.status(StatusCode::OK)
				.header("content-type", EVENT_STREAM_MIME_TYPE)
				.body(Body::from(body.freeze()))
				.unwrap_or_else(|_| internal_error())
		},
	}
}

#[cfg(test)]
#[path = "streamablehttp_tests.rs"]
mod tests;
