use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::json;

use super::*;
use crate::mcp::rbac::{Action, Authorization, AuthorizationRule, JwtSource, RuleSource, ToolTarget};
use crate::mcp::{DEFAULT_TOOL_DELIMITER, McpTargetConfig};

fn route(targets: Vec<&str>, authorization: Option<Authorization>) -> McpRoute {
	McpRoute {
		targets: targets
			.into_iter()
			.map(|n| McpTargetConfig {
				name: strng::new(n),
				url: strng::format!("http://{n}.invalid/mcp"),
				headers: vec![],
			})
			.collect(),
		delimiter: strng::new(DEFAULT_TOOL_DELIMITER),
		authorization,
	}
}

fn post(body: serde_json::Value, session: Option<&str>, bearer: Option<&str>) -> Request {
	let mut builder = ::http::Request::builder()
		.method(Method::POST)
		.uri("http://gw.example.com/mcp")
		.header("content-type", "application/json")
		.header("accept", "application/json, text/event-stream");
	if let Some(s) = session {
		builder = builder.header(MCP_SESSION_HEADER, s);
	}
	if let Some(token) = bearer {
		builder = builder.header("authorization", format!("Bearer {token}"));
	}
	builder
		.body(Body::from(serde_json::to_vec(&body).unwrap()))
		.unwrap()
}

async fn body_json(resp: Response) -> serde_json::Value {
	let bytes = axum::body::to_bytes(resp.into_body(), 1 << 20).await.unwrap();
	serde_json::from_slice(&bytes).unwrap()
}

fn token(payload: serde_json::Value) -> String {
	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
	let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
	format!("{header}.{body}.sig")
}

#[tokio::test]
async fn initialize_establishes_a_session() {
	let app = App::new(route(vec![], None));
	let req = post(
		json!({
			"jsonrpc": "2.0", "id": 1, "method": "initialize",
			"params": {
				"protocolVersion": "2025-06-18",
				"capabilities": {},
				"clientInfo": {"name": "test", "version": "0"}
			}
		}),
		None,
		None,
	);
	let resp = app.handle(req, AsyncLog::default()).await;
	assert_eq!(resp.status(), StatusCode::OK);
	let session = resp
		.headers()
		.get(MCP_SESSION_HEADER)
		.and_then(|v| v.to_str().ok())
		.map(|s| s.to_string())
		.expect("session header");
	assert!(app.sessions().get_session(&session).is_some());
	let v = body_json(resp).await;
	assert_eq!(v["result"]["serverInfo"]["name"], "aigateway");
	assert_eq!(v["result"]["capabilities"]["tools"]["listChanged"], true);
}

#[tokio::test]
async fn non_initialize_without_session_is_rejected() {
	let app = App::new(route(vec![], None));
	let req = post(
		json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
		None,
		None,
	);
	let resp = app.handle(req, AsyncLog::default()).await;
	assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
	let v = body_json(resp).await;
	assert_eq!(v["error"]["code"], SESSION_EXPIRED_CODE);
}

#[tokio::test]
async fn expired_session_yields_32001() {
	let app = App::new(route(vec![], None));
	let req = post(
		json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
		Some("no-such-session"),
		None,
	);
	let resp = app.handle(req, AsyncLog::default()).await;
	assert_eq!(resp.status(), StatusCode::NOT_FOUND);
	let v = body_json(resp).await;
	assert_eq!(v["error"]["code"], SESSION_EXPIRED_CODE);
	assert_eq!(v["id"], 2);
}

#[tokio::test]
async fn ping_answers_locally() {
	let app = App::new(route(vec![], None));
	let session = app.sessions().get_or_create("s1");
	let req = post(
		json!({"jsonrpc": "2.0", "id": 3, "method": "ping"}),
		Some(&session.id),
		None,
	);
	let resp = app.handle(req, AsyncLog::default()).await;
	assert_eq!(resp.status(), StatusCode::OK);
	let v = body_json(resp).await;
	assert_eq!(v["result"], json!({}));
}

#[tokio::test]
async fn unknown_tool_prefix_is_not_found() {
	let app = App::new(route(vec!["github", "jira"], None));
	let session = app.sessions().get_or_create("s1");
	let req = post(
		json!({
			"jsonrpc": "2.0", "id": 4, "method": "tools/call",
			"params": {"name": "gitlab__create_issue", "arguments": {}}
		}),
		Some(&session.id),
		None,
	);
	let resp = app.handle(req, AsyncLog::default()).await;
	assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_scope_is_denied_with_challenge() {
	let authz = Authorization {
		resource_metadata_url: Some(strng::literal!("https://gw/.well-known/oauth-protected-resource")),
		default_action: Action::Deny,
		rules: vec![AuthorizationRule {
			source: Some(RuleSource {
				jwt: Some(JwtSource {
					claims: Default::default(),
					scopes: vec!["issues:write".to_string()],
				}),
			}),
			target: vec![ToolTarget {
				backend: strng::literal!("github"),
				tool: strng::literal!("create_issue"),
			}],
			expression: None,
			action: Action::Allow,
		}],
	};
	let app = App::new(route(vec!["github", "jira"], Some(authz)));
	let session = app.sessions().get_or_create("s1");
	let req = post(
		json!({
			"jsonrpc": "2.0", "id": 5, "method": "tools/call",
			"params": {"name": "github__create_issue", "arguments": {"title": "bug"}}
		}),
		Some(&session.id),
		Some(&token(json!({"scope": "repo:read"}))),
	);
	let resp = app.handle(req, AsyncLog::default()).await;
	assert_eq!(resp.status(), StatusCode::FORBIDDEN);
	let challenge = resp
		.headers()
		.get("www-authenticate")
		.and_then(|v| v.to_str().ok())
		.unwrap()
		.to_string();
	assert_eq!(
		challenge,
		"Bearer error=\"insufficient_scope\", scope=\"issues:write\", resource_metadata=\"https://gw/.well-known/oauth-protected-resource\""
	);
	// The body hides the tool's existence
	let v = body_json(resp).await;
	assert!(
		v["error"]["message"].as_str().unwrap().contains("unknown tool"),
		"{v}"
	);
}

#[tokio::test]
async fn wrong_content_type_is_rejected() {
	let app = App::new(route(vec![], None));
	let req = ::http::Request::builder()
		.method(Method::POST)
		.uri("http://gw.example.com/mcp")
		.header("content-type", "text/plain")
		.body(Body::from("hi"))
		.unwrap();
	let resp = app.handle(req, AsyncLog::default()).await;
	assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn delete_removes_the_session() {
	let app = App::new(route(vec![], None));
	let session = app.sessions().get_or_create("to-delete");
	let req = ::http::Request::builder()
		.method(Method::DELETE)
		.uri("http://gw.example.com/mcp")
		.header(MCP_SESSION_HEADER, session.id.as_ref())
		.body(Body::empty())
		.unwrap();
	let resp = app.handle(req, AsyncLog::default()).await;
	assert_eq!(resp.status(), StatusCode::ACCEPTED);
	assert!(app.sessions().get_session("to-delete").is_none());
}
