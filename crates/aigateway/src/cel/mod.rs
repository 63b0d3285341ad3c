// Portions of this code are heavily inspired from https://github.com/Kuadrant/wasm-shim/
// Under Apache 2.0 license (https://github.com/Kuadrant/wasm-shim/blob/main/LICENSE)

use std::collections::{BTreeMap, HashSet};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

pub use cel::Value;
use cel::{Context, ExecutionError, ParseError, ParseErrors, Program};
use serde::{Deserialize, Serialize, Serializer};

use crate::http::jwt::Claims;
use crate::http::{HeaderMap, Method};

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("execution: {0}")]
	Resolve(#[from] ExecutionError),
	#[error("parse: {0}")]
	Parse(#[from] ParseError),
	#[error("parse: {0}")]
	Parses(#[from] ParseErrors),
	#[error("variable: {0}")]
	Variable(String),
	#[error("failed to convert to json")]
	JsonConvert,
}

pub const REQUEST_ATTRIBUTE: &str = "request";

/// Expression is a compiled CEL program plus the root attributes it references.
pub struct Expression {
	attributes: HashSet<String>,
	expression: Program,
	original_expression: String,
}

impl Expression {
	pub fn new(expression: &str) -> Result<Self, Error> {
		let program = Program::compile(expression)?;
		let attributes = program
			.references()
			.variables()
			.into_iter()
			.map(|v| v.to_string())
			.collect();
		Ok(Expression {
			attributes,
			expression: program,
			original_expression: expression.to_string(),
		})
	}

	pub fn attributes(&self) -> &HashSet<String> {
		&self.attributes
	}
}

impl Serialize for Expression {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.original_expression)
	}
}

impl<'de> Deserialize<'de> for Expression {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		let e = String::deserialize(deserializer)?;
		// Local configs treat CEL as strict parsing
		Expression::new(&e).map_err(|e| serde::de::Error::custom(e.to_string()))
	}
}

impl Debug for Expression {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Expression")
			.field("expression", &self.original_expression)
			.finish()
	}
}

/// The `request` activation value. Headers are lowercased; `headers` carries first values
/// only, `headers_all` the full slices. `mcp.params` is JSON round-tripped so expressions see
/// the wire-tag names.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestContext {
	pub method: String,
	pub host: String,
	pub path: String,
	pub headers: BTreeMap<String, String>,
	pub headers_all: BTreeMap<String, Vec<String>>,
	pub auth: AuthContext,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub mcp: Option<McpContext>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AuthContext {
	pub jwt: JwtContext,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct JwtContext {
	pub claims: serde_json::Value,
	pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct McpContext {
	pub method: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub backend: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub tool: String,
	pub params: serde_json::Value,
}

impl RequestContext {
	pub fn build(method: &Method, host: &str, path: &str, headers: &HeaderMap) -> RequestContext {
		let mut first: BTreeMap<String, String> = BTreeMap::new();
		let mut all: BTreeMap<String, Vec<String>> = BTreeMap::new();
		for (name, value) in headers {
			let Ok(value) = value.to_str() else { continue };
			let name = name.as_str().to_ascii_lowercase();
			first
				.entry(name.clone())
				.or_insert_with(|| value.to_string());
			all.entry(name).or_default().push(value.to_string());
		}
		let auth = headers
			.get("authorization")
			.and_then(|_| Claims::from_headers(headers))
			.map(|claims| AuthContext {
				jwt: JwtContext {
					scopes: claims.scopes(),
					claims: claims.claims_value(),
				},
			})
			.unwrap_or_default();
		RequestContext {
			method: method.as_str().to_string(),
			host: host.to_string(),
			path: path.to_string(),
			headers: first,
			headers_all: all,
			auth,
			mcp: None,
		}
	}

	pub fn with_mcp(mut self, mcp: McpContext) -> Self {
		self.mcp = Some(mcp);
		self
	}
}

/// Executor evaluates expressions against a built activation. Evaluation is CPU-only.
pub struct Executor<'a> {
	context: Context<'a>,
}

impl Executor<'_> {
	pub fn new(request: &RequestContext) -> Result<Executor<'static>, Error> {
		let mut context = Context::default();
		context.add_variable_from_value(
			REQUEST_ATTRIBUTE,
			cel::to_value(request).map_err(|e| Error::Variable(e.to_string()))?,
		);
		Ok(Executor { context })
	}

	pub fn eval(&self, expr: &Expression) -> Result<Value, Error> {
		Ok(expr.expression.execute(&self.context)?)
	}

	/// eval_bool returns the boolean result; a non-boolean result or an execution error is
	/// None so policy layers can skip the rule.
	pub fn eval_bool(&self, expr: &Expression) -> Option<bool> {
		match self.eval(expr) {
			Ok(Value::Bool(b)) => Some(b),
			Ok(_) => None,
			Err(e) => {
				tracing::debug!("cel evaluation failed: {e}");
				None
			},
		}
	}
}

pub type ArcExpression = Arc<Expression>;

#[cfg(test)]
mod tests {
	use super::*;

	fn request_with(headers: Vec<(&'static str, &'static str)>) -> RequestContext {
		let mut hm = HeaderMap::new();
		for (k, v) in headers {
			hm.append(k, v.parse().unwrap());
		}
		RequestContext::build(&Method::POST, "gw.example.com", "/mcp", &hm)
	}

	#[test]
	fn request_fields_are_exposed() {
		let ctx = request_with(vec![("X-Team", "search")]);
		let exec = Executor::new(&ctx).unwrap();
		let expr = Expression::new(r#"request.method == "POST" && request.path == "/mcp""#).unwrap();
		assert_eq!(exec.eval_bool(&expr), Some(true));
		assert!(expr.attributes().contains("request"));
	}

	#[test]
	fn headers_are_lowercased_first_value_only() {
		let mut hm = HeaderMap::new();
		hm.append("X-Env", "prod".parse().unwrap());
		hm.append("X-Env", "canary".parse().unwrap());
		let ctx = RequestContext::build(&Method::GET, "h", "/", &hm);
		let exec = Executor::new(&ctx).unwrap();
		assert_eq!(
			exec.eval_bool(&Expression::new(r#"request.headers["x-env"] == "prod""#).unwrap()),
			Some(true)
		);
		assert_eq!(
			exec.eval_bool(
				&Expression::new(r#"request.headers_all["x-env"] == ["prod", "canary"]"#).unwrap()
			),
			Some(true)
		);
	}

	#[test]
	fn mcp_params_use_wire_names() {
		let ctx = request_with(vec![]).with_mcp(McpContext {
			method: "tools/call".to_string(),
			backend: "github".to_string(),
			tool: "create_issue".to_string(),
			params: serde_json::json!({"arguments": {"title": "bug"}}),
		});
		let exec = Executor::new(&ctx).unwrap();
		assert_eq!(
			exec.eval_bool(
				&Expression::new(
					r#"request.mcp.backend == "github" && request.mcp.params.arguments.title == "bug""#
				)
				.unwrap()
			),
			Some(true)
		);
	}

	#[test]
	fn non_boolean_results_are_skipped() {
		let ctx = request_with(vec![]);
		let exec = Executor::new(&ctx).unwrap();
		assert_eq!(
			exec.eval_bool(&Expression::new("request.path").unwrap()),
			None
		);
		// Unknown attributes error at evaluation, not at compile time
		assert_eq!(
			exec.eval_bool(&Expression::new("response.code == 200").unwrap()),
			None
		);
	}

	#[test]
	fn bad_expressions_fail_to_compile() {
		assert!(Expression::new("request.path ==").is_err());
	}
}
