use std::collections::HashMap;
use std::sync::Arc;

use aigw_core::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cel::{Executor, Expression, RequestContext};
use crate::http::jwt::Claims;

/// Authorization is a route's tool-access policy: ordered rules evaluated against the request
/// context, falling back to the default action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub resource_metadata_url: Option<Strng>,
	#[serde(default)]
	pub default_action: Action,
	#[serde(default)]
	pub rules: Vec<AuthorizationRule>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
	Allow,
	#[default]
	Deny,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRule {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub source: Option<RuleSource>,
	/// When non-empty, the rule only applies to these (backend, tool) pairs.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub target: Vec<ToolTarget>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expression: Option<Arc<Expression>>,
	pub action: Action,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSource {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub jwt: Option<JwtSource>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtSource {
	/// Claims that must all be present with the given values.
	#[serde(default, skip_serializing_if = "HashMap::is_empty")]
	pub claims: HashMap<String, String>,
	/// Scopes the token must cover.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub scopes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolTarget {
	pub backend: Strng,
	pub tool: Strng,
}

/// Decision is the outcome of evaluating a route's policy for one tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
	Allow,
	Deny {
		/// The WWW-Authenticate challenge to attach, when an allow rule failed only on scope
		/// coverage.
		challenge: Option<String>,
	},
}

impl Decision {
	pub fn allowed(&self) -> bool {
		matches!(self, Decision::Allow)
	}
}

impl Authorization {
	/// evaluate walks the rules in order. Per rule: a failing or non-boolean CEL expression
	/// skips it; a target mismatch skips it; unsatisfied claims skip it; satisfied scopes (or
	/// none required) return its action. An allow rule that failed only scope coverage feeds
	/// the challenge emitted if the default action denies.
	pub fn evaluate(
		&self,
		backend: &str,
		tool: &str,
		claims: Option<&Claims>,
		exec: Option<&Executor>,
	) -> Decision {
		let token_scopes = claims.map(|c| c.scopes()).unwrap_or_default();
		// The smallest scope set an allow rule would have accepted
		let mut challenge_scopes: Option<Vec<String>> = None;

		for rule in &self.rules {
			if let Some(expr) = &rule.expression {
				let verdict = exec.and_then(|e| e.eval_bool(expr));
				if verdict != Some(true) {
					continue;
				}
			}
			if !rule.target.is_empty()
				&& !rule
					.target
					.iter()
					.any(|t| t.backend.as_str() == backend && t.tool.as_str() == tool)
			{
				continue;
			}
			let jwt = rule.source.as_ref().and_then(|s| s.jwt.as_ref());
			if let Some(jwt) = jwt {
				if !jwt.claims.is_empty() {
					let satisfied = jwt.claims.iter().all(|(key, expected)| {
						claims
							.and_then(|c| c.get_claim(key, "."))
							.map(|actual| actual == expected)
							.unwrap_or(false)
					});
					if !satisfied {
						continue;
					}
				}
				if !jwt.scopes.is_empty() {
					let covered = jwt.scopes.iter().all(|s| token_scopes.contains(s));
					if !covered {
						if rule.action == Action::Allow {
							let better = challenge_scopes
								.as_ref()
								.map(|cur| jwt.scopes.len() < cur.len())
								.unwrap_or(true);
							if better {
								challenge_scopes = Some(jwt.scopes.clone());
							}
						}
						continue;
					}
				}
			}
			return match rule.action {
				Action::Allow => Decision::Allow,
				Action::Deny => Decision::Deny { challenge: None },
			};
		}

		match self.default_action {
			Action::Allow => Decision::Allow,
			Action::Deny => Decision::Deny {
				challenge: challenge_scopes.map(|scopes| self.challenge(&scopes)),
			},
		}
	}

	fn challenge(&self, scopes: &[String]) -> String {
		let scope = scopes.join(" ");
		match &self.resource_metadata_url {
			Some(url) => format!(
				"Bearer error=\"insufficient_scope\", scope=\"{scope}\", resource_metadata=\"{url}\""
			),
			None => format!("Bearer error=\"insufficient_scope\", scope=\"{scope}\""),
		}
	}

	/// evaluate_request is the common entry: builds the context once per JSON-RPC message.
	pub fn evaluate_call(
		&self,
		backend: &str,
		tool: &str,
		claims: Option<&Claims>,
		request: &RequestContext,
	) -> Decision {
		let exec = Executor::new(request).ok();
		self.evaluate(backend, tool, claims, exec.as_ref())
	}
}

#[cfg(test)]
#[path = "rbac_tests.rs"]
mod tests;
