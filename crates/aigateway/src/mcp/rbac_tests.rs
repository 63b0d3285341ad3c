use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::json;

use super::*;
use crate::http::{HeaderMap, Method};

fn token(payload: serde_json::Value) -> String {
	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
	let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
	format!("{header}.{body}.sig")
}

fn claims(payload: serde_json::Value) -> Claims {
	Claims::parse_unverified(&token(payload)).unwrap()
}

fn request() -> RequestContext {
	RequestContext::build(&Method::POST, "gw", "/mcp", &HeaderMap::new())
}

fn scope_rule(backend: &str, tool: &str, scopes: &[&str], action: Action) -> AuthorizationRule {
	AuthorizationRule {
		source: Some(RuleSource {
			jwt: Some(JwtSource {
				claims: Default::default(),
				scopes: scopes.iter().map(|s| s.to_string()).collect(),
			}),
		}),
		target: vec![ToolTarget {
			backend: strng::new(backend),
			tool: strng::new(tool),
		}],
		expression: None,
		action,
	}
}

#[test]
fn covered_scopes_allow() {
	let authz = Authorization {
		resource_metadata_url: None,
		default_action: Action::Deny,
		rules: vec![scope_rule("github", "create_issue", &["issues:write"], Action::Allow)],
	};
	let c = claims(json!({"scope": "issues:write repo:read"}));
	assert_eq!(
		authz.evaluate_call("github", "create_issue", Some(&c), &request()),
		Decision::Allow
	);
}

#[test]
fn missing_scopes_deny_with_challenge() {
	let authz = Authorization {
		resource_metadata_url: Some(strng::literal!("https://gw/.well-known/oauth-protected-resource")),
		default_action: Action::Deny,
		rules: vec![scope_rule("github", "create_issue", &["issues:write"], Action::Allow)],
	};
	let c = claims(json!({"scope": "repo:read"}));
	let decision = authz.evaluate_call("github", "create_issue", Some(&c), &request());
	let Decision::Deny { challenge: Some(challenge) } = decision else {
		panic!("expected deny with challenge, got {decision:?}");
	};
	assert_eq!(
		challenge,
		"Bearer error=\"insufficient_scope\", scope=\"issues:write\", resource_metadata=\"https://gw/.well-known/oauth-protected-resource\""
	);
}

#[test]
fn smallest_scope_set_wins_the_challenge() {
	let authz = Authorization {
		resource_metadata_url: None,
		default_action: Action::Deny,
		rules: vec![
			scope_rule("github", "create_issue", &["admin", "issues:write"], Action::Allow),
			scope_rule("github", "create_issue", &["issues:write"], Action::Allow),
		],
	};
	let c = claims(json!({"scope": "repo:read"}));
	let Decision::Deny { challenge: Some(challenge) } =
		authz.evaluate_call("github", "create_issue", Some(&c), &request())
	else {
		panic!("expected deny with challenge");
	};
	assert_eq!(challenge, "Bearer error=\"insufficient_scope\", scope=\"issues:write\"");
}

#[test]
fn target_mismatch_skips_rule() {
	let authz = Authorization {
		resource_metadata_url: None,
		default_action: Action::Deny,
		rules: vec![scope_rule("github", "create_issue", &[], Action::Allow)],
	};
	let c = claims(json!({}));
	assert!(
		!authz
			.evaluate_call("jira", "create_issue", Some(&c), &request())
			.allowed()
	);
	assert!(
		authz
			.evaluate_call("github", "create_issue", Some(&c), &request())
			.allowed()
	);
}

#[test]
fn claims_must_all_match() {
	let mut rule = scope_rule("github", "create_issue", &[], Action::Allow);
	rule.source = Some(RuleSource {
		jwt: Some(JwtSource {
			claims: [("org".to_string(), "acme".to_string())].into_iter().collect(),
			scopes: vec![],
		}),
	});
	let authz = Authorization {
		resource_metadata_url: None,
		default_action: Action::Deny,
		rules: vec![rule],
	};
	assert!(
		authz
			.evaluate_call(
				"github",
				"create_issue",
				Some(&claims(json!({"org": "acme"}))),
				&request()
			)
			.allowed()
	);
	assert!(
		!authz
			.evaluate_call(
				"github",
				"create_issue",
				Some(&claims(json!({"org": "evil"}))),
				&request()
			)
			.allowed()
	);
}

#[test]
fn cel_gate_runs_first() {
	let mut rule = scope_rule("github", "create_issue", &[], Action::Deny);
	rule.expression = Some(std::sync::Arc::new(
		Expression::new(r#"request.method == "POST""#).unwrap(),
	));
	let authz = Authorization {
		resource_metadata_url: None,
		default_action: Action::Allow,
		rules: vec![rule],
	};
	// The CEL gate passes, so the deny rule fires
	assert!(
		!authz
			.evaluate_call("github", "create_issue", None, &request())
			.allowed()
	);

	// A non-boolean expression skips the rule entirely
	let mut rule = scope_rule("github", "create_issue", &[], Action::Deny);
	rule.expression = Some(std::sync::Arc::new(Expression::new("request.path").unwrap()));
	let authz = Authorization {
		resource_metadata_url: None,
		default_action: Action::Allow,
		rules: vec![rule],
	};
	assert!(
		authz
			.evaluate_call("github", "create_issue", None, &request())
			.allowed()
	);
}

#[test]
fn deny_rules_do_not_feed_the_challenge() {
	let authz = Authorization {
		resource_metadata_url: None,
		default_action: Action::Deny,
		rules: vec![scope_rule("github", "create_issue", &["admin"], Action::Deny)],
	};
	let c = claims(json!({"scope": "repo:read"}));
	assert_eq!(
		authz.evaluate_call("github", "create_issue", Some(&c), &request()),
		Decision::Deny { challenge: None }
	);
}
