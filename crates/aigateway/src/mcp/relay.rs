use aigw_core::prelude::*;
use futures_util::future::join_all;
use rmcp::model::{
	ClientJsonRpcMessage, ListToolsResult, ServerJsonRpcMessage, ServerResult,
};

use crate::mcp::session::Session;
use crate::mcp::upstream::UpstreamClient;
use crate::mcp::{Error, McpTargetConfig};

/// Relay fans JSON-RPC messages out across the route's upstream servers and merges the
/// results, namespacing tool names so the client sees a single server.
#[derive(Debug, Clone)]
pub struct Relay {
	targets: Vec<McpTargetConfig>,
	delimiter: Strng,
	client: UpstreamClient,
}

impl Relay {
	pub fn new(targets: Vec<McpTargetConfig>, delimiter: Strng) -> Self {
		Relay {
			targets,
			delimiter,
			client: UpstreamClient::new(),
		}
	}

	pub fn targets(&self) -> &[McpTargetConfig] {
		&self.targets
	}

	pub fn client(&self) -> &UpstreamClient {
		&self.client
	}

	pub fn is_multiplexing(&self) -> bool {
		self.targets.len() > 1
	}

	pub fn mangle(&self, backend: &str, tool: &str) -> String {
		format!("{backend}{}{tool}", self.delimiter)
	}

	/// parse_resource_name splits a client-visible name back into (backend, original name).
	/// With a single upstream, un-prefixed names are accepted and pinned to it.
	pub fn parse_resource_name<'a>(&'a self, name: &'a str) -> Result<(&'a str, &'a str), Error> {
		if let Some((backend, tool)) = name.split_once(self.delimiter.as_str())
			&& self.targets.iter().any(|t| t.name.as_str() == backend)
		{
			return Ok((backend, tool));
		}
		if let [only] = self.targets.as_slice() {
			return Ok((only.name.as_str(), name));
		}
		Err(Error::UnknownToolName(name.to_string()))
	}

	fn target(&self, name: &str) -> Result<&McpTargetConfig, Error> {
		self
			.targets
			.iter()
			.find(|t| t.name.as_str() == name)
			.ok_or_else(|| Error::UnknownToolName(name.to_string()))
	}

	/// fanout_initialize sends the handshake to every upstream and records the per-upstream
	/// session ids on the session.
	pub async fn fanout_initialize(
		&self,
		session: &Session,
		message: &ClientJsonRpcMessage,
	) -> Result<(), Error> {
		let results = join_all(self.targets.iter().map(|target| async move {
			(target, self.client.send(target, None, message).await)
		}))
		.await;
		let mut last_err = None;
		let mut ok = 0;
		for (target, result) in results {
			match result {
				Ok(resp) => {
					ok += 1;
					session.set_upstream_session(target.name.clone(), resp.session_id);
				},
				Err(e) => {
					tracing::warn!("initialize failed for {}: {e}", target.name);
					last_err = Some(e);
				},
			}
		}
		// All upstreams down is a hard failure; anything else degrades
		if ok == 0 && let Some(e) = last_err {
			return Err(e);
		}
		Ok(())
	}

	/// fanout_list_tools merges `tools/list` across upstreams with names rewritten. A failing
	/// upstream does not fail the aggregate: its tools are omitted and the error is logged.
	pub async fn fanout_list_tools(
		&self,
		session: &Session,
		message: &ClientJsonRpcMessage,
	) -> ListToolsResult {
		let results = join_all(self.targets.iter().map(|target| async move {
			let sid = session.upstream_session(target.name.as_str());
			(target, self.client.send(target, sid.as_deref(), message).await)
		}))
		.await;

		let mut merged = ListToolsResult::default();
		for (target, result) in results {
			let resp = match result {
				Ok(r) => r,
				Err(e) => {
					tracing::warn!("tools/list failed for {}: {e}", target.name);
					continue;
				},
			};
			for message in resp.messages {
				let ServerJsonRpcMessage::Response(r) = message else {
					continue;
				};
				let ServerResult::ListToolsResult(ltr) = r.result else {
					continue;
				};
				for mut tool in ltr.tools {
					let original = tool.name.to_string();
					let mangled = self.mangle(target.name.as_str(), &original);
					session.record_tool(mangled.clone(), target.name.clone(), original);
					tool.name = mangled.into();
					merged.tools.push(tool);
				}
			}
		}
		merged
	}

	/// send_single forwards a message to one named upstream.
	pub async fn send_single(
		&self,
		session: &Session,
		backend: &str,
		message: &ClientJsonRpcMessage,
	) -> Result<Vec<ServerJsonRpcMessage>, Error> {
		let target = self.target(backend)?;
		let sid = session.upstream_session(backend);
		let resp = self.client.send(target, sid.as_deref(), message).await?;
		Ok(resp.messages)
	}

	/// fanout_notification forwards a client notification to every upstream, best effort.
	pub async fn fanout_notification(&self, session: &Session, message: &ClientJsonRpcMessage) {
		let _ = join_all(self.targets.iter().map(|target| async move {
			let sid = session.upstream_session(target.name.as_str());
			if let Err(e) = self.client.send(target, sid.as_deref(), message).await {
				tracing::debug!("notification failed for {}: {e}", target.name);
			}
		}))
		.await;
	}

	/// fanout_delete tears down every upstream session.
	pub async fn fanout_delete(&self, session: &Session) {
		let _ = join_all(self.targets.iter().map(|target| async move {
			if let Some(sid) = session.upstream_session(target.name.as_str()) {
				self.client.delete_session(target, &sid).await;
			}
		}))
		.await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn relay(names: &[&str]) -> Relay {
		Relay::new(
			names
				.iter()
				.map(|n| McpTargetConfig {
					name: strng::new(n),
					url: strng::format!("http://{n}.internal/mcp"),
					headers: vec![],
				})
				.collect(),
			strng::literal!("__"),
		)
	}

	#[test]
	fn mangling_round_trips() {
		let r = relay(&["github", "jira"]);
		let mangled = r.mangle("github", "create_issue");
		assert_eq!(mangled, "github__create_issue");
		assert_eq!(
			r.parse_resource_name(&mangled).unwrap(),
			("github", "create_issue")
		);
	}

	#[test]
	fn unknown_backend_prefix_is_rejected_when_multiplexing() {
		let r = relay(&["github", "jira"]);
		assert!(matches!(
			r.parse_resource_name("gitlab__create_issue"),
			Err(Error::UnknownToolName(_))
		));
		// A tool that merely contains the delimiter does not leak through
		assert!(matches!(
			r.parse_resource_name("create__issue"),
			Err(Error::UnknownToolName(_))
		));
	}

	#[test]
	fn single_upstream_accepts_bare_names() {
		let r = relay(&["github"]);
		assert_eq!(
			r.parse_resource_name("create_issue").unwrap(),
			("github", "create_issue")
		);
		// Prefixed names still work
		assert_eq!(
			r.parse_resource_name("github__create_issue").unwrap(),
			("github", "create_issue")
		);
	}

	#[test]
	fn tools_containing_the_delimiter_resolve_to_the_longest_backend_match() {
		let r = relay(&["github"]);
		// The original tool name may itself contain the delimiter
		assert_eq!(
			r.parse_resource_name("github__nested__tool").unwrap(),
			("github", "nested__tool")
		);
	}
}
