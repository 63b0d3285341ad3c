use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use aigw_core::prelude::*;
use parking_lot::Mutex;
use rmcp::model::RequestId;

/// Session pins a client to its fan-out set. It carries the upstream session ids, the mapping
/// from client-visible (namespaced) tool names back to their origin, and the in-flight
/// request correlation table. All mutation goes through the per-session lock.
#[derive(Debug)]
pub struct Session {
	pub id: Arc<str>,
	state: Mutex<SessionState>,
}

#[derive(Debug, Default)]
struct SessionState {
	/// Upstream session ids, per backend. Also the subscription set for server-push streams.
	upstream_sessions: HashMap<Strng, Option<String>>,
	/// Mangled tool name -> (backend, original tool name)
	tools: HashMap<String, (Strng, String)>,
	/// In-flight client request ids and their methods
	pending: HashMap<String, String>,
}

impl Session {
	fn new(id: Arc<str>) -> Self {
		Session {
			id,
			state: Mutex::new(SessionState::default()),
		}
	}

	pub fn set_upstream_session(&self, backend: Strng, session_id: Option<String>) {
		self.state.lock().upstream_sessions.insert(backend, session_id);
	}

	pub fn upstream_session(&self, backend: &str) -> Option<String> {
		self
			.state
			.lock()
			.upstream_sessions
			.get(backend)
			.and_then(|s| s.clone())
	}

	/// The subscribed fan-out set, with each upstream's session id.
	pub fn upstream_sessions(&self) -> Vec<(Strng, Option<String>)> {
		self
			.state
			.lock()
			.upstream_sessions
			.iter()
			.map(|(k, v)| (k.clone(), v.clone()))
			.collect()
	}

	/// record_tool remembers where a client-visible tool name came from.
	pub fn record_tool(&self, mangled: String, backend: Strng, original: String) {
		self.state.lock().tools.insert(mangled, (backend, original));
	}

	/// resolve_tool maps a client-visible tool name back to (backend, original name).
	pub fn resolve_tool(&self, mangled: &str) -> Option<(Strng, String)> {
		self.state.lock().tools.get(mangled).cloned()
	}

	pub fn begin_request(&self, id: &RequestId, method: &str) {
		self
			.state
			.lock()
			.pending
			.insert(id.to_string(), method.to_string());
	}

	pub fn finish_request(&self, id: &RequestId) -> Option<String> {
		self.state.lock().pending.remove(&id.to_string())
	}

	pub fn pending_count(&self) -> usize {
		self.state.lock().pending.len()
	}
}

/// SessionManager is the shared session table. `get_or_create` on a session id is atomic; a
/// session is shared between concurrent client connections carrying the same id.
#[derive(Debug, Default)]
pub struct SessionManager {
	sessions: RwLock<HashMap<String, Arc<Session>>>,
}

fn session_id() -> Arc<str> {
	uuid::Uuid::new_v4().to_string().into()
}

impl SessionManager {
	pub fn new() -> Self {
		Default::default()
	}

	pub fn get_session(&self, id: &str) -> Option<Arc<Session>> {
		self.sessions.read().ok()?.get(id).cloned()
	}

	/// create_session establishes a new session and registers it.
	pub fn create_session(&self) -> Arc<Session> {
		let id = session_id();
		let sess = Arc::new(Session::new(id.clone()));
		let mut sm = self.sessions.write().expect("write lock");
		sm.insert(id.to_string(), sess.clone());
		sess
	}

	/// get_or_create returns the session for `id`, creating it atomically if absent. Used in
	/// tests and for resumable flows; the normal path creates on initialize.
	pub fn get_or_create(&self, id: &str) -> Arc<Session> {
		let mut sm = self.sessions.write().expect("write lock");
		sm.entry(id.to_string())
			.or_insert_with(|| Arc::new(Session::new(id.into())))
			.clone()
	}

	pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
		let mut sm = self.sessions.write().expect("write lock");
		sm.remove(id)
	}

	pub fn len(&self) -> usize {
		self.sessions.read().map(|s| s.len()).unwrap_or_default()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
