use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::Result;
use crate::session::Session;

/// The session table: session id to shared session record.
pub type Sessions = HashMap<String, Arc<Session>>;

/// Ready and chatting totals taken from one snapshot of the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadinessCounts {
	/// Sessions waiting to be paired.
	pub ready: usize,
	/// Sessions currently in a room.
	pub chatting: usize,
}

/// Operations collaborators use to register and query sessions.
///
/// Every call is atomic with respect to every other call on the same registry.
/// Queries that walk the table see one consistent set of entries.
/// [`SessionMap`](crate::SessionMap) is the single-table implementation;
/// collaborators that only hold `dyn SessionRegistry` are unaffected if it is
/// replaced by a sharded one.
pub trait SessionRegistry: Send + Sync {
	/// Inserts or replaces the session stored under `id`.
	fn set(&self, id: &str, session: Arc<Session>) -> Result<()>;

	/// Returns the session stored under `id`.
	fn get(&self, id: &str) -> Result<Option<Arc<Session>>>;

	/// Removes the session stored under `id`. Unknown ids are ignored.
	fn close(&self, id: &str) -> Result<()>;

	/// Ids of every session currently marked ready.
	fn ready_ids(&self) -> Result<HashSet<String>>;

	/// Ids of every ready session in `region`.
	fn ready_ids_by_region(&self, region: &str) -> Result<HashSet<String>>;

	/// Counts ready and chatting sessions in a single pass.
	fn ready_and_chatting(&self) -> Result<ReadinessCounts>;

	/// Number of registered sessions.
	fn len(&self) -> Result<usize>;

	fn is_empty(&self) -> Result<bool> {
		Ok(self.len()? == 0)
	}
}

// Table walks shared by registry implementations. Callers hold the read lock.

pub(crate) fn collect_ready_ids(sessions: &Sessions) -> HashSet<String> {
	sessions.values().filter(|s| s.is_ready()).map(|s| s.id().to_string()).collect()
}

pub(crate) fn collect_ready_ids_in(sessions: &Sessions, region: &str) -> HashSet<String> {
	sessions
		.values()
		.filter(|s| s.region() == region && s.is_ready())
		.map(|s| s.id().to_string())
		.collect()
}

pub(crate) fn count_ready_and_chatting(sessions: &Sessions) -> ReadinessCounts {
	let mut counts = ReadinessCounts::default();
	for session in sessions.values() {
		if session.is_ready() {
			counts.ready += 1;
		}
		if session.is_chatting() {
			counts.chatting += 1;
		}
	}
	counts
}
