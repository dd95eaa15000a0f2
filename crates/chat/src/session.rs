//! Session and room records indexed by the registry.
//!
//! A [`Session`] is shared as `Arc<Session>` between the registry and the
//! connection handler that owns it. `ready` and `room` can be changed in place
//! through any clone of the `Arc`, and the registry sees the change without a
//! new `set`. Those writes do not take the registry lock, so a query running
//! concurrently observes each field as of some instant during its traversal.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use uuid::Uuid;

/// A pairing between chatting sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Room {
	id: String,
	members: Vec<String>,
}

impl Room {
	/// Creates an empty room with the given id.
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			members: Vec::new(),
		}
	}

	/// Creates a room with a fresh id holding two sessions.
	pub fn pair(first: &str, second: &str) -> Self {
		Self {
			id: Uuid::new_v4().to_string(),
			members: vec![first.to_string(), second.to_string()],
		}
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn members(&self) -> &[String] {
		&self.members
	}

	/// Returns true if `session_id` is one of the room's members.
	pub fn contains(&self, session_id: &str) -> bool {
		self.members.iter().any(|m| m == session_id)
	}
}

/// One participant's matchmaking state.
pub struct Session {
	id: String,
	region: String,
	ready: AtomicBool,
	room: RwLock<Option<Arc<Room>>>,
}

impl Session {
	/// Creates a session that is neither ready nor in a room.
	pub fn new(id: impl Into<String>, region: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			region: region.into(),
			ready: AtomicBool::new(false),
			room: RwLock::new(None),
		}
	}

	/// Sets the initial ready flag.
	#[must_use]
	pub fn with_ready(self, ready: bool) -> Self {
		self.ready.store(ready, Ordering::Relaxed);
		self
	}

	/// Wraps the session for sharing with the registry.
	pub fn into_shared(self) -> Arc<Self> {
		Arc::new(self)
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn region(&self) -> &str {
		&self.region
	}

	/// Returns true while the owner waits for a partner.
	pub fn is_ready(&self) -> bool {
		self.ready.load(Ordering::Acquire)
	}

	pub fn set_ready(&self, ready: bool) {
		self.ready.store(ready, Ordering::Release);
	}

	/// Returns the current room, if any.
	pub fn room(&self) -> Option<Arc<Room>> {
		self.room.read().clone()
	}

	/// Returns true while the session is in a room.
	pub fn is_chatting(&self) -> bool {
		self.room.read().is_some()
	}

	/// Puts the session in `room`, returning the room it left.
	pub fn join_room(&self, room: Arc<Room>) -> Option<Arc<Room>> {
		self.room.write().replace(room)
	}

	/// Takes the session out of its room.
	pub fn leave_room(&self) -> Option<Arc<Room>> {
		self.room.write().take()
	}
}

impl fmt::Debug for Session {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Session")
			.field("id", &self.id)
			.field("region", &self.region)
			.field("ready", &self.is_ready())
			.field("room", &self.room().map(|r| r.id().to_string()))
			.finish()
	}
}
