//! Region-scoped pairing of ready sessions.

use std::sync::Arc;

use crate::registry::Sessions;
use crate::session::{Room, Session};

/// Pairs `seeker_id` with another ready session from the same region.
///
/// Candidates are tried in id order. Both sessions leave the ready pool and
/// join the new room. Sessions already in a room are never paired, as seeker
/// or as partner. Returns `None` when the seeker is unknown, not ready, already
/// chatting, or has nobody to pair with.
///
/// The caller must hold the table's write lock. That excludes every other
/// pairing attempt, so a ready session is never handed to two seekers.
pub(crate) fn pair_in_region(sessions: &Sessions, seeker_id: &str) -> Option<Arc<Room>> {
	let seeker = sessions.get(seeker_id)?;
	if !seeker.is_ready() || seeker.is_chatting() {
		return None;
	}

	let partner = sessions
		.values()
		.filter(|candidate| is_candidate(seeker, candidate))
		.min_by(|a, b| a.id().cmp(b.id()))?;

	let room = Arc::new(Room::pair(seeker.id(), partner.id()));
	for session in [seeker, partner] {
		session.set_ready(false);
		session.join_room(Arc::clone(&room));
	}
	tracing::debug!(room = room.id(), seeker = seeker.id(), partner = partner.id(), region = seeker.region(), "registry.paired");
	Some(room)
}

fn is_candidate(seeker: &Arc<Session>, candidate: &Arc<Session>) -> bool {
	!Arc::ptr_eq(seeker, candidate)
		&& candidate.id() != seeker.id()
		&& candidate.region() == seeker.region()
		&& candidate.is_ready()
		&& !candidate.is_chatting()
}
