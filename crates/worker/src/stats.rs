use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time snapshot of pool activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
	/// Number of worker threads started.
	pub workers: usize,
	/// Units of work queued but not yet picked up.
	pub pending: usize,
	/// Units of work that ran to completion. A unit is counted before its
	/// caller is woken.
	pub completed: u64,
	/// Units of work dropped unrun because their caller stopped waiting.
	/// Counted when a worker reaches the unit, which can be after the caller
	/// already returned.
	pub abandoned: u64,
	/// Units of work that panicked.
	pub panicked: u64,
}

/// Shared counters updated by workers.
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
	completed: AtomicU64,
	abandoned: AtomicU64,
	panicked: AtomicU64,
}

impl PoolCounters {
	pub fn record_completed(&self) {
		self.completed.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_abandoned(&self) {
		self.abandoned.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_panicked(&self) {
		self.panicked.fetch_add(1, Ordering::Relaxed);
	}

	pub fn snapshot(&self, workers: usize, pending: usize) -> PoolStats {
		PoolStats {
			workers,
			pending,
			completed: self.completed.load(Ordering::Relaxed),
			abandoned: self.abandoned.load(Ordering::Relaxed),
			panicked: self.panicked.load(Ordering::Relaxed),
		}
	}
}
