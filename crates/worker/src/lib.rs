//! Lock-guarded worker pool.
//!
//! A [`GuardedPool`] owns one piece of state behind a reader/writer lock and a
//! fixed set of worker threads. Every access goes through a [`Work`] unit
//! tagged [`Access::Exclusive`] or [`Access::Shared`], queued on one unbounded
//! [`WorkQueue`] and run by whichever worker is idle:
//!
//! ```text
//!  caller ──Work──▶ WorkQueue ──▶ worker 0..P ──lock──▶ state
//!    ▲                                  │
//!    └──────────── completion ◀─────────┘
//! ```
//!
//! Callers block on (or await) a private completion signal, so the pool looks
//! like a plain function call while all locking stays inside the workers.

mod access;
mod completion;
mod error;
mod pool;
mod queue;
mod spawn;
mod stats;


pub use access::Access;
pub use error::{PoolError, QueueClosed};
pub use pool::{ExclusiveOp, GuardedPool, PoolConfig, SharedOp, Work, default_workers};
pub use queue::{WorkQueue, WorkReceiver, WorkSender};
pub use stats::PoolStats;
pub use tokio_util::sync::CancellationToken;

/// Extracts the message from a panic payload, if it carries one.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> Option<String> {
	if let Some(s) = payload.downcast_ref::<&'static str>() {
		Some((*s).to_string())
	} else {
		payload.downcast_ref::<String>().cloned()
	}
}
