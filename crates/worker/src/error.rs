//! Error types for the worker pool.

use thiserror::Error;

/// Errors surfaced to callers submitting work to a [`GuardedPool`](crate::GuardedPool).
#[derive(Debug, Error)]
pub enum PoolError {
	/// The pool was closed before the unit of work could be queued.
	#[error("worker pool is closed")]
	Closed,

	/// The caller's deadline passed before the unit of work completed.
	#[error("deadline elapsed before the unit of work completed")]
	DeadlineElapsed,

	/// The caller's cancellation token fired before the unit of work completed.
	#[error("caller cancelled while waiting for the unit of work")]
	Cancelled,

	/// The unit of work panicked on the worker thread.
	#[error("unit of work panicked: {0}")]
	Panicked(String),

	/// A worker thread could not be started.
	#[error("failed to spawn worker thread: {0}")]
	Spawn(#[from] std::io::Error),
}

/// Returned by [`WorkSender::send`](crate::WorkSender::send) once the queue is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("work queue is closed")]
pub struct QueueClosed;
