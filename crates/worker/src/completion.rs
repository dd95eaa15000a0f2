use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tokio::sync::Notify;

use crate::error::PoolError;

/// Type-erased view of a completion held by a queued job.
///
/// Workers only need to know whether the caller still waits, and how to
/// report a failure that prevented the unit of work from completing itself.
pub(crate) trait Signal: Send + Sync {
	fn is_abandoned(&self) -> bool;
	fn fail(&self, error: PoolError);
}

/// Caller-private completion signal for one unit of work.
///
/// Blocking callers park on the condition variable; async callers wait on the
/// [`Notify`]. Both observe the same slot.
pub(crate) struct Completion<R> {
	slot: Mutex<Option<Result<R, PoolError>>>,
	ready: Condvar,
	notify: Notify,
	abandoned: AtomicBool,
}

impl<R> Completion<R> {
	pub fn new() -> Self {
		Self {
			slot: Mutex::new(None),
			ready: Condvar::new(),
			notify: Notify::new(),
			abandoned: AtomicBool::new(false),
		}
	}

	/// Stores the result and wakes the waiting caller.
	pub fn complete(&self, result: Result<R, PoolError>) {
		let mut slot = self.slot.lock();
		*slot = Some(result);
		drop(slot);
		self.ready.notify_all();
		self.notify.notify_one();
	}

	/// Marks the unit of work as no longer awaited. A worker that has not yet
	/// started it drops it unrun.
	pub fn abandon(&self) {
		self.abandoned.store(true, Ordering::Release);
	}

	/// Blocks until the result is available.
	pub fn wait(&self) -> Result<R, PoolError> {
		let mut slot = self.slot.lock();
		loop {
			if let Some(result) = slot.take() {
				return result;
			}
			self.ready.wait(&mut slot);
		}
	}

	/// Blocks until the result is available or `deadline` passes.
	pub fn wait_until(&self, deadline: Instant) -> Result<R, PoolError> {
		let mut slot = self.slot.lock();
		loop {
			if let Some(result) = slot.take() {
				return result;
			}
			if self.ready.wait_until(&mut slot, deadline).timed_out() {
				if let Some(result) = slot.take() {
					return result;
				}
				self.abandon();
				return Err(PoolError::DeadlineElapsed);
			}
		}
	}

	/// Waits for the result without blocking the thread.
	///
	/// Dropping the returned future before it resolves abandons the unit of work.
	pub async fn wait_async(&self) -> Result<R, PoolError> {
		let guard = AbandonOnDrop { completion: self, armed: true };
		loop {
			// Register before checking the slot so a completion between the
			// check and the await is not missed.
			let notified = self.notify.notified();
			let taken = self.slot.lock().take();
			if let Some(result) = taken {
				guard.disarm();
				return result;
			}
			notified.await;
		}
	}
}

impl<R: Send> Signal for Completion<R> {
	fn is_abandoned(&self) -> bool {
		self.abandoned.load(Ordering::Acquire)
	}

	fn fail(&self, error: PoolError) {
		self.complete(Err(error));
	}
}

struct AbandonOnDrop<'a, R> {
	completion: &'a Completion<R>,
	armed: bool,
}

impl<R> AbandonOnDrop<'_, R> {
	fn disarm(mut self) {
		self.armed = false;
	}
}

impl<R> Drop for AbandonOnDrop<'_, R> {
	fn drop(&mut self) {
		if self.armed {
			self.completion.abandon();
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::thread;
	use std::time::Duration;

	use super::*;

	#[test]
	fn wait_returns_result_completed_on_another_thread() {
		let completion = Arc::new(Completion::new());
		let done = Arc::clone(&completion);
		thread::spawn(move || {
			thread::sleep(Duration::from_millis(10));
			done.complete(Ok(5u32));
		});
		assert_eq!(completion.wait().unwrap(), 5);
	}

	#[test]
	fn wait_until_times_out_and_abandons() {
		let completion: Completion<u32> = Completion::new();
		let deadline = Instant::now() + Duration::from_millis(10);
		assert!(matches!(completion.wait_until(deadline), Err(PoolError::DeadlineElapsed)));
		assert!(completion.is_abandoned());
	}

	#[test]
	fn fail_surfaces_error_to_waiter() {
		let completion: Completion<u32> = Completion::new();
		completion.fail(PoolError::Panicked("boom".into()));
		assert!(matches!(completion.wait(), Err(PoolError::Panicked(msg)) if msg == "boom"));
	}

	#[tokio::test]
	async fn async_wait_observes_completion_before_await() {
		let completion = Completion::new();
		completion.complete(Ok("ready"));
		assert_eq!(completion.wait_async().await.unwrap(), "ready");
		assert!(!completion.is_abandoned());
	}

	#[tokio::test]
	async fn dropped_async_wait_abandons() {
		let completion: Completion<u32> = Completion::new();
		let waited = tokio::time::timeout(Duration::from_millis(10), completion.wait_async()).await;
		assert!(waited.is_err());
		assert!(completion.is_abandoned());
	}
}
