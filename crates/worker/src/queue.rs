use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::QueueClosed;

struct QueueState<T> {
	items: VecDeque<T>,
	closed: bool,
}

struct QueueInner<T> {
	state: Mutex<QueueState<T>>,
	available: Condvar,
}

/// Unbounded multi-producer, multi-consumer FIFO feeding pool workers.
///
/// Receivers block on a condition variable, so the queue is usable from plain
/// OS threads without an async runtime.
pub struct WorkQueue<T> {
	inner: Arc<QueueInner<T>>,
}

/// Producer handle for a [`WorkQueue`].
pub struct WorkSender<T> {
	inner: Arc<QueueInner<T>>,
}

/// Consumer handle for a [`WorkQueue`].
pub struct WorkReceiver<T> {
	inner: Arc<QueueInner<T>>,
}

impl<T> Clone for WorkSender<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T> Clone for WorkReceiver<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T> Default for WorkQueue<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> WorkQueue<T> {
	/// Creates an empty, open queue.
	pub fn new() -> Self {
		Self {
			inner: Arc::new(QueueInner {
				state: Mutex::new(QueueState {
					items: VecDeque::new(),
					closed: false,
				}),
				available: Condvar::new(),
			}),
		}
	}

	/// Returns a sender handle.
	pub fn sender(&self) -> WorkSender<T> {
		WorkSender {
			inner: Arc::clone(&self.inner),
		}
	}

	/// Returns a receiver handle.
	pub fn receiver(&self) -> WorkReceiver<T> {
		WorkReceiver {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T> WorkSender<T> {
	/// Appends one item. Never blocks on capacity.
	pub fn send(&self, item: T) -> Result<(), QueueClosed> {
		let mut state = self.inner.state.lock();
		if state.closed {
			return Err(QueueClosed);
		}
		state.items.push_back(item);
		drop(state);
		self.inner.available.notify_one();
		Ok(())
	}

	/// Closes the queue. Receivers drain queued items, then observe `None`.
	pub fn close(&self) {
		let mut state = self.inner.state.lock();
		state.closed = true;
		drop(state);
		self.inner.available.notify_all();
	}

	/// Returns true once [`Self::close`] has been called.
	pub fn is_closed(&self) -> bool {
		self.inner.state.lock().closed
	}

	/// Returns current queue depth.
	pub fn len(&self) -> usize {
		self.inner.state.lock().items.len()
	}

	/// Returns true when nothing is queued.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl<T> WorkReceiver<T> {
	/// Blocks until an item is available. Returns `None` once the queue is closed and drained.
	pub fn recv(&self) -> Option<T> {
		let mut state = self.inner.state.lock();
		loop {
			if let Some(item) = state.items.pop_front() {
				return Some(item);
			}
			if state.closed {
				return None;
			}
			self.inner.available.wait(&mut state);
		}
	}

	/// Pops one item without waiting.
	pub fn try_recv(&self) -> Option<T> {
		self.inner.state.lock().items.pop_front()
	}

	/// Returns current queue depth.
	pub fn len(&self) -> usize {
		self.inner.state.lock().items.len()
	}

	/// Returns true when nothing is queued.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
