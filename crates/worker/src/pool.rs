use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::completion::{Completion, Signal};
use crate::error::PoolError;
use crate::queue::{WorkQueue, WorkReceiver, WorkSender};
use crate::spawn::spawn_worker_thread;
use crate::stats::{PoolCounters, PoolStats};
use crate::{Access, panic_message};

/// Boxed operation run under the write lock.
pub type ExclusiveOp<S> = Box<dyn FnOnce(&mut S) + Send>;
/// Boxed operation run under the read lock.
pub type SharedOp<S> = Box<dyn FnOnce(&S) + Send>;

/// One unit of work, tagged with the lock mode it needs.
pub enum Work<S> {
	Exclusive(ExclusiveOp<S>),
	Shared(SharedOp<S>),
}

impl<S> Work<S> {
	/// Wraps an operation that needs write access.
	pub fn exclusive(op: impl FnOnce(&mut S) + Send + 'static) -> Self {
		Self::Exclusive(Box::new(op))
	}

	/// Wraps an operation that only reads.
	pub fn shared(op: impl FnOnce(&S) + Send + 'static) -> Self {
		Self::Shared(Box::new(op))
	}

	/// Returns the lock mode this unit runs under.
	pub fn access(&self) -> Access {
		match self {
			Self::Exclusive(_) => Access::Exclusive,
			Self::Shared(_) => Access::Shared,
		}
	}

	/// Runs the operation, holding the matching lock for its whole body.
	pub fn run(self, state: &RwLock<S>) {
		match self {
			Self::Exclusive(op) => {
				let mut guard = state.write();
				op(&mut guard);
			}
			Self::Shared(op) => {
				let guard = state.read();
				op(&guard);
			}
		}
	}

	fn then(self, after: impl FnOnce() + Send + 'static) -> Self
	where
		S: 'static,
	{
		match self {
			Self::Exclusive(op) => Self::exclusive(move |state| {
				op(state);
				after();
			}),
			Self::Shared(op) => Self::shared(move |state| {
				op(state);
				after();
			}),
		}
	}
}

impl<S> fmt::Debug for Work<S> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Work::{:?}(..)", self.access())
	}
}

struct Job<S> {
	work: Work<S>,
	signal: Arc<dyn Signal>,
}

/// Hands a unit's result to its caller. The unit is counted as completed
/// before the caller wakes, so a returned call is already in [`PoolStats`].
struct Done<R> {
	completion: Arc<Completion<R>>,
	counters: Arc<PoolCounters>,
}

impl<R> Done<R> {
	fn complete(&self, value: R) {
		self.counters.record_completed();
		self.completion.complete(Ok(value));
	}
}

/// Worker pool sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
	/// Number of worker threads. Zero is treated as one.
	pub workers: usize,
	/// Prefix for worker thread names; the worker index is appended.
	pub thread_name: String,
}

impl Default for PoolConfig {
	fn default() -> Self {
		Self {
			workers: default_workers(),
			thread_name: "tailla-worker".to_string(),
		}
	}
}

impl PoolConfig {
	#[must_use]
	pub fn with_workers(mut self, workers: usize) -> Self {
		self.workers = workers;
		self
	}

	#[must_use]
	pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
		self.thread_name = name.into();
		self
	}
}

/// Available hardware parallelism, falling back to one.
pub fn default_workers() -> usize {
	std::thread::available_parallelism().map(std::num::NonZeroUsize::get).unwrap_or(1)
}

/// State guarded by a reader/writer lock and reachable only through a fixed
/// pool of worker threads.
///
/// Callers submit [`Work`] onto one shared unbounded queue. Whichever worker
/// dequeues it takes the write lock for [`Access::Exclusive`] units and the read
/// lock for [`Access::Shared`] units, so shared units overlap with each other
/// and exclusive units overlap with nothing.
///
/// Operations must not submit to the same pool from inside a unit of work:
/// the nested caller blocks a worker, and once every worker does so the pool
/// deadlocks.
pub struct GuardedPool<S> {
	name: String,
	sender: WorkSender<Job<S>>,
	workers: Mutex<Vec<JoinHandle<()>>>,
	size: usize,
	counters: Arc<PoolCounters>,
}

impl<S> GuardedPool<S>
where
	S: Send + Sync + 'static,
{
	/// Moves `state` behind the lock and starts the worker threads.
	pub fn new(state: S, config: PoolConfig) -> Result<Self, PoolError> {
		let size = config.workers.max(1);
		let state = Arc::new(RwLock::new(state));
		let queue = WorkQueue::new();
		let sender = queue.sender();
		let counters = Arc::new(PoolCounters::default());

		let mut workers = Vec::with_capacity(size);
		for index in 0..size {
			let receiver = queue.receiver();
			let state = Arc::clone(&state);
			let counters = Arc::clone(&counters);
			let spawned = spawn_worker_thread(format!("{}-{index}", config.thread_name), move || run_worker(index, receiver, state, counters));
			match spawned {
				Ok(handle) => workers.push(handle),
				Err(err) => {
					sender.close();
					return Err(PoolError::Spawn(err));
				}
			}
		}

		tracing::debug!(pool = %config.thread_name, workers = size, "pool.start");
		Ok(Self {
			name: config.thread_name,
			sender,
			workers: Mutex::new(workers),
			size,
			counters,
		})
	}

	/// Runs `f` under the write lock and returns its result.
	pub fn exclusive<F, R>(&self, f: F) -> Result<R, PoolError>
	where
		F: FnOnce(&mut S) -> R + Send + 'static,
		R: Send + 'static,
	{
		self.enqueue(|done| Work::exclusive(move |state| done.complete(f(state))))?.wait()
	}

	/// Runs `f` under the read lock and returns its result.
	pub fn shared<F, R>(&self, f: F) -> Result<R, PoolError>
	where
		F: FnOnce(&S) -> R + Send + 'static,
		R: Send + 'static,
	{
		self.enqueue(|done| Work::shared(move |state| done.complete(f(state))))?.wait()
	}

	/// Like [`Self::exclusive`], but stops waiting at `deadline`.
	///
	/// A unit abandoned before a worker picked it up is dropped without running.
	pub fn exclusive_until<F, R>(&self, deadline: Instant, f: F) -> Result<R, PoolError>
	where
		F: FnOnce(&mut S) -> R + Send + 'static,
		R: Send + 'static,
	{
		let result = self.enqueue(|done| Work::exclusive(move |state| done.complete(f(state))))?.wait_until(deadline);
		log_deadline(&self.name, Access::Exclusive, &result);
		result
	}

	/// Like [`Self::shared`], but stops waiting at `deadline`.
	pub fn shared_until<F, R>(&self, deadline: Instant, f: F) -> Result<R, PoolError>
	where
		F: FnOnce(&S) -> R + Send + 'static,
		R: Send + 'static,
	{
		let result = self.enqueue(|done| Work::shared(move |state| done.complete(f(state))))?.wait_until(deadline);
		log_deadline(&self.name, Access::Shared, &result);
		result
	}

	/// Awaits [`Self::exclusive`] without blocking the calling thread.
	pub async fn exclusive_async<F, R>(&self, f: F) -> Result<R, PoolError>
	where
		F: FnOnce(&mut S) -> R + Send + 'static,
		R: Send + 'static,
	{
		let completion = self.enqueue(|done| Work::exclusive(move |state| done.complete(f(state))))?;
		completion.wait_async().await
	}

	/// Awaits [`Self::shared`] without blocking the calling thread.
	pub async fn shared_async<F, R>(&self, f: F) -> Result<R, PoolError>
	where
		F: FnOnce(&S) -> R + Send + 'static,
		R: Send + 'static,
	{
		let completion = self.enqueue(|done| Work::shared(move |state| done.complete(f(state))))?;
		completion.wait_async().await
	}

	/// Awaits an exclusive unit, giving up with [`PoolError::Cancelled`] once `token` fires.
	pub async fn exclusive_cancellable<F, R>(&self, token: &CancellationToken, f: F) -> Result<R, PoolError>
	where
		F: FnOnce(&mut S) -> R + Send + 'static,
		R: Send + 'static,
	{
		let completion = self.enqueue(|done| Work::exclusive(move |state| done.complete(f(state))))?;
		await_or_cancel(&completion, token).await
	}

	/// Awaits a shared unit, giving up with [`PoolError::Cancelled`] once `token` fires.
	pub async fn shared_cancellable<F, R>(&self, token: &CancellationToken, f: F) -> Result<R, PoolError>
	where
		F: FnOnce(&S) -> R + Send + 'static,
		R: Send + 'static,
	{
		let completion = self.enqueue(|done| Work::shared(move |state| done.complete(f(state))))?;
		await_or_cancel(&completion, token).await
	}

	/// Runs a prebuilt unit of work and blocks until it finished.
	pub fn execute(&self, work: Work<S>) -> Result<(), PoolError> {
		self.enqueue(|done| work.then(move || done.complete(())))?.wait()
	}

	fn enqueue<R>(&self, build: impl FnOnce(Done<R>) -> Work<S>) -> Result<Arc<Completion<R>>, PoolError>
	where
		R: Send + 'static,
	{
		let completion = Arc::new(Completion::new());
		let work = build(Done {
			completion: Arc::clone(&completion),
			counters: Arc::clone(&self.counters),
		});
		let access = work.access();
		let signal: Arc<dyn Signal> = Arc::clone(&completion) as Arc<dyn Signal>;
		self.sender.send(Job { work, signal }).map_err(|_| PoolError::Closed)?;
		tracing::trace!(pool = %self.name, access = access.as_str(), "pool.submit");
		Ok(completion)
	}

	/// Returns the number of worker threads.
	pub fn workers(&self) -> usize {
		self.size
	}

	/// Returns a snapshot of queue depth and outcome counters.
	pub fn stats(&self) -> PoolStats {
		self.counters.snapshot(self.size, self.sender.len())
	}

	/// Returns true once the pool stopped accepting work.
	pub fn is_closed(&self) -> bool {
		self.sender.is_closed()
	}

	/// Stops accepting work. Already queued units still run.
	pub fn close(&self) {
		if !self.sender.is_closed() {
			tracing::debug!(pool = %self.name, pending = self.sender.len(), "pool.close");
		}
		self.sender.close();
	}

	/// Closes the pool and joins every worker once the queue drained.
	pub fn shutdown(&self) {
		self.close();
		let handles = std::mem::take(&mut *self.workers.lock());
		if handles.is_empty() {
			return;
		}
		let current = std::thread::current().id();
		for handle in handles {
			// The last handle can be dropped from inside a unit of work.
			if handle.thread().id() == current {
				continue;
			}
			if handle.join().is_err() {
				tracing::warn!(pool = %self.name, "pool.worker.join_failed");
			}
		}
		tracing::debug!(pool = %self.name, "pool.shutdown");
	}
}

impl<S> Drop for GuardedPool<S> {
	fn drop(&mut self) {
		self.sender.close();
		let handles = std::mem::take(&mut *self.workers.lock());
		let current = std::thread::current().id();
		for handle in handles {
			if handle.thread().id() != current {
				let _ = handle.join();
			}
		}
	}
}

impl<S> fmt::Debug for GuardedPool<S> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("GuardedPool")
			.field("name", &self.name)
			.field("workers", &self.size)
			.field("pending", &self.sender.len())
			.field("closed", &self.sender.is_closed())
			.finish()
	}
}

async fn await_or_cancel<R>(completion: &Completion<R>, token: &CancellationToken) -> Result<R, PoolError> {
	tokio::select! {
		biased;
		result = completion.wait_async() => result,
		() = token.cancelled() => {
			completion.abandon();
			tracing::warn!("pool.wait.cancelled");
			Err(PoolError::Cancelled)
		}
	}
}

fn log_deadline<R>(pool: &str, access: Access, result: &Result<R, PoolError>) {
	if matches!(result, Err(PoolError::DeadlineElapsed)) {
		tracing::warn!(pool, access = access.as_str(), "pool.wait.deadline_elapsed");
	}
}

fn run_worker<S>(index: usize, receiver: WorkReceiver<Job<S>>, state: Arc<RwLock<S>>, counters: Arc<PoolCounters>) {
	tracing::trace!(worker = index, "pool.worker.start");
	while let Some(Job { work, signal }) = receiver.recv() {
		let access = work.access();
		if signal.is_abandoned() {
			counters.record_abandoned();
			tracing::trace!(worker = index, access = access.as_str(), "pool.work.skipped");
			continue;
		}

		// parking_lot locks do not poison, so the lock is usable after a panic.
		if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| work.run(&state))) {
			let message = panic_message(&*payload).unwrap_or_else(|| "<unknown panic>".to_string());
			tracing::warn!(worker = index, access = access.as_str(), %message, "pool.work.panicked");
			counters.record_panicked();
			signal.fail(PoolError::Panicked(message));
		}
	}
	tracing::trace!(worker = index, "pool.worker.stop");
}
