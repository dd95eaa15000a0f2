use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tailla_worker::{CancellationToken, GuardedPool, PoolStats};

use crate::config::RegistryConfig;
use crate::error::Result;
use crate::matchmaking::pair_in_region;
use crate::registry::{ReadinessCounts, SessionRegistry, Sessions, collect_ready_ids, collect_ready_ids_in, count_ready_and_chatting};
use crate::session::{Room, Session};

/// Session table served by a fixed pool of worker threads.
///
/// Every operation is a closure submitted through [`Self::action`] (write lock)
/// or [`Self::raction`] (read lock). The caller blocks until a worker has run
/// it. Closures must not call back into the same map.
pub struct SessionMap {
	pool: GuardedPool<Sessions>,
}

impl SessionMap {
	/// Creates a map with one worker per available CPU.
	pub fn new() -> Result<Self> {
		Self::with_config(RegistryConfig::default())
	}

	/// Fails with [`ConfigError::InvalidWorkers`](crate::ConfigError::InvalidWorkers) when `config` asks for zero
	/// workers.
	pub fn with_config(config: RegistryConfig) -> Result<Self> {
		config.validate()?;
		let pool = GuardedPool::new(Sessions::new(), config.pool_config())?;
		tracing::debug!(workers = pool.workers(), "registry.start");
		Ok(Self { pool })
	}

	/// Runs `f` with exclusive access to the table.
	pub fn action<F, R>(&self, f: F) -> Result<R>
	where
		F: FnOnce(&mut Sessions) -> R + Send + 'static,
		R: Send + 'static,
	{
		Ok(self.pool.exclusive(f)?)
	}

	/// Runs `f` with shared access to the table.
	pub fn raction<F, R>(&self, f: F) -> Result<R>
	where
		F: FnOnce(&Sessions) -> R + Send + 'static,
		R: Send + 'static,
	{
		Ok(self.pool.shared(f)?)
	}

	/// [`Self::action`] that gives up at `deadline`.
	pub fn action_until<F, R>(&self, deadline: Instant, f: F) -> Result<R>
	where
		F: FnOnce(&mut Sessions) -> R + Send + 'static,
		R: Send + 'static,
	{
		Ok(self.pool.exclusive_until(deadline, f)?)
	}

	/// [`Self::raction`] that gives up at `deadline`.
	pub fn raction_until<F, R>(&self, deadline: Instant, f: F) -> Result<R>
	where
		F: FnOnce(&Sessions) -> R + Send + 'static,
		R: Send + 'static,
	{
		Ok(self.pool.shared_until(deadline, f)?)
	}

	pub async fn action_async<F, R>(&self, f: F) -> Result<R>
	where
		F: FnOnce(&mut Sessions) -> R + Send + 'static,
		R: Send + 'static,
	{
		Ok(self.pool.exclusive_async(f).await?)
	}

	pub async fn raction_async<F, R>(&self, f: F) -> Result<R>
	where
		F: FnOnce(&Sessions) -> R + Send + 'static,
		R: Send + 'static,
	{
		Ok(self.pool.shared_async(f).await?)
	}

	/// [`Self::action_async`] that gives up once `token` is cancelled.
	pub async fn action_cancellable<F, R>(&self, token: &CancellationToken, f: F) -> Result<R>
	where
		F: FnOnce(&mut Sessions) -> R + Send + 'static,
		R: Send + 'static,
	{
		Ok(self.pool.exclusive_cancellable(token, f).await?)
	}

	/// [`Self::raction_async`] that gives up once `token` is cancelled.
	pub async fn raction_cancellable<F, R>(&self, token: &CancellationToken, f: F) -> Result<R>
	where
		F: FnOnce(&Sessions) -> R + Send + 'static,
		R: Send + 'static,
	{
		Ok(self.pool.shared_cancellable(token, f).await?)
	}

	pub async fn set_async(&self, id: &str, session: Arc<Session>) -> Result<()> {
		tracing::trace!(id, "registry.set");
		let id = id.to_string();
		self.action_async(move |sessions| {
			sessions.insert(id, session);
		})
		.await
	}

	pub async fn get_async(&self, id: &str) -> Result<Option<Arc<Session>>> {
		tracing::trace!(id, "registry.get");
		let id = id.to_string();
		self.raction_async(move |sessions| sessions.get(&id).cloned()).await
	}

	pub async fn close_async(&self, id: &str) -> Result<()> {
		tracing::trace!(id, "registry.close");
		let id = id.to_string();
		self.action_async(move |sessions| {
			sessions.remove(&id);
		})
		.await
	}

	/// Pairs `seeker_id` with another ready session in its region.
	///
	/// Runs under exclusive access, so concurrent seekers never claim the same
	/// partner. Both sessions stop being ready and share the returned room.
	pub fn match_in_region(&self, seeker_id: &str) -> Result<Option<Arc<Room>>> {
		tracing::trace!(id = seeker_id, "registry.match_in_region");
		let seeker_id = seeker_id.to_string();
		self.action(move |sessions| pair_in_region(sessions, &seeker_id))
	}

	/// Worker pool activity counters.
	pub fn stats(&self) -> PoolStats {
		self.pool.stats()
	}

	pub fn is_closed(&self) -> bool {
		self.pool.is_closed()
	}

	/// Stops accepting operations and joins the workers after queued ones ran.
	pub fn shutdown(&self) {
		self.pool.shutdown();
		tracing::debug!("registry.shutdown");
	}
}

impl SessionRegistry for SessionMap {
	fn set(&self, id: &str, session: Arc<Session>) -> Result<()> {
		tracing::trace!(id, "registry.set");
		let id = id.to_string();
		self.action(move |sessions| {
			sessions.insert(id, session);
		})
	}

	fn get(&self, id: &str) -> Result<Option<Arc<Session>>> {
		tracing::trace!(id, "registry.get");
		let id = id.to_string();
		self.raction(move |sessions| sessions.get(&id).cloned())
	}

	fn close(&self, id: &str) -> Result<()> {
		tracing::trace!(id, "registry.close");
		let id = id.to_string();
		self.action(move |sessions| {
			sessions.remove(&id);
		})
	}

	fn ready_ids(&self) -> Result<HashSet<String>> {
		tracing::trace!("registry.ready_ids");
		self.raction(collect_ready_ids)
	}

	fn ready_ids_by_region(&self, region: &str) -> Result<HashSet<String>> {
		tracing::trace!(region, "registry.ready_ids_by_region");
		let region = region.to_string();
		self.raction(move |sessions| collect_ready_ids_in(sessions, &region))
	}

	fn ready_and_chatting(&self) -> Result<ReadinessCounts> {
		tracing::trace!("registry.ready_and_chatting");
		self.raction(count_ready_and_chatting)
	}

	fn len(&self) -> Result<usize> {
		tracing::trace!("registry.len");
		self.raction(Sessions::len)
	}
}

impl fmt::Debug for SessionMap {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SessionMap").field("pool", &self.pool).finish()
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;
	use crate::error::{ConfigError, RegistryError};

	/// Log sink shared between a test and its `fmt` subscriber.
	#[derive(Clone, Default)]
	struct Captured(Arc<parking_lot::Mutex<Vec<u8>>>);

	impl std::io::Write for Captured {
		fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
			self.0.lock().extend_from_slice(buf);
			Ok(buf.len())
		}

		fn flush(&mut self) -> std::io::Result<()> {
			Ok(())
		}
	}

	impl Captured {
		fn text(&self) -> String {
			String::from_utf8_lossy(&self.0.lock()).into_owned()
		}
	}

	fn map() -> SessionMap {
		SessionMap::with_config(RegistryConfig::default().with_workers(2)).unwrap()
	}

	#[test]
	fn set_then_get_returns_same_record() {
		let map = map();
		let session = Session::new("a", "uk").into_shared();
		map.set("a", Arc::clone(&session)).unwrap();

		let stored = map.get("a").unwrap().expect("a was registered");
		assert!(Arc::ptr_eq(&stored, &session));
		assert!(map.get("b").unwrap().is_none());
	}

	#[test]
	fn last_set_wins() {
		let map = map();
		let first = Session::new("a", "uk").into_shared();
		let second = Session::new("a", "us").into_shared();
		map.set("a", first).unwrap();
		map.set("a", Arc::clone(&second)).unwrap();

		assert!(Arc::ptr_eq(&map.get("a").unwrap().unwrap(), &second));
		assert_eq!(map.len().unwrap(), 1);
	}

	#[test]
	fn close_unknown_id_is_noop() {
		let map = map();
		map.set("a", Session::new("a", "uk").into_shared()).unwrap();
		map.close("nope").unwrap();
		assert_eq!(map.len().unwrap(), 1);
		assert!(map.get("a").unwrap().is_some());
	}

	#[test]
	fn in_place_mutation_is_seen_without_reregistration() {
		let map = map();
		let session = Session::new("a", "uk").into_shared();
		map.set("a", Arc::clone(&session)).unwrap();
		assert!(map.ready_ids().unwrap().is_empty());

		session.set_ready(true);
		assert!(map.ready_ids().unwrap().contains("a"));
	}

	#[test]
	fn action_runs_bulk_operation_atomically() {
		let map = map();
		for id in ["a", "b", "c"] {
			map.set(id, Session::new(id, "uk").with_ready(true).into_shared()).unwrap();
		}
		let cleared = map
			.action(|sessions| {
				let ready: Vec<_> = sessions.values().filter(|s| s.is_ready()).map(|s| s.id().to_string()).collect();
				for id in &ready {
					sessions.remove(id);
				}
				ready.len()
			})
			.unwrap();
		assert_eq!(cleared, 3);
		assert!(map.is_empty().unwrap());
	}

	#[test]
	fn match_in_region_pairs_and_clears_readiness() {
		let map = map();
		map.set("a", Session::new("a", "uk").with_ready(true).into_shared()).unwrap();
		map.set("b", Session::new("b", "uk").with_ready(true).into_shared()).unwrap();

		let room = map.match_in_region("a").unwrap().expect("b is waiting in uk");
		assert!(room.contains("b"));
		assert!(map.ready_ids().unwrap().is_empty());
		assert_eq!(map.ready_and_chatting().unwrap(), ReadinessCounts { ready: 0, chatting: 2 });
		assert!(map.match_in_region("a").unwrap().is_none());
	}

	#[test]
	fn operations_after_shutdown_report_closed() {
		let map = map();
		map.shutdown();
		assert!(map.is_closed());
		assert!(matches!(map.set("a", Session::new("a", "uk").into_shared()), Err(RegistryError::Closed)));
		assert!(matches!(map.get("a"), Err(RegistryError::Closed)));
		assert!(matches!(map.close("a"), Err(RegistryError::Closed)));
		assert!(matches!(map.ready_ids(), Err(RegistryError::Closed)));
		assert!(matches!(map.ready_ids_by_region("uk"), Err(RegistryError::Closed)));
		assert!(matches!(map.ready_and_chatting(), Err(RegistryError::Closed)));
		assert!(matches!(map.match_in_region("a"), Err(RegistryError::Closed)));
	}

	#[test]
	fn panicking_action_surfaces_and_map_keeps_serving() {
		let map = map();
		let result = map.action(|_| -> usize { panic!("broken bulk op") });
		assert!(matches!(result, Err(RegistryError::Panicked(msg)) if msg.contains("broken bulk op")));

		map.set("a", Session::new("a", "uk").into_shared()).unwrap();
		assert_eq!(map.len().unwrap(), 1);
	}

	#[test]
	fn deadline_variant_returns_value_when_in_time() {
		let map = map();
		map.set("a", Session::new("a", "uk").into_shared()).unwrap();
		let len = map.raction_until(Instant::now() + Duration::from_secs(5), |s| s.len()).unwrap();
		assert_eq!(len, 1);
	}

	#[tokio::test]
	async fn async_variants_round_trip() {
		let map = map();
		map.set_async("a", Session::new("a", "uk").with_ready(true).into_shared()).await.unwrap();
		assert_eq!(map.get_async("a").await.unwrap().map(|s| s.region().to_string()), Some("uk".to_string()));

		let token = CancellationToken::new();
		assert_eq!(map.raction_cancellable(&token, |s| s.len()).await.unwrap(), 1);

		map.close_async("a").await.unwrap();
		assert!(map.get_async("a").await.unwrap().is_none());
	}

	#[test]
	fn zero_workers_is_rejected_at_construction() {
		let result = SessionMap::with_config(RegistryConfig::default().with_workers(0));
		assert!(matches!(result, Err(RegistryError::Config(ConfigError::InvalidWorkers))));
	}

	#[test]
	fn every_query_emits_a_trace_event() {
		let captured = Captured::default();
		let writer = captured.clone();
		let subscriber = tracing_subscriber::fmt()
			.with_max_level(tracing::Level::TRACE)
			.with_ansi(false)
			.with_writer(move || writer.clone())
			.finish();

		let map = map();
		tracing::subscriber::with_default(subscriber, || {
			map.get("a").unwrap();
			map.ready_ids().unwrap();
			map.ready_ids_by_region("uk").unwrap();
			map.ready_and_chatting().unwrap();
			map.len().unwrap();
			map.match_in_region("a").unwrap();
		});

		let logs = captured.text();
		for event in ["registry.get", "registry.ready_ids_by_region", "registry.ready_and_chatting", "registry.len", "registry.match_in_region"] {
			assert!(logs.contains(event), "no {event} event in:\n{logs}");
		}
		assert_eq!(logs.lines().filter(|line| line.contains("registry.ready_ids")).count(), 2, "{logs}");
		assert!(logs.lines().any(|line| line.contains("registry.ready_ids_by_region") && line.contains("region=")), "{logs}");
	}
}
