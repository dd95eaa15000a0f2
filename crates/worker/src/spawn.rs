use std::thread::JoinHandle;

/// Spawns a dedicated named OS thread for one pool worker.
pub(crate) fn spawn_worker_thread<F>(name: String, f: F) -> std::io::Result<JoinHandle<()>>
where
	F: FnOnce() + Send + 'static,
{
	tracing::trace!(thread = %name, "worker.spawn_thread");
	std::thread::Builder::new().name(name).spawn(f)
}
