//! Tailla registry soak driver.
//!
//! Spawns caller threads that behave like connection handlers: register
//! sessions, flip readiness, pair within a region, and disconnect. Reports the
//! registry's counts and worker statistics at the end.

use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tailla_chat::{RegistryConfig, Session, SessionMap, SessionRegistry};
use tracing::info;

/// Soak command line arguments.
#[derive(Parser, Debug)]
#[command(name = "tailla-soak")]
#[command(about = "Exercise the session registry from concurrent callers")]
struct Args {
	/// Registry configuration file (TOML)
	#[arg(short, long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Worker threads, overriding the configuration file
	#[arg(short, long)]
	workers: Option<usize>,

	/// Concurrent caller threads
	#[arg(long, default_value_t = 16)]
	callers: usize,

	/// Sessions owned by each caller
	#[arg(long, default_value_t = 64)]
	sessions: usize,

	/// Number of distinct regions
	#[arg(long, default_value_t = 4)]
	regions: usize,

	/// Passes each caller makes over its sessions
	#[arg(long, default_value_t = 20)]
	rounds: usize,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

/// Deterministic pseudo-random source so runs are reproducible per caller.
struct Xorshift64(u64);

impl Xorshift64 {
	fn new(seed: u64) -> Self {
		Self(seed.max(1))
	}

	fn next(&mut self) -> u64 {
		let mut x = self.0;
		x ^= x << 13;
		x ^= x >> 7;
		x ^= x << 17;
		self.0 = x;
		x
	}

	fn next_usize(&mut self, bound: usize) -> usize {
		(self.next() % bound as u64) as usize
	}
}

#[derive(Debug, Default)]
struct CallerReport {
	registered: usize,
	paired: usize,
	closed: usize,
}

fn main() -> anyhow::Result<()> {
	let args = Args::parse();
	setup_tracing(args.verbose);

	let mut config = match &args.config {
		Some(path) => RegistryConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
		None => RegistryConfig::default(),
	};
	if let Some(workers) = args.workers {
		config = config.with_workers(workers);
	}
	config.validate()?;

	info!(workers = config.worker_count(), callers = args.callers, sessions = args.sessions, "starting soak");
	let registry = SessionMap::with_config(config)?;
	let regions = args.regions.max(1);
	let started = Instant::now();

	let reports = thread::scope(|scope| {
		let handles: Vec<_> = (0..args.callers)
			.map(|caller| {
				let registry = &registry;
				scope.spawn(move || run_caller(registry, caller, args.sessions, regions, args.rounds))
			})
			.collect();
		handles
			.into_iter()
			.map(|h| h.join().unwrap_or_else(|_| Err(anyhow::anyhow!("caller thread panicked"))))
			.collect::<anyhow::Result<Vec<_>>>()
	})?;

	let totals = reports.iter().fold(CallerReport::default(), |acc, r| CallerReport {
		registered: acc.registered + r.registered,
		paired: acc.paired + r.paired,
		closed: acc.closed + r.closed,
	});
	let counts = registry.ready_and_chatting()?;
	let remaining = registry.len()?;
	let stats = registry.stats();

	info!(
		elapsed_ms = started.elapsed().as_millis() as u64,
		registered = totals.registered,
		paired = totals.paired,
		closed = totals.closed,
		remaining,
		ready = counts.ready,
		chatting = counts.chatting,
		"soak finished"
	);
	info!(
		workers = stats.workers,
		completed = stats.completed,
		abandoned = stats.abandoned,
		panicked = stats.panicked,
		"registry pool stats"
	);

	registry.shutdown();
	Ok(())
}

fn run_caller(registry: &SessionMap, caller: usize, sessions: usize, regions: usize, rounds: usize) -> anyhow::Result<CallerReport> {
	let mut rng = Xorshift64::new(0x9E37_79B9_7F4A_7C15 ^ caller as u64);
	let mut report = CallerReport::default();

	for round in 0..rounds {
		for slot in 0..sessions {
			let id = format!("c{caller}-s{slot}");
			let Some(session) = registry.get(&id)? else {
				let region = format!("region-{}", rng.next_usize(regions));
				registry.set(&id, Session::new(id.as_str(), region).into_shared())?;
				report.registered += 1;
				continue;
			};

			match rng.next_usize(4) {
				0 => {
					session.leave_room();
					registry.close(&id)?;
					report.closed += 1;
				}
				_ if session.is_chatting() => {
					session.leave_room();
				}
				_ => {
					session.set_ready(true);
					if registry.match_in_region(&id)?.is_some() {
						report.paired += 1;
					}
				}
			}
		}
		tracing::debug!(caller, round, "caller round done");
	}
	Ok(report)
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("tailla_soak=debug,tailla_chat=debug,tailla_worker=debug,info")
		} else {
			EnvFilter::new("tailla_soak=info,warn")
		}
	});

	tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}
