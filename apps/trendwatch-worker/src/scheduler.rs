//! Fixed-interval job scheduling with single-flight invocations.

use std::{
	sync::{
		Arc, Mutex,
		atomic::{AtomicBool, Ordering},
	},
	time::Duration,
};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use trendwatch_service::BoxFuture;

/// Work driven by a [`PeriodicJob`].
pub trait ScheduledJob
where
	Self: Send + Sync + 'static,
{
	fn name(&self) -> &str;

	fn run_once<'a>(&'a self) -> BoxFuture<'a, color_eyre::Result<()>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
	Ran,
	/// Another invocation was in flight, so this one was dropped.
	Coalesced,
}

/// Why a scheduler loop ended. Job panics are contained per invocation, so `Panicked` means the
/// loop task itself died.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobExit {
	Cancelled,
	Panicked,
}

struct Shared {
	job: Arc<dyn ScheduledJob>,
	in_flight: AtomicBool,
}
impl Shared {
	async fn invoke(&self) -> TriggerOutcome {
		if self
			.in_flight
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.is_err()
		{
			tracing::info!(job = self.job.name(), "Invocation coalesced into the running one.");

			return TriggerOutcome::Coalesced;
		}

		let _guard = InFlightGuard(&self.in_flight);
		let job = self.job.clone();

		// Each invocation gets its own task so a panic stays inside it.
		match tokio::spawn(async move { job.run_once().await }).await {
			Ok(Ok(())) => {},
			Ok(Err(err)) => {
				tracing::error!(job = self.job.name(), error = %err, "Scheduled job failed.");
			},
			Err(err) if err.is_panic() => {
				tracing::error!(job = self.job.name(), error = %err, "Scheduled job panicked.");
			},
			Err(err) => {
				tracing::error!(job = self.job.name(), error = %err, "Scheduled job was aborted.");
			},
		}

		TriggerOutcome::Ran
	}
}

struct InFlightGuard<'a>(&'a AtomicBool);
impl Drop for InFlightGuard<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

struct Running {
	token: CancellationToken,
	handle: JoinHandle<JobExit>,
}
impl Running {
	fn is_live(&self) -> bool {
		!self.token.is_cancelled() && !self.handle.is_finished()
	}
}

/// Runs a job now and then every `interval`, one invocation at a time.
///
/// Stopping drains: an invocation already in flight runs to completion and the loop exits at its
/// next sleep.
pub struct PeriodicJob {
	shared: Arc<Shared>,
	interval: Duration,
	running: Mutex<Option<Running>>,
}
impl PeriodicJob {
	pub fn new(job: Arc<dyn ScheduledJob>, interval: Duration) -> Self {
		Self {
			shared: Arc::new(Shared { job, in_flight: AtomicBool::new(false) }),
			interval,
			running: Mutex::new(None),
		}
	}

	pub fn from_minutes(job: Arc<dyn ScheduledJob>, minutes: u64) -> Self {
		Self::new(job, Duration::from_secs(minutes.saturating_mul(60)))
	}

	pub fn name(&self) -> &str {
		self.shared.job.name()
	}

	/// Spawns the loop. Returns `false` without spawning when it is already running.
	pub fn start(&self) -> bool {
		let mut running = self.running.lock().unwrap_or_else(|err| err.into_inner());

		if running.as_ref().is_some_and(Running::is_live) {
			return false;
		}

		let token = CancellationToken::new();
		let handle = tokio::spawn(run_loop(self.shared.clone(), self.interval, token.clone()));

		*running = Some(Running { token, handle });

		tracing::info!(job = self.name(), interval_secs = self.interval.as_secs(), "Job started.");

		true
	}

	/// Requests cancellation without waiting for an in-flight invocation.
	pub fn stop(&self) {
		let running = self.running.lock().unwrap_or_else(|err| err.into_inner());

		if let Some(running) = running.as_ref()
			&& !running.token.is_cancelled()
		{
			running.token.cancel();

			tracing::info!(job = self.name(), "Job stop requested.");
		}
	}

	pub fn is_running(&self) -> bool {
		let running = self.running.lock().unwrap_or_else(|err| err.into_inner());

		running.as_ref().is_some_and(Running::is_live)
	}

	/// Runs one invocation now unless one is already in flight.
	pub async fn trigger(&self) -> TriggerOutcome {
		self.shared.invoke().await
	}

	/// Stops the loop and waits for it to drain. `None` when it was never started.
	pub async fn shutdown(&self) -> Option<JobExit> {
		let running = self.running.lock().unwrap_or_else(|err| err.into_inner()).take()?;

		running.token.cancel();

		let exit = match running.handle.await {
			Ok(exit) => exit,
			Err(err) => {
				tracing::error!(job = self.name(), error = %err, "Job loop did not exit cleanly.");

				JobExit::Panicked
			},
		};

		tracing::info!(job = self.name(), exit = ?exit, "Job shut down.");

		Some(exit)
	}
}
impl Drop for PeriodicJob {
	fn drop(&mut self) {
		if let Some(running) = self.running.get_mut().unwrap_or_else(|err| err.into_inner()).take()
		{
			running.token.cancel();
		}
	}
}

async fn run_loop(shared: Arc<Shared>, interval: Duration, token: CancellationToken) -> JobExit {
	loop {
		if token.is_cancelled() {
			break;
		}

		shared.invoke().await;

		tokio::select! {
			_ = token.cancelled() => break,
			_ = tokio::time::sleep(interval) => {},
		}
	}

	tracing::debug!(job = shared.job.name(), "Job loop cancelled.");

	JobExit::Cancelled
}
