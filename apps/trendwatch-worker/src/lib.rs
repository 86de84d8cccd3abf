pub mod jobs;
pub mod scheduler;

use std::{path::PathBuf, sync::Arc};

use clap::Parser;

use trendwatch_service::{TrendService, pg};
use trendwatch_storage::db::Db;

use crate::{
	jobs::{MaterializedViewRefreshJob, TrendBatchJob},
	scheduler::PeriodicJob,
};

#[derive(Debug, Parser)]
#[command(
	version = trendwatch_cli::VERSION,
	rename_all = "kebab",
	styles = trendwatch_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Run a single batch and exit instead of scheduling.
	#[arg(long)]
	pub once: bool,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = trendwatch_config::load(&args.config)?;

	trendwatch_cli::init_tracing(&config.service.log_level);

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema(config.storage.vectors.vector_dim).await?;

	let (store, index) = pg::adapters(Arc::new(db), &config.storage.vectors.items_table);
	let service = Arc::new(TrendService::new(config, store, index));

	if args.once {
		let result = service.run_batch().await;

		println!("{}", serde_json::to_string_pretty(&result)?);

		return Ok(());
	}

	let scheduler_cfg = service.cfg.scheduler.clone();
	let mut jobs = vec![PeriodicJob::from_minutes(
		Arc::new(TrendBatchJob::new(service.clone())),
		scheduler_cfg.trend_interval_minutes,
	)];

	if scheduler_cfg.refresh_enabled {
		jobs.push(PeriodicJob::from_minutes(
			Arc::new(MaterializedViewRefreshJob::new(service.clone())),
			scheduler_cfg.refresh_interval_minutes,
		));
	}

	for job in &jobs {
		job.start();
	}

	tracing::info!(jobs = jobs.len(), "Worker running.");
	tokio::signal::ctrl_c().await?;
	tracing::info!("Shutdown signal received. Draining jobs.");

	for job in &jobs {
		job.shutdown().await;
	}

	Ok(())
}
