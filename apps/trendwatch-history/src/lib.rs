pub mod report;

use std::{fs, path::PathBuf, sync::Arc, time::Instant};

use clap::Parser;
use time::OffsetDateTime;

use trendwatch_domain::{ClusterParams, ScoringParams, cluster, score};
use trendwatch_service::{Providers, QueryStore, pg::PgQueryStore, pipeline, vectorize};
use trendwatch_storage::db::Db;

use crate::report::HistoryReport;

#[derive(Debug, Parser)]
#[command(
	version = trendwatch_cli::VERSION,
	rename_all = "kebab",
	styles = trendwatch_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Cap on the newest rows read. Reads the full history when absent.
	#[arg(long, value_name = "N")]
	pub max_rows: Option<u32>,
	/// Report destination. Prints to stdout when absent.
	#[arg(long, short = 'o', value_name = "FILE")]
	pub output: Option<PathBuf>,
	#[arg(long, value_name = "N", default_value_t = report::DEFAULT_SAMPLE_SIZE)]
	pub sample_size: usize,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = trendwatch_config::load(&args.config)?;

	trendwatch_cli::init_tracing(&config.service.log_level);

	let started = Instant::now();
	let db = Db::connect(&config.storage.postgres).await?;
	let store = PgQueryStore::new(Arc::new(db));
	let raw = store.read_queries(None, args.max_rows).await?;
	let total = raw.len();

	tracing::info!(count = total, "History loaded.");

	let normalized = pipeline::normalize_batch(raw);
	let providers = Providers::default();
	let vectorized =
		vectorize::vectorize(providers.embedding.as_ref(), &config.providers.embedding, normalized)
			.await?;
	let vectors: Vec<&[f32]> = vectorized.queries.iter().map(|query| &*query.embedding).collect();
	let clusters = cluster::cluster_embeddings(&vectors, ClusterParams::from(&config.trends));
	let now = OffsetDateTime::now_utc();
	let trends = score::score_clusters(
		&clusters,
		&vectorized.queries,
		&ScoringParams::from(&config.trends),
		now,
	);
	let report = HistoryReport::build(
		total,
		vectorized.dropped,
		&vectorized.queries,
		&clusters,
		trends,
		args.sample_size,
		now,
	);

	tracing::info!(
		clusters = report.clusters.len(),
		noise = report.noise_queries,
		elapsed_ms = started.elapsed().as_millis() as u64,
		"History clustered."
	);

	let json = serde_json::to_string_pretty(&report)?;

	match &args.output {
		Some(path) => {
			fs::write(path, json)?;

			tracing::info!(path = %path.display(), "Report written.");
		},
		None => println!("{json}"),
	}

	Ok(())
}
