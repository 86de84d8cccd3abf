//! One batch run of trend detection, from ingest to persistence.

use std::{fmt, time::Instant};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use trendwatch_domain::{
	ClusterParams, NormalizedQuery, RawQuery, ScoringParams, Trend, cluster, score,
};

use crate::{Error, ResponseStatus, Result, TrendService, vectorize};

pub const INSUFFICIENT_DATA: &str = "Insufficient data for clustering";
pub const NO_CLUSTERS: &str = "No semantic clusters found";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
	Ingest,
	Normalize,
	Vectorize,
	Cluster,
	Score,
	Enrich,
	Persist,
	Done,
}
impl fmt::Display for Stage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Ingest => "ingest",
			Self::Normalize => "normalize",
			Self::Vectorize => "vectorize",
			Self::Cluster => "cluster",
			Self::Score => "score",
			Self::Enrich => "enrich",
			Self::Persist => "persist",
			Self::Done => "done",
		};

		f.write_str(name)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
	pub status: ResponseStatus,
	pub trends_identified: usize,
	pub total_queries_processed: usize,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}
impl BatchResult {
	pub fn success(trends_identified: usize, total_queries_processed: usize) -> Self {
		Self {
			status: ResponseStatus::Success,
			trends_identified,
			total_queries_processed,
			message: None,
			error: None,
		}
	}

	pub fn skipped(total_queries_processed: usize, message: &str) -> Self {
		Self {
			message: Some(message.to_string()),
			..Self::success(0, total_queries_processed)
		}
	}

	/// Counts are zeroed on failure.
	pub fn failure(err: &Error) -> Self {
		Self {
			status: ResponseStatus::Error,
			trends_identified: 0,
			total_queries_processed: 0,
			message: None,
			error: Some(err.to_string()),
		}
	}

	pub fn is_success(&self) -> bool {
		self.status == ResponseStatus::Success
	}
}

impl TrendService {
	/// Runs one batch against the current wall clock. Never returns an error; failures are
	/// reported in the result and logged.
	pub async fn run_batch(&self) -> BatchResult {
		self.run_batch_at(OffsetDateTime::now_utc()).await
	}

	/// Runs one batch, scoring recency relative to `now`.
	pub async fn run_batch_at(&self, now: OffsetDateTime) -> BatchResult {
		let started = Instant::now();
		let mut stage = Stage::Ingest;

		tracing::info!("Trend batch started.");

		match self.execute_batch(now, &mut stage).await {
			Ok(result) => {
				tracing::info!(
					trends_identified = result.trends_identified,
					total_queries_processed = result.total_queries_processed,
					outcome = result.message.as_deref().unwrap_or("persisted"),
					elapsed_ms = started.elapsed().as_millis() as u64,
					"Trend batch finished."
				);

				result
			},
			Err(err) => {
				tracing::error!(stage = %stage, error = %err, "Trend batch failed.");

				BatchResult::failure(&err)
			},
		}
	}

	async fn execute_batch(&self, now: OffsetDateTime, stage: &mut Stage) -> Result<BatchResult> {
		let trends_cfg = &self.cfg.trends;
		let min_cluster_size = trends_cfg.min_cluster_size as usize;
		let raw =
			self.store.read_queries(trends_cfg.batch_interval_minutes, trends_cfg.max_rows).await?;
		let total = raw.len();

		if total < min_cluster_size {
			tracing::info!(count = total, "Not enough queries for clustering.");

			return Ok(BatchResult::skipped(total, INSUFFICIENT_DATA));
		}

		*stage = Stage::Normalize;

		let normalized = normalize_batch(raw);

		if normalized.len() < min_cluster_size {
			return Ok(BatchResult::skipped(total, INSUFFICIENT_DATA));
		}

		*stage = Stage::Vectorize;

		let vectorized = vectorize::vectorize(
			self.providers.embedding.as_ref(),
			&self.cfg.providers.embedding,
			normalized,
		)
		.await?;

		if vectorized.queries.len() < min_cluster_size {
			return Err(Error::Embedding {
				message: format!(
					"Only {} of {total} queries received embeddings.",
					vectorized.queries.len()
				),
			});
		}

		*stage = Stage::Cluster;

		let embedded = vectorized.queries;
		let vectors: Vec<&[f32]> = embedded.iter().map(|query| &*query.embedding).collect();
		let clusters = cluster::cluster_embeddings(&vectors, ClusterParams::from(trends_cfg));

		tracing::debug!(clusters = clusters.len(), points = embedded.len(), "Clustering finished.");

		if clusters.is_empty() {
			return Ok(BatchResult::skipped(total, NO_CLUSTERS));
		}

		*stage = Stage::Score;

		let mut trends =
			score::score_clusters(&clusters, &embedded, &ScoringParams::from(trends_cfg), now);

		*stage = Stage::Enrich;

		self.enrich(&mut trends).await;

		*stage = Stage::Persist;

		let batch_timestamp = OffsetDateTime::now_utc();
		let written = self.store.write_trends(&trends, batch_timestamp).await?;

		*stage = Stage::Done;

		Ok(BatchResult::success(written, total))
	}

	async fn enrich(&self, trends: &mut [Trend]) {
		for trend in trends.iter_mut() {
			trend.representative_query_generated =
				self.generate_phrase(&trend.top_query_texts()).await;
		}
	}
}

/// Normalizes raw queries, dropping any that normalize to nothing.
pub fn normalize_batch(raw: Vec<RawQuery>) -> Vec<NormalizedQuery> {
	raw.into_iter()
		.map(NormalizedQuery::from_raw)
		.filter(|query| !query.normalized_text.is_empty())
		.collect()
}
