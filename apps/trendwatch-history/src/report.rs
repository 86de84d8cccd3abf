//! JSON report of one offline clustering pass.

use std::collections::HashSet;

use serde::Serialize;
use time::OffsetDateTime;

use trendwatch_domain::{Clusters, EmbeddedQuery, Trend};

pub const DEFAULT_SAMPLE_SIZE: usize = 5;

#[derive(Debug, Serialize)]
pub struct HistoryReport {
	#[serde(with = "trendwatch_domain::time_serde")]
	pub generated_at: OffsetDateTime,
	pub total_queries: usize,
	pub embedded_queries: usize,
	pub dropped_queries: usize,
	/// Embedded queries that joined no cluster.
	pub noise_queries: usize,
	/// Largest first.
	pub clusters: Vec<ClusterReport>,
	/// What a batch over the same rows would persist.
	pub trends: Vec<Trend>,
}
impl HistoryReport {
	pub fn build(
		total_queries: usize,
		dropped_queries: usize,
		queries: &[EmbeddedQuery],
		clusters: &Clusters,
		trends: Vec<Trend>,
		sample_size: usize,
		generated_at: OffsetDateTime,
	) -> Self {
		let mut reports: Vec<ClusterReport> = clusters
			.iter()
			.map(|(&cluster_id, members)| {
				ClusterReport::build(cluster_id, members, queries, sample_size)
			})
			.collect();

		reports.sort_by(|a, b| b.size.cmp(&a.size).then(a.cluster_id.cmp(&b.cluster_id)));

		let clustered: usize = reports.iter().map(|report| report.size).sum();

		Self {
			generated_at,
			total_queries,
			embedded_queries: queries.len(),
			dropped_queries,
			noise_queries: queries.len().saturating_sub(clustered),
			clusters: reports,
			trends,
		}
	}
}

#[derive(Debug, Serialize)]
pub struct ClusterReport {
	pub cluster_id: usize,
	pub size: usize,
	pub unique_queries: usize,
	/// Distinct member texts in first-seen order.
	pub sample_queries: Vec<String>,
}
impl ClusterReport {
	fn build(
		cluster_id: usize,
		members: &[usize],
		queries: &[EmbeddedQuery],
		sample_size: usize,
	) -> Self {
		let mut seen = HashSet::new();
		let mut distinct = Vec::new();
		let mut size = 0;

		for query in members.iter().filter_map(|&idx| queries.get(idx)) {
			size += 1;

			if seen.insert(query.text()) {
				distinct.push(query.text().to_string());
			}
		}

		let unique_queries = distinct.len();

		distinct.truncate(sample_size);

		Self { cluster_id, size, unique_queries, sample_queries: distinct }
	}
}
