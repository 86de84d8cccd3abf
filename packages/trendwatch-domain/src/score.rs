//! Volume and recency scoring of clusters into ranked trends.

use std::collections::HashMap;

use time::OffsetDateTime;

use crate::{
	EmbeddedQuery, TopQuery, Trend,
	cluster::Clusters,
	vector::{self, round4},
};

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringParams {
	pub min_cluster_size: usize,
	pub top_n_trends: usize,
	pub volume_weight: f64,
	pub recency_weight: f64,
	pub recency_decay_minutes: f64,
	pub top_query_count: usize,
}
impl Default for ScoringParams {
	fn default() -> Self {
		Self::from(&trendwatch_config::Trends::default())
	}
}
impl From<&trendwatch_config::Trends> for ScoringParams {
	fn from(cfg: &trendwatch_config::Trends) -> Self {
		Self {
			min_cluster_size: cfg.min_cluster_size as usize,
			top_n_trends: cfg.top_n_trends as usize,
			volume_weight: cfg.volume_weight,
			recency_weight: cfg.recency_weight,
			recency_decay_minutes: cfg.recency_decay_minutes,
			top_query_count: cfg.top_query_count as usize,
		}
	}
}

/// Scores every cluster large enough to matter and returns the top trends, best first.
///
/// Ties keep cluster id order. Out-of-range member indices are ignored.
pub fn score_clusters(
	clusters: &Clusters,
	queries: &[EmbeddedQuery],
	params: &ScoringParams,
	now: OffsetDateTime,
) -> Vec<Trend> {
	let mut trends = Vec::new();

	for indices in clusters.values() {
		let members: Vec<&EmbeddedQuery> =
			indices.iter().filter_map(|&idx| queries.get(idx)).collect();

		if members.len() < params.min_cluster_size {
			continue;
		}

		let Some(representative) = representative_member(&members) else {
			continue;
		};
		let top = top_queries(&members, params.top_query_count);
		let unique_query_count = distinct_texts(&members);

		trends.push(Trend {
			representative_query: representative.text().to_string(),
			representative_query_generated: None,
			trend_score: trend_score(&members, params, now),
			query_count: members.len() as u32,
			unique_query_count,
			top_queries: top,
			created_at: now,
		});
	}

	trends.sort_by(|a, b| b.trend_score.total_cmp(&a.trend_score));
	trends.truncate(params.top_n_trends);

	trends
}

/// `round(volume * volume_weight + recency * recency_weight, 4)`.
pub fn trend_score(members: &[&EmbeddedQuery], params: &ScoringParams, now: OffsetDateTime) -> f64 {
	let volume = members.len() as f64;
	let recency = recency_score(
		members.iter().map(|member| member.created_at()),
		params.recency_decay_minutes,
		now,
	);

	round4(volume * params.volume_weight + recency * params.recency_weight)
}

/// Sum of `exp(-age_minutes / decay_minutes)`. Future timestamps count as age zero.
pub fn recency_score<I>(created_at: I, decay_minutes: f64, now: OffsetDateTime) -> f64
where
	I: IntoIterator<Item = OffsetDateTime>,
{
	created_at
		.into_iter()
		.map(|ts| {
			let age_minutes = ((now - ts).as_seconds_f64() / 60.0).max(0.0);

			(-age_minutes / decay_minutes).exp()
		})
		.sum()
}

/// The member closest (cosine) to the cluster centroid; the first one on ties.
pub fn representative_member<'a>(members: &[&'a EmbeddedQuery]) -> Option<&'a EmbeddedQuery> {
	let centroid = vector::centroid(members.iter().map(|member| &*member.embedding))?;
	let mut best: Option<(&EmbeddedQuery, f32)> = None;

	for &member in members {
		let distance = vector::cosine_distance(&member.embedding, &centroid);

		if best.map(|(_, best_distance)| distance < best_distance).unwrap_or(true) {
			best = Some((member, distance));
		}
	}

	best.map(|(member, _)| member)
}

/// Most frequent normalized texts, ties broken by first appearance.
pub fn top_queries(members: &[&EmbeddedQuery], limit: usize) -> Vec<TopQuery> {
	let mut order: Vec<TopQuery> = Vec::new();
	let mut positions: HashMap<&str, usize> = HashMap::new();

	for member in members {
		match positions.get(member.text()) {
			Some(&pos) => order[pos].count += 1,
			None => {
				positions.insert(member.text(), order.len());
				order.push(TopQuery { text: member.text().to_string(), count: 1 });
			},
		}
	}

	// Stable, so equal counts keep first-seen order.
	order.sort_by(|a, b| b.count.cmp(&a.count));
	order.truncate(limit);

	order
}

fn distinct_texts(members: &[&EmbeddedQuery]) -> u32 {
	let mut seen: Vec<&str> = members.iter().map(|member| member.text()).collect();

	seen.sort_unstable();
	seen.dedup();

	seen.len() as u32
}
