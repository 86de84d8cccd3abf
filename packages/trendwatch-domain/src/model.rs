use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A search query exactly as it was recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawQuery {
	pub original_text: String,
	pub session_id: Option<String>,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedQuery {
	pub raw: RawQuery,
	pub normalized_text: String,
}
impl NormalizedQuery {
	pub fn from_raw(raw: RawQuery) -> Self {
		let normalized_text = crate::normalize_query(&raw.original_text);

		Self { raw, normalized_text }
	}
}

/// A normalized query with its embedding.
///
/// Queries that normalize to the same text within one batch hold the same `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedQuery {
	pub query: NormalizedQuery,
	pub embedding: Arc<[f32]>,
}
impl EmbeddedQuery {
	pub fn text(&self) -> &str {
		&self.query.normalized_text
	}

	pub fn created_at(&self) -> OffsetDateTime {
		self.query.raw.created_at
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopQuery {
	pub text: String,
	pub count: u32,
}

/// A scored cluster, ready to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
	pub representative_query: String,
	pub representative_query_generated: Option<String>,
	pub trend_score: f64,
	pub query_count: u32,
	pub unique_query_count: u32,
	pub top_queries: Vec<TopQuery>,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
}
impl Trend {
	pub fn top_query_texts(&self) -> Vec<String> {
		self.top_queries.iter().map(|top| top.text.clone()).collect()
	}
}

/// A trend row read back from storage, tagged with the batch that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTrend {
	#[serde(flatten)]
	pub trend: Trend,
	#[serde(with = "crate::time_serde")]
	pub batch_timestamp: OffsetDateTime,
}

/// One stored item returned by a nearest-neighbor lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemHit {
	pub item_id: String,
	pub segment_start: Option<f64>,
	pub segment_end: Option<f64>,
	pub text: String,
	/// Distance under the requested metric, rounded to four decimals.
	pub distance: f64,
}
