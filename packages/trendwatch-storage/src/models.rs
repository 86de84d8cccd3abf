use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

use trendwatch_domain::{ItemHit, RawQuery, StoredTrend, TopQuery, Trend, vector};

#[derive(Debug, sqlx::FromRow)]
pub struct QueryHistoryRow {
	pub query: String,
	pub session_id: Option<String>,
	pub created_at: OffsetDateTime,
}
impl From<QueryHistoryRow> for RawQuery {
	fn from(row: QueryHistoryRow) -> Self {
		Self { original_text: row.query, session_id: row.session_id, created_at: row.created_at }
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct TrendRow {
	pub id: Uuid,
	pub representative_query: String,
	pub representative_query_generated: Option<String>,
	pub trend_score: f64,
	pub query_count: i32,
	pub unique_query_count: i32,
	pub top_queries: Json<Vec<TopQuery>>,
	pub created_at: OffsetDateTime,
	pub batch_timestamp: OffsetDateTime,
}
impl From<TrendRow> for StoredTrend {
	fn from(row: TrendRow) -> Self {
		Self {
			trend: Trend {
				representative_query: row.representative_query,
				representative_query_generated: row.representative_query_generated,
				trend_score: row.trend_score,
				query_count: row.query_count.max(0) as u32,
				unique_query_count: row.unique_query_count.max(0) as u32,
				top_queries: row.top_queries.0,
				created_at: row.created_at,
			},
			batch_timestamp: row.batch_timestamp,
		}
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct QueryStat {
	pub query: String,
	pub query_count: i64,
	pub session_count: i64,
	pub last_seen_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ItemHitRow {
	pub item_id: String,
	pub segment_start: Option<f64>,
	pub segment_end: Option<f64>,
	pub text: String,
	pub distance: f64,
}
impl From<ItemHitRow> for ItemHit {
	fn from(row: ItemHitRow) -> Self {
		Self {
			item_id: row.item_id,
			segment_start: row.segment_start,
			segment_end: row.segment_end,
			text: row.text,
			distance: vector::round4(row.distance),
		}
	}
}

#[derive(Debug, Clone)]
pub struct NewItem {
	pub item_id: String,
	pub segment_start: Option<f64>,
	pub segment_end: Option<f64>,
	pub text: String,
	pub embedding: Vec<f32>,
}
