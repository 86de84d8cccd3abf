use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

use trendwatch_domain::{RawQuery, StoredTrend, Trend};

use crate::{
	Error, Result,
	db::Db,
	models::{QueryHistoryRow, QueryStat, TrendRow},
};

/// Newest-first raw queries, skipping rows whose text is NULL or blank.
///
/// `window_minutes` bounds by age and `max_rows` caps the count; either may be absent.
pub async fn read_queries(
	db: &Db,
	window_minutes: Option<u32>,
	max_rows: Option<u32>,
) -> Result<Vec<RawQuery>> {
	let window = window_minutes.map(|minutes| minutes as i32);
	let limit = max_rows.map(i64::from);
	let rows: Vec<QueryHistoryRow> = sqlx::query_as(
		"\
SELECT query, session_id, created_at
FROM search_query_history
WHERE query IS NOT NULL
	AND TRIM(query) <> ''
	AND ($1::int IS NULL OR created_at >= now() - make_interval(mins => $1::int))
ORDER BY created_at DESC
LIMIT $2",
	)
	.bind(window)
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows.into_iter().map(RawQuery::from).collect())
}

pub async fn insert_query(
	db: &Db,
	query: Option<&str>,
	session_id: Option<&str>,
	created_at: OffsetDateTime,
) -> Result<Uuid> {
	let id = Uuid::new_v4();

	sqlx::query(
		"INSERT INTO search_query_history (id, query, session_id, created_at) VALUES ($1, $2, $3, $4)",
	)
	.bind(id)
	.bind(query)
	.bind(session_id)
	.bind(created_at)
	.execute(&db.pool)
	.await?;

	Ok(id)
}

/// Appends one batch of trends atomically; either every row lands or none does.
pub async fn write_trends(
	db: &Db,
	trends: &[Trend],
	batch_timestamp: OffsetDateTime,
) -> Result<usize> {
	let mut tx = db.pool.begin().await?;

	for trend in trends {
		let query_count = i32::try_from(trend.query_count).map_err(|_| {
			Error::InvalidArgument(format!("query_count {} is out of range.", trend.query_count))
		})?;
		let unique_query_count = i32::try_from(trend.unique_query_count).map_err(|_| {
			Error::InvalidArgument(format!(
				"unique_query_count {} is out of range.",
				trend.unique_query_count
			))
		})?;

		sqlx::query(
			"\
INSERT INTO trending_searches (
	id,
	representative_query,
	representative_query_generated,
	trend_score,
	query_count,
	unique_query_count,
	top_queries,
	created_at,
	batch_timestamp
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
		)
		.bind(Uuid::new_v4())
		.bind(trend.representative_query.as_str())
		.bind(trend.representative_query_generated.as_deref())
		.bind(trend.trend_score)
		.bind(query_count)
		.bind(unique_query_count)
		.bind(Json(&trend.top_queries))
		.bind(trend.created_at)
		.bind(batch_timestamp)
		.execute(&mut *tx)
		.await?;
	}

	tx.commit().await?;

	Ok(trends.len())
}

/// Trends of the most recent batch scoring at least `min_score`, best first.
pub async fn read_current_trends(
	db: &Db,
	limit: u32,
	min_score: f64,
) -> Result<Vec<StoredTrend>> {
	let rows: Vec<TrendRow> = sqlx::query_as(
		"\
SELECT
	id,
	representative_query,
	representative_query_generated,
	trend_score,
	query_count,
	unique_query_count,
	top_queries,
	created_at,
	batch_timestamp
FROM trending_searches
WHERE batch_timestamp = (SELECT MAX(batch_timestamp) FROM trending_searches)
	AND trend_score >= $1
ORDER BY trend_score DESC, created_at ASC
LIMIT $2",
	)
	.bind(min_score)
	.bind(i64::from(limit))
	.fetch_all(&db.pool)
	.await?;

	Ok(rows.into_iter().map(StoredTrend::from).collect())
}

pub async fn refresh_query_stats(db: &Db) -> Result<()> {
	sqlx::query("REFRESH MATERIALIZED VIEW query_stats_view").execute(&db.pool).await?;

	Ok(())
}

/// Most frequent queries as of the last materialized-view refresh.
pub async fn popular_queries(db: &Db, limit: u32) -> Result<Vec<QueryStat>> {
	let rows = sqlx::query_as(
		"\
SELECT query, query_count, session_count, last_seen_at
FROM query_stats_view
ORDER BY query_count DESC, last_seen_at DESC
LIMIT $1",
	)
	.bind(i64::from(limit))
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}
