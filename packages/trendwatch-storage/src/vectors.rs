use uuid::Uuid;

use trendwatch_domain::{ItemHit, Metric};

use crate::{
	Error, Result,
	db::Db,
	models::{ItemHitRow, NewItem},
};

/// pgvector's default `hnsw.ef_search`.
const MIN_EF_SEARCH: u32 = 40;
/// pgvector's upper bound for `hnsw.ef_search`.
const MAX_EF_SEARCH: u32 = 1_000;

/// The pgvector operator computing `metric`.
pub fn distance_operator(metric: Metric) -> &'static str {
	match metric {
		Metric::Cosine => "<=>",
		Metric::Euclidean => "<->",
	}
}

pub fn format_vector_text(vec: &[f32]) -> String {
	let mut out = String::from("[");

	for (idx, value) in vec.iter().enumerate() {
		if idx > 0 {
			out.push(',');
		}

		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}

/// `hnsw.ef_search` wide enough for an index scan to yield `top_k` rows.
pub fn ef_search(top_k: u32) -> u32 {
	top_k.clamp(MIN_EF_SEARCH, MAX_EF_SEARCH)
}

/// The `top_k` items of `table` closest to `embedding`, nearest first.
pub async fn nearest(
	db: &Db,
	table: &str,
	embedding: &[f32],
	top_k: u32,
	metric: Metric,
) -> Result<Vec<ItemHit>> {
	ensure_identifier(table)?;

	let op = distance_operator(metric);
	let sql = format!(
		"\
SELECT
	item_id,
	segment_start,
	segment_end,
	text,
	(embedding {op} $1::text::vector)::float8 AS distance
FROM {table}
ORDER BY embedding {op} $1::text::vector
LIMIT $2"
	);
	let mut tx = db.pool.begin().await?;

	// The candidate list caps how many rows an HNSW scan returns.
	sqlx::query("SELECT set_config('hnsw.ef_search', $1, true)")
		.bind(ef_search(top_k).to_string())
		.execute(&mut *tx)
		.await?;

	let rows: Vec<ItemHitRow> = sqlx::query_as(&sql)
		.bind(format_vector_text(embedding))
		.bind(i64::from(top_k))
		.fetch_all(&mut *tx)
		.await
		.map_err(|err| Error::from_table_query(err, table))?;

	tx.commit().await?;

	Ok(rows.into_iter().map(ItemHit::from).collect())
}

pub async fn insert_item(db: &Db, table: &str, item: &NewItem) -> Result<Uuid> {
	ensure_identifier(table)?;

	if item.embedding.is_empty() {
		return Err(Error::InvalidArgument("Item embedding must be non-empty.".to_string()));
	}

	let id = Uuid::new_v4();
	let sql = format!(
		"\
INSERT INTO {table} (id, item_id, segment_start, segment_end, text, embedding)
VALUES ($1, $2, $3, $4, $5, $6::text::vector)"
	);

	sqlx::query(&sql)
		.bind(id)
		.bind(item.item_id.as_str())
		.bind(item.segment_start)
		.bind(item.segment_end)
		.bind(item.text.as_str())
		.bind(format_vector_text(&item.embedding))
		.execute(&db.pool)
		.await
		.map_err(|err| Error::from_table_query(err, table))?;

	Ok(id)
}

fn ensure_identifier(table: &str) -> Result<()> {
	if trendwatch_config::is_sql_identifier(table) {
		Ok(())
	} else {
		Err(Error::InvalidArgument(format!("{table:?} is not a valid table name.")))
	}
}
