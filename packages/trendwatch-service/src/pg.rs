//! Postgres-backed [`QueryStore`] and [`VectorIndex`].

use std::sync::Arc;

use time::OffsetDateTime;

use trendwatch_domain::{ItemHit, Metric, RawQuery, StoredTrend, Trend};
use trendwatch_storage::{Result, db::Db, queries, vectors};

use crate::{BoxFuture, QueryStore, VectorIndex};

pub struct PgQueryStore {
	db: Arc<Db>,
}
impl PgQueryStore {
	pub fn new(db: Arc<Db>) -> Self {
		Self { db }
	}
}
impl QueryStore for PgQueryStore {
	fn read_queries<'a>(
		&'a self,
		window_minutes: Option<u32>,
		max_rows: Option<u32>,
	) -> BoxFuture<'a, Result<Vec<RawQuery>>> {
		Box::pin(queries::read_queries(&self.db, window_minutes, max_rows))
	}

	fn write_trends<'a>(
		&'a self,
		trends: &'a [Trend],
		batch_timestamp: OffsetDateTime,
	) -> BoxFuture<'a, Result<usize>> {
		Box::pin(queries::write_trends(&self.db, trends, batch_timestamp))
	}

	fn read_current_trends<'a>(
		&'a self,
		limit: u32,
		min_score: f64,
	) -> BoxFuture<'a, Result<Vec<StoredTrend>>> {
		Box::pin(queries::read_current_trends(&self.db, limit, min_score))
	}

	fn refresh_materialized_views<'a>(&'a self) -> BoxFuture<'a, Result<()>> {
		Box::pin(queries::refresh_query_stats(&self.db))
	}
}

pub struct PgVectorIndex {
	db: Arc<Db>,
	table: String,
}
impl PgVectorIndex {
	pub fn new(db: Arc<Db>, table: impl Into<String>) -> Self {
		Self { db, table: table.into() }
	}
}
impl VectorIndex for PgVectorIndex {
	fn nearest<'a>(
		&'a self,
		embedding: &'a [f32],
		top_k: u32,
		metric: Metric,
	) -> BoxFuture<'a, Result<Vec<ItemHit>>> {
		Box::pin(vectors::nearest(&self.db, &self.table, embedding, top_k, metric))
	}
}

/// Both adapters over one shared pool.
pub fn adapters(db: Arc<Db>, items_table: &str) -> (Arc<dyn QueryStore>, Arc<dyn VectorIndex>) {
	let store: Arc<dyn QueryStore> = Arc::new(PgQueryStore::new(db.clone()));
	let index: Arc<dyn VectorIndex> = Arc::new(PgVectorIndex::new(db, items_table));

	(store, index)
}
