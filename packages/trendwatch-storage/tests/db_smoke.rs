use time::{Duration, OffsetDateTime};

use trendwatch_config::Postgres;
use trendwatch_domain::{Metric, TopQuery, Trend};
use trendwatch_storage::{Error, db::Db, models::NewItem, queries, vectors};
use trendwatch_testkit::TestDatabase;

const VECTOR_DIM: u32 = 3;

async fn bootstrap(test_db: &TestDatabase) -> Db {
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 2 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema(VECTOR_DIM).await.expect("Failed to ensure schema.");

	db
}

fn trend(query: &str, score: f64, now: OffsetDateTime) -> Trend {
	Trend {
		representative_query: query.to_string(),
		representative_query_generated: None,
		trend_score: score,
		query_count: 3,
		unique_query_count: 2,
		top_queries: vec![
			TopQuery { text: query.to_string(), count: 2 },
			TopQuery { text: format!("{query} today"), count: 1 },
		],
		created_at: now,
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set TRENDWATCH_PG_DSN to run."]
async fn schema_bootstrap_is_idempotent() {
	let Some(base_dsn) = trendwatch_testkit::env_dsn() else {
		eprintln!("Skipping schema_bootstrap_is_idempotent; set TRENDWATCH_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;

	db.ensure_schema(VECTOR_DIM).await.expect("Second bootstrap failed.");

	let count: i64 = sqlx::query_scalar(
		"SELECT count(*) FROM information_schema.tables WHERE table_name = 'trending_searches'",
	)
	.fetch_one(&db.pool)
	.await
	.expect("Failed to query schema tables.");

	assert_eq!(count, 1);

	db.pool.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set TRENDWATCH_PG_DSN to run."]
async fn reads_newest_non_blank_queries_within_cap() {
	let Some(base_dsn) = trendwatch_testkit::env_dsn() else {
		eprintln!("Skipping reads_newest_non_blank_queries_within_cap; set TRENDWATCH_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;
	let now = OffsetDateTime::now_utc();

	for (idx, text) in ["oldest", "older", "newer", "newest"].iter().enumerate() {
		queries::insert_query(&db, Some(text), Some("s1"), now - Duration::minutes(10 - idx as i64))
			.await
			.expect("Failed to insert query.");
	}

	queries::insert_query(&db, None, None, now).await.expect("Failed to insert NULL query.");
	queries::insert_query(&db, Some("   "), None, now)
		.await
		.expect("Failed to insert blank query.");

	let rows = queries::read_queries(&db, None, Some(3)).await.expect("Failed to read queries.");
	let texts: Vec<&str> = rows.iter().map(|row| row.original_text.as_str()).collect();

	assert_eq!(texts, vec!["newest", "newer", "older"]);

	let windowed =
		queries::read_queries(&db, Some(60), None).await.expect("Failed to read window.");

	assert_eq!(windowed.len(), 4);

	db.pool.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set TRENDWATCH_PG_DSN to run."]
async fn current_trends_come_from_latest_batch() {
	let Some(base_dsn) = trendwatch_testkit::env_dsn() else {
		eprintln!("Skipping current_trends_come_from_latest_batch; set TRENDWATCH_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;
	let now = OffsetDateTime::now_utc();
	let earlier = now - Duration::minutes(15);

	queries::write_trends(&db, &[trend("old news", 9.0, earlier)], earlier)
		.await
		.expect("Failed to write first batch.");
	queries::write_trends(
		&db,
		&[trend("pizza", 2.0, now), trend("weather", 4.5, now), trend("noise", 0.2, now)],
		now,
	)
	.await
	.expect("Failed to write second batch.");

	let current =
		queries::read_current_trends(&db, 10, 1.0).await.expect("Failed to read trends.");
	let names: Vec<&str> =
		current.iter().map(|stored| stored.trend.representative_query.as_str()).collect();

	assert_eq!(names, vec!["weather", "pizza"]);
	assert_eq!(current[0].trend.top_queries.len(), 2);
	assert_eq!(current[0].trend.top_queries[0].count, 2);

	db.pool.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set TRENDWATCH_PG_DSN to run."]
async fn nearest_orders_by_selected_metric() {
	let Some(base_dsn) = trendwatch_testkit::env_dsn() else {
		eprintln!("Skipping nearest_orders_by_selected_metric; set TRENDWATCH_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;

	for (item_id, embedding) in [
		("near", vec![1.0, 0.0, 0.0]),
		("long", vec![10.0, 0.5, 0.0]),
		("far", vec![0.0, 0.0, 1.0]),
	] {
		let item = NewItem {
			item_id: item_id.to_string(),
			segment_start: Some(0.0),
			segment_end: Some(1.5),
			text: format!("{item_id} text"),
			embedding,
		};

		vectors::insert_item(&db, "embedded_items", &item).await.expect("Failed to insert item.");
	}

	let query = [1.0, 0.05, 0.0];
	let cosine = vectors::nearest(&db, "embedded_items", &query, 2, Metric::Cosine)
		.await
		.expect("Cosine search failed.");
	let euclidean = vectors::nearest(&db, "embedded_items", &query, 2, Metric::Euclidean)
		.await
		.expect("Euclidean search failed.");

	assert_eq!(cosine.len(), 2);
	assert!(cosine[0].distance <= cosine[1].distance);
	assert_eq!(euclidean.len(), 2);
	assert_eq!(euclidean[0].item_id, "near");
	assert_eq!(euclidean[1].item_id, "far");

	db.pool.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set TRENDWATCH_PG_DSN to run."]
async fn nearest_fills_top_k_from_items_inserted_after_bootstrap() {
	let Some(base_dsn) = trendwatch_testkit::env_dsn() else {
		eprintln!(
			"Skipping nearest_fills_top_k_from_items_inserted_after_bootstrap; set \
			 TRENDWATCH_PG_DSN to run."
		);

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;

	for idx in 0..10 {
		let angle = idx as f32 * 0.3;
		let item = NewItem {
			item_id: format!("item-{idx}"),
			segment_start: None,
			segment_end: None,
			text: format!("item {idx}"),
			embedding: vec![angle.cos(), angle.sin(), 0.1 * idx as f32],
		};

		vectors::insert_item(&db, "embedded_items", &item).await.expect("Failed to insert item.");
	}

	for metric in [Metric::Cosine, Metric::Euclidean] {
		let hits = vectors::nearest(&db, "embedded_items", &[1.0, 0.0, 0.0], 3, metric)
			.await
			.expect("Search failed.");

		assert_eq!(hits.len(), 3, "{metric}");
		assert!(hits.windows(2).all(|pair| pair[0].distance <= pair[1].distance), "{metric}");
	}

	db.pool.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set TRENDWATCH_PG_DSN to run."]
async fn missing_items_table_is_index_not_found() {
	let Some(base_dsn) = trendwatch_testkit::env_dsn() else {
		eprintln!("Skipping missing_items_table_is_index_not_found; set TRENDWATCH_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;
	let err = vectors::nearest(&db, "no_such_items", &[1.0, 0.0, 0.0], 3, Metric::Cosine)
		.await
		.expect_err("Expected missing table error.");

	assert!(matches!(err, Error::IndexNotFound(ref table) if table == "no_such_items"));

	db.pool.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set TRENDWATCH_PG_DSN to run."]
async fn refreshed_view_reports_popular_queries() {
	let Some(base_dsn) = trendwatch_testkit::env_dsn() else {
		eprintln!("Skipping refreshed_view_reports_popular_queries; set TRENDWATCH_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;
	let now = OffsetDateTime::now_utc();

	for (text, session) in [("Pizza", "a"), ("pizza ", "b"), ("weather", "a")] {
		queries::insert_query(&db, Some(text), Some(session), now)
			.await
			.expect("Failed to insert query.");
	}

	queries::refresh_query_stats(&db).await.expect("Failed to refresh view.");

	let stats = queries::popular_queries(&db, 5).await.expect("Failed to read view.");

	assert_eq!(stats[0].query, "pizza");
	assert_eq!(stats[0].query_count, 2);
	assert_eq!(stats[0].session_count, 2);

	db.pool.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
