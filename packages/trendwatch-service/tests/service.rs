use std::sync::{
	Arc, Mutex,
	atomic::{AtomicUsize, Ordering},
};

use serde_json::Map;
use time::{Duration, OffsetDateTime, macros::datetime};

use trendwatch_config::{
	Config, EmbeddingProviderConfig, PhraseProviderConfig, Postgres, Providers as ProviderConfigs,
	Scheduler, Search, Service, Storage, Trends, Vectors,
};
use trendwatch_domain::{ItemHit, Metric, RawQuery, StoredTrend, TopQuery, Trend};
use trendwatch_service::{
	BoxFuture, EmbeddingInput, EmbeddingProvider, Error, PhraseProvider, Providers, QueryStore,
	ResponseStatus, SearchRequest, TrendService, VectorIndex, pipeline,
};

const NOW: OffsetDateTime = datetime!(2025-03-01 12:00 UTC);

fn test_config() -> Config {
	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "info".to_string() },
		storage: Storage {
			postgres: Postgres { dsn: "postgres://unused".to_string(), pool_max_conns: 1 },
			vectors: Vectors { vector_dim: 3, items_table: "embedded_items".to_string() },
		},
		providers: ProviderConfigs {
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test-key".to_string(),
				path: "/".to_string(),
				model: "test".to_string(),
				dimensions: 3,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			phrase: PhraseProviderConfig {
				enabled: true,
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test-key".to_string(),
				path: "/".to_string(),
				model: "test".to_string(),
				temperature: 0.3,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
		trends: Trends::default(),
		scheduler: Scheduler::default(),
		search: Search::default(),
	}
}

/// Embeds by topic keyword so that related queries land close together.
struct KeywordEmbedding {
	calls: AtomicUsize,
	texts: Mutex<Vec<String>>,
	offline: bool,
	/// Texts containing this keyword get a vector of the wrong size.
	mis_sized: Option<&'static str>,
}
impl KeywordEmbedding {
	fn new() -> Self {
		Self {
			calls: AtomicUsize::new(0),
			texts: Mutex::new(Vec::new()),
			offline: false,
			mis_sized: None,
		}
	}

	fn offline() -> Self {
		Self { offline: true, ..Self::new() }
	}

	fn mis_sizing(keyword: &'static str) -> Self {
		Self { mis_sized: Some(keyword), ..Self::new() }
	}

	fn vector_for(text: &str) -> Vec<f32> {
		let jitter = (text.len() % 5) as f32 * 0.02;

		if text.contains("pizza") {
			vec![1.0, jitter, 0.0]
		} else if text.contains("weather") {
			vec![0.0, jitter, 1.0]
		} else if text.starts_with('a') {
			vec![1.0, 0.0, 0.0]
		} else if text.starts_with('b') {
			vec![0.0, 1.0, 0.0]
		} else {
			vec![0.0, 0.0, 1.0]
		}
	}
}
impl EmbeddingProvider for KeywordEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.texts.lock().expect("Lock poisoned.").extend(texts.iter().cloned());

		if self.offline {
			return Box::pin(async { Err(color_eyre::eyre::eyre!("Embedding gateway offline.")) });
		}

		let vectors = texts
			.iter()
			.map(|text| match self.mis_sized {
				Some(keyword) if text.contains(keyword) => vec![1.0, 0.0],
				_ => Self::vector_for(text),
			})
			.collect();

		Box::pin(async move { Ok(vectors) })
	}
}

struct SpyPhrase {
	calls: AtomicUsize,
	reply: Option<String>,
}
impl SpyPhrase {
	fn replying(phrase: &str) -> Self {
		Self { calls: AtomicUsize::new(0), reply: Some(phrase.to_string()) }
	}

	fn failing() -> Self {
		Self { calls: AtomicUsize::new(0), reply: None }
	}
}
impl PhraseProvider for SpyPhrase {
	fn summarize<'a>(
		&'a self,
		_cfg: &'a PhraseProviderConfig,
		_examples: &'a [String],
		_max_words: u32,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let reply = self.reply.clone();

		Box::pin(async move {
			reply.ok_or_else(|| color_eyre::eyre::eyre!("Phrase model offline."))
		})
	}
}

#[derive(Default)]
struct MemoryStore {
	queries: Vec<RawQuery>,
	current: Vec<StoredTrend>,
	fail_writes: bool,
	fail_reads: bool,
	written: Mutex<Vec<(Vec<Trend>, OffsetDateTime)>>,
	window_requests: Mutex<Vec<(Option<u32>, Option<u32>)>>,
}
impl QueryStore for MemoryStore {
	fn read_queries<'a>(
		&'a self,
		window_minutes: Option<u32>,
		max_rows: Option<u32>,
	) -> BoxFuture<'a, trendwatch_storage::Result<Vec<RawQuery>>> {
		self.window_requests.lock().expect("Lock poisoned.").push((window_minutes, max_rows));

		let mut rows = self.queries.clone();

		rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));

		if let Some(max_rows) = max_rows {
			rows.truncate(max_rows as usize);
		}

		Box::pin(async move { Ok(rows) })
	}

	fn write_trends<'a>(
		&'a self,
		trends: &'a [Trend],
		batch_timestamp: OffsetDateTime,
	) -> BoxFuture<'a, trendwatch_storage::Result<usize>> {
		Box::pin(async move {
			if self.fail_writes {
				return Err(trendwatch_storage::Error::InvalidArgument(
					"connection reset".to_string(),
				));
			}

			self.written.lock().expect("Lock poisoned.").push((trends.to_vec(), batch_timestamp));

			Ok(trends.len())
		})
	}

	fn read_current_trends<'a>(
		&'a self,
		limit: u32,
		min_score: f64,
	) -> BoxFuture<'a, trendwatch_storage::Result<Vec<StoredTrend>>> {
		Box::pin(async move {
			if self.fail_reads {
				return Err(trendwatch_storage::Error::NotFound("trending_searches".to_string()));
			}

			Ok(self
				.current
				.iter()
				.filter(|stored| stored.trend.trend_score >= min_score)
				.take(limit as usize)
				.cloned()
				.collect())
		})
	}

	fn refresh_materialized_views<'a>(&'a self) -> BoxFuture<'a, trendwatch_storage::Result<()>> {
		Box::pin(async { Ok(()) })
	}
}

struct MemoryIndex {
	items: Vec<(String, Vec<f32>)>,
	missing: bool,
}
impl MemoryIndex {
	fn with_items(count: usize) -> Self {
		let items = (0..count)
			.map(|idx| {
				let angle = idx as f32 * 0.3;

				(format!("item-{idx}"), vec![angle.cos(), angle.sin(), 0.1 * idx as f32])
			})
			.collect();

		Self { items, missing: false }
	}
}
impl VectorIndex for MemoryIndex {
	fn nearest<'a>(
		&'a self,
		embedding: &'a [f32],
		top_k: u32,
		metric: Metric,
	) -> BoxFuture<'a, trendwatch_storage::Result<Vec<ItemHit>>> {
		Box::pin(async move {
			if self.missing {
				return Err(trendwatch_storage::Error::IndexNotFound("embedded_items".to_string()));
			}

			let mut hits: Vec<ItemHit> = self
				.items
				.iter()
				.map(|(item_id, vector)| ItemHit {
					item_id: item_id.clone(),
					segment_start: None,
					segment_end: None,
					text: format!("{item_id} text"),
					distance: f64::from(metric.distance(embedding, vector)),
				})
				.collect();

			hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
			hits.truncate(top_k as usize);

			Ok(hits)
		})
	}
}

fn raw(text: &str, age_minutes: i64) -> RawQuery {
	RawQuery {
		original_text: text.to_string(),
		session_id: Some("session".to_string()),
		created_at: NOW - Duration::minutes(age_minutes),
	}
}

fn pizza_and_weather() -> Vec<RawQuery> {
	vec![
		raw("Best pizza near me", 1),
		raw("pizza near me?", 2),
		raw("PIZZA delivery", 3),
		raw("weather today", 4),
		raw("Weather forecast!", 5),
	]
}

fn service(
	store: Arc<MemoryStore>,
	embedding: Arc<KeywordEmbedding>,
	phrase: Arc<SpyPhrase>,
) -> TrendService {
	TrendService::with_providers(
		test_config(),
		store,
		Arc::new(MemoryIndex::with_items(0)),
		Providers::new(embedding, phrase),
	)
}

fn stored(query: &str, generated: Option<&str>, score: f64) -> StoredTrend {
	StoredTrend {
		trend: Trend {
			representative_query: query.to_string(),
			representative_query_generated: generated.map(str::to_string),
			trend_score: score,
			query_count: 3,
			unique_query_count: 3,
			top_queries: vec![TopQuery { text: query.to_string(), count: 3 }],
			created_at: NOW,
		},
		batch_timestamp: NOW,
	}
}

#[tokio::test]
async fn pizza_and_weather_yield_one_trend() {
	let store = Arc::new(MemoryStore { queries: pizza_and_weather(), ..MemoryStore::default() });
	let embedding = Arc::new(KeywordEmbedding::new());
	let phrase = Arc::new(SpyPhrase::replying("pizza near me"));
	let service = service(store.clone(), embedding.clone(), phrase.clone());
	let result = service.run_batch_at(NOW).await;

	assert!(result.is_success(), "Batch failed: {result:?}");
	assert_eq!(result.trends_identified, 1);
	assert_eq!(result.total_queries_processed, 5);
	assert_eq!(embedding.calls.load(Ordering::SeqCst), 1);
	assert_eq!(phrase.calls.load(Ordering::SeqCst), 1);

	let written = store.written.lock().expect("Lock poisoned.");
	let (trends, _) = &written[0];

	assert_eq!(written.len(), 1);
	assert_eq!(trends[0].query_count, 3);
	assert!(trends[0].representative_query.contains("pizza"));
	assert_eq!(trends[0].representative_query_generated.as_deref(), Some("pizza near me"));
}

#[tokio::test]
async fn batch_reads_with_configured_bounds() {
	let store = Arc::new(MemoryStore { queries: pizza_and_weather(), ..MemoryStore::default() });
	let service =
		service(store.clone(), Arc::new(KeywordEmbedding::new()), Arc::new(SpyPhrase::failing()));

	service.run_batch_at(NOW).await;

	assert_eq!(*store.window_requests.lock().expect("Lock poisoned."), vec![(None, Some(40))]);
}

#[tokio::test]
async fn vectorizer_receives_each_distinct_text_once() {
	let mut queries = pizza_and_weather();

	queries.push(raw("pizza near me", 6));
	queries.push(raw("Pizza near me!!", 7));

	let store = Arc::new(MemoryStore { queries, ..MemoryStore::default() });
	let embedding = Arc::new(KeywordEmbedding::new());
	let service = service(store, embedding.clone(), Arc::new(SpyPhrase::failing()));
	let result = service.run_batch_at(NOW).await;
	let texts = embedding.texts.lock().expect("Lock poisoned.");

	assert_eq!(result.total_queries_processed, 7);
	assert_eq!(embedding.calls.load(Ordering::SeqCst), 1);
	assert_eq!(texts.len(), 5);
	assert_eq!(texts.iter().filter(|text| text.as_str() == "pizza near me").count(), 1);
}

#[tokio::test]
async fn phrase_failure_is_not_fatal() {
	let store = Arc::new(MemoryStore { queries: pizza_and_weather(), ..MemoryStore::default() });
	let phrase = Arc::new(SpyPhrase::failing());
	let service = service(store.clone(), Arc::new(KeywordEmbedding::new()), phrase.clone());
	let result = service.run_batch_at(NOW).await;

	assert!(result.is_success());
	assert_eq!(result.trends_identified, 1);
	assert_eq!(phrase.calls.load(Ordering::SeqCst), 1);

	let written = store.written.lock().expect("Lock poisoned.");

	assert_eq!(written[0].0[0].representative_query_generated, None);
}

#[tokio::test]
async fn disabled_phrase_generation_skips_the_provider() {
	let store = Arc::new(MemoryStore { queries: pizza_and_weather(), ..MemoryStore::default() });
	let phrase = Arc::new(SpyPhrase::replying("unused"));
	let mut service = service(store, Arc::new(KeywordEmbedding::new()), phrase.clone());

	service.cfg.providers.phrase.enabled = false;

	let result = service.run_batch_at(NOW).await;

	assert!(result.is_success());
	assert_eq!(phrase.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn too_few_queries_is_insufficient_data() {
	let store = Arc::new(MemoryStore {
		queries: vec![raw("pizza", 1), raw("pizza pie", 2)],
		..MemoryStore::default()
	});
	let embedding = Arc::new(KeywordEmbedding::new());
	let service = service(store.clone(), embedding.clone(), Arc::new(SpyPhrase::failing()));
	let result = service.run_batch_at(NOW).await;

	assert_eq!(result.status, ResponseStatus::Success);
	assert_eq!(result.trends_identified, 0);
	assert_eq!(result.total_queries_processed, 2);
	assert_eq!(result.message.as_deref(), Some(pipeline::INSUFFICIENT_DATA));
	assert_eq!(embedding.calls.load(Ordering::SeqCst), 0);
	assert!(store.written.lock().expect("Lock poisoned.").is_empty());
}

#[tokio::test]
async fn scattered_queries_find_no_clusters() {
	let store = Arc::new(MemoryStore {
		queries: vec![raw("apples", 1), raw("boats", 2), raw("clouds", 3)],
		..MemoryStore::default()
	});
	let service =
		service(store.clone(), Arc::new(KeywordEmbedding::new()), Arc::new(SpyPhrase::failing()));
	let result = service.run_batch_at(NOW).await;

	assert!(result.is_success());
	assert_eq!(result.total_queries_processed, 3);
	assert_eq!(result.message.as_deref(), Some(pipeline::NO_CLUSTERS));
	assert!(store.written.lock().expect("Lock poisoned.").is_empty());
}

#[tokio::test]
async fn embedding_failure_reports_error_with_zero_counts() {
	let store = Arc::new(MemoryStore { queries: pizza_and_weather(), ..MemoryStore::default() });
	let embedding = Arc::new(KeywordEmbedding::offline());
	let phrase = Arc::new(SpyPhrase::replying("unused"));
	let service = service(store.clone(), embedding.clone(), phrase.clone());
	let result = service.run_batch_at(NOW).await;

	assert_eq!(result.status, ResponseStatus::Error);
	assert_eq!(result.trends_identified, 0);
	assert_eq!(result.total_queries_processed, 0);
	assert!(
		result.error.as_deref().is_some_and(|err| err.starts_with("Embedding error")),
		"Unexpected error: {:?}",
		result.error
	);
	assert_eq!(embedding.calls.load(Ordering::SeqCst), 1);
	assert_eq!(phrase.calls.load(Ordering::SeqCst), 0);
	assert!(store.written.lock().expect("Lock poisoned.").is_empty());
}

#[tokio::test]
async fn dropped_vectors_below_cluster_minimum_fail_the_batch() {
	let store = Arc::new(MemoryStore { queries: pizza_and_weather(), ..MemoryStore::default() });
	let service = service(
		store.clone(),
		Arc::new(KeywordEmbedding::mis_sizing("pizza")),
		Arc::new(SpyPhrase::failing()),
	);
	let result = service.run_batch_at(NOW).await;

	assert_eq!(result.status, ResponseStatus::Error);
	assert_eq!(result.trends_identified, 0);
	assert_eq!(result.total_queries_processed, 0);
	assert_eq!(
		result.error.as_deref(),
		Some("Embedding error: Only 2 of 5 queries received embeddings.")
	);
	assert!(store.written.lock().expect("Lock poisoned.").is_empty());
}

#[tokio::test]
async fn write_failure_reports_error_with_zero_counts() {
	let store = Arc::new(MemoryStore {
		queries: pizza_and_weather(),
		fail_writes: true,
		..MemoryStore::default()
	});
	let service =
		service(store, Arc::new(KeywordEmbedding::new()), Arc::new(SpyPhrase::failing()));
	let result = service.run_batch_at(NOW).await;

	assert_eq!(result.status, ResponseStatus::Error);
	assert_eq!(result.trends_identified, 0);
	assert_eq!(result.total_queries_processed, 0);
	assert!(result.error.is_some());
}

#[tokio::test]
async fn current_trends_prefer_fresh_then_stored_then_raw() {
	let store = Arc::new(MemoryStore {
		current: vec![
			stored("pizza deals", Some("cheap pizza"), 4.0),
			stored("weather today", None, 2.0),
		],
		..MemoryStore::default()
	});
	let failing =
		service(store.clone(), Arc::new(KeywordEmbedding::new()), Arc::new(SpyPhrase::failing()));
	let response = failing.get_current_trends(20, 0.0).await;

	assert_eq!(response.status, ResponseStatus::Success);
	assert_eq!(response.trending_searches, vec!["Cheap pizza", "Weather today"]);
	assert_eq!(response.error, None);

	let fresh = service(
		store,
		Arc::new(KeywordEmbedding::new()),
		Arc::new(SpyPhrase::replying("hot topic")),
	);
	let response = fresh.get_current_trends(1, 0.0).await;

	assert_eq!(response.trending_searches, vec!["Hot topic"]);
}

#[tokio::test]
async fn current_trends_read_failure_is_an_error_envelope() {
	let store = Arc::new(MemoryStore { fail_reads: true, ..MemoryStore::default() });
	let service =
		service(store, Arc::new(KeywordEmbedding::new()), Arc::new(SpyPhrase::failing()));
	let response = service.get_current_trends(20, 0.0).await;

	assert_eq!(response.status, ResponseStatus::Error);
	assert!(response.trending_searches.is_empty());
	assert!(response.error.is_some());

	let listed = service.list_trends(20, 0.0).await;

	assert_eq!(listed.status, ResponseStatus::Error);
	assert_eq!(listed.count, 0);
}

#[tokio::test]
async fn list_trends_returns_raw_rows() {
	let store = Arc::new(MemoryStore {
		current: vec![stored("pizza deals", None, 4.0), stored("weather today", None, 0.5)],
		..MemoryStore::default()
	});
	let service =
		service(store, Arc::new(KeywordEmbedding::new()), Arc::new(SpyPhrase::failing()));
	let listed = service.list_trends(20, 1.0).await;

	assert_eq!(listed.status, ResponseStatus::Success);
	assert_eq!(listed.count, 1);
	assert_eq!(listed.trends[0].trend.representative_query, "pizza deals");
}

fn search_service(index: MemoryIndex) -> TrendService {
	TrendService::with_providers(
		test_config(),
		Arc::new(MemoryStore::default()),
		Arc::new(index),
		Providers::new(Arc::new(KeywordEmbedding::new()), Arc::new(SpyPhrase::failing())),
	)
}

fn search_request(embedding: Vec<f32>, top_k: Option<u32>, metric: Option<&str>) -> SearchRequest {
	SearchRequest {
		embedding: EmbeddingInput::Flat(embedding),
		top_k,
		metric: metric.map(str::to_string),
	}
}

#[tokio::test]
async fn search_returns_top_k_in_distance_order() {
	let service = search_service(MemoryIndex::with_items(10));
	let response = service
		.search(search_request(vec![1.0, 0.2, 0.1], Some(3), None))
		.await
		.expect("Search failed.");

	assert_eq!(response.items.len(), 3);
	assert_eq!(response.metric, "cosine");
	assert!(response.items.windows(2).all(|pair| pair[0].distance <= pair[1].distance));

	for item in &response.items {
		assert_eq!(item.distance, (item.distance * 10_000.0).round() / 10_000.0);
	}
}

#[tokio::test]
async fn search_accepts_l2_alias_and_nested_embedding() {
	let service = search_service(MemoryIndex::with_items(10));
	let request = SearchRequest {
		embedding: EmbeddingInput::Nested(vec![vec![1.0, 0.0, 0.0]]),
		top_k: Some(2),
		metric: Some("l2".to_string()),
	};
	let response = service.search(request).await.expect("Search failed.");

	assert_eq!(response.metric, "euclidean");
	assert_eq!(response.items[0].item_id, "item-0");
}

#[tokio::test]
async fn search_rejects_bad_input_with_specific_errors() {
	let service = search_service(MemoryIndex::with_items(10));
	let unknown = service
		.search(search_request(vec![1.0, 0.0, 0.0], None, Some("manhattan")))
		.await
		.expect_err("Expected unknown metric.");
	let empty = service
		.search(search_request(Vec::new(), None, None))
		.await
		.expect_err("Expected invalid embedding.");
	let wrong_dim = service
		.search(search_request(vec![1.0, 0.0], None, None))
		.await
		.expect_err("Expected invalid embedding.");
	let zero_k = service
		.search(search_request(vec![1.0, 0.0, 0.0], Some(0), None))
		.await
		.expect_err("Expected invalid request.");

	assert!(matches!(unknown, Error::UnknownMetric { .. }));
	assert!(matches!(empty, Error::InvalidEmbedding { .. }));
	assert!(matches!(wrong_dim, Error::InvalidEmbedding { .. }));
	assert!(matches!(zero_k, Error::InvalidRequest { .. }));
}

#[tokio::test]
async fn missing_index_is_distinct_from_storage_errors() {
	let service = search_service(MemoryIndex { items: Vec::new(), missing: true });
	let err = service
		.search(search_request(vec![1.0, 0.0, 0.0], None, None))
		.await
		.expect_err("Expected missing index.");

	assert!(matches!(err, Error::IndexNotFound { .. }));
	assert_eq!(err.code(), "INDEX_NOT_FOUND");
}
