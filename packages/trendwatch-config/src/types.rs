use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub trends: Trends,
	#[serde(default)]
	pub scheduler: Scheduler,
	#[serde(default)]
	pub search: Search,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub vectors: Vectors,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Vectors {
	pub vector_dim: u32,
	/// Table holding item embeddings. Must be a plain SQL identifier.
	#[serde(default = "default_items_table")]
	pub items_table: String,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub phrase: PhraseProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct PhraseProviderConfig {
	/// Disabling skips generation entirely; trends keep their centroid query.
	#[serde(default = "default_true")]
	pub enabled: bool,
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

/// Tunables for one batch of trend detection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Trends {
	/// Rolling ingest window. `None` reads the newest rows regardless of age.
	pub batch_interval_minutes: Option<u32>,
	pub max_rows: Option<u32>,
	pub min_cluster_size: u32,
	pub dbscan_eps: f32,
	pub dbscan_min_samples: u32,
	pub top_n_trends: u32,
	pub volume_weight: f64,
	pub recency_weight: f64,
	pub recency_decay_minutes: f64,
	pub top_query_count: u32,
	pub phrase_max_words: u32,
}
impl Default for Trends {
	fn default() -> Self {
		Self {
			batch_interval_minutes: None,
			max_rows: Some(40),
			min_cluster_size: 3,
			dbscan_eps: 0.418_182,
			dbscan_min_samples: 2,
			top_n_trends: 20,
			volume_weight: 0.6,
			recency_weight: 0.4,
			recency_decay_minutes: 5.0,
			top_query_count: 5,
			phrase_max_words: 4,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Scheduler {
	pub trend_interval_minutes: u64,
	pub refresh_interval_minutes: u64,
	pub refresh_enabled: bool,
}
impl Default for Scheduler {
	fn default() -> Self {
		Self { trend_interval_minutes: 15, refresh_interval_minutes: 15, refresh_enabled: true }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Search {
	pub default_top_k: u32,
	pub max_top_k: u32,
}
impl Default for Search {
	fn default() -> Self {
		Self { default_top_k: 10, max_top_k: 250 }
	}
}

fn default_items_table() -> String {
	"embedded_items".to_string()
}

fn default_true() -> bool {
	true
}
