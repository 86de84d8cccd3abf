pub mod pg;
pub mod pipeline;
pub mod search;
pub mod trends;
pub mod vectorize;

mod error;

pub use error::{Error, Result};
pub use pipeline::{BatchResult, Stage};
pub use search::{EmbeddingInput, SearchEnvelope, SearchRequest, SearchResponse};
pub use trends::{TrendListResponse, TrendingSearchesResponse};

use std::{future::Future, pin::Pin, sync::Arc};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use trendwatch_config::{Config, EmbeddingProviderConfig, PhraseProviderConfig};
use trendwatch_domain::{ItemHit, Metric, RawQuery, StoredTrend, Trend};
use trendwatch_providers::{embedding, phrase};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	/// One vector per input text, in input order.
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

pub trait PhraseProvider
where
	Self: Send + Sync,
{
	fn summarize<'a>(
		&'a self,
		cfg: &'a PhraseProviderConfig,
		examples: &'a [String],
		max_words: u32,
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

/// Source of raw queries and sink for scored trends.
pub trait QueryStore
where
	Self: Send + Sync,
{
	/// Newest-first, excluding rows with NULL or blank text.
	fn read_queries<'a>(
		&'a self,
		window_minutes: Option<u32>,
		max_rows: Option<u32>,
	) -> BoxFuture<'a, trendwatch_storage::Result<Vec<RawQuery>>>;

	/// Writes every trend of one batch in a single transaction.
	fn write_trends<'a>(
		&'a self,
		trends: &'a [Trend],
		batch_timestamp: OffsetDateTime,
	) -> BoxFuture<'a, trendwatch_storage::Result<usize>>;

	/// Trends of the newest batch, best first.
	fn read_current_trends<'a>(
		&'a self,
		limit: u32,
		min_score: f64,
	) -> BoxFuture<'a, trendwatch_storage::Result<Vec<StoredTrend>>>;

	fn refresh_materialized_views<'a>(&'a self) -> BoxFuture<'a, trendwatch_storage::Result<()>>;
}

pub trait VectorIndex
where
	Self: Send + Sync,
{
	/// At most `top_k` items ordered by ascending distance under `metric`.
	fn nearest<'a>(
		&'a self,
		embedding: &'a [f32],
		top_k: u32,
		metric: Metric,
	) -> BoxFuture<'a, trendwatch_storage::Result<Vec<ItemHit>>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
	Success,
	Error,
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub phrase: Arc<dyn PhraseProvider>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, phrase: Arc<dyn PhraseProvider>) -> Self {
		Self { embedding, phrase }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), phrase: provider }
	}
}

pub struct TrendService {
	pub cfg: Config,
	pub store: Arc<dyn QueryStore>,
	pub index: Arc<dyn VectorIndex>,
	pub providers: Providers,
}
impl TrendService {
	pub fn new(cfg: Config, store: Arc<dyn QueryStore>, index: Arc<dyn VectorIndex>) -> Self {
		Self { cfg, store, index, providers: Providers::default() }
	}

	pub fn with_providers(
		cfg: Config,
		store: Arc<dyn QueryStore>,
		index: Arc<dyn VectorIndex>,
		providers: Providers,
	) -> Self {
		Self { cfg, store, index, providers }
	}

	pub async fn refresh_materialized_views(&self) -> Result<()> {
		self.store.refresh_materialized_views().await?;

		Ok(())
	}

	/// A generated phrase for `examples`, or `None` when generation is disabled or fails.
	pub(crate) async fn generate_phrase(&self, examples: &[String]) -> Option<String> {
		let cfg = &self.cfg.providers.phrase;

		if !cfg.enabled || examples.is_empty() {
			return None;
		}

		match self
			.providers
			.phrase
			.summarize(cfg, examples, self.cfg.trends.phrase_max_words)
			.await
		{
			Ok(phrase) if !phrase.trim().is_empty() => Some(phrase.trim().to_string()),
			Ok(_) => {
				tracing::warn!("Phrase provider returned an empty phrase.");

				None
			},
			Err(err) => {
				tracing::warn!(error = %err, "Representative phrase generation failed.");

				None
			},
		}
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed(cfg, texts).await?) })
	}
}
impl PhraseProvider for DefaultProviders {
	fn summarize<'a>(
		&'a self,
		cfg: &'a PhraseProviderConfig,
		examples: &'a [String],
		max_words: u32,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(async move { Ok(phrase::summarize(cfg, examples, max_words).await?) })
	}
}
