//! Batch-scoped deduplicating vectorizer.

use std::{
	collections::{HashMap, HashSet},
	sync::Arc,
};

use trendwatch_config::EmbeddingProviderConfig;
use trendwatch_domain::{EmbeddedQuery, NormalizedQuery};

use crate::{EmbeddingProvider, Error, Result};

#[derive(Debug)]
pub struct Vectorized {
	/// Embedded queries in input order.
	pub queries: Vec<EmbeddedQuery>,
	/// Inputs left without a usable vector.
	pub dropped: usize,
}

/// Embeds each distinct normalized text exactly once and shares the vector across duplicates.
///
/// A response with no vectors is an error. Missing or wrongly sized vectors drop only the
/// affected texts.
pub async fn vectorize(
	provider: &dyn EmbeddingProvider,
	cfg: &EmbeddingProviderConfig,
	queries: Vec<NormalizedQuery>,
) -> Result<Vectorized> {
	if queries.is_empty() {
		return Ok(Vectorized { queries: Vec::new(), dropped: 0 });
	}

	let distinct = distinct_texts(&queries);
	let vectors = provider
		.embed(cfg, &distinct)
		.await
		.map_err(|err| Error::Embedding { message: err.to_string() })?;

	if vectors.is_empty() {
		return Err(Error::Embedding {
			message: "Embedding provider returned no vectors.".to_string(),
		});
	}
	if vectors.len() != distinct.len() {
		tracing::warn!(
			expected = distinct.len(),
			actual = vectors.len(),
			"Embedding count does not match distinct query count."
		);
	}

	let expected_dim = cfg.dimensions as usize;
	let mut cache: HashMap<&str, Arc<[f32]>> = HashMap::with_capacity(distinct.len());

	for (text, vector) in distinct.iter().zip(vectors) {
		if vector.len() != expected_dim {
			tracing::warn!(
				text = %text,
				expected = expected_dim,
				actual = vector.len(),
				"Dropping query with mis-sized embedding."
			);

			continue;
		}

		cache.insert(text.as_str(), Arc::from(vector));
	}

	let total = queries.len();
	let mut embedded = Vec::with_capacity(total);

	for query in queries {
		let Some(embedding) = cache.get(query.normalized_text.as_str()).cloned() else {
			continue;
		};

		embedded.push(EmbeddedQuery { query, embedding });
	}

	Ok(Vectorized { dropped: total - embedded.len(), queries: embedded })
}

/// Distinct texts in first-seen order.
fn distinct_texts(queries: &[NormalizedQuery]) -> Vec<String> {
	let mut seen: HashSet<&str> = HashSet::with_capacity(queries.len());
	let mut out = Vec::new();

	for query in queries {
		if seen.insert(query.normalized_text.as_str()) {
			out.push(query.normalized_text.clone());
		}
	}

	out
}

#[cfg(test)]
mod tests {
	use std::sync::{
		Mutex,
		atomic::{AtomicUsize, Ordering},
	};

	use serde_json::Map;
	use time::macros::datetime;

	use super::*;
	use crate::BoxFuture;
	use trendwatch_domain::RawQuery;

	struct RecordingEmbedding {
		calls: AtomicUsize,
		seen: Mutex<Vec<String>>,
		truncate_to: Option<usize>,
	}
	impl RecordingEmbedding {
		fn new(truncate_to: Option<usize>) -> Self {
			Self { calls: AtomicUsize::new(0), seen: Mutex::new(Vec::new()), truncate_to }
		}
	}
	impl EmbeddingProvider for RecordingEmbedding {
		fn embed<'a>(
			&'a self,
			_cfg: &'a EmbeddingProviderConfig,
			texts: &'a [String],
		) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.seen.lock().expect("Lock poisoned.").extend(texts.iter().cloned());

			let mut vectors: Vec<Vec<f32>> =
				texts.iter().map(|text| vec![text.len() as f32, 1.0]).collect();

			if let Some(limit) = self.truncate_to {
				vectors.truncate(limit);
			}

			Box::pin(async move { Ok(vectors) })
		}
	}

	fn cfg() -> EmbeddingProviderConfig {
		EmbeddingProviderConfig {
			provider_id: "test".to_string(),
			api_base: "http://127.0.0.1:1".to_string(),
			api_key: "test-key".to_string(),
			path: "/".to_string(),
			model: "test".to_string(),
			dimensions: 2,
			timeout_ms: 1_000,
			default_headers: Map::new(),
		}
	}

	fn normalized(texts: &[&str]) -> Vec<NormalizedQuery> {
		texts
			.iter()
			.map(|text| {
				NormalizedQuery::from_raw(RawQuery {
					original_text: text.to_string(),
					session_id: None,
					created_at: datetime!(2025-03-01 12:00 UTC),
				})
			})
			.collect()
	}

	#[tokio::test]
	async fn embeds_each_distinct_text_once() {
		let provider = RecordingEmbedding::new(None);
		let input = normalized(&["Pizza", "pizza?", "weather", "PIZZA", "weather."]);
		let out = vectorize(&provider, &cfg(), input).await.expect("Vectorize failed.");

		assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
		assert_eq!(*provider.seen.lock().expect("Lock poisoned."), vec!["pizza", "weather"]);
		assert_eq!(out.queries.len(), 5);
		assert_eq!(out.dropped, 0);

		for query in &out.queries {
			assert_eq!(&*query.embedding, &[query.text().len() as f32, 1.0]);
		}

		assert!(Arc::ptr_eq(&out.queries[0].embedding, &out.queries[3].embedding));
	}

	#[tokio::test]
	async fn preserves_input_order() {
		let provider = RecordingEmbedding::new(None);
		let out = vectorize(&provider, &cfg(), normalized(&["b", "a", "b"]))
			.await
			.expect("Vectorize failed.");
		let texts: Vec<&str> = out.queries.iter().map(|query| query.text()).collect();

		assert_eq!(texts, vec!["b", "a", "b"]);
	}

	#[tokio::test]
	async fn drops_texts_without_vectors() {
		let provider = RecordingEmbedding::new(Some(1));
		let out = vectorize(&provider, &cfg(), normalized(&["a", "b", "a", "b"]))
			.await
			.expect("Vectorize failed.");

		assert_eq!(out.queries.len(), 2);
		assert_eq!(out.dropped, 2);
		assert!(out.queries.iter().all(|query| query.text() == "a"));
	}

	#[tokio::test]
	async fn empty_response_is_an_error() {
		let provider = RecordingEmbedding::new(Some(0));
		let err = vectorize(&provider, &cfg(), normalized(&["a", "b"]))
			.await
			.expect_err("Expected embedding error.");

		assert!(matches!(err, Error::Embedding { .. }));
	}

	#[tokio::test]
	async fn empty_input_skips_the_provider() {
		let provider = RecordingEmbedding::new(None);
		let out = vectorize(&provider, &cfg(), Vec::new()).await.expect("Vectorize failed.");

		assert!(out.queries.is_empty());
		assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
	}
}
