//! Nearest-neighbor search over stored item embeddings.

use serde::{Deserialize, Serialize};

use trendwatch_domain::{ItemHit, Metric, vector};

use crate::{Error, ResponseStatus, Result, TrendService};

/// A query embedding, either flat or wrapped in a single-element batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingInput {
	Flat(Vec<f32>),
	Nested(Vec<Vec<f32>>),
}
impl EmbeddingInput {
	pub fn into_vector(self) -> Result<Vec<f32>> {
		let vector = match self {
			Self::Flat(vector) => vector,
			Self::Nested(mut batch) => {
				if batch.len() != 1 {
					return Err(Error::InvalidEmbedding {
						message: format!(
							"Nested embedding must hold exactly one vector, got {}.",
							batch.len()
						),
					});
				}

				batch.remove(0)
			},
		};

		if vector.is_empty() {
			return Err(Error::InvalidEmbedding { message: "Embedding is empty.".to_string() });
		}
		if vector.iter().any(|value| !value.is_finite()) {
			return Err(Error::InvalidEmbedding {
				message: "Embedding contains non-finite values.".to_string(),
			});
		}

		Ok(vector)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
	pub embedding: EmbeddingInput,
	#[serde(default)]
	pub top_k: Option<u32>,
	#[serde(default)]
	pub metric: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
	pub metric: String,
	pub top_k: u32,
	pub items: Vec<ItemHit>,
}

/// Search outcome in the shape every read path returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchEnvelope {
	pub status: ResponseStatus,
	pub results: Vec<ItemHit>,
	pub count: usize,
	pub error_code: Option<String>,
	pub error: Option<String>,
}
impl From<Result<SearchResponse>> for SearchEnvelope {
	fn from(result: Result<SearchResponse>) -> Self {
		match result {
			Ok(response) => Self {
				status: ResponseStatus::Success,
				count: response.items.len(),
				results: response.items,
				error_code: None,
				error: None,
			},
			Err(err) => Self {
				status: ResponseStatus::Error,
				results: Vec::new(),
				count: 0,
				error_code: Some(err.code().to_string()),
				error: Some(err.to_string()),
			},
		}
	}
}

impl TrendService {
	/// The `top_k` stored items nearest to the request embedding, closest first.
	pub async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
		let metric = match req.metric.as_deref() {
			Some(raw) => raw.parse::<Metric>()?,
			None => Metric::default(),
		};
		let top_k = req.top_k.unwrap_or(self.cfg.search.default_top_k);

		if top_k == 0 || top_k > self.cfg.search.max_top_k {
			return Err(Error::InvalidRequest {
				message: format!("top_k must be between 1 and {}.", self.cfg.search.max_top_k),
			});
		}

		let embedding = req.embedding.into_vector()?;
		let expected_dim = self.cfg.storage.vectors.vector_dim as usize;

		if embedding.len() != expected_dim {
			return Err(Error::InvalidEmbedding {
				message: format!(
					"Embedding has {} dimensions, expected {expected_dim}.",
					embedding.len()
				),
			});
		}

		let mut items = self.index.nearest(&embedding, top_k, metric).await.map_err(|err| {
			tracing::error!(error = %err, metric = %metric, "Similarity search failed.");

			Error::from(err)
		})?;

		for item in &mut items {
			item.distance = vector::round4(item.distance);
		}

		items.sort_by(|a, b| a.distance.total_cmp(&b.distance));
		items.truncate(top_k as usize);

		tracing::debug!(
			metric = %metric,
			top_k,
			returned = items.len(),
			"Similarity search finished."
		);

		Ok(SearchResponse { metric: metric.as_str().to_string(), top_k, items })
	}
}
