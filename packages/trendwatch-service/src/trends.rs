use serde::{Deserialize, Serialize};

use trendwatch_domain::StoredTrend;

use crate::{ResponseStatus, TrendService};

/// Display phrases of the current trends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingSearchesResponse {
	pub status: ResponseStatus,
	pub trending_searches: Vec<String>,
	pub error: Option<String>,
}

/// Stored rows of the current trends, undecorated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendListResponse {
	pub status: ResponseStatus,
	pub trends: Vec<StoredTrend>,
	pub count: usize,
	pub error: Option<String>,
}

impl TrendService {
	/// Current trends rendered as display phrases.
	///
	/// Each phrase is generated fresh from the trend's top queries, falling back to the phrase
	/// stored with the batch and then to the representative query.
	pub async fn get_current_trends(
		&self,
		limit: u32,
		min_score: f64,
	) -> TrendingSearchesResponse {
		let stored = match self.store.read_current_trends(limit, min_score).await {
			Ok(stored) => stored,
			Err(err) => {
				tracing::error!(error = %err, "Failed to read current trends.");

				return TrendingSearchesResponse {
					status: ResponseStatus::Error,
					trending_searches: Vec::new(),
					error: Some(crate::Error::from(err).to_string()),
				};
			},
		};
		let mut phrases = Vec::with_capacity(stored.len());

		for row in &stored {
			let trend = &row.trend;
			let phrase = match self.generate_phrase(&trend.top_query_texts()).await {
				Some(phrase) => phrase,
				None => trend
					.representative_query_generated
					.clone()
					.filter(|phrase| !phrase.trim().is_empty())
					.unwrap_or_else(|| trend.representative_query.clone()),
			};

			phrases.push(capitalize_first(&phrase));
		}

		TrendingSearchesResponse {
			status: ResponseStatus::Success,
			trending_searches: phrases,
			error: None,
		}
	}

	pub async fn list_trends(&self, limit: u32, min_score: f64) -> TrendListResponse {
		match self.store.read_current_trends(limit, min_score).await {
			Ok(trends) => TrendListResponse {
				status: ResponseStatus::Success,
				count: trends.len(),
				trends,
				error: None,
			},
			Err(err) => {
				tracing::error!(error = %err, "Failed to list trends.");

				TrendListResponse {
					status: ResponseStatus::Error,
					trends: Vec::new(),
					count: 0,
					error: Some(crate::Error::from(err).to_string()),
				}
			},
		}
	}
}

/// Uppercases the first character, leaving the rest untouched.
pub fn capitalize_first(raw: &str) -> String {
	let trimmed = raw.trim();
	let mut chars = trimmed.chars();

	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars).collect(),
		None => String::new(),
	}
}
