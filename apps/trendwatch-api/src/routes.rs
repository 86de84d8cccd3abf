use axum::{
	Json, Router,
	extract::{Query, State, rejection::JsonRejection},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};

use trendwatch_service::{
	BatchResult, Error as ServiceError, ResponseStatus, SearchEnvelope, SearchRequest,
	TrendListResponse, TrendingSearchesResponse,
};

use crate::state::AppState;

pub const DEFAULT_TREND_LIMIT: u32 = 20;
pub const MAX_TREND_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct TrendsQuery {
	limit: Option<u32>,
	min_score: Option<f64>,
}
impl TrendsQuery {
	fn resolve(&self) -> Result<(u32, f64), ApiError> {
		let limit = self.limit.unwrap_or(DEFAULT_TREND_LIMIT);
		let min_score = self.min_score.unwrap_or(0.0);

		if !(1..=MAX_TREND_LIMIT).contains(&limit) {
			return Err(json_error(
				StatusCode::BAD_REQUEST,
				"INVALID_REQUEST",
				format!("limit must be between 1 and {MAX_TREND_LIMIT}."),
				Some(vec!["limit".to_string()]),
			));
		}
		if !min_score.is_finite() {
			return Err(json_error(
				StatusCode::BAD_REQUEST,
				"INVALID_REQUEST",
				"min_score must be a finite number.",
				Some(vec!["min_score".to_string()]),
			));
		}

		Ok((limit, min_score))
	}
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/trends", get(trends))
		.route("/v1/trends/raw", get(raw_trends))
		.route("/v1/search", post(search))
		.route("/v1/admin/run_batch", post(run_batch))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn trends(
	State(state): State<AppState>,
	Query(query): Query<TrendsQuery>,
) -> Result<(StatusCode, Json<TrendingSearchesResponse>), ApiError> {
	let (limit, min_score) = query.resolve()?;
	let response = state.service.get_current_trends(limit, min_score).await;

	Ok((envelope_status(response.status), Json(response)))
}

async fn raw_trends(
	State(state): State<AppState>,
	Query(query): Query<TrendsQuery>,
) -> Result<(StatusCode, Json<TrendListResponse>), ApiError> {
	let (limit, min_score) = query.resolve()?;
	let response = state.service.list_trends(limit, min_score).await;

	Ok((envelope_status(response.status), Json(response)))
}

async fn search(
	State(state): State<AppState>,
	payload: Result<Json<SearchRequest>, JsonRejection>,
) -> (StatusCode, Json<SearchEnvelope>) {
	let result = match payload {
		Ok(Json(payload)) => state.service.search(payload).await,
		Err(rejection) => Err(rejected_search(&rejection)),
	};
	let status = match &result {
		Ok(_) => StatusCode::OK,
		Err(err) => error_status(err),
	};

	(status, Json(SearchEnvelope::from(result)))
}

async fn run_batch(State(state): State<AppState>) -> (StatusCode, Json<BatchResult>) {
	let result = state.service.run_batch().await;

	(envelope_status(result.status), Json(result))
}

/// A body axum could not decode, classified by the field that failed.
fn rejected_search(rejection: &JsonRejection) -> ServiceError {
	let message = rejection.body_text();

	if matches!(rejection, JsonRejection::JsonDataError(_)) && message.contains("embedding") {
		ServiceError::InvalidEmbedding { message }
	} else {
		ServiceError::InvalidRequest { message }
	}
}

fn envelope_status(status: ResponseStatus) -> StatusCode {
	match status {
		ResponseStatus::Success => StatusCode::OK,
		ResponseStatus::Error => StatusCode::INTERNAL_SERVER_ERROR,
	}
}

fn error_status(err: &ServiceError) -> StatusCode {
	match err {
		ServiceError::InvalidRequest { .. }
		| ServiceError::InvalidEmbedding { .. }
		| ServiceError::UnknownMetric { .. } => StatusCode::BAD_REQUEST,
		ServiceError::IndexNotFound { .. } => StatusCode::NOT_FOUND,
		ServiceError::Embedding { .. } | ServiceError::Provider { .. } => StatusCode::BAD_GATEWAY,
		ServiceError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
	}
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(
	status: StatusCode,
	code: &str,
	message: impl Into<String>,
	fields: Option<Vec<String>>,
) -> ApiError {
	ApiError::new(status, code, message, fields)
}
