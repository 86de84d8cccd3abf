pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Invalid embedding: {message}")]
	InvalidEmbedding { message: String },
	#[error("Unknown metric {metric:?}; expected cosine, euclidean, or l2.")]
	UnknownMetric { metric: String },
	#[error("Index not found: {message}")]
	IndexNotFound { message: String },
	#[error("Embedding error: {message}")]
	Embedding { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl Error {
	/// Stable machine-readable name of the error kind.
	pub fn code(&self) -> &'static str {
		match self {
			Self::InvalidRequest { .. } => "INVALID_REQUEST",
			Self::InvalidEmbedding { .. } => "INVALID_EMBEDDING",
			Self::UnknownMetric { .. } => "UNKNOWN_METRIC",
			Self::IndexNotFound { .. } => "INDEX_NOT_FOUND",
			Self::Embedding { .. } => "EMBEDDING_ERROR",
			Self::Provider { .. } => "PROVIDER_ERROR",
			Self::Storage { .. } => "STORAGE_ERROR",
		}
	}
}

impl From<trendwatch_storage::Error> for Error {
	fn from(err: trendwatch_storage::Error) -> Self {
		match err {
			trendwatch_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			trendwatch_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			trendwatch_storage::Error::NotFound(message) => Self::Storage { message },
			trendwatch_storage::Error::IndexNotFound(table) =>
				Self::IndexNotFound { message: format!("Table {table} does not exist.") },
		}
	}
}

impl From<trendwatch_domain::UnknownMetric> for Error {
	fn from(err: trendwatch_domain::UnknownMetric) -> Self {
		Self::UnknownMetric { metric: err.0 }
	}
}

impl From<color_eyre::Report> for Error {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
