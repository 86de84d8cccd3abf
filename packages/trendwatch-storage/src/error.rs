#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Vector index table {0} does not exist.")]
	IndexNotFound(String),
}
impl Error {
	/// Maps Postgres `undefined_table` (42P01) on `table` to [`Error::IndexNotFound`].
	pub(crate) fn from_table_query(err: sqlx::Error, table: &str) -> Self {
		if let sqlx::Error::Database(db_err) = &err
			&& db_err.code().as_deref() == Some("42P01")
		{
			return Self::IndexNotFound(table.to_string());
		}

		Self::Sqlx(err)
	}
}
