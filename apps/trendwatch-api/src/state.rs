use std::sync::Arc;

use trendwatch_service::{TrendService, pg};
use trendwatch_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<TrendService>,
}
impl AppState {
	pub async fn new(config: trendwatch_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema(config.storage.vectors.vector_dim).await?;

		let (store, index) = pg::adapters(Arc::new(db), &config.storage.vectors.items_table);
		let service = TrendService::new(config, store, index);

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: TrendService) -> Self {
		Self { service: Arc::new(service) }
	}
}
