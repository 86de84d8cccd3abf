use std::sync::Arc;

use color_eyre::eyre;

use trendwatch_service::{BoxFuture, TrendService};

use crate::scheduler::ScheduledJob;

pub const TREND_BATCH: &str = "trend_batch";
pub const VIEW_REFRESH: &str = "materialized_view_refresh";

/// One trend detection batch per tick.
pub struct TrendBatchJob {
	service: Arc<TrendService>,
}
impl TrendBatchJob {
	pub fn new(service: Arc<TrendService>) -> Self {
		Self { service }
	}
}
impl ScheduledJob for TrendBatchJob {
	fn name(&self) -> &str {
		TREND_BATCH
	}

	fn run_once<'a>(&'a self) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			let result = self.service.run_batch().await;

			if !result.is_success() {
				return Err(eyre::eyre!(
					"Trend batch failed: {}.",
					result.error.as_deref().unwrap_or("unknown error")
				));
			}

			Ok(())
		})
	}
}

/// Refreshes the query statistics views.
pub struct MaterializedViewRefreshJob {
	service: Arc<TrendService>,
}
impl MaterializedViewRefreshJob {
	pub fn new(service: Arc<TrendService>) -> Self {
		Self { service }
	}
}
impl ScheduledJob for MaterializedViewRefreshJob {
	fn name(&self) -> &str {
		VIEW_REFRESH
	}

	fn run_once<'a>(&'a self) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			self.service.refresh_materialized_views().await?;

			tracing::info!("Materialized views refreshed.");

			Ok(())
		})
	}
}
