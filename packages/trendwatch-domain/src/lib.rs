pub mod cluster;
pub mod model;
pub mod normalize;
pub mod score;
pub mod time_serde;
pub mod vector;

pub use cluster::{ClusterParams, Clusters, DistanceMatrix};
pub use model::{EmbeddedQuery, ItemHit, NormalizedQuery, RawQuery, StoredTrend, TopQuery, Trend};
pub use normalize::normalize_query;
pub use score::ScoringParams;
pub use vector::{Metric, UnknownMetric};
