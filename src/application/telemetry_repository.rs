// Repository trait for time series data access
use crate::domain::telemetry::{Query, TimeSeries};
use async_trait::async_trait;

#[async_trait]
pub trait Datasource: Send + Sync {
    /// Execute a range query; an empty result is not an error
    async fn query_range(&self, query: &Query) -> anyhow::Result<Vec<TimeSeries>>;
}
