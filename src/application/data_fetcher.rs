// Data fetcher - Executes queries and normalises the returned series
use crate::application::error::FetchError;
use crate::application::telemetry_repository::Datasource;
use crate::domain::telemetry::{Query, TimeSeries};
use std::sync::Arc;

#[derive(Clone)]
pub struct DataFetcher {
    datasource: Arc<dyn Datasource>,
}

impl DataFetcher {
    pub fn new(datasource: Arc<dyn Datasource>) -> Self {
        Self { datasource }
    }

    /// Run one query without retrying. No matching series is an empty
    /// result, not an error.
    pub async fn fetch(&self, query: &Query) -> Result<Vec<TimeSeries>, FetchError> {
        tracing::debug!(
            "Executing query {} with step {:?}: {}",
            query.ref_id,
            query.step,
            query.expr
        );

        let series = self
            .datasource
            .query_range(query)
            .await
            .map_err(|e| FetchError {
                ref_id: query.ref_id.clone(),
                reason: format!("{:#}", e),
            })?;

        tracing::debug!("Query {} returned {} series", query.ref_id, series.len());
        Ok(series.into_iter().map(normalize).collect())
    }
}

/// Ascending timestamps, first sample wins on exact duplicates
fn normalize(mut series: TimeSeries) -> TimeSeries {
    if !series.points.is_sorted_by_key(|p| p.time_ms) {
        tracing::debug!("Reordering out-of-order samples for {}", series.display_name());
        series.points.sort_by_key(|p| p.time_ms);
    }
    series.points.dedup_by_key(|p| p.time_ms);
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::telemetry::{SeriesPoint, TimeRange};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::BTreeMap;

    struct StaticDatasource {
        result: Result<Vec<TimeSeries>, String>,
    }

    #[async_trait]
    impl Datasource for StaticDatasource {
        async fn query_range(&self, _query: &Query) -> anyhow::Result<Vec<TimeSeries>> {
            match &self.result {
                Ok(series) => Ok(series.clone()),
                Err(e) => anyhow::bail!("{}", e),
            }
        }
    }

    fn query() -> Query {
        let to = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        Query {
            ref_id: "A".to_string(),
            expr: "up".to_string(),
            legend_format: None,
            datasource: None,
            range: TimeRange::ending_at(to, Duration::hours(1)).unwrap(),
            step: std::time::Duration::from_secs(15),
        }
    }

    fn fetcher(result: Result<Vec<TimeSeries>, String>) -> DataFetcher {
        DataFetcher::new(Arc::new(StaticDatasource { result }))
    }

    #[tokio::test]
    async fn test_fetch_sorts_and_deduplicates() {
        let points = vec![
            SeriesPoint::new(3000, 3.0),
            SeriesPoint::new(1000, 1.0),
            SeriesPoint::new(2000, 2.0),
            SeriesPoint::new(1000, 9.0),
            SeriesPoint::new(3000, 7.0),
        ];
        let series = TimeSeries::new(BTreeMap::new(), points);

        let fetched = fetcher(Ok(vec![series])).fetch(&query()).await.unwrap();
        let points = &fetched[0].points;

        assert_eq!(
            points,
            &vec![
                SeriesPoint::new(1000, 1.0),
                SeriesPoint::new(2000, 2.0),
                SeriesPoint::new(3000, 3.0),
            ]
        );
        assert!(points.windows(2).all(|w| w[0].time_ms < w[1].time_ms));
    }

    #[tokio::test]
    async fn test_fetch_empty_result_is_not_an_error() {
        let fetched = fetcher(Ok(Vec::new())).fetch(&query()).await.unwrap();
        assert!(fetched.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_becomes_fetch_error() {
        let err = fetcher(Err("503 Service Unavailable".to_string()))
            .fetch(&query())
            .await
            .unwrap_err();

        assert_eq!(err.ref_id, "A");
        assert!(err.reason.contains("503"));
    }
}
