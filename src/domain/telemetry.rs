// Time series domain models
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

use super::dashboard::DatasourceRef;

/// Inclusive time window shared read-only by every query of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> anyhow::Result<Self> {
        if from >= to {
            anyhow::bail!("time range start {} must be before its end {}", from, to);
        }
        Ok(Self { from, to })
    }

    /// The window ending at `to` and spanning `span` back in time
    pub fn ending_at(to: DateTime<Utc>, span: Duration) -> anyhow::Result<Self> {
        Self::new(to - span, to)
    }

    pub fn span(&self) -> Duration {
        self.to - self.from
    }
}

/// One executable query produced for a panel target
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub ref_id: String,
    pub expr: String,
    pub legend_format: Option<String>,
    pub datasource: Option<DatasourceRef>,
    pub range: TimeRange,
    pub step: std::time::Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub time_ms: i64,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(time_ms: i64, value: f64) -> Self {
        Self { time_ms, value }
    }
}

/// A label set plus its samples, time-ascending
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub labels: BTreeMap<String, String>,
    pub points: Vec<SeriesPoint>,
}

impl TimeSeries {
    pub fn new(labels: BTreeMap<String, String>, points: Vec<SeriesPoint>) -> Self {
        Self { labels, points }
    }

    /// Prometheus style identity, e.g. `up{instance="a:9100", job="node"}`
    pub fn display_name(&self) -> String {
        let metric = self.labels.get("__name__").map(String::as_str).unwrap_or("");
        let labels: Vec<String> = self
            .labels
            .iter()
            .filter(|(k, _)| k.as_str() != "__name__")
            .map(|(k, v)| format!("{}=\"{}\"", k, v))
            .collect();

        if labels.is_empty() {
            metric.to_string()
        } else {
            format!("{}{{{}}}", metric, labels.join(", "))
        }
    }
}

/// The series one query returned, kept with the legend template of its target
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub ref_id: String,
    pub legend_format: Option<String>,
    pub series: Vec<TimeSeries>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_time_range_rejects_inverted_bounds() {
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert!(TimeRange::new(t, t).is_err());
        assert!(TimeRange::new(t, t - Duration::seconds(1)).is_err());

        let range = TimeRange::ending_at(t, Duration::hours(1)).unwrap();
        assert_eq!(range.span(), Duration::hours(1));
    }

    #[test]
    fn test_display_name() {
        let mut labels = BTreeMap::new();
        labels.insert("__name__".to_string(), "up".to_string());
        labels.insert("job".to_string(), "node".to_string());
        labels.insert("instance".to_string(), "a:9100".to_string());

        let series = TimeSeries::new(labels, Vec::new());
        assert_eq!(series.display_name(), "up{instance=\"a:9100\", job=\"node\"}");

        let bare = TimeSeries::new(BTreeMap::new(), Vec::new());
        assert_eq!(bare.display_name(), "");
    }
}
