// Prometheus HTTP API client, used directly or behind the Grafana proxy
use crate::application::telemetry_repository::Datasource;
use crate::domain::telemetry::{Query, SeriesPoint, TimeRange, TimeSeries};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PrometheusClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    status: String,
    data: Option<T>,
    #[serde(rename = "errorType", default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MatrixData {
    #[serde(rename = "resultType")]
    result_type: String,
    #[serde(default)]
    result: Vec<MatrixSeries>,
}

#[derive(Debug, Deserialize)]
struct MatrixSeries {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    #[serde(default)]
    values: Vec<(f64, String)>,
}

impl PrometheusClient {
    /// `base_url` is everything before `/api/v1`
    pub fn new(base_url: &str, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    /// A client talking straight to a Prometheus server
    pub fn direct(base_url: &str, timeout: Duration, insecure: bool) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(insecure)
            .build()
            .context("Failed to build Prometheus HTTP client")?;
        Ok(Self::new(base_url, http))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_url(&self, path: &str, params: &[(&str, String)]) -> String {
        let query: Vec<String> = params
            .iter()
            .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
            .collect();
        if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query.join("&"))
        }
    }

    async fn execute<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let url = self.build_url(path, params);
        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send request to Prometheus")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read Prometheus response")?;

        // Prometheus reports query errors as JSON bodies on 4xx/5xx
        let parsed: Option<ApiResponse<T>> = serde_json::from_str(&body).ok();
        match parsed {
            Some(api) if api.status == "success" => api
                .data
                .context("Prometheus response has no data"),
            Some(api) => anyhow::bail!(
                "Prometheus query failed ({}): {}",
                api.error_type.unwrap_or_else(|| status.to_string()),
                api.error.unwrap_or_default()
            ),
            None if !status.is_success() => {
                anyhow::bail!("Prometheus request failed with status {}: {}", status, body)
            }
            None => anyhow::bail!("Failed to parse Prometheus response: {}", body),
        }
    }

    /// `GET /api/v1/query_range` with the query's own step
    pub async fn fetch_matrix(&self, query: &Query) -> Result<Vec<TimeSeries>> {
        let params = [
            ("query", query.expr.clone()),
            ("start", query.range.from.timestamp().to_string()),
            ("end", query.range.to.timestamp().to_string()),
            ("step", query.step.as_secs_f64().to_string()),
        ];
        let data: MatrixData = self.execute("/api/v1/query_range", &params).await?;
        if data.result_type != "matrix" {
            anyhow::bail!("Unexpected Prometheus result type {}", data.result_type);
        }

        Ok(data.result.into_iter().map(into_series).collect())
    }

    /// `GET /api/v1/label/<label>/values`
    pub async fn label_values(&self, label: &str, range: &TimeRange) -> Result<Vec<String>> {
        let path = format!("/api/v1/label/{}/values", urlencoding::encode(label));
        let params = [
            ("start", range.from.timestamp().to_string()),
            ("end", range.to.timestamp().to_string()),
        ];
        self.execute(&path, &params).await
    }

    /// Values of `label` across the series matching `matcher`, via `/api/v1/series`
    pub async fn series_label_values(
        &self,
        matcher: &str,
        label: &str,
        range: &TimeRange,
    ) -> Result<Vec<String>> {
        let params = [
            ("match[]", matcher.to_string()),
            ("start", range.from.timestamp().to_string()),
            ("end", range.to.timestamp().to_string()),
        ];
        let series: Vec<BTreeMap<String, String>> = self.execute("/api/v1/series", &params).await?;

        let values: BTreeSet<String> = series
            .into_iter()
            .filter_map(|mut labels| labels.remove(label))
            .collect();
        Ok(values.into_iter().collect())
    }
}

fn into_series(raw: MatrixSeries) -> TimeSeries {
    let points = raw
        .values
        .into_iter()
        .filter_map(|(ts, value)| match value.parse::<f64>() {
            Ok(v) => Some(SeriesPoint::new((ts * 1000.0).round() as i64, v)),
            Err(_) => {
                tracing::debug!("Dropping unparseable sample {:?}", value);
                None
            }
        })
        .collect();
    TimeSeries::new(raw.metric, points)
}

#[async_trait]
impl Datasource for PrometheusClient {
    async fn query_range(&self, query: &Query) -> Result<Vec<TimeSeries>> {
        self.fetch_matrix(query).await
    }
}
