// Grafana HTTP API client: dashboards, datasources and the Prometheus proxy
use crate::application::dashboard_repository::DashboardSource;
use crate::application::query_builder::QueryBuilder;
use crate::application::telemetry_repository::Datasource;
use crate::domain::dashboard::{Dashboard, DatasourceRef};
use crate::domain::telemetry::{Query, TimeRange, TimeSeries};
use crate::domain::variable::{
    META_VALUE_PREFIX, TemplateVariable, VariableAssignment, VariableKind,
};
use crate::infrastructure::config::{GrafanaSettings, PrometheusSettings};
use crate::infrastructure::grafana_model::DashboardResponse;
use crate::infrastructure::prometheus_client::PrometheusClient;
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::sync::OnceCell;

static LABEL_VALUES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^label_values\((?:(.+),\s*)?([a-zA-Z_][a-zA-Z0-9_]*)\)\s*$")
        .expect("label_values pattern is valid")
});

#[derive(Debug, Clone, Deserialize)]
pub struct DatasourceInfo {
    pub id: i64,
    #[serde(default)]
    pub uid: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "isDefault", default)]
    pub is_default: bool,
}

pub struct GrafanaClient {
    base_url: String,
    http: reqwest::Client,
    builder: QueryBuilder,
    datasource_override: Option<String>,
    /// Bypasses the proxy for both panel and variable queries
    direct: Option<PrometheusClient>,
    datasources: OnceCell<Vec<DatasourceInfo>>,
}

impl GrafanaClient {
    pub fn new(grafana: &GrafanaSettings, prometheus: &PrometheusSettings) -> Result<Self> {
        let timeout = Duration::from_secs(grafana.timeout_secs);

        let mut headers = HeaderMap::new();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", grafana.api_key))
            .context("Grafana API key is not a valid header value")?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("X-Grafana-Org-Id", HeaderValue::from(grafana.org_id));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .danger_accept_invalid_certs(grafana.insecure_tls_skip_verify)
            .build()
            .context("Failed to build Grafana HTTP client")?;

        let direct = match &prometheus.url {
            Some(url) => {
                let client =
                    PrometheusClient::direct(url, timeout, grafana.insecure_tls_skip_verify)?;
                tracing::info!("Querying Prometheus directly at {}", client.base_url());
                Some(client)
            }
            None => None,
        };

        Ok(Self {
            base_url: grafana.base_url.trim_end_matches('/').to_string(),
            http,
            builder: QueryBuilder::new(
                prometheus.node_exporter_job_name.clone(),
                prometheus.max_points_per_series,
            ),
            datasource_override: prometheus.datasource.clone(),
            direct,
            datasources: OnceCell::new(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to send request to Grafana")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Grafana request {} failed with status {}: {}", path, status, body);
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse Grafana response for {}", path))
    }

    async fn datasources(&self) -> Result<&[DatasourceInfo]> {
        let list = self
            .datasources
            .get_or_try_init(|| self.get_json::<Vec<DatasourceInfo>>("/api/datasources"))
            .await?;
        Ok(list.as_slice())
    }

    /// The Prometheus client serving `reference`
    async fn prometheus_for(&self, reference: Option<&DatasourceRef>) -> Result<PrometheusClient> {
        if let Some(direct) = &self.direct {
            return Ok(direct.clone());
        }

        let datasources = self.datasources().await?;
        let override_ref = self.datasource_override.clone().map(DatasourceRef::Name);
        let reference = override_ref.as_ref().or(reference);
        let info = select_datasource(datasources, reference)?;

        if info.kind != "prometheus" {
            anyhow::bail!(
                "datasource {} has unsupported type {}",
                info.name,
                info.kind
            );
        }

        Ok(PrometheusClient::new(&self.proxy_url(info), self.http.clone()))
    }

    /// The `match[]` selector of `label_values(metric, label)` with `$job` and
    /// the dashboard's other variables filled in
    fn series_matcher(
        &self,
        metric: &str,
        variable: &str,
        context: &VariableAssignment,
        range: &TimeRange,
    ) -> Result<String> {
        let step = self.builder.step_for(range);
        Ok(self.builder.substitute(metric, variable, context, range, step)?)
    }

    fn proxy_url(&self, info: &DatasourceInfo) -> String {
        if info.uid.is_empty() {
            format!("{}/api/datasources/proxy/{}", self.base_url, info.id)
        } else {
            format!("{}/api/datasources/proxy/uid/{}", self.base_url, info.uid)
        }
    }
}

fn select_datasource<'a>(
    datasources: &'a [DatasourceInfo],
    reference: Option<&DatasourceRef>,
) -> Result<&'a DatasourceInfo> {
    match reference.filter(|r| !r.is_templated()) {
        Some(DatasourceRef::Name(name)) => datasources
            .iter()
            .find(|ds| &ds.name == name)
            .or_else(|| datasources.iter().find(|ds| &ds.uid == name))
            .with_context(|| format!("unknown datasource {}", name)),
        Some(DatasourceRef::Uid(uid)) => datasources
            .iter()
            .find(|ds| &ds.uid == uid)
            .or_else(|| datasources.iter().find(|ds| &ds.name == uid))
            .with_context(|| format!("unknown datasource uid {}", uid)),
        None => datasources
            .iter()
            .find(|ds| ds.is_default && ds.kind == "prometheus")
            .or_else(|| datasources.iter().find(|ds| ds.kind == "prometheus"))
            .context("no Prometheus datasource configured in Grafana"),
    }
}

/// `label_values(metric, label)` or `label_values(label)`
fn parse_label_values(query: &str) -> Option<(Option<String>, String)> {
    let captures = LABEL_VALUES.captures(query.trim())?;
    let metric = captures
        .get(1)
        .map(|m| m.as_str().trim().to_string())
        .filter(|m| !m.is_empty());
    Some((metric, captures[2].to_string()))
}

/// Apply a variable's `regex` (written as `/pattern/flags`): non-matching values
/// are dropped and the first capture group, when present, replaces the value.
fn apply_variable_regex(values: Vec<String>, pattern: Option<&str>) -> Result<Vec<String>> {
    let Some(pattern) = pattern else {
        return Ok(values);
    };

    let body = match pattern.strip_prefix('/') {
        Some(rest) => match rest.rfind('/') {
            Some(end) => {
                let flags = &rest[end + 1..];
                let inner = &rest[..end];
                if flags.contains('i') {
                    format!("(?i){}", inner)
                } else {
                    inner.to_string()
                }
            }
            None => rest.to_string(),
        },
        None => pattern.to_string(),
    };
    let regex = Regex::new(&body).with_context(|| format!("invalid variable regex {}", pattern))?;

    Ok(values
        .into_iter()
        .filter_map(|value| {
            let captures = regex.captures(&value)?;
            let extracted = captures.get(1).or_else(|| captures.get(0))?;
            Some(extracted.as_str().to_string())
        })
        .collect())
}

#[async_trait]
impl DashboardSource for GrafanaClient {
    async fn get_dashboard(&self, uid: &str) -> Result<Dashboard> {
        let path = format!("/api/dashboards/uid/{}", urlencoding::encode(uid));
        let response: DashboardResponse = self.get_json(&path).await?;
        Ok(response.into_dashboard(uid))
    }

    async fn list_variable_values(
        &self,
        variable: &TemplateVariable,
        context: &VariableAssignment,
        range: &TimeRange,
    ) -> Result<Vec<String>> {
        let VariableKind::Query {
            query,
            datasource,
            regex,
        } = &variable.kind
        else {
            anyhow::bail!(
                "variable {} of type {} has no queryable values",
                variable.name,
                variable.kind.name()
            );
        };

        let (metric, label) = parse_label_values(query)
            .with_context(|| format!("unsupported variable query {}", query))?;
        let prometheus = self.prometheus_for(datasource.as_ref()).await?;

        let values = match metric {
            Some(metric) => {
                let matcher = self.series_matcher(&metric, &variable.name, context, range)?;
                prometheus.series_label_values(&matcher, &label, range).await?
            }
            None => prometheus.label_values(&label, range).await?,
        };

        let values: Vec<String> = values
            .into_iter()
            .filter(|v| !v.starts_with(META_VALUE_PREFIX))
            .collect();
        let values = apply_variable_regex(values, regex.as_deref())?;
        let unique: BTreeSet<String> = values.into_iter().collect();

        tracing::debug!(
            "Variable {} has {} values",
            variable.name,
            unique.len()
        );
        Ok(unique.into_iter().collect())
    }
}

#[async_trait]
impl Datasource for GrafanaClient {
    async fn query_range(&self, query: &Query) -> Result<Vec<TimeSeries>> {
        let prometheus = self.prometheus_for(query.datasource.as_ref()).await?;
        prometheus.fetch_matrix(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datasource(id: i64, uid: &str, name: &str, kind: &str, is_default: bool) -> DatasourceInfo {
        DatasourceInfo {
            id,
            uid: uid.to_string(),
            name: name.to_string(),
            kind: kind.to_string(),
            is_default,
        }
    }

    fn datasources() -> Vec<DatasourceInfo> {
        vec![
            datasource(1, "loki-1", "Loki", "loki", true),
            datasource(2, "prom-1", "Prometheus", "prometheus", false),
            datasource(3, "prom-2", "Thanos", "prometheus", true),
        ]
    }

    fn settings() -> (GrafanaSettings, PrometheusSettings) {
        let grafana = GrafanaSettings {
            base_url: "https://grafana.example.com/".to_string(),
            api_key: "secret".to_string(),
            insecure_tls_skip_verify: false,
            default_time_slice: 3600,
            abort_on_api_error: false,
            timeout_secs: 30,
            org_id: 1,
        };
        (grafana, PrometheusSettings::default())
    }

    #[test]
    fn test_parse_label_values() {
        assert_eq!(
            parse_label_values("label_values(node_uname_info{job=\"$job\"}, instance)"),
            Some((
                Some("node_uname_info{job=\"$job\"}".to_string()),
                "instance".to_string()
            ))
        );
        assert_eq!(
            parse_label_values("label_values(job)"),
            Some((None, "job".to_string()))
        );
        assert_eq!(parse_label_values("query_result(up)"), None);
        assert_eq!(parse_label_values("label_values(up, 1bad)"), None);
    }

    #[test]
    fn test_apply_variable_regex() {
        let values = vec![
            "10.0.0.1:9100".to_string(),
            "10.0.0.2:9100".to_string(),
            "db:5432".to_string(),
        ];

        let extracted = apply_variable_regex(values.clone(), Some("/(.*):9100/")).unwrap();
        assert_eq!(extracted, vec!["10.0.0.1", "10.0.0.2"]);

        let filtered = apply_variable_regex(values.clone(), Some("/^DB/i")).unwrap();
        assert_eq!(filtered, vec!["db"]);

        let untouched = apply_variable_regex(values.clone(), None).unwrap();
        assert_eq!(untouched, values);

        assert!(apply_variable_regex(values, Some("/(unclosed/")).is_err());
    }

    #[test]
    fn test_select_datasource() {
        let list = datasources();

        let by_name = DatasourceRef::Name("Prometheus".to_string());
        assert_eq!(select_datasource(&list, Some(&by_name)).unwrap().id, 2);

        let by_uid = DatasourceRef::Uid("prom-2".to_string());
        assert_eq!(select_datasource(&list, Some(&by_uid)).unwrap().id, 3);

        // Default Prometheus, skipping the default Loki
        assert_eq!(select_datasource(&list, None).unwrap().id, 3);

        let templated = DatasourceRef::Uid("${DS_PROMETHEUS}".to_string());
        assert_eq!(select_datasource(&list, Some(&templated)).unwrap().id, 3);

        let unknown = DatasourceRef::Name("Graphite".to_string());
        assert!(select_datasource(&list, Some(&unknown)).is_err());
        assert!(select_datasource(&[], None).is_err());
    }

    #[test]
    fn test_proxy_url() {
        let (grafana, prometheus) = settings();
        let client = GrafanaClient::new(&grafana, &prometheus).unwrap();
        let list = datasources();

        assert_eq!(
            client.proxy_url(&list[1]),
            "https://grafana.example.com/api/datasources/proxy/uid/prom-1"
        );
        assert_eq!(
            client.proxy_url(&datasource(7, "", "Old", "prometheus", false)),
            "https://grafana.example.com/api/datasources/proxy/7"
        );
    }

    #[test]
    fn test_series_matcher_uses_dashboard_context() {
        use crate::domain::variable::BindingOrigin;

        let (grafana, prometheus) = settings();
        let client = GrafanaClient::new(&grafana, &prometheus).unwrap();
        let range = TimeRange::new(
            chrono::DateTime::from_timestamp(0, 0).unwrap(),
            chrono::DateTime::from_timestamp(3600, 0).unwrap(),
        )
        .unwrap();

        let mut context = VariableAssignment::new();
        context.bind("node", "h1:9100", BindingOrigin::Default);
        let matcher = client
            .series_matcher(
                "node_network_info{instance=\"$node\",job=\"$job\"}",
                "device",
                &context,
                &range,
            )
            .unwrap();

        assert_eq!(matcher, "node_network_info{instance=\"h1:9100\",job=\"node\"}");
        assert!(!matcher.contains('$'));
    }

    #[tokio::test]
    async fn test_direct_prometheus_skips_datasource_lookup() {
        let (grafana, mut prometheus) = settings();
        prometheus.url = Some("http://prometheus:9090".to_string());
        let client = GrafanaClient::new(&grafana, &prometheus).unwrap();

        let selected = client.prometheus_for(None).await.unwrap();
        assert_eq!(selected.base_url(), "http://prometheus:9090");
    }

    #[tokio::test]
    async fn test_non_query_variables_have_no_lookup() {
        let (grafana, prometheus) = settings();
        let client = GrafanaClient::new(&grafana, &prometheus).unwrap();
        let variable = TemplateVariable::new("protocol", VariableKind::Custom, vec!["tcp".to_string()]);
        let range = TimeRange::new(
            chrono::DateTime::from_timestamp(0, 0).unwrap(),
            chrono::DateTime::from_timestamp(3600, 0).unwrap(),
        )
        .unwrap();

        assert!(
            client
                .list_variable_values(&variable, &VariableAssignment::new(), &range)
                .await
                .is_err()
        );
    }
}
