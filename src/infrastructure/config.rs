use crate::domain::dashboard::DashboardSpec;
use crate::domain::render::{DEFAULT_HEIGHT, DEFAULT_WIDTH, Dimensions};
use crate::domain::variable::IgnorePattern;
use anyhow::Context;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub grafana: GrafanaSettings,
    #[serde(default)]
    pub prometheus: PrometheusSettings,
    #[serde(default)]
    pub plots: PlotSettings,
    #[serde(default)]
    pub dashboards: Vec<DashboardConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GrafanaSettings {
    pub base_url: String,
    pub api_key: String,
    #[serde(default)]
    pub insecure_tls_skip_verify: bool,
    /// Seconds before `--to` covered when `--from` is not given
    #[serde(default = "default_time_slice")]
    pub default_time_slice: u64,
    #[serde(default)]
    pub abort_on_api_error: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_org_id")]
    pub org_id: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PrometheusSettings {
    #[serde(default = "default_job_name")]
    pub node_exporter_job_name: String,
    /// Datasource name used for every panel instead of the dashboard's own
    #[serde(default)]
    pub datasource: Option<String>,
    /// Query this Prometheus directly instead of going through Grafana
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_points")]
    pub max_points_per_series: usize,
}

impl Default for PrometheusSettings {
    fn default() -> Self {
        Self {
            node_exporter_job_name: default_job_name(),
            datasource: None,
            url: None,
            max_points_per_series: default_max_points(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlotSettings {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub max_assignments: Option<usize>,
}

impl Default for PlotSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            concurrency: default_concurrency(),
            max_assignments: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub uid: String,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub graph_dimensions: GraphDimensions,
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default)]
    pub ignore_regex: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct GraphDimensions {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

impl Default for GraphDimensions {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
        }
    }
}

fn default_time_slice() -> u64 {
    3600
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_org_id() -> u64 {
    1
}

fn default_job_name() -> String {
    "node".to_string()
}

fn default_max_points() -> usize {
    crate::application::query_builder::DEFAULT_MAX_POINTS
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("plots")
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_width() -> u32 {
    DEFAULT_WIDTH
}

fn default_height() -> u32 {
    DEFAULT_HEIGHT
}

/// Load the settings file (any format the `config` crate detects from the
/// extension) with `PLOTTER__SECTION__KEY` environment overrides.
pub fn load_settings(path: &str) -> anyhow::Result<Settings> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name(path))
        .add_source(
            config::Environment::with_prefix("PLOTTER")
                .prefix_separator("__")
                .separator("__"),
        );

    from_builder(builder).with_context(|| format!("Invalid configuration in {}", path))
}

fn from_builder(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> anyhow::Result<Settings> {
    let settings: Settings = builder.build()?.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}

impl Settings {
    fn validate(&self) -> anyhow::Result<()> {
        if self.grafana.base_url.trim().is_empty() {
            anyhow::bail!("grafana.base_url must not be empty");
        }
        if self.dashboards.is_empty() {
            anyhow::bail!("no dashboards configured");
        }
        for dashboard in &self.dashboards {
            dashboard.to_spec()?;
        }
        Ok(())
    }

    pub fn dashboard_specs(&self) -> anyhow::Result<Vec<DashboardSpec>> {
        self.dashboards.iter().map(DashboardConfig::to_spec).collect()
    }
}

impl DashboardConfig {
    pub fn to_spec(&self) -> anyhow::Result<DashboardSpec> {
        if self.uid.trim().is_empty() {
            anyhow::bail!("dashboard uid must not be empty");
        }

        let ignore = match self.ignore_regex.as_deref() {
            Some(pattern) if !pattern.is_empty() => Some(
                IgnorePattern::new(pattern).with_context(|| {
                    format!("invalid ignore_regex for dashboard {}", self.uid)
                })?,
            ),
            _ => None,
        };

        let mut spec = DashboardSpec::new(self.uid.clone());
        spec.collapsed = self.collapsed;
        spec.dimensions = Dimensions::new(self.graph_dimensions.width, self.graph_dimensions.height);
        spec.selected_variables = self.variables.clone();
        spec.ignore = ignore;
        Ok(spec)
    }
}
