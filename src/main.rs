// Main entry point - Dependency injection and the plotting run
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::application::data_fetcher::DataFetcher;
use crate::application::orchestrator::{DashboardOrchestrator, RunSettings};
use crate::application::query_builder::QueryBuilder;
use crate::infrastructure::config::load_settings;
use crate::infrastructure::file_sink::FileArtifactSink;
use crate::infrastructure::grafana_client::GrafanaClient;
use crate::presentation::cli::Cli;
use crate::presentation::report;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    // Load configuration
    let settings = load_settings(&cli.config)?;
    let specs = settings.dashboard_specs()?;
    let range = cli.time_range(settings.grafana.default_time_slice, Utc::now())?;

    // Create clients (infrastructure layer)
    let grafana = Arc::new(GrafanaClient::new(&settings.grafana, &settings.prometheus)?);
    let output_dir = cli
        .output_dir
        .clone()
        .unwrap_or_else(|| settings.plots.output_dir.clone());
    let sink = Arc::new(FileArtifactSink::new(output_dir));

    // Create the pipeline (application layer)
    let run_settings = RunSettings {
        abort_on_api_error: settings.grafana.abort_on_api_error,
        max_assignments: settings.plots.max_assignments,
        concurrency: if cli.sequentially {
            1
        } else {
            settings.plots.concurrency
        },
    };
    let orchestrator = DashboardOrchestrator::new(
        grafana.clone(),
        QueryBuilder::new(
            settings.prometheus.node_exporter_job_name.clone(),
            settings.prometheus.max_points_per_series,
        ),
        DataFetcher::new(grafana),
        sink,
        run_settings,
    );

    let report = orchestrator.run_all(&specs, &range).await?;
    report::print_summary(&report);

    if !report.is_clean() {
        tracing::warn!("Some plots could not be created");
    }

    Ok(())
}
