// Dashboard orchestrator - Drives resolver, builder, fetcher and renderer per dashboard
use crate::application::artifact_sink::ArtifactSink;
use crate::application::dashboard_repository::DashboardSource;
use crate::application::data_fetcher::DataFetcher;
use crate::application::error::{DashboardFetchError, PairFailure, ResolutionError};
use crate::application::panel_renderer::PanelRenderer;
use crate::application::query_builder::QueryBuilder;
use crate::application::render_result::{
    DashboardReport, DashboardState, RenderOutcome, RenderResult, RunReport, SkippedPanel,
};
use crate::application::variable_resolver;
use crate::domain::dashboard::{Dashboard, DashboardSpec, Panel};
use crate::domain::render::{ArtifactKey, Dimensions};
use crate::domain::telemetry::{QueryResult, TimeRange};
use crate::domain::variable::{VariableAssignment, VariableKind};
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Stop a dashboard at its first datasource error
    pub abort_on_api_error: bool,
    pub max_assignments: Option<usize>,
    /// Dashboards processed at the same time
    pub concurrency: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            abort_on_api_error: false,
            max_assignments: None,
            concurrency: 1,
        }
    }
}

pub struct DashboardOrchestrator {
    dashboards: Arc<dyn DashboardSource>,
    builder: QueryBuilder,
    fetcher: DataFetcher,
    renderer: PanelRenderer,
    sink: Arc<dyn ArtifactSink>,
    settings: RunSettings,
}

impl DashboardOrchestrator {
    pub fn new(
        dashboards: Arc<dyn DashboardSource>,
        builder: QueryBuilder,
        fetcher: DataFetcher,
        sink: Arc<dyn ArtifactSink>,
        settings: RunSettings,
    ) -> Self {
        Self {
            dashboards,
            builder,
            fetcher,
            renderer: PanelRenderer::new(),
            sink,
            settings,
        }
    }

    /// Render every configured dashboard. Dashboards are independent: a
    /// failed fetch only fails its own report. A `ResolutionError` is a
    /// configuration defect and ends the run.
    pub async fn run_all(
        &self,
        specs: &[DashboardSpec],
        range: &TimeRange,
    ) -> Result<RunReport, ResolutionError> {
        let concurrency = self.settings.concurrency.max(1);
        tracing::info!(
            "Rendering {} dashboards between {} and {} ({} at a time)",
            specs.len(),
            range.from,
            range.to,
            concurrency
        );

        let dashboards: Vec<DashboardReport> = futures::stream::iter(specs)
            .map(|spec| self.run_dashboard(spec, range))
            .buffered(concurrency)
            .try_collect()
            .await?;

        Ok(RunReport { dashboards })
    }

    pub async fn run_dashboard(
        &self,
        spec: &DashboardSpec,
        range: &TimeRange,
    ) -> Result<DashboardReport, ResolutionError> {
        let mut report = DashboardReport::new(&spec.uid);

        let mut dashboard = match self.dashboards.get_dashboard(&spec.uid).await {
            Ok(dashboard) => dashboard,
            Err(e) => {
                return Ok(report.fail(DashboardFetchError::Request {
                    uid: spec.uid.clone(),
                    reason: format!("{:#}", e),
                }));
            }
        };
        tracing::info!(
            "Dashboard {} ({}): {} panels, {} variables",
            dashboard.uid,
            dashboard.title,
            dashboard.panels.len(),
            dashboard.variables.len()
        );

        if let Err(e) = self.load_selected_values(&mut dashboard, spec, range).await {
            return Ok(report.fail(e));
        }

        report.transition(DashboardState::Expanding);
        let assignments = variable_resolver::resolve(
            &dashboard.variables,
            &spec.selected_variables,
            spec.ignore.as_ref(),
            self.settings.max_assignments,
        )
        .inspect_err(|e| tracing::error!("Dashboard {}: {}", spec.uid, e))?;

        report.transition(DashboardState::Rendering);
        let mut panels: Vec<&Panel> = Vec::new();
        for panel in dashboard.renderable_panels(spec.collapsed) {
            if panel.kind.is_supported() {
                panels.push(panel);
            } else {
                tracing::warn!(
                    "Dashboard {}: skipping panel {} `{}` of unsupported type `{}`",
                    dashboard.uid,
                    panel.id,
                    panel.title,
                    panel.kind.as_str()
                );
                report.skipped_panels.push(SkippedPanel {
                    id: panel.id,
                    title: panel.title.clone(),
                    kind: panel.kind.as_str().to_string(),
                });
            }
        }
        tracing::info!(
            "Dashboard {}: {} panels x {} assignments",
            dashboard.uid,
            panels.len(),
            assignments.len()
        );

        let mut aborted = false;
        for assignment in &assignments {
            for panel in &panels {
                let key = artifact_key(&dashboard, panel, assignment, spec.dimensions);
                if aborted {
                    report.results.push(RenderResult {
                        key,
                        outcome: RenderOutcome::Aborted,
                    });
                    continue;
                }

                let outcome = self
                    .render_pair(panel, assignment, range, spec.dimensions, &key)
                    .await;
                if let RenderOutcome::Failed(failure) = &outcome {
                    tracing::warn!(
                        "Dashboard {}: panel {} `{}` [{}] failed: {}",
                        dashboard.uid,
                        panel.id,
                        panel.title,
                        assignment.describe(),
                        failure
                    );
                    if self.settings.abort_on_api_error && matches!(failure, PairFailure::Fetch(_)) {
                        tracing::warn!(
                            "Dashboard {}: aborting remaining panels after datasource error",
                            dashboard.uid
                        );
                        aborted = true;
                    }
                }
                report.results.push(RenderResult { key, outcome });
            }
        }

        report.transition(DashboardState::Done);
        Ok(report)
    }

    /// Query-backed variables only embed their values when Grafana saved them;
    /// look them up for the variables that will be expanded.
    async fn load_selected_values(
        &self,
        dashboard: &mut Dashboard,
        spec: &DashboardSpec,
        range: &TimeRange,
    ) -> Result<(), DashboardFetchError> {
        let context = variable_resolver::default_assignment(&dashboard.variables);
        for variable in dashboard
            .variables
            .iter_mut()
            .filter(|v| spec.selected_variables.contains(&v.name))
        {
            if !matches!(variable.kind, VariableKind::Query { .. })
                || variable.concrete_candidates().next().is_some()
            {
                continue;
            }

            let values = self
                .dashboards
                .list_variable_values(variable, &context, range)
                .await
                .map_err(|e| DashboardFetchError::VariableValues {
                    uid: spec.uid.clone(),
                    variable: variable.name.clone(),
                    reason: format!("{:#}", e),
                })?;
            tracing::debug!(
                "Dashboard {}: variable {} has {} values",
                spec.uid,
                variable.name,
                values.len()
            );
            variable.candidate_values = values;
        }
        Ok(())
    }

    async fn render_pair(
        &self,
        panel: &Panel,
        assignment: &VariableAssignment,
        range: &TimeRange,
        dimensions: Dimensions,
        key: &ArtifactKey,
    ) -> RenderOutcome {
        let mut skipped_queries = Vec::new();
        let mut results = Vec::new();

        for built in self.builder.build(&panel.targets, assignment, range) {
            let query = match built {
                Ok(query) => query,
                Err(e) => {
                    tracing::warn!("Panel {} `{}`: {}", panel.id, panel.title, e);
                    skipped_queries.push(e);
                    continue;
                }
            };

            match self.fetcher.fetch(&query).await {
                Ok(series) => results.push(QueryResult {
                    ref_id: query.ref_id,
                    legend_format: query.legend_format,
                    series,
                }),
                Err(e) => return RenderOutcome::Failed(e.into()),
            }
        }

        let artifact = match self
            .renderer
            .render(panel, assignment, &results, range, dimensions)
        {
            Ok(artifact) => artifact,
            Err(e) => return RenderOutcome::Failed(e.into()),
        };

        match self.sink.store(key, &artifact).await {
            Ok(stored) => {
                tracing::info!(
                    "Created {} for \"{}\" ({}x{})",
                    stored.location,
                    artifact.title,
                    artifact.dimensions.width,
                    artifact.dimensions.height
                );
                RenderOutcome::Written {
                    artifact: stored,
                    skipped_queries,
                }
            }
            Err(e) => RenderOutcome::Failed(PairFailure::Store(format!("{:#}", e))),
        }
    }
}

fn artifact_key(
    dashboard: &Dashboard,
    panel: &Panel,
    assignment: &VariableAssignment,
    dimensions: Dimensions,
) -> ArtifactKey {
    ArtifactKey {
        dashboard_uid: dashboard.uid.clone(),
        dashboard_slug: dashboard.slug.clone(),
        panel_id: panel.id,
        panel_title: panel.title.clone(),
        assignment: assignment.clone(),
        dimensions,
    }
}
