// Per-artifact and per-dashboard outcomes of a run
use crate::application::error::{DashboardFetchError, PairFailure, TemplateError};
use crate::domain::render::{ArtifactKey, ArtifactRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Written {
        artifact: ArtifactRef,
        /// Queries dropped for malformed templates; the plot was drawn without them
        skipped_queries: Vec<TemplateError>,
    },
    Failed(PairFailure),
    /// Not attempted because an earlier datasource error aborted the dashboard
    Aborted,
}

/// Outcome of one (panel, assignment) pair
#[derive(Debug, Clone)]
pub struct RenderResult {
    pub key: ArtifactKey,
    pub outcome: RenderOutcome,
}

impl RenderResult {
    pub fn is_written(&self) -> bool {
        matches!(self.outcome, RenderOutcome::Written { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardState {
    Fetching,
    Expanding,
    Rendering,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct SkippedPanel {
    pub id: i64,
    pub title: String,
    pub kind: String,
}

#[derive(Debug, Clone)]
pub struct DashboardReport {
    pub uid: String,
    pub state: DashboardState,
    pub error: Option<DashboardFetchError>,
    pub results: Vec<RenderResult>,
    pub skipped_panels: Vec<SkippedPanel>,
}

impl DashboardReport {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            state: DashboardState::Fetching,
            error: None,
            results: Vec::new(),
            skipped_panels: Vec::new(),
        }
    }

    pub fn transition(&mut self, next: DashboardState) {
        tracing::debug!("Dashboard {}: {:?} -> {:?}", self.uid, self.state, next);
        self.state = next;
    }

    pub fn fail(mut self, error: DashboardFetchError) -> Self {
        tracing::error!("{}", error);
        self.transition(DashboardState::Failed);
        self.error = Some(error);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub written: usize,
    pub failed: usize,
    pub aborted: usize,
    pub failed_dashboards: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub dashboards: Vec<DashboardReport>,
}

impl RunReport {
    pub fn results(&self) -> impl Iterator<Item = &RenderResult> {
        self.dashboards.iter().flat_map(|d| d.results.iter())
    }

    pub fn tally(&self) -> Tally {
        let mut tally = Tally::default();
        for dashboard in &self.dashboards {
            if dashboard.state == DashboardState::Failed {
                tally.failed_dashboards += 1;
            }
        }
        for result in self.results() {
            match result.outcome {
                RenderOutcome::Written { .. } => tally.written += 1,
                RenderOutcome::Failed(_) => tally.failed += 1,
                RenderOutcome::Aborted => tally.aborted += 1,
            }
        }
        tally
    }

    pub fn is_clean(&self) -> bool {
        let tally = self.tally();
        tally.failed == 0 && tally.aborted == 0 && tally.failed_dashboards == 0
    }
}
