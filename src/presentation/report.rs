// Human readable run summary
use crate::application::render_result::{DashboardReport, RenderOutcome, RunReport};

pub fn print_summary(report: &RunReport) {
    for line in summary_lines(report) {
        println!("{}", line);
    }
}

pub fn summary_lines(report: &RunReport) -> Vec<String> {
    let mut lines = Vec::new();
    for dashboard in &report.dashboards {
        dashboard_lines(dashboard, &mut lines);
    }

    let tally = report.tally();
    lines.push(format!(
        "{} written, {} failed, {} aborted, {} dashboard(s) failed",
        tally.written, tally.failed, tally.aborted, tally.failed_dashboards
    ));
    lines
}

fn dashboard_lines(dashboard: &DashboardReport, lines: &mut Vec<String>) {
    if let Some(error) = &dashboard.error {
        lines.push(format!("{} ({:?}): {}", dashboard.uid, dashboard.state, error));
        return;
    }

    let written = dashboard.results.iter().filter(|r| r.is_written()).count();
    lines.push(format!(
        "{} ({:?}): {}/{} plots written",
        dashboard.uid,
        dashboard.state,
        written,
        dashboard.results.len()
    ));

    for panel in &dashboard.skipped_panels {
        lines.push(format!(
            "  skipped panel {} \"{}\" of type {}",
            panel.id, panel.title, panel.kind
        ));
    }

    for result in &dashboard.results {
        let assignment = result.key.assignment.describe();
        let mut target = format!("panel {} \"{}\"", result.key.panel_id, result.key.panel_title);
        if !assignment.is_empty() {
            target.push_str(&format!(" [{}]", assignment));
        }
        match &result.outcome {
            RenderOutcome::Written {
                skipped_queries, ..
            } => {
                for error in skipped_queries {
                    lines.push(format!("  {}: {}", target, error));
                }
            }
            RenderOutcome::Failed(failure) => lines.push(format!("  {} failed: {}", target, failure)),
            RenderOutcome::Aborted => lines.push(format!("  {} aborted", target)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::error::{
        DashboardFetchError, FetchError, PairFailure, TemplateError,
    };
    use crate::application::render_result::{DashboardState, RenderResult, SkippedPanel};
    use crate::domain::render::{ArtifactKey, ArtifactRef, Dimensions};
    use crate::domain::variable::{BindingOrigin, VariableAssignment};

    fn key(panel_id: i64, job: &str) -> ArtifactKey {
        let mut assignment = VariableAssignment::new();
        assignment.bind("job", job, BindingOrigin::Selected);
        ArtifactKey {
            dashboard_uid: "net".to_string(),
            dashboard_slug: "network".to_string(),
            panel_id,
            panel_title: "Traffic".to_string(),
            assignment,
            dimensions: Dimensions::default(),
        }
    }

    #[test]
    fn test_summary_lines() {
        let mut net = DashboardReport::new("net");
        net.transition(DashboardState::Done);
        net.skipped_panels.push(SkippedPanel {
            id: 9,
            title: "Uptime".to_string(),
            kind: "stat".to_string(),
        });
        net.results = vec![
            RenderResult {
                key: key(1, "a"),
                outcome: RenderOutcome::Written {
                    artifact: ArtifactRef {
                        location: "plots/network/a/traffic-1.svg".to_string(),
                    },
                    skipped_queries: vec![TemplateError::EmptyName {
                        ref_id: "B".to_string(),
                        position: 3,
                    }],
                },
            },
            RenderResult {
                key: key(1, "b"),
                outcome: RenderOutcome::Failed(PairFailure::Fetch(FetchError {
                    ref_id: "A".to_string(),
                    reason: "timeout".to_string(),
                })),
            },
            RenderResult {
                key: key(1, "c"),
                outcome: RenderOutcome::Aborted,
            },
        ];

        let missing = DashboardReport::new("gone").fail(DashboardFetchError::Request {
            uid: "gone".to_string(),
            reason: "404".to_string(),
        });

        let report = RunReport {
            dashboards: vec![net, missing],
        };
        let lines = summary_lines(&report);

        assert_eq!(lines[0], "net (Done): 1/3 plots written");
        assert_eq!(lines[1], "  skipped panel 9 \"Uptime\" of type stat");
        assert_eq!(lines[2], "  panel 1 \"Traffic\" [job=a]: query B: empty placeholder name at byte 3");
        assert_eq!(lines[3], "  panel 1 \"Traffic\" [job=b] failed: query A failed: timeout");
        assert_eq!(lines[4], "  panel 1 \"Traffic\" [job=c] aborted");
        assert_eq!(lines[5], "gone (Failed): failed to fetch dashboard gone: 404");
        assert_eq!(lines[6], "1 written, 1 failed, 1 aborted, 1 dashboard(s) failed");
    }
}
