// Query builder - Turns panel targets into executable range queries
use crate::application::error::TemplateError;
use crate::domain::dashboard::PanelTarget;
use crate::domain::telemetry::{Query, TimeRange};
use crate::domain::variable::{BindingOrigin, VariableAssignment};
use std::time::Duration;

pub const DEFAULT_MAX_POINTS: usize = 1000;

const JOB_VARIABLE: &str = "job";
const SCRAPE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    job_name: String,
    max_points: usize,
}

impl QueryBuilder {
    pub fn new(job_name: impl Into<String>, max_points: usize) -> Self {
        Self {
            job_name: job_name.into(),
            max_points: max_points.max(1),
        }
    }

    /// One query per target, in target order. A malformed template only
    /// fails its own entry.
    pub fn build(
        &self,
        targets: &[PanelTarget],
        assignment: &VariableAssignment,
        range: &TimeRange,
    ) -> Vec<Result<Query, TemplateError>> {
        let step = self.step_for(range);

        targets
            .iter()
            .map(|target| {
                let expr = self.substitute(&target.expr, &target.ref_id, assignment, range, step)?;
                Ok(Query {
                    ref_id: target.ref_id.clone(),
                    expr,
                    legend_format: target.legend_format.clone(),
                    datasource: target.datasource.clone(),
                    range: *range,
                    step,
                })
            })
            .collect()
    }

    /// Resolution step keeping a series at or below `max_points` samples
    pub fn step_for(&self, range: &TimeRange) -> Duration {
        let span = range.span().num_seconds().max(1) as u64;
        let step = span.div_ceil(self.max_points as u64);
        Duration::from_secs(step.max(1))
    }

    /// Replace `$name`, `${name}`, `${name:format}` and `[[name]]`.
    /// Names with no value are left as written.
    pub fn substitute(
        &self,
        template: &str,
        ref_id: &str,
        assignment: &VariableAssignment,
        range: &TimeRange,
        step: Duration,
    ) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        let mut offset = 0;

        while let Some(c) = rest.chars().next() {
            let (consumed, name) = if rest.starts_with("${") {
                let end = rest[2..].find('}').ok_or_else(|| TemplateError::Unterminated {
                    ref_id: ref_id.to_string(),
                    opener: "${",
                    position: offset,
                })?;
                let body = &rest[2..2 + end];
                (end + 3, body.split(':').next().unwrap_or_default())
            } else if rest.starts_with("[[") {
                let end = rest[2..].find("]]").ok_or_else(|| TemplateError::Unterminated {
                    ref_id: ref_id.to_string(),
                    opener: "[[",
                    position: offset,
                })?;
                let body = &rest[2..2 + end];
                (end + 4, body.split(':').next().unwrap_or_default())
            } else if c == '$' {
                let len = rest[1..]
                    .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
                    .unwrap_or(rest.len() - 1);
                if len == 0 {
                    // A bare `$`, e.g. a regex anchor
                    out.push(c);
                    rest = &rest[1..];
                    offset += 1;
                    continue;
                }
                (len + 1, &rest[1..1 + len])
            } else {
                out.push(c);
                rest = &rest[c.len_utf8()..];
                offset += c.len_utf8();
                continue;
            };

            if name.trim().is_empty() {
                return Err(TemplateError::EmptyName {
                    ref_id: ref_id.to_string(),
                    position: offset,
                });
            }

            match self.lookup(name.trim(), assignment, range, step) {
                Some(value) => out.push_str(&value),
                None => out.push_str(&rest[..consumed]),
            }
            rest = &rest[consumed..];
            offset += consumed;
        }

        Ok(out)
    }

    /// Built-ins first; `$job` takes a selected binding, else the configured job name, never a dashboard default
    fn lookup(
        &self,
        name: &str,
        assignment: &VariableAssignment,
        range: &TimeRange,
        step: Duration,
    ) -> Option<String> {
        match name {
            "__interval" => return Some(prometheus_duration(step)),
            "__interval_ms" => return Some(step.as_millis().to_string()),
            "__rate_interval" => {
                let rate = (step + SCRAPE_INTERVAL).max(SCRAPE_INTERVAL * 4);
                return Some(prometheus_duration(rate));
            }
            "__range" => return Some(format!("{}s", range.span().num_seconds())),
            "__range_s" => return Some(range.span().num_seconds().to_string()),
            _ => {}
        }

        let binding = assignment.get(name);
        if let Some(b) = binding {
            if b.origin == BindingOrigin::Selected {
                return Some(b.value.clone());
            }
        }
        if name == JOB_VARIABLE {
            return Some(self.job_name.clone());
        }
        binding.map(|b| b.value.clone())
    }
}

/// Render a duration the way PromQL range selectors expect it
pub fn prometheus_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs == 0 {
        format!("{}ms", duration.as_millis())
    } else if secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}
