// Variable resolver - Expands a variable selection into rendering passes
use crate::application::error::ResolutionError;
use crate::domain::variable::{
    BindingOrigin, IgnorePattern, TemplateVariable, VariableAssignment, VariableKind,
};

/// Produce the assignments to render, in deterministic order.
///
/// With no selection the result is the single dashboard-defaults pass.
/// Otherwise the selected variables (in declared order) are expanded to the
/// Cartesian product of their usable values, the first variable varying
/// slowest. Unselected variables keep their dashboard default in every pass.
pub fn resolve(
    variables: &[TemplateVariable],
    selected: &[String],
    ignore: Option<&IgnorePattern>,
    limit: Option<usize>,
) -> Result<Vec<VariableAssignment>, ResolutionError> {
    let defaults = default_assignment(variables);
    if selected.is_empty() {
        return Ok(vec![defaults]);
    }

    let mut axes: Vec<(&str, Vec<&str>)> = Vec::new();
    for variable in variables.iter().filter(|v| selected.contains(&v.name)) {
        axes.push((variable.name.as_str(), usable_values(variable, ignore)?));
    }

    let count = axes
        .iter()
        .try_fold(1usize, |acc, (_, values)| acc.checked_mul(values.len()))
        .unwrap_or(usize::MAX);
    if let Some(limit) = limit {
        if count > limit {
            return Err(ResolutionError::TooManyAssignments { count, limit });
        }
    }

    let mut assignments = vec![defaults];
    for (name, values) in axes {
        let mut next = Vec::with_capacity(assignments.len() * values.len());
        for assignment in &assignments {
            for value in &values {
                let mut expanded = assignment.clone();
                expanded.bind(name, *value, BindingOrigin::Selected);
                next.push(expanded);
            }
        }
        assignments = next;
    }

    tracing::debug!("Resolved {} variable assignments", assignments.len());
    Ok(assignments)
}

/// The dashboard's own saved values, one `Default` binding per variable
pub fn default_assignment(variables: &[TemplateVariable]) -> VariableAssignment {
    let mut assignment = VariableAssignment::new();
    for variable in variables {
        if let Some(value) = variable.default_value() {
            assignment.bind(variable.name.clone(), value, BindingOrigin::Default);
        }
    }
    assignment
}

fn usable_values<'a>(
    variable: &'a TemplateVariable,
    ignore: Option<&IgnorePattern>,
) -> Result<Vec<&'a str>, ResolutionError> {
    let mut concrete: Vec<&str> = Vec::new();
    for value in variable.concrete_candidates() {
        if !concrete.contains(&value.as_str()) {
            concrete.push(value);
        }
    }

    if concrete.is_empty() {
        return Err(match &variable.kind {
            VariableKind::Other(kind) => ResolutionError::UnsupportedVariable {
                variable: variable.name.clone(),
                kind: kind.clone(),
            },
            _ => ResolutionError::NoValues {
                variable: variable.name.clone(),
            },
        });
    }

    let Some(ignore) = ignore else {
        return Ok(concrete);
    };

    let usable: Vec<&str> = concrete
        .into_iter()
        .filter(|v| !ignore.is_ignored(v))
        .collect();
    if usable.is_empty() {
        return Err(ResolutionError::AllValuesIgnored {
            variable: variable.name.clone(),
            pattern: ignore.as_str().to_string(),
        });
    }

    Ok(usable)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom(name: &str, values: &[&str], current: &str) -> TemplateVariable {
        TemplateVariable::new(
            name,
            VariableKind::Custom,
            values.iter().map(|v| v.to_string()).collect(),
        )
        .with_current(current)
    }

    fn selected(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn pairs(assignment: &VariableAssignment) -> Vec<(String, String)> {
        assignment
            .selected()
            .map(|b| (b.name.clone(), b.value.clone()))
            .collect()
    }

    #[test]
    fn test_empty_selection_yields_defaults() {
        let variables = vec![
            custom("job", &["a", "b"], "b"),
            custom("protocol", &["tcp", "udp"], "udp"),
        ];

        let assignments = resolve(&variables, &[], None, None).unwrap();
        assert_eq!(assignments.len(), 1);

        let only = &assignments[0];
        assert!(only.is_default_pass());
        assert_eq!(only.get("job").unwrap().value, "b");
        assert_eq!(only.get("protocol").unwrap().value, "udp");
    }

    #[test]
    fn test_auto_interval_default_never_reaches_queries() {
        use crate::application::query_builder::QueryBuilder;
        use crate::domain::dashboard::PanelTarget;
        use crate::domain::telemetry::TimeRange;

        let variables = vec![TemplateVariable::new(
            "interval",
            VariableKind::Interval,
            vec!["1m".to_string(), "5m".to_string()],
        )
        .with_current("$__auto_interval_interval")];
        let assignments = resolve(&variables, &[], None, None).unwrap();

        let to = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let range = TimeRange::ending_at(to, chrono::Duration::hours(1)).unwrap();
        let target = PanelTarget {
            ref_id: "A".to_string(),
            expr: "rate(x[$interval])".to_string(),
            legend_format: None,
            datasource: None,
        };
        let built = QueryBuilder::new("node", 1000).build(&[target], &assignments[0], &range);
        let expr = &built[0].as_ref().unwrap().expr;

        assert_eq!(expr, "rate(x[1m])");
        assert!(!expr.contains("$__"));
    }

    #[test]
    fn test_no_variables_yields_one_empty_assignment() {
        let assignments = resolve(&[], &[], None, None).unwrap();
        assert_eq!(assignments, vec![VariableAssignment::new()]);
    }

    #[test]
    fn test_cartesian_product_order() {
        let variables = vec![
            custom("job", &["a", "b"], "a"),
            custom("protocol", &["tcp", "udp"], "tcp"),
        ];

        let assignments =
            resolve(&variables, &selected(&["job", "protocol"]), None, None).unwrap();
        let combos: Vec<Vec<(String, String)>> = assignments.iter().map(pairs).collect();

        let expected: Vec<Vec<(String, String)>> = [("a", "tcp"), ("a", "udp"), ("b", "tcp"), ("b", "udp")]
            .iter()
            .map(|(j, p)| {
                vec![
                    ("job".to_string(), j.to_string()),
                    ("protocol".to_string(), p.to_string()),
                ]
            })
            .collect();
        assert_eq!(combos, expected);
    }

    #[test]
    fn test_product_size_and_distinctness() {
        let variables = vec![
            custom("a", &["1", "2", "3"], "1"),
            custom("b", &["x", "y"], "x"),
            custom("c", &["p", "q", "r", "s"], "p"),
        ];

        let assignments = resolve(&variables, &selected(&["a", "b", "c"]), None, None).unwrap();
        assert_eq!(assignments.len(), 3 * 2 * 4);

        for (i, left) in assignments.iter().enumerate() {
            for right in &assignments[i + 1..] {
                assert_ne!(left, right);
            }
        }
    }

    #[test]
    fn test_unselected_variables_keep_defaults() {
        let variables = vec![
            custom("job", &["a", "b"], "a"),
            custom("instance", &["h1", "h2"], "h2"),
        ];

        let assignments = resolve(&variables, &selected(&["job"]), None, None).unwrap();
        assert_eq!(assignments.len(), 2);
        for assignment in &assignments {
            assert_eq!(assignment.get("instance").unwrap().value, "h2");
            assert_eq!(assignment.describe().matches('=').count(), 1);
        }
    }

    #[test]
    fn test_ignore_pattern_filters_values() {
        let variables = vec![
            custom("job", &["a", "b"], "a"),
            custom("protocol", &["tcp", "udp", "udplite"], "tcp"),
        ];
        let ignore = IgnorePattern::new("udp").unwrap();

        let assignments = resolve(
            &variables,
            &selected(&["job", "protocol"]),
            Some(&ignore),
            None,
        )
        .unwrap();

        assert_eq!(assignments.len(), 4);
        for assignment in &assignments {
            for binding in assignment.selected() {
                assert!(!ignore.is_ignored(&binding.value));
            }
        }
        assert_eq!(assignments[1].get("protocol").unwrap().value, "udplite");
    }

    #[test]
    fn test_ignore_everything_is_an_error() {
        let variables = vec![custom("protocol", &["tcp", "udp"], "tcp")];
        let ignore = IgnorePattern::new("tcp|udp").unwrap();

        let err = resolve(&variables, &selected(&["protocol"]), Some(&ignore), None).unwrap_err();
        assert_eq!(
            err,
            ResolutionError::AllValuesIgnored {
                variable: "protocol".to_string(),
                pattern: "tcp|udp".to_string(),
            }
        );
    }

    #[test]
    fn test_meta_values_are_not_candidates() {
        let variables = vec![custom(
            "interval",
            &["$__auto_interval_interval", "1m", "$__all", "5m"],
            "1m",
        )];

        let assignments = resolve(&variables, &selected(&["interval"]), None, None).unwrap();
        let values: Vec<&str> = assignments
            .iter()
            .map(|a| a.get("interval").unwrap().value.as_str())
            .collect();
        assert_eq!(values, vec!["1m", "5m"]);
    }

    #[test]
    fn test_variable_without_values_is_an_error() {
        let variables = vec![custom("job", &["$__all"], "$__all")];
        let err = resolve(&variables, &selected(&["job"]), None, None).unwrap_err();
        assert_eq!(
            err,
            ResolutionError::NoValues {
                variable: "job".to_string()
            }
        );

        let adhoc = vec![TemplateVariable::new(
            "filters",
            VariableKind::Other("adhoc".to_string()),
            Vec::new(),
        )];
        let err = resolve(&adhoc, &selected(&["filters"]), None, None).unwrap_err();
        assert!(matches!(err, ResolutionError::UnsupportedVariable { .. }));
    }

    #[test]
    fn test_unknown_selected_names_are_inert() {
        let variables = vec![custom("job", &["a", "b"], "a")];
        let assignments = resolve(&variables, &selected(&["missing"]), None, None).unwrap();
        assert_eq!(assignments.len(), 1);
        assert!(assignments[0].is_default_pass());
    }

    #[test]
    fn test_assignment_limit() {
        let variables = vec![
            custom("job", &["a", "b"], "a"),
            custom("protocol", &["tcp", "udp"], "tcp"),
        ];
        let names = selected(&["job", "protocol"]);

        assert_eq!(resolve(&variables, &names, None, Some(4)).unwrap().len(), 4);
        let err = resolve(&variables, &names, None, Some(3)).unwrap_err();
        assert_eq!(err, ResolutionError::TooManyAssignments { count: 4, limit: 3 });
    }
}
