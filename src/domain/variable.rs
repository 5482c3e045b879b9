// Template variable domain models
use super::dashboard::DatasourceRef;
use regex::Regex;

/// Values starting with this prefix are Grafana meta options such as `$__all`
pub const META_VALUE_PREFIX: &str = "$__";

pub const ALL_VALUE: &str = "$__all";

#[derive(Debug, Clone, PartialEq)]
pub enum VariableKind {
    Custom,
    Interval,
    Constant,
    TextBox,
    Query {
        query: String,
        datasource: Option<DatasourceRef>,
        regex: Option<String>,
    },
    Other(String),
}

impl VariableKind {
    pub fn name(&self) -> &str {
        match self {
            VariableKind::Custom => "custom",
            VariableKind::Interval => "interval",
            VariableKind::Constant => "constant",
            VariableKind::TextBox => "textbox",
            VariableKind::Query { .. } => "query",
            VariableKind::Other(kind) => kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateVariable {
    pub name: String,
    pub kind: VariableKind,
    pub candidate_values: Vec<String>,
    /// Saved default; several entries for multi-value variables
    pub current_value: Vec<String>,
    pub all_value: Option<String>,
}

impl TemplateVariable {
    pub fn new(name: impl Into<String>, kind: VariableKind, candidate_values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            candidate_values,
            current_value: Vec::new(),
            all_value: None,
        }
    }

    #[cfg(test)]
    pub fn with_current(mut self, current: impl Into<String>) -> Self {
        self.current_value = vec![current.into()];
        self
    }

    /// Candidates that correspond to a concrete series
    pub fn concrete_candidates(&self) -> impl Iterator<Item = &String> {
        self.candidate_values
            .iter()
            .filter(|v| !v.starts_with(META_VALUE_PREFIX))
    }

    /// The value the dashboard itself would substitute
    pub fn default_value(&self) -> Option<String> {
        match self.current_value.as_slice() {
            [] => None,
            [single] if single == ALL_VALUE => Some(self.all_expansion()),
            // Other meta options such as `$__auto_interval_<name>` have no
            // PromQL meaning; fall back to the first concrete candidate
            [single] if single.starts_with(META_VALUE_PREFIX) => {
                self.concrete_candidates().next().cloned()
            }
            [single] => Some(single.clone()),
            many => {
                let concrete: Vec<&String> = many
                    .iter()
                    .filter(|v| !v.starts_with(META_VALUE_PREFIX))
                    .collect();
                if concrete.len() == many.len() {
                    Some(alternation(concrete.into_iter()))
                } else {
                    Some(self.all_expansion())
                }
            }
        }
    }

    fn all_expansion(&self) -> String {
        if let Some(all) = &self.all_value {
            if !all.is_empty() {
                return all.clone();
            }
        }

        let candidates: Vec<&String> = self.concrete_candidates().collect();
        if candidates.is_empty() {
            ".*".to_string()
        } else {
            alternation(candidates.into_iter())
        }
    }
}

fn alternation<'a>(values: impl Iterator<Item = &'a String>) -> String {
    let escaped: Vec<String> = values.map(|v| regex::escape(v)).collect();
    format!("({})", escaped.join("|"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingOrigin {
    /// Chosen by the Cartesian expansion of the user's selection
    Selected,
    /// The dashboard's saved default
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub value: String,
    pub origin: BindingOrigin,
}

/// One value per variable; one rendering pass over a dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableAssignment {
    bindings: Vec<Binding>,
}

impl VariableAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<String>, origin: BindingOrigin) {
        let name = name.into();
        let value = value.into();
        match self.bindings.iter_mut().find(|b| b.name == name) {
            Some(existing) => {
                existing.value = value;
                existing.origin = origin;
            }
            None => self.bindings.push(Binding { name, value, origin }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    #[cfg(test)]
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn selected(&self) -> impl Iterator<Item = &Binding> {
        self.bindings
            .iter()
            .filter(|b| b.origin == BindingOrigin::Selected)
    }

    /// True when nothing was expanded, i.e. the plain dashboard-defaults pass
    pub fn is_default_pass(&self) -> bool {
        self.selected().next().is_none()
    }

    /// `job=a, protocol=tcp` for the selected bindings
    pub fn describe(&self) -> String {
        self.selected()
            .map(|b| format!("{}={}", b.name, b.value))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Whole-value ignore filter for candidate values
#[derive(Debug, Clone)]
pub struct IgnorePattern {
    source: String,
    regex: Regex,
}

impl IgnorePattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{})$", pattern))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn is_ignored(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignore_pattern_matches_whole_value() {
        let ignore = IgnorePattern::new("udp").unwrap();
        assert!(ignore.is_ignored("udp"));
        assert!(!ignore.is_ignored("udp6"));
        assert!(!ignore.is_ignored("xudp"));

        let ignore = IgnorePattern::new("lo|docker.*").unwrap();
        assert!(ignore.is_ignored("lo"));
        assert!(ignore.is_ignored("docker0"));
        assert!(!ignore.is_ignored("eth0"));
    }

    #[test]
    fn test_default_value() {
        let var = TemplateVariable::new(
            "job",
            VariableKind::Custom,
            vec!["$__all".to_string(), "a.b".to_string(), "c".to_string()],
        );
        assert_eq!(var.default_value(), None);

        let var = var.with_current("c");
        assert_eq!(var.default_value().as_deref(), Some("c"));

        let all = var.clone().with_current(ALL_VALUE);
        assert_eq!(all.default_value().as_deref(), Some("(a\\.b|c)"));

        let mut custom_all = all.clone();
        custom_all.all_value = Some(".+".to_string());
        assert_eq!(custom_all.default_value().as_deref(), Some(".+"));

        let mut multi = var;
        multi.current_value = vec!["a".to_string(), "c".to_string()];
        assert_eq!(multi.default_value().as_deref(), Some("(a|c)"));
    }

    #[test]
    fn test_auto_interval_default_uses_first_candidate() {
        let var = TemplateVariable::new(
            "interval",
            VariableKind::Interval,
            vec!["1m".to_string(), "5m".to_string()],
        )
        .with_current("$__auto_interval_interval");
        assert_eq!(var.default_value().as_deref(), Some("1m"));

        let empty = TemplateVariable::new("interval", VariableKind::Interval, Vec::new())
            .with_current("$__auto_interval_interval");
        assert_eq!(empty.default_value(), None);
    }

    #[test]
    fn test_assignment_bindings() {
        let mut assignment = VariableAssignment::new();
        assignment.bind("instance", "host:9100", BindingOrigin::Default);
        assert!(assignment.is_default_pass());

        assignment.bind("job", "a", BindingOrigin::Selected);
        assignment.bind("protocol", "tcp", BindingOrigin::Selected);
        assert!(!assignment.is_default_pass());
        assert_eq!(assignment.describe(), "job=a, protocol=tcp");
        assert_eq!(assignment.get("instance").unwrap().value, "host:9100");

        assignment.bind("instance", "other:9100", BindingOrigin::Selected);
        assert_eq!(assignment.bindings().len(), 3);
        assert_eq!(assignment.describe(), "instance=other:9100, job=a, protocol=tcp");
    }
}
