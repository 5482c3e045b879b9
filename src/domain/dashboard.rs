// Dashboard domain model
use super::render::Dimensions;
use super::variable::{IgnorePattern, TemplateVariable};

/// What the user asked for one dashboard
#[derive(Debug, Clone)]
pub struct DashboardSpec {
    pub uid: String,
    pub collapsed: bool,
    pub dimensions: Dimensions,
    pub selected_variables: Vec<String>,
    pub ignore: Option<IgnorePattern>,
}

impl DashboardSpec {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            collapsed: false,
            dimensions: Dimensions::default(),
            selected_variables: Vec::new(),
            ignore: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    pub uid: String,
    pub slug: String,
    pub title: String,
    pub panels: Vec<Panel>,
    pub variables: Vec<TemplateVariable>,
}

impl Dashboard {
    pub fn new(
        uid: String,
        slug: String,
        title: String,
        panels: Vec<Panel>,
        variables: Vec<TemplateVariable>,
    ) -> Self {
        Self {
            uid,
            slug,
            title,
            panels,
            variables,
        }
    }

    /// Panels to render, in declared order, honouring the collapsed-row flag
    pub fn renderable_panels(&self, include_collapsed: bool) -> impl Iterator<Item = &Panel> {
        self.panels
            .iter()
            .filter(move |p| include_collapsed || !p.parent_row_collapsed)
    }
}

/// Reference to a datasource as written in the dashboard JSON
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasourceRef {
    Name(String),
    Uid(String),
}

impl DatasourceRef {
    /// Template references such as `${DS_PROMETHEUS}` resolve to the default datasource
    pub fn is_templated(&self) -> bool {
        match self {
            DatasourceRef::Name(v) | DatasourceRef::Uid(v) => v.starts_with('$'),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelKind {
    Graph,
    TimeSeries,
    Unsupported(String),
}

impl PanelKind {
    pub fn from_type(kind: &str) -> Self {
        match kind {
            "graph" => PanelKind::Graph,
            "timeseries" => PanelKind::TimeSeries,
            other => PanelKind::Unsupported(other.to_string()),
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, PanelKind::Unsupported(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            PanelKind::Graph => "graph",
            PanelKind::TimeSeries => "timeseries",
            PanelKind::Unsupported(kind) => kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelTarget {
    pub ref_id: String,
    pub expr: String,
    pub legend_format: Option<String>,
    pub datasource: Option<DatasourceRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub value: f64,
    pub color: String,
}

#[derive(Debug, Clone)]
pub struct Panel {
    pub id: i64,
    pub title: String,
    pub kind: PanelKind,
    pub targets: Vec<PanelTarget>,
    pub unit: Option<String>,
    pub y_min: Option<f64>,
    pub y_max: Option<f64>,
    pub thresholds: Vec<Threshold>,
    pub parent_row_collapsed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel(id: i64, collapsed: bool) -> Panel {
        Panel {
            id,
            title: format!("Panel {}", id),
            kind: PanelKind::TimeSeries,
            targets: Vec::new(),
            unit: None,
            y_min: None,
            y_max: None,
            thresholds: Vec::new(),
            parent_row_collapsed: collapsed,
        }
    }

    #[test]
    fn test_renderable_panels_respects_collapsed_rows() {
        let dashboard = Dashboard::new(
            "uid".to_string(),
            "slug".to_string(),
            "Title".to_string(),
            vec![panel(1, false), panel(2, true), panel(3, false)],
            Vec::new(),
        );

        let ids: Vec<i64> = dashboard.renderable_panels(false).map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 3]);

        let ids: Vec<i64> = dashboard.renderable_panels(true).map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_panel_kind() {
        assert_eq!(PanelKind::from_type("graph"), PanelKind::Graph);
        assert_eq!(PanelKind::from_type("timeseries"), PanelKind::TimeSeries);
        assert!(!PanelKind::from_type("stat").is_supported());
        assert_eq!(PanelKind::from_type("stat").as_str(), "stat");
    }

    #[test]
    fn test_templated_datasource() {
        assert!(DatasourceRef::Name("${DS_PROMETHEUS}".to_string()).is_templated());
        assert!(!DatasourceRef::Uid("P1809F7CD0C75ACF3".to_string()).is_templated());
    }
}
