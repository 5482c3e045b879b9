// Grafana dashboard JSON model and its mapping onto domain types
use crate::domain::dashboard::{Dashboard, DatasourceRef, Panel, PanelKind, PanelTarget, Threshold};
use crate::domain::variable::{TemplateVariable, VariableKind};
use serde::Deserialize;
use serde_json::Value;

/// Body of `GET /api/dashboards/uid/<uid>`
#[derive(Debug, Deserialize)]
pub struct DashboardResponse {
    #[serde(default)]
    pub meta: DashboardMeta,
    pub dashboard: DashboardJson,
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardMeta {
    #[serde(default)]
    pub slug: String,
}

#[derive(Debug, Deserialize)]
pub struct DashboardJson {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub panels: Vec<PanelJson>,
    /// Pre-5.0 schema
    #[serde(default)]
    pub rows: Vec<LegacyRowJson>,
    #[serde(default)]
    pub templating: TemplatingJson,
}

#[derive(Debug, Deserialize)]
pub struct LegacyRowJson {
    #[serde(default)]
    pub collapse: bool,
    #[serde(default)]
    pub panels: Vec<PanelJson>,
}

#[derive(Debug, Deserialize)]
pub struct PanelJson {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub collapsed: bool,
    /// Children of a collapsed row
    #[serde(default)]
    pub panels: Vec<PanelJson>,
    #[serde(default)]
    pub targets: Vec<TargetJson>,
    #[serde(default)]
    pub datasource: Option<Value>,
    #[serde(rename = "fieldConfig", default)]
    pub field_config: FieldConfigJson,
    #[serde(default)]
    pub yaxes: Vec<AxisJson>,
}

#[derive(Debug, Deserialize)]
pub struct TargetJson {
    #[serde(rename = "refId", default)]
    pub ref_id: String,
    #[serde(default)]
    pub expr: Option<String>,
    #[serde(rename = "legendFormat", default)]
    pub legend_format: Option<String>,
    #[serde(default)]
    pub hide: bool,
    #[serde(default)]
    pub datasource: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FieldConfigJson {
    #[serde(default)]
    pub defaults: FieldDefaultsJson,
}

#[derive(Debug, Default, Deserialize)]
pub struct FieldDefaultsJson {
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub thresholds: Option<ThresholdsJson>,
}

#[derive(Debug, Deserialize)]
pub struct ThresholdsJson {
    #[serde(default)]
    pub steps: Vec<ThresholdStepJson>,
}

#[derive(Debug, Deserialize)]
pub struct ThresholdStepJson {
    /// `null` for the base step
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Deserialize)]
pub struct AxisJson {
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TemplatingJson {
    #[serde(default)]
    pub list: Vec<VariableJson>,
}

#[derive(Debug, Deserialize)]
pub struct VariableJson {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub query: Option<Value>,
    #[serde(default)]
    pub datasource: Option<Value>,
    #[serde(default)]
    pub regex: Option<String>,
    #[serde(default)]
    pub options: Vec<OptionJson>,
    #[serde(default)]
    pub current: Option<OptionJson>,
    #[serde(rename = "allValue", default)]
    pub all_value: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OptionJson {
    #[serde(default)]
    pub value: Value,
}

impl DashboardResponse {
    pub fn into_dashboard(self, uid: &str) -> Dashboard {
        let DashboardJson {
            uid: json_uid,
            title,
            panels: top_level,
            rows,
            templating,
        } = self.dashboard;

        let mut panels = Vec::new();
        for panel in top_level {
            flatten(panel, false, &mut panels);
        }
        for row in rows {
            for panel in row.panels {
                flatten(panel, row.collapse, &mut panels);
            }
        }

        let variables = templating
            .list
            .into_iter()
            .map(VariableJson::into_variable)
            .collect();

        let slug = if self.meta.slug.is_empty() {
            title.clone()
        } else {
            self.meta.slug
        };

        Dashboard::new(
            json_uid.unwrap_or_else(|| uid.to_string()),
            slug,
            title,
            panels,
            variables,
        )
    }
}

fn flatten(panel: PanelJson, in_collapsed_row: bool, out: &mut Vec<Panel>) {
    if panel.kind == "row" {
        let collapsed = panel.collapsed;
        for child in panel.panels {
            flatten(child, collapsed, out);
        }
    } else {
        out.push(panel.into_panel(in_collapsed_row));
    }
}

impl PanelJson {
    fn into_panel(self, parent_row_collapsed: bool) -> Panel {
        let panel_datasource = self.datasource.as_ref().and_then(datasource_ref);

        let targets = self
            .targets
            .into_iter()
            .enumerate()
            .filter(|(_, t)| !t.hide)
            .filter_map(|(index, target)| {
                let expr = target.expr.filter(|e| !e.trim().is_empty())?;
                let ref_id = if target.ref_id.is_empty() {
                    format!("#{}", index)
                } else {
                    target.ref_id
                };
                let datasource = target
                    .datasource
                    .as_ref()
                    .and_then(datasource_ref)
                    .or_else(|| panel_datasource.clone());
                Some(PanelTarget {
                    ref_id,
                    expr,
                    legend_format: target.legend_format,
                    datasource,
                })
            })
            .collect();

        let defaults = self.field_config.defaults;
        let unit = defaults
            .unit
            .or_else(|| self.yaxes.into_iter().next().and_then(|axis| axis.format))
            .filter(|unit| !unit.is_empty());
        let thresholds = defaults
            .thresholds
            .map(|t| {
                t.steps
                    .into_iter()
                    .filter_map(|step| {
                        step.value.map(|value| Threshold {
                            value,
                            color: step.color,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Panel {
            id: self.id,
            title: self.title,
            kind: PanelKind::from_type(&self.kind),
            targets,
            unit,
            y_min: defaults.min,
            y_max: defaults.max,
            thresholds,
            parent_row_collapsed,
        }
    }
}

impl VariableJson {
    fn into_variable(self) -> TemplateVariable {
        let query = self.query.as_ref().map(query_text).unwrap_or_default();
        let mut options: Vec<String> = self
            .options
            .iter()
            .flat_map(|option| strings(&option.value))
            .collect();

        let kind = match self.kind.as_str() {
            "custom" => {
                if options.is_empty() {
                    options = split_list(&query);
                }
                VariableKind::Custom
            }
            "interval" => {
                if options.is_empty() {
                    options = split_list(&query);
                }
                VariableKind::Interval
            }
            "constant" => {
                options = vec![query.clone()];
                VariableKind::Constant
            }
            "textbox" => {
                options = vec![query.clone()];
                VariableKind::TextBox
            }
            "query" => VariableKind::Query {
                query,
                datasource: self.datasource.as_ref().and_then(datasource_ref),
                regex: self.regex.filter(|r| !r.is_empty()),
            },
            other => VariableKind::Other(other.to_string()),
        };

        let mut variable = TemplateVariable::new(self.name, kind, options);
        variable.current_value = self
            .current
            .as_ref()
            .map(|c| strings(&c.value))
            .unwrap_or_default();
        variable.all_value = self.all_value.filter(|v| !v.is_empty());
        variable
    }
}

/// Either a plain datasource name or a `{"type": .., "uid": ..}` object
fn datasource_ref(value: &Value) -> Option<DatasourceRef> {
    match value {
        Value::String(name) if !name.is_empty() => Some(DatasourceRef::Name(name.clone())),
        Value::Object(map) => map
            .get("uid")
            .and_then(Value::as_str)
            .filter(|uid| !uid.is_empty())
            .map(|uid| DatasourceRef::Uid(uid.to_string())),
        _ => None,
    }
}

/// Variable queries are a string, or an object with a `query` field on newer Grafana
fn query_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Object(map) => map
            .get("query")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

fn strings(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Value::Number(n) => vec![n.to_string()],
        _ => Vec::new(),
    }
}

fn split_list(query: &str) -> Vec<String> {
    query
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}
