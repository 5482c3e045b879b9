// Repository trait for dashboard definitions
use crate::domain::dashboard::Dashboard;
use crate::domain::telemetry::TimeRange;
use crate::domain::variable::{TemplateVariable, VariableAssignment};
use async_trait::async_trait;

#[async_trait]
pub trait DashboardSource: Send + Sync {
    /// Fetch a dashboard with its panels flattened out of rows
    async fn get_dashboard(&self, uid: &str) -> anyhow::Result<Dashboard>;

    /// Look up the candidate values of a variable that does not embed them.
    /// `context` holds the dashboard's other values, for chained queries
    /// such as `label_values(up{instance="$node"}, device)`.
    async fn list_variable_values(
        &self,
        variable: &TemplateVariable,
        context: &VariableAssignment,
        range: &TimeRange,
    ) -> anyhow::Result<Vec<String>>;
}
