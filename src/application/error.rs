// Error taxonomy of the rendering pipeline

/// Misconfigured variable selection; fatal to the whole run
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("variable `{variable}` has no values left after applying ignore pattern `{pattern}`")]
    AllValuesIgnored { variable: String, pattern: String },
    #[error("variable `{variable}` has no values")]
    NoValues { variable: String },
    #[error("variable `{variable}` of type `{kind}` cannot be expanded")]
    UnsupportedVariable { variable: String, kind: String },
    #[error("variable selection expands to {count} assignments, above the limit of {limit}")]
    TooManyAssignments { count: usize, limit: usize },
}

/// Malformed placeholder syntax in one query template
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("query {ref_id}: unterminated `{opener}` placeholder at byte {position}")]
    Unterminated {
        ref_id: String,
        opener: &'static str,
        position: usize,
    },
    #[error("query {ref_id}: empty placeholder name at byte {position}")]
    EmptyName { ref_id: String, position: usize },
}

/// A datasource call failed for one query
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("query {ref_id} failed: {reason}")]
pub struct FetchError {
    pub ref_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("panel type `{0}` is not supported")]
    UnsupportedPanel(String),
    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("drawing failed: {0}")]
    Drawing(String),
}

/// The dashboard itself could not be retrieved or prepared
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DashboardFetchError {
    #[error("failed to fetch dashboard {uid}: {reason}")]
    Request { uid: String, reason: String },
    #[error("failed to list values of variable `{variable}` on dashboard {uid}: {reason}")]
    VariableValues {
        uid: String,
        variable: String,
        reason: String,
    },
}

/// Reason one (panel, assignment) pair produced no artifact
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PairFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("failed to store artifact: {0}")]
    Store(String),
}
