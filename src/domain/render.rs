// Render artifact domain models
use super::variable::VariableAssignment;

pub const DEFAULT_WIDTH: u32 = 1200;
pub const DEFAULT_HEIGHT: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

/// A rendered image, SVG encoded
#[derive(Debug, Clone)]
pub struct Artifact {
    pub title: String,
    pub dimensions: Dimensions,
    pub svg: String,
}

impl Artifact {
    pub const EXTENSION: &'static str = "svg";
}

/// Everything needed to name an artifact without collisions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKey {
    pub dashboard_uid: String,
    pub dashboard_slug: String,
    pub panel_id: i64,
    pub panel_title: String,
    pub assignment: VariableAssignment,
    pub dimensions: Dimensions,
}

/// Where the sink put an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub location: String,
}
