// Filesystem sink writing one SVG per artifact
use crate::application::artifact_sink::ArtifactSink;
use crate::domain::render::{Artifact, ArtifactKey, ArtifactRef};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Lays artifacts out as `<root>/<dashboard>/<value>.../<title>-<panel id>.svg`,
/// one directory level per selected variable in declared order. Names that
/// do not survive slugification unchanged carry a hash of the raw text so
/// distinct values never share a path.
#[derive(Debug, Clone)]
pub struct FileArtifactSink {
    root: PathBuf,
}

impl FileArtifactSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, key: &ArtifactKey) -> PathBuf {
        let dashboard = if key.dashboard_slug.is_empty() {
            &key.dashboard_uid
        } else {
            &key.dashboard_slug
        };

        let mut path = self.root.join(path_segment(dashboard));
        for binding in key.assignment.selected() {
            path.push(path_segment(&binding.value));
        }
        path.push(format!(
            "{}-{}.{}",
            slugify(&key.panel_title),
            key.panel_id,
            Artifact::EXTENSION
        ));
        path
    }
}

/// Lowercase ASCII alphanumerics with every other run of characters
/// collapsed to a single `-`
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push('_');
    }
    slug
}

/// `slugify(text)`, suffixed with the first 8 hex digits of its SHA-256 when lossy
fn path_segment(text: &str) -> String {
    let slug = slugify(text);
    if slug == text {
        return slug;
    }

    let digest = Sha256::digest(text.as_bytes());
    let suffix: String = digest[..4].iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}-{}", slug, suffix)
}

#[async_trait]
impl ArtifactSink for FileArtifactSink {
    async fn store(&self, key: &ArtifactKey, artifact: &Artifact) -> Result<ArtifactRef> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        tokio::fs::write(&path, artifact.svg.as_bytes())
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(ArtifactRef {
            location: path.display().to_string(),
        })
    }
}
