// Sink trait for rendered artifacts
use crate::domain::render::{Artifact, ArtifactKey, ArtifactRef};
use async_trait::async_trait;

#[async_trait]
pub trait ArtifactSink: Send + Sync {
    async fn store(&self, key: &ArtifactKey, artifact: &Artifact) -> anyhow::Result<ArtifactRef>;
}
