//! File-backed artifact shared by the built-in plugins

use std::path::PathBuf;

use async_trait::async_trait;
use ironcast_core::artifact::Artifact;
use ironcast_core::error::CoreError;
use tracing::debug;

/// Artifact describing a set of files on disk
pub struct FileArtifact {
    builder_id: &'static str,
    files: Vec<PathBuf>,
}

impl FileArtifact {
    pub fn new(builder_id: &'static str, files: Vec<PathBuf>) -> Self {
        Self { builder_id, files }
    }
}

#[async_trait]
impl Artifact for FileArtifact {
    fn builder_id(&self) -> &str {
        self.builder_id
    }

    fn files(&self) -> Vec<PathBuf> {
        self.files.clone()
    }

    fn id(&self) -> String {
        self.files
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    fn summary(&self) -> String {
        match self.files.as_slice() {
            [single] => format!("Stored file: {}", single.display()),
            files => format!("Stored {} files", files.len()),
        }
    }

    fn state(&self, _key: &str) -> Option<serde_json::Value> {
        None
    }

    async fn destroy(&self) -> ironcast_core::Result<()> {
        for file in &self.files {
            debug!(file = %file.display(), "removing artifact file");
            match tokio::fs::remove_file(file).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(CoreError::ArtifactDestroy {
                        id: self.id(),
                        reason: e.to_string(),
                    })
                }
            }
        }
        Ok(())
    }
}
