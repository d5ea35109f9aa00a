//! The `manifest` post-processor
//!
//! Appends a record of each artifact it sees to a JSON manifest, so other
//! tooling can discover what a run produced. The input artifact passes
//! through untouched.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use ironcast_core::artifact::ArtifactRef;
use ironcast_core::cancel::CancelToken;
use ironcast_core::error::CoreError;
use ironcast_core::postprocessor::{PostProcessed, PostProcessor};
use ironcast_core::template::merge_config;
use ironcast_core::ui::Ui;
use serde::{Deserialize, Serialize};

fn default_output() -> String {
    "ironcast-manifest.json".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct ManifestConfig {
    /// Path of the manifest file; appended to across runs
    output: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self { output: default_output() }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Manifest {
    builds: Vec<ManifestRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestRecord {
    builder_id: String,
    artifact_id: String,
    files: Vec<PathBuf>,
    build_time: String,
}

/// Post-processor recording artifacts into a JSON manifest
#[derive(Default)]
pub struct ManifestPostProcessor {
    config: ManifestConfig,
}

#[async_trait]
impl PostProcessor for ManifestPostProcessor {
    async fn configure(&mut self, raws: &[serde_json::Value]) -> ironcast_core::Result<()> {
        let config: ManifestConfig = serde_json::from_value(merge_config(raws))?;
        if config.output.is_empty() {
            return Err(CoreError::config("output must not be empty"));
        }
        self.config = config;
        Ok(())
    }

    async fn post_process(
        &self,
        _token: CancelToken,
        ui: Arc<dyn Ui>,
        artifact: ArtifactRef,
    ) -> ironcast_core::Result<PostProcessed> {
        let path = PathBuf::from(&self.config.output);

        let mut manifest: Manifest = match tokio::fs::read(&path).await {
            Ok(data) => serde_json::from_slice(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Manifest::default(),
            Err(e) => return Err(e.into()),
        };

        manifest.builds.push(ManifestRecord {
            builder_id: artifact.builder_id().to_string(),
            artifact_id: artifact.id(),
            files: artifact.files(),
            build_time: Utc::now().to_rfc3339(),
        });

        tokio::fs::write(&path, serde_json::to_vec_pretty(&manifest)?).await?;
        ui.message(&format!("Recorded artifact in {}", path.display()));

        Ok(PostProcessed {
            artifact,
            keep_input: true,
            force_keep: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use ironcast_core::ui::NoopUi;

    use super::*;
    use crate::artifact::FileArtifact;

    #[tokio::test]
    async fn test_records_appended_across_invocations() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("manifest.json");

        let mut pp = ManifestPostProcessor::default();
        pp.configure(&[serde_json::json!({"output": output.to_str().unwrap()})])
            .await
            .unwrap();

        for id in ["one", "two"] {
            let input: ArtifactRef = Arc::new(FileArtifact::new(
                "ironcast.test",
                vec![PathBuf::from(format!("{id}.img"))],
            ));
            let result = pp
                .post_process(CancelToken::new(), Arc::new(NoopUi), input)
                .await
                .unwrap();
            assert!(result.keep_input);
        }

        let manifest: Manifest =
            serde_json::from_slice(&std::fs::read(&output).unwrap()).unwrap();
        assert_eq!(manifest.builds.len(), 2);
        assert_eq!(manifest.builds[0].artifact_id, "one.img");
        assert_eq!(manifest.builds[1].artifact_id, "two.img");
    }

    #[tokio::test]
    async fn test_pass_through_returns_same_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("manifest.json");

        let mut pp = ManifestPostProcessor::default();
        pp.configure(&[serde_json::json!({"output": output.to_str().unwrap()})])
            .await
            .unwrap();

        let input: ArtifactRef =
            Arc::new(FileArtifact::new("ironcast.test", vec![PathBuf::from("a.img")]));
        let result = pp
            .post_process(CancelToken::new(), Arc::new(NoopUi), Arc::clone(&input))
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&result.artifact, &input));
    }
}
