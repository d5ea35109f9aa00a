//! The `checksum` post-processor
//!
//! Writes digest files for an artifact's files. The input artifact always
//! survives; a checksum of a destroyed artifact is useless.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use ironcast_core::artifact::ArtifactRef;
use ironcast_core::cancel::CancelToken;
use ironcast_core::error::CoreError;
use ironcast_core::postprocessor::{PostProcessed, PostProcessor};
use ironcast_core::template::merge_config;
use ironcast_core::ui::Ui;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::artifact::FileArtifact;

/// Stable identifier of checksum artifacts
pub const POST_PROCESSOR_ID: &str = "ironcast.post-processor.checksum";

fn default_types() -> Vec<String> {
    vec!["sha256".to_string()]
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct ChecksumConfig {
    /// Digest algorithms to compute
    checksum_types: Vec<String>,
}

impl Default for ChecksumConfig {
    fn default() -> Self {
        Self { checksum_types: default_types() }
    }
}

/// Post-processor producing `<file>.<algorithm>.sum` digest files
#[derive(Default)]
pub struct ChecksumPostProcessor {
    config: ChecksumConfig,
}

fn digest(algorithm: &str, data: &[u8]) -> String {
    match algorithm {
        "md5" => format!("{:x}", md5::compute(data)),
        _ => format!("{:x}", Sha256::digest(data)),
    }
}

#[async_trait]
impl PostProcessor for ChecksumPostProcessor {
    async fn configure(&mut self, raws: &[serde_json::Value]) -> ironcast_core::Result<()> {
        let config: ChecksumConfig = serde_json::from_value(merge_config(raws))?;

        let mut errs = Vec::new();
        for algorithm in &config.checksum_types {
            if !matches!(algorithm.as_str(), "md5" | "sha256") {
                errs.push(format!(
                    "unsupported checksum type '{algorithm}', expected md5 or sha256"
                ));
            }
        }
        if config.checksum_types.is_empty() {
            errs.push("at least one checksum type is required".to_string());
        }

        if !errs.is_empty() {
            return Err(CoreError::ConfigErrors(errs));
        }
        self.config = config;
        Ok(())
    }

    async fn post_process(
        &self,
        token: CancelToken,
        ui: Arc<dyn Ui>,
        artifact: ArtifactRef,
    ) -> ironcast_core::Result<PostProcessed> {
        let mut outputs: Vec<PathBuf> = Vec::new();

        for file in artifact.files() {
            if token.is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            let data = tokio::fs::read(&file).await?;

            for algorithm in &self.config.checksum_types {
                let sum = digest(algorithm, &data);
                let out = file.with_extension(format!(
                    "{}.{algorithm}.sum",
                    file.extension().and_then(|e| e.to_str()).unwrap_or("raw")
                ));

                let file_name = file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                tokio::fs::write(&out, format!("{sum}  {file_name}\n")).await?;

                ui.message(&format!("{algorithm}: {sum}  {file_name}"));
                outputs.push(out);
            }
        }

        if outputs.is_empty() {
            return Err(CoreError::post_process(
                "checksum",
                format!("artifact '{}' has no files to checksum", artifact.id()),
            ));
        }

        Ok(PostProcessed {
            artifact: Arc::new(FileArtifact::new(POST_PROCESSOR_ID, outputs)),
            keep_input: true,
            force_keep: true,
        })
    }
}
