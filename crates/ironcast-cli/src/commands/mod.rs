//! CLI command implementations

pub mod build;
pub mod validate;

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use color_eyre::eyre::{eyre, Context, Result};
use ironcast_build::{CoreBuild, PostProcessorSpec, ProvisionerSpec};
use ironcast_core::error::CoreError;
use ironcast_core::template::Template;

pub use build::BuildCommand;
pub use validate::ValidateCommand;

/// Resolve a template into concrete builds using the built-in plugin set
///
/// Every build gets its own component instances; unknown types across the
/// whole template are aggregated into one error.
pub(crate) fn assemble_builds(template: &Template) -> std::result::Result<Vec<CoreBuild>, CoreError> {
    let mut unknown = BTreeSet::new();
    let mut builds = Vec::with_capacity(template.builders.len());

    for def in &template.builders {
        let Some(builder) = ironcast_builtins::builder(&def.builder_type) else {
            unknown.insert(format!("unknown builder type '{}'", def.builder_type));
            continue;
        };

        let mut build = CoreBuild::new(
            def.name(),
            &def.builder_type,
            builder,
            def.config_value(),
        );

        for provisioner_def in &template.provisioners {
            let Some(provisioner) =
                ironcast_builtins::provisioner(&provisioner_def.provisioner_type)
            else {
                unknown.insert(format!(
                    "unknown provisioner type '{}'",
                    provisioner_def.provisioner_type
                ));
                continue;
            };
            build.add_provisioner(ProvisionerSpec {
                type_name: provisioner_def.provisioner_type.clone(),
                filter: provisioner_def.filter(),
                config: provisioner_def.config_value(),
                provisioner,
            });
        }

        for sequence in template.sequences() {
            let mut specs = Vec::with_capacity(sequence.len());
            for processor_def in &sequence {
                if processor_def.is_ignored() {
                    continue;
                }
                let Some(post_processor) =
                    ironcast_builtins::post_processor(&processor_def.processor_type)
                else {
                    unknown.insert(format!(
                        "unknown post-processor type '{}'",
                        processor_def.processor_type
                    ));
                    continue;
                };
                specs.push(PostProcessorSpec {
                    name: processor_def.name().to_string(),
                    keep_input: processor_def.keep_input_artifact,
                    filter: processor_def.filter(),
                    config: processor_def.config_value(),
                    post_processor,
                });
            }
            if !specs.is_empty() {
                build.add_post_processor_sequence(specs);
            }
        }

        builds.push(build);
    }

    if !unknown.is_empty() {
        return Err(CoreError::ConfigErrors(unknown.into_iter().collect()));
    }
    Ok(builds)
}

/// Collect template variables from a var file and `-var` overrides
pub(crate) fn load_vars(
    pairs: &[String],
    var_file: Option<&Path>,
) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();

    if let Some(path) = var_file {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read var file {}", path.display()))?;
        let parsed: HashMap<String, serde_json::Value> = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse var file {}", path.display()))?;
        for (key, value) in parsed {
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            vars.insert(key, value);
        }
    }

    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| eyre!("invalid variable '{pair}', expected key=value"))?;
        vars.insert(key.to_string(), value.to_string());
    }

    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_builds_resolves_builtins() {
        let template = Template::parse(
            r#"{
                "builders": [{"type": "file", "name": "img", "target": "out.img"}],
                "provisioners": [{"type": "shell", "inline": ["true"]}],
                "post-processors": ["manifest"]
            }"#,
        )
        .unwrap();

        let builds = assemble_builds(&template).unwrap();
        assert_eq!(builds.len(), 1);
        assert_eq!(builds[0].name(), "img");
    }

    #[test]
    fn test_assemble_builds_aggregates_unknown_types() {
        let template = Template::parse(
            r#"{
                "builders": [{"type": "virtualbox"}],
                "provisioners": [{"type": "ansible"}]
            }"#,
        )
        .unwrap();

        let err = assemble_builds(&template).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("virtualbox"));
        assert!(text.contains("ansible"));
    }

    #[test]
    fn test_load_vars_cli_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let var_file = dir.path().join("vars.json");
        std::fs::write(&var_file, r#"{"region": "us-1", "size": 40}"#).unwrap();

        let vars = load_vars(&["region=eu-1".to_string()], Some(&var_file)).unwrap();
        assert_eq!(vars["region"], "eu-1");
        assert_eq!(vars["size"], "40");
    }

    #[test]
    fn test_load_vars_rejects_malformed_pair() {
        assert!(load_vars(&["not-a-pair".to_string()], None).is_err());
    }
}
