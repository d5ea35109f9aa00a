//! Template data model
//!
//! Templates arrive as JSON: a set of named builder configurations, a flat
//! provisioner list, and post-processor sequences. Interpolation beyond
//! simple `${var}` substitution happens upstream; the model here is what
//! the build engine consumes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};

/// `only`/`except` filter keyed on build names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub only: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub except: Vec<String>,
}

impl RunFilter {
    pub fn new(only: Vec<String>, except: Vec<String>) -> Self {
        Self { only, except }
    }

    /// Whether a build with this name passes the filter
    pub fn allows(&self, build_name: &str) -> bool {
        if self.except.iter().any(|n| n == build_name) {
            return false;
        }
        self.only.is_empty() || self.only.iter().any(|n| n == build_name)
    }
}

/// One builder entry in a template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderDef {
    /// Builder type id, e.g. `file`
    #[serde(rename = "type")]
    pub builder_type: String,

    /// Build name; defaults to the builder type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Builder-specific configuration
    #[serde(flatten)]
    pub config: serde_json::Map<String, Value>,
}

impl BuilderDef {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.builder_type)
    }

    /// The raw configuration block handed to the builder's prepare
    pub fn config_value(&self) -> Value {
        Value::Object(self.config.clone())
    }
}

/// One provisioner entry in a template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionerDef {
    #[serde(rename = "type")]
    pub provisioner_type: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub only: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub except: Vec<String>,

    #[serde(flatten)]
    pub config: serde_json::Map<String, Value>,
}

impl ProvisionerDef {
    pub fn filter(&self) -> RunFilter {
        RunFilter::new(self.only.clone(), self.except.clone())
    }

    pub fn config_value(&self) -> Value {
        Value::Object(self.config.clone())
    }
}

/// One post-processor entry in a template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostProcessorDef {
    #[serde(rename = "type")]
    pub processor_type: String,

    /// Display name used by `-except`; defaults to the type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub keep_input_artifact: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub only: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub except: Vec<String>,

    #[serde(flatten)]
    pub config: serde_json::Map<String, Value>,
}

impl PostProcessorDef {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.processor_type)
    }

    /// Compatibility rule: an unnamed, untyped entry is skipped silently
    pub fn is_ignored(&self) -> bool {
        self.name().is_empty()
    }

    pub fn filter(&self) -> RunFilter {
        RunFilter::new(self.only.clone(), self.except.clone())
    }

    pub fn config_value(&self) -> Value {
        Value::Object(self.config.clone())
    }
}

/// A post-processor template entry: a bare type name, a single block, or a
/// sequence of blocks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PostProcessorEntry {
    Shorthand(String),
    Single(PostProcessorDef),
    Sequence(Vec<PostProcessorDef>),
}

impl PostProcessorEntry {
    /// Normalize this entry into an ordered sequence of definitions
    pub fn to_sequence(&self) -> Vec<PostProcessorDef> {
        match self {
            Self::Shorthand(name) => vec![PostProcessorDef {
                processor_type: name.clone(),
                name: None,
                keep_input_artifact: false,
                only: Vec::new(),
                except: Vec::new(),
                config: serde_json::Map::new(),
            }],
            Self::Single(def) => vec![def.clone()],
            Self::Sequence(defs) => defs.clone(),
        }
    }
}

/// A parsed and validated template
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Template {
    pub builders: Vec<BuilderDef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provisioners: Vec<ProvisionerDef>,

    #[serde(default, rename = "post-processors", skip_serializing_if = "Vec::is_empty")]
    pub post_processors: Vec<PostProcessorEntry>,
}

impl Template {
    /// Parse a template from JSON source
    pub fn parse(source: &str) -> Result<Self> {
        let template: Template = serde_json::from_str(source)?;
        template.validate()?;
        Ok(template)
    }

    /// Parse after substituting `${name}` variables into the raw source
    pub fn parse_with_vars(source: &str, vars: &HashMap<String, String>) -> Result<Self> {
        Self::parse(&interpolate(source, vars))
    }

    /// Validate structural rules, aggregating every problem
    pub fn validate(&self) -> Result<()> {
        let mut errs = Vec::new();

        if self.builders.is_empty() {
            errs.push("at least one builder must be defined".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for builder in &self.builders {
            if builder.builder_type.is_empty() {
                errs.push("builder is missing a type".to_string());
            }
            if !seen.insert(builder.name().to_string()) {
                errs.push(format!("duplicate build name: {}", builder.name()));
            }
        }

        for entry in &self.post_processors {
            if let PostProcessorEntry::Sequence(defs) = entry {
                if defs.is_empty() {
                    errs.push("post-processor sequence must not be empty".to_string());
                }
            }
        }

        if errs.is_empty() {
            Ok(())
        } else {
            Err(CoreError::ConfigErrors(errs))
        }
    }

    /// The normalized post-processor sequences
    pub fn sequences(&self) -> Vec<Vec<PostProcessorDef>> {
        self.post_processors
            .iter()
            .map(PostProcessorEntry::to_sequence)
            .collect()
    }
}

/// Merge raw config blocks into one object; later blocks win on conflicts
pub fn merge_config(raws: &[Value]) -> Value {
    let mut merged = serde_json::Map::new();
    for raw in raws {
        if let Value::Object(map) = raw {
            for (key, value) in map {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Object(merged)
}

/// Substitute `${name}` placeholders in raw template source
pub fn interpolate(source: &str, vars: &HashMap<String, String>) -> String {
    vars.iter().fold(source.to_string(), |acc, (key, value)| {
        acc.replace(&format!("${{{key}}}"), value)
    })
}
