//! A single build's lifecycle
//!
//! A build pairs one builder with its resolved provisioner list and
//! post-processor sequences. It moves Unprepared → Prepared → Running and
//! settles in Succeeded, Failed or Cancelled.

use std::sync::{Arc, Mutex};

use ironcast_core::artifact::ArtifactRef;
use ironcast_core::builder::{
    Builder, CONFIG_BUILDER_TYPE, CONFIG_BUILD_NAME, CONFIG_DEBUG, CONFIG_FORCE, CONFIG_ON_ERROR,
};
use ironcast_core::cancel::CancelToken;
use ironcast_core::hook::{Hook, HookBus, HOOK_PROVISION};
use ironcast_core::postprocessor::PostProcessor;
use ironcast_core::provisioner::Provisioner;
use ironcast_core::template::RunFilter;
use ironcast_core::ui::Ui;
use serde_json::Value;
use tracing::{debug, info};

use crate::chain::PostProcessorSlot;
use crate::coordinator::OnError;
use crate::error::{BuildError, Result};
use crate::provision::{ProvisionHook, ProvisionerEntry};

/// Lifecycle state of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Unprepared,
    Prepared,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

/// A provisioner awaiting preparation
pub struct ProvisionerSpec {
    pub type_name: String,
    pub filter: RunFilter,
    pub config: Value,
    pub provisioner: Box<dyn Provisioner>,
}

/// A post-processor awaiting configuration
pub struct PostProcessorSpec {
    pub name: String,
    pub keep_input: bool,
    pub filter: RunFilter,
    pub config: Value,
    pub post_processor: Box<dyn PostProcessor>,
}

/// One builder instance plus its provisioners and post-processor chains
pub struct CoreBuild {
    name: String,
    builder_type: String,
    builder: Box<dyn Builder>,
    builder_config: Value,

    pending_provisioners: Vec<ProvisionerSpec>,
    provisioners: Vec<ProvisionerEntry>,
    pending_post_processors: Vec<Vec<PostProcessorSpec>>,
    post_processors: Vec<Vec<PostProcessorSlot>>,

    debug: bool,
    force: bool,
    on_error: OnError,

    phase: Arc<Mutex<BuildPhase>>,
}

impl std::fmt::Debug for CoreBuild {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreBuild")
            .field("name", &self.name)
            .field("builder_type", &self.builder_type)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl CoreBuild {
    pub fn new(
        name: impl Into<String>,
        builder_type: impl Into<String>,
        builder: Box<dyn Builder>,
        builder_config: Value,
    ) -> Self {
        Self {
            name: name.into(),
            builder_type: builder_type.into(),
            builder,
            builder_config,
            pending_provisioners: Vec::new(),
            provisioners: Vec::new(),
            pending_post_processors: Vec::new(),
            post_processors: Vec::new(),
            debug: false,
            force: false,
            on_error: OnError::default(),
            phase: Arc::new(Mutex::new(BuildPhase::Unprepared)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn builder_type(&self) -> &str {
        &self.builder_type
    }

    pub fn phase(&self) -> BuildPhase {
        *self.phase.lock().unwrap()
    }

    fn set_phase(&self, phase: BuildPhase) {
        *self.phase.lock().unwrap() = phase;
    }

    /// Attach a provisioner; order of attachment is order of execution
    pub fn add_provisioner(&mut self, spec: ProvisionerSpec) {
        self.pending_provisioners.push(spec);
    }

    /// Attach a post-processor sequence
    pub fn add_post_processor_sequence(&mut self, sequence: Vec<PostProcessorSpec>) {
        self.pending_post_processors.push(sequence);
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn set_force(&mut self, force: bool) {
        self.force = force;
    }

    pub fn set_on_error(&mut self, on_error: OnError) {
        self.on_error = on_error;
    }

    /// The configured post-processor sequences; available after prepare
    pub fn post_processors(&self) -> Vec<Vec<PostProcessorSlot>> {
        self.post_processors.clone()
    }

    /// Prepare the builder and every attached component
    ///
    /// Side-effect-free by contract. Validation problems across all
    /// components are aggregated; warnings are returned for the caller to
    /// surface.
    pub async fn prepare(&mut self) -> Result<Vec<String>> {
        debug!(build = %self.name, "preparing build");

        let mut overrides = serde_json::Map::new();
        overrides.insert(CONFIG_BUILD_NAME.to_string(), Value::from(self.name.clone()));
        overrides.insert(
            CONFIG_BUILDER_TYPE.to_string(),
            Value::from(self.builder_type.clone()),
        );
        overrides.insert(CONFIG_DEBUG.to_string(), Value::from(self.debug));
        overrides.insert(CONFIG_FORCE.to_string(), Value::from(self.force));
        overrides.insert(
            CONFIG_ON_ERROR.to_string(),
            Value::from(self.on_error.as_str()),
        );

        let raws = [self.builder_config.clone(), Value::Object(overrides)];

        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        match self.builder.prepare(&raws).await {
            Ok(mut w) => warnings.append(&mut w),
            Err(e) => errors.push(e.to_string()),
        }

        for mut spec in self.pending_provisioners.drain(..) {
            match spec.provisioner.prepare(&[spec.config.clone()]).await {
                Ok(()) => self.provisioners.push(ProvisionerEntry {
                    type_name: spec.type_name,
                    filter: spec.filter,
                    inner: Arc::from(spec.provisioner),
                }),
                Err(e) => errors.push(format!("provisioner '{}': {e}", spec.type_name)),
            }
        }

        for sequence in self.pending_post_processors.drain(..) {
            let mut slots = Vec::with_capacity(sequence.len());
            for mut spec in sequence {
                match spec.post_processor.configure(&[spec.config.clone()]).await {
                    Ok(()) => slots.push(PostProcessorSlot {
                        name: spec.name,
                        keep_input: spec.keep_input,
                        filter: spec.filter,
                        inner: Arc::from(spec.post_processor),
                    }),
                    Err(e) => errors.push(format!("post-processor '{}': {e}", spec.name)),
                }
            }
            self.post_processors.push(slots);
        }

        if !errors.is_empty() {
            return Err(BuildError::Prepare {
                build: self.name.clone(),
                source: ironcast_core::error::CoreError::ConfigErrors(errors),
            });
        }

        self.set_phase(BuildPhase::Prepared);
        Ok(warnings)
    }

    /// Run the builder, with the provision hook wired in
    ///
    /// Post-processing is driven by the coordinator once the artifact is
    /// back.
    pub async fn run(
        &self,
        token: CancelToken,
        ui: Arc<dyn Ui>,
    ) -> Result<Option<ArtifactRef>> {
        if self.phase() != BuildPhase::Prepared {
            return Err(BuildError::NotPrepared { build: self.name.clone() });
        }
        self.set_phase(BuildPhase::Running);
        info!(build = %self.name, builder = %self.builder_type, "running build");

        let mut bus = HookBus::new();
        bus.register(
            HOOK_PROVISION,
            Arc::new(ProvisionHook::new(
                self.name.clone(),
                self.provisioners.clone(),
            )),
        );
        let hook: Arc<dyn Hook> = Arc::new(bus);

        match self.builder.run(token.clone(), ui, hook).await {
            Ok(artifact) => {
                self.set_phase(BuildPhase::Succeeded);
                Ok(artifact)
            }
            Err(e) => {
                if e.is_cancellation() || token.is_cancelled() {
                    self.set_phase(BuildPhase::Cancelled);
                } else {
                    self.set_phase(BuildPhase::Failed);
                }
                Err(BuildError::Run { build: self.name.clone(), source: e })
            }
        }
    }
}
