//! Shared fixtures for build orchestration tests
//!
//! Scripted builders drive the real step runner so tests exercise the same
//! machinery production builders use; communicators and post-processors are
//! mocks with observable operation logs.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ironcast_core::artifact::{Artifact, ArtifactRef};
use ironcast_core::builder::Builder;
use ironcast_core::cancel::CancelToken;
use ironcast_core::communicator::{
    run_command, Cmd, CommError, CommResult, Communicator, RemoteCommand,
};
use ironcast_core::error::CoreError;
use ironcast_core::hook::{Hook, HookPayload, HOOK_PROVISION};
use ironcast_core::postprocessor::{PostProcessed, PostProcessor};
use ironcast_core::provisioner::Provisioner;
use ironcast_core::ui::Ui;
use ironcast_multistep::{Step, StepAction, StateBag};

pub type OpLog = Arc<Mutex<Vec<String>>>;

pub fn op_log() -> OpLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &OpLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Artifact with an observable destroy counter
pub struct MockArtifact {
    pub artifact_id: String,
    pub destroyed: Arc<AtomicU32>,
}

impl MockArtifact {
    pub fn new(id: &str) -> (ArtifactRef, Arc<AtomicU32>) {
        let destroyed = Arc::new(AtomicU32::new(0));
        let artifact = Arc::new(Self {
            artifact_id: id.to_string(),
            destroyed: Arc::clone(&destroyed),
        });
        (artifact, destroyed)
    }
}

#[async_trait]
impl Artifact for MockArtifact {
    fn builder_id(&self) -> &str {
        "ironcast.mock"
    }

    fn files(&self) -> Vec<std::path::PathBuf> {
        Vec::new()
    }

    fn id(&self) -> String {
        self.artifact_id.clone()
    }

    fn summary(&self) -> String {
        format!("mock artifact {}", self.artifact_id)
    }

    fn state(&self, _key: &str) -> Option<serde_json::Value> {
        None
    }

    async fn destroy(&self) -> ironcast_core::Result<()> {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Tracks the peak number of concurrently running builds
#[derive(Default)]
pub struct ConcurrencyProbe {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl ConcurrencyProbe {
    pub fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    pub fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

/// What a scripted step does when executed
#[derive(Clone)]
pub enum StepBehavior {
    /// Succeed after an optional delay
    Continue { delay_ms: u64 },
    /// Record an error in the bag and halt
    Fail,
    /// Wait until cancelled, then halt
    Block,
    /// Dispatch the provision hook with the given communicator
    Provision { comm: Arc<dyn Communicator> },
}

struct ScriptedStep {
    name: String,
    behavior: StepBehavior,
    build: String,
    log: OpLog,
    ui: Arc<dyn Ui>,
    hook: Arc<dyn Hook>,
}

#[async_trait]
impl Step for ScriptedStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, token: CancelToken, state: &StateBag) -> StepAction {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:execute:{}", self.build, self.name));

        match &self.behavior {
            StepBehavior::Continue { delay_ms } => {
                if *delay_ms > 0 {
                    tokio::time::sleep(std::time::Duration::from_millis(*delay_ms)).await;
                }
                StepAction::Continue
            }
            StepBehavior::Fail => {
                state.set_error(CoreError::step(&self.name, "induced failure"));
                StepAction::Halt
            }
            StepBehavior::Block => {
                token.cancelled().await;
                StepAction::Halt
            }
            StepBehavior::Provision { comm } => {
                let payload = HookPayload::Provision { communicator: Arc::clone(comm) };
                match self
                    .hook
                    .run(HOOK_PROVISION, Arc::clone(&self.ui), Some(payload), token.clone())
                    .await
                {
                    Ok(()) => StepAction::Continue,
                    Err(e) => {
                        if !token.is_cancelled() && !e.is_cancellation() {
                            state.set_error(e);
                        }
                        StepAction::Halt
                    }
                }
            }
        }
    }

    async fn cleanup(&self, _state: &StateBag) {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:cleanup:{}", self.build, self.name));
    }
}

/// Builder running a scripted step list through the real step runner
pub struct ScriptedBuilder {
    pub build_name: String,
    pub steps: Vec<(String, StepBehavior)>,
    pub log: OpLog,
    pub artifact: Option<ArtifactRef>,
    pub prepare_errors: Vec<String>,
    pub warnings: Vec<String>,
    pub probe: Option<Arc<ConcurrencyProbe>>,
}

impl ScriptedBuilder {
    pub fn new(build_name: &str, log: &OpLog) -> Self {
        Self {
            build_name: build_name.to_string(),
            steps: Vec::new(),
            log: Arc::clone(log),
            artifact: None,
            prepare_errors: Vec::new(),
            warnings: Vec::new(),
            probe: None,
        }
    }

    pub fn step(mut self, name: &str, behavior: StepBehavior) -> Self {
        self.steps.push((name.to_string(), behavior));
        self
    }

    pub fn passing_step(self, name: &str) -> Self {
        self.step(name, StepBehavior::Continue { delay_ms: 0 })
    }

    pub fn producing(mut self, artifact: ArtifactRef) -> Self {
        self.artifact = Some(artifact);
        self
    }

    pub fn failing_prepare(mut self, message: &str) -> Self {
        self.prepare_errors.push(message.to_string());
        self
    }

    pub fn warning(mut self, message: &str) -> Self {
        self.warnings.push(message.to_string());
        self
    }

    pub fn probed(mut self, probe: &Arc<ConcurrencyProbe>) -> Self {
        self.probe = Some(Arc::clone(probe));
        self
    }
}

#[async_trait]
impl Builder for ScriptedBuilder {
    async fn prepare(&mut self, _raws: &[serde_json::Value]) -> ironcast_core::Result<Vec<String>> {
        if !self.prepare_errors.is_empty() {
            return Err(CoreError::ConfigErrors(self.prepare_errors.clone()));
        }
        Ok(self.warnings.clone())
    }

    async fn run(
        &self,
        token: CancelToken,
        ui: Arc<dyn Ui>,
        hook: Arc<dyn Hook>,
    ) -> ironcast_core::Result<Option<ArtifactRef>> {
        if let Some(probe) = &self.probe {
            probe.enter();
        }

        let steps: Vec<Box<dyn Step>> = self
            .steps
            .iter()
            .map(|(name, behavior)| {
                Box::new(ScriptedStep {
                    name: name.clone(),
                    behavior: behavior.clone(),
                    build: self.build_name.clone(),
                    log: Arc::clone(&self.log),
                    ui: Arc::clone(&ui),
                    hook: Arc::clone(&hook),
                }) as Box<dyn Step>
            })
            .collect();

        let state = StateBag::new();
        let runner = ironcast_multistep::StepRunner::new(steps);
        runner.run(token.clone(), &state).await;

        if let Some(probe) = &self.probe {
            probe.exit();
        }

        if let Some(error) = state.error() {
            return Err(error);
        }
        if state.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        if state.is_halted() {
            return Err(CoreError::Halted);
        }
        Ok(self.artifact.clone())
    }
}

/// Communicator whose commands park until cancellation
pub struct BlockingCommunicator;

#[async_trait]
impl Communicator for BlockingCommunicator {
    async fn start(&self, token: CancelToken, _cmd: Cmd) -> CommResult<RemoteCommand> {
        Ok(RemoteCommand::new(async move {
            token.cancelled().await;
            Err(CommError::Cancelled)
        }))
    }

    async fn upload(
        &self,
        _token: CancelToken,
        _dest: &Path,
        _source: &mut (dyn tokio::io::AsyncRead + Send + Unpin),
        _mode: Option<u32>,
    ) -> CommResult<()> {
        Err(CommError::Unsupported)
    }

    async fn upload_dir(
        &self,
        _token: CancelToken,
        _dest: &Path,
        _source: &Path,
        _excludes: &[String],
    ) -> CommResult<()> {
        Err(CommError::Unsupported)
    }

    async fn download(
        &self,
        _token: CancelToken,
        _source: &Path,
        _dest: &mut (dyn tokio::io::AsyncWrite + Send + Unpin),
    ) -> CommResult<()> {
        Err(CommError::Unsupported)
    }

    async fn download_dir(
        &self,
        _token: CancelToken,
        _source: &Path,
        _dest: &Path,
        _excludes: &[String],
    ) -> CommResult<()> {
        Err(CommError::Unsupported)
    }

    async fn dir_exists(&self, _token: CancelToken, _path: &Path) -> CommResult<bool> {
        Ok(false)
    }
}

/// Provisioner that runs one command through the communicator
pub struct ExecProvisioner {
    pub label: String,
    pub log: OpLog,
}

#[async_trait]
impl Provisioner for ExecProvisioner {
    async fn prepare(&mut self, _raws: &[serde_json::Value]) -> ironcast_core::Result<()> {
        Ok(())
    }

    async fn provision(
        &self,
        token: CancelToken,
        _ui: Arc<dyn Ui>,
        comm: Arc<dyn Communicator>,
    ) -> ironcast_core::Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("provision:{}", self.label));
        let output = run_command(comm.as_ref(), token, Cmd::new("true")).await?;
        output.success()?;
        Ok(())
    }
}

/// Post-processor returning a fresh artifact, optionally keeping the input
pub struct MockPostProcessor {
    pub label: String,
    pub log: OpLog,
    pub fail: bool,
    pub keep_input: bool,
    pub pass_through: bool,
}

impl MockPostProcessor {
    pub fn new(label: &str, log: &OpLog) -> Self {
        Self {
            label: label.to_string(),
            log: Arc::clone(log),
            fail: false,
            keep_input: false,
            pass_through: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn keeping_input(mut self) -> Self {
        self.keep_input = true;
        self
    }

    pub fn passing_through(mut self) -> Self {
        self.pass_through = true;
        self
    }
}

#[async_trait]
impl PostProcessor for MockPostProcessor {
    async fn configure(&mut self, _raws: &[serde_json::Value]) -> ironcast_core::Result<()> {
        Ok(())
    }

    async fn post_process(
        &self,
        _token: CancelToken,
        _ui: Arc<dyn Ui>,
        artifact: ArtifactRef,
    ) -> ironcast_core::Result<PostProcessed> {
        self.log.lock().unwrap().push(format!("pp:{}", self.label));
        if self.fail {
            return Err(CoreError::post_process(&self.label, "induced failure"));
        }
        if self.pass_through {
            return Ok(PostProcessed {
                artifact,
                keep_input: self.keep_input,
                force_keep: false,
            });
        }
        let (output, _) = MockArtifact::new(&format!("{}-output", self.label));
        Ok(PostProcessed {
            artifact: output,
            keep_input: self.keep_input,
            force_keep: false,
        })
    }
}
