//! Communicator contract
//!
//! Provisioners talk to the machine being built through this trait without
//! knowing the transport underneath. Transport implementations live in the
//! `ironcast-comm` crate.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::oneshot;

use crate::cancel::CancelToken;

/// Transport-level error taxonomy
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommError {
    /// The underlying connection dropped and could not be re-established
    #[error("connection to the remote host was lost")]
    ConnectionLost,

    /// The remote command ran but exited nonzero
    #[error("remote command exited with status {code}")]
    RemoteCommandFailed { code: i32 },

    /// The transport does not support the requested operation
    #[error("operation not supported by this communicator")]
    Unsupported,

    /// A configured deadline expired before the operation completed
    #[error("communicator operation timed out")]
    Timeout,

    /// The operation was interrupted by cancellation
    #[error("communicator operation was cancelled")]
    Cancelled,

    /// Transport-level I/O failure
    #[error("i/o error: {0}")]
    Io(String),
}

impl CommError {
    /// Transient failures are worth retrying; everything else is final
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionLost | Self::Timeout)
    }
}

impl From<std::io::Error> for CommError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Result type alias for communicator operations
pub type CommResult<T> = std::result::Result<T, CommError>;

/// A command to run on the remote machine
///
/// The command string is interpreted by the remote shell, matching how
/// provisioners are written in templates.
#[derive(Debug, Clone)]
pub struct Cmd {
    pub command: String,
}

impl Cmd {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into() }
    }
}

type ExitWaiter = Pin<Box<dyn Future<Output = CommResult<i32>> + Send>>;

/// Handle to a started remote command
///
/// Streams are populated by the transport; `wait` resolves to the remote
/// exit status. Waiting twice returns the cached status.
pub struct RemoteCommand {
    pub stdin: Option<Box<dyn AsyncWrite + Send + Unpin>>,
    pub stdout: Option<Box<dyn AsyncRead + Send + Unpin>>,
    pub stderr: Option<Box<dyn AsyncRead + Send + Unpin>>,
    waiter: Option<ExitWaiter>,
    exit_status: Option<CommResult<i32>>,
    terminate: Option<oneshot::Sender<()>>,
}

impl RemoteCommand {
    /// Create a handle whose exit status resolves through `waiter`
    pub fn new<F>(waiter: F) -> Self
    where
        F: Future<Output = CommResult<i32>> + Send + 'static,
    {
        Self {
            stdin: None,
            stdout: None,
            stderr: None,
            waiter: Some(Box::pin(waiter)),
            exit_status: None,
            terminate: None,
        }
    }

    /// Attach a stdin stream
    pub fn with_stdin(mut self, stdin: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        self.stdin = Some(Box::new(stdin));
        self
    }

    /// Attach a stdout stream
    pub fn with_stdout(mut self, stdout: impl AsyncRead + Send + Unpin + 'static) -> Self {
        self.stdout = Some(Box::new(stdout));
        self
    }

    /// Attach a stderr stream
    pub fn with_stderr(mut self, stderr: impl AsyncRead + Send + Unpin + 'static) -> Self {
        self.stderr = Some(Box::new(stderr));
        self
    }

    /// Attach a termination trigger the transport listens on
    pub fn with_terminate(mut self, terminate: oneshot::Sender<()>) -> Self {
        self.terminate = Some(terminate);
        self
    }

    /// Wait for the command to finish and return its exit status
    pub async fn wait(&mut self) -> CommResult<i32> {
        if let Some(status) = &self.exit_status {
            return status.clone();
        }
        let waiter = match self.waiter.take() {
            Some(w) => w,
            None => return Err(CommError::ConnectionLost),
        };
        let status = waiter.await;
        self.exit_status = Some(status.clone());
        status
    }

    /// Force the remote command to terminate
    pub fn terminate(&mut self) {
        if let Some(tx) = self.terminate.take() {
            let _ = tx.send(());
        }
    }
}

impl std::fmt::Debug for RemoteCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCommand")
            .field("exit_status", &self.exit_status)
            .finish()
    }
}

/// Transport abstraction for exec/upload/download against the machine
/// being built
///
/// Every operation takes a cancellation token and must abandon in-flight
/// I/O when it fires.
#[async_trait]
pub trait Communicator: Send + Sync {
    /// Begin a remote command
    async fn start(&self, token: CancelToken, cmd: Cmd) -> CommResult<RemoteCommand>;

    /// Upload a byte stream to a remote path
    async fn upload(
        &self,
        token: CancelToken,
        dest: &Path,
        source: &mut (dyn AsyncRead + Send + Unpin),
        mode: Option<u32>,
    ) -> CommResult<()>;

    /// Upload a local directory tree to a remote path
    async fn upload_dir(
        &self,
        token: CancelToken,
        dest: &Path,
        source: &Path,
        excludes: &[String],
    ) -> CommResult<()>;

    /// Download a remote path into a writer
    async fn download(
        &self,
        token: CancelToken,
        source: &Path,
        dest: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> CommResult<()>;

    /// Download a remote directory tree to a local path
    async fn download_dir(
        &self,
        token: CancelToken,
        source: &Path,
        dest: &Path,
        excludes: &[String],
    ) -> CommResult<()>;

    /// Test whether a remote directory exists
    async fn dir_exists(&self, token: CancelToken, path: &Path) -> CommResult<bool>;
}

/// Convenience: run a command to completion and collect its output
///
/// The transport's wait future is responsible for observing the token and
/// tearing the command down; its pipes close when it does, which unblocks
/// the reads here.
pub async fn run_command(
    comm: &dyn Communicator,
    token: CancelToken,
    cmd: Cmd,
) -> CommResult<CommandOutput> {
    use tokio::io::AsyncReadExt;

    let mut remote = comm.start(token, cmd).await?;
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    // No input to feed; close stdin so the remote side sees EOF.
    drop(remote.stdin.take());
    let out = remote.stdout.take();
    let err = remote.stderr.take();

    let ((out_read, err_read), status) = tokio::join!(
        async {
            tokio::join!(
                async {
                    match out {
                        Some(mut out) => out.read_to_end(&mut stdout).await.map(|_| ()),
                        None => Ok(()),
                    }
                },
                async {
                    match err {
                        Some(mut err) => err.read_to_end(&mut stderr).await.map(|_| ()),
                        None => Ok(()),
                    }
                }
            )
        },
        remote.wait(),
    );
    let code = status?;
    out_read?;
    err_read?;

    Ok(CommandOutput { exit_status: code, stdout, stderr })
}

/// Collected output of a completed remote command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_status: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// Check for a zero exit status, erroring otherwise
    pub fn success(&self) -> CommResult<()> {
        if self.exit_status == 0 {
            Ok(())
        } else {
            Err(CommError::RemoteCommandFailed { code: self.exit_status })
        }
    }

    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}
