//! The `none` communicator
//!
//! Used by builders whose machines are never reachable (or that skip
//! provisioning entirely). Every operation is rejected with `Unsupported`.

use std::path::Path;

use async_trait::async_trait;
use ironcast_core::cancel::CancelToken;
use ironcast_core::communicator::{Cmd, CommError, CommResult, Communicator, RemoteCommand};
use tokio::io::{AsyncRead, AsyncWrite};

/// Communicator that rejects all operations
#[derive(Debug, Default, Clone, Copy)]
pub struct NoneCommunicator;

#[async_trait]
impl Communicator for NoneCommunicator {
    async fn start(&self, _token: CancelToken, _cmd: Cmd) -> CommResult<RemoteCommand> {
        Err(CommError::Unsupported)
    }

    async fn upload(
        &self,
        _token: CancelToken,
        _dest: &Path,
        _source: &mut (dyn AsyncRead + Send + Unpin),
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
        _dest: &mut (dyn AsyncWrite + Send + Unpin),
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
        Err(CommError::Unsupported)
    }
}
