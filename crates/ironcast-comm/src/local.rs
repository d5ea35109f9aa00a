//! Platform-native exec communicator
//!
//! Runs commands and file transfers directly on the host. Builders whose
//! "machine" is a local directory tree (and the test suite) provision
//! through this transport.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use ironcast_core::cancel::CancelToken;
use ironcast_core::communicator::{Cmd, CommError, CommResult, Communicator, RemoteCommand};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::debug;

/// Communicator executing against the local host
#[derive(Debug, Clone)]
pub struct LocalExec {
    shell: PathBuf,
    /// Directory commands run in; also the root for relative transfer paths
    root: Option<PathBuf>,
}

impl Default for LocalExec {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalExec {
    pub fn new() -> Self {
        Self { shell: PathBuf::from("/bin/sh"), root: None }
    }

    /// Anchor command execution and relative paths at `root`
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match (&self.root, path.is_relative()) {
            (Some(root), true) => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl Communicator for LocalExec {
    async fn start(&self, token: CancelToken, cmd: Cmd) -> CommResult<RemoteCommand> {
        debug!(command = %cmd.command, "starting local command");

        let mut command = Command::new(&self.shell);
        command
            .arg("-c")
            .arg(&cmd.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(root) = &self.root {
            command.current_dir(root);
        }

        let mut child = command.spawn()?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let waiter = async move {
            tokio::select! {
                status = child.wait() => {
                    let status = status?;
                    Ok(status.code().unwrap_or(-1))
                }
                _ = token.cancelled() => {
                    let _ = child.kill().await;
                    Err(CommError::Cancelled)
                }
                _ = kill_rx => {
                    let _ = child.kill().await;
                    Err(CommError::Cancelled)
                }
            }
        };

        let mut remote = RemoteCommand::new(waiter).with_terminate(kill_tx);
        if let Some(stdin) = stdin {
            remote = remote.with_stdin(stdin);
        }
        if let Some(stdout) = stdout {
            remote = remote.with_stdout(stdout);
        }
        if let Some(stderr) = stderr {
            remote = remote.with_stderr(stderr);
        }
        Ok(remote)
    }

    async fn upload(
        &self,
        token: CancelToken,
        dest: &Path,
        source: &mut (dyn AsyncRead + Send + Unpin),
        mode: Option<u32>,
    ) -> CommResult<()> {
        let dest = self.resolve(dest);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(&dest).await?;
        tokio::select! {
            copied = tokio::io::copy(source, &mut file) => { copied?; }
            _ = token.cancelled() => return Err(CommError::Cancelled),
        }

        #[cfg(unix)]
        if let Some(mode) = mode {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&dest, std::fs::Permissions::from_mode(mode)).await?;
        }
        #[cfg(not(unix))]
        let _ = mode;

        Ok(())
    }

    async fn upload_dir(
        &self,
        token: CancelToken,
        dest: &Path,
        source: &Path,
        excludes: &[String],
    ) -> CommResult<()> {
        copy_tree(token, source, &self.resolve(dest), excludes).await
    }

    async fn download(
        &self,
        token: CancelToken,
        source: &Path,
        dest: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> CommResult<()> {
        let mut file = tokio::fs::File::open(self.resolve(source)).await?;
        tokio::select! {
            copied = tokio::io::copy(&mut file, dest) => { copied?; }
            _ = token.cancelled() => return Err(CommError::Cancelled),
        }
        Ok(())
    }

    async fn download_dir(
        &self,
        token: CancelToken,
        source: &Path,
        dest: &Path,
        excludes: &[String],
    ) -> CommResult<()> {
        copy_tree(token, &self.resolve(source), dest, excludes).await
    }

    async fn dir_exists(&self, _token: CancelToken, path: &Path) -> CommResult<bool> {
        match tokio::fs::metadata(self.resolve(path)).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn excluded(rel: &Path, excludes: &[String]) -> bool {
    excludes.iter().any(|pattern| {
        rel.starts_with(pattern)
            || rel
                .file_name()
                .map(|n| n.to_string_lossy() == pattern.as_str())
                .unwrap_or(false)
    })
}

/// Copy a directory tree, skipping excluded relative paths
async fn copy_tree(
    token: CancelToken,
    source: &Path,
    dest: &Path,
    excludes: &[String],
) -> CommResult<()> {
    let entries: Vec<(PathBuf, bool)> = walkdir::WalkDir::new(source)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .map(|entry| (entry.path().to_path_buf(), entry.file_type().is_dir()))
        .collect();

    for (path, is_dir) in entries {
        if token.is_cancelled() {
            return Err(CommError::Cancelled);
        }

        let rel = match path.strip_prefix(source) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel.to_path_buf(),
            _ => continue,
        };
        if excluded(&rel, excludes) {
            continue;
        }

        let target = dest.join(&rel);
        if is_dir {
            tokio::fs::create_dir_all(&target).await?;
        } else {
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(&path, &target).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use ironcast_core::communicator::run_command;

    use super::*;

    #[tokio::test]
    async fn test_start_reports_exit_status() {
        let comm = LocalExec::new();
        let token = CancelToken::new();

        let output = run_command(&comm, token.clone(), Cmd::new("exit 0"))
            .await
            .unwrap();
        assert_eq!(output.exit_status, 0);

        let output = run_command(&comm, token, Cmd::new("exit 3")).await.unwrap();
        assert_eq!(output.exit_status, 3);
    }

    #[tokio::test]
    async fn test_command_output_captured() {
        let comm = LocalExec::new();
        let output = run_command(&comm, CancelToken::new(), Cmd::new("echo forged"))
            .await
            .unwrap();
        assert_eq!(output.stdout_string().trim(), "forged");
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_command() {
        let comm = LocalExec::new();
        let token = CancelToken::new();

        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let err = run_command(&comm, token, Cmd::new("sleep 30"))
            .await
            .unwrap_err();
        assert!(matches!(err, CommError::Cancelled));
    }

    #[tokio::test]
    async fn test_upload_and_download_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let comm = LocalExec::new().with_root(dir.path());
        let token = CancelToken::new();

        let mut source = std::io::Cursor::new(b"image contents".to_vec());
        comm.upload(token.clone(), Path::new("out/disk.img"), &mut source, Some(0o644))
            .await
            .unwrap();

        let mut downloaded = Vec::new();
        comm.download(token.clone(), Path::new("out/disk.img"), &mut downloaded)
            .await
            .unwrap();
        assert_eq!(downloaded, b"image contents");

        assert!(comm.dir_exists(token.clone(), Path::new("out")).await.unwrap());
        assert!(!comm.dir_exists(token, Path::new("missing")).await.unwrap());
    }

    #[tokio::test]
    async fn test_upload_dir_honors_excludes() {
        let src = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("keep.txt"), "keep").unwrap();
        std::fs::create_dir(src.path().join("skip")).unwrap();
        std::fs::write(src.path().join("skip/drop.txt"), "drop").unwrap();

        let dst = tempfile::tempdir().unwrap();
        let comm = LocalExec::new();
        comm.upload_dir(
            CancelToken::new(),
            dst.path(),
            src.path(),
            &["skip".to_string()],
        )
        .await
        .unwrap();

        assert!(dst.path().join("keep.txt").exists());
        assert!(!dst.path().join("skip").exists());
    }
}
