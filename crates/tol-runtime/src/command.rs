//! Process spawn collaborator.
//!
//! [`ProcessSpawner`] is the boundary between the lifecycle controller and
//! the operating system: it spawns a command, streams labeled stdout and
//! stderr lines into an [`OutputSink`], and resolves once the child exits.
//! Resolution with `Ok` means exit code 0; anything else is a
//! [`SpawnError`].

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::debug;

use tol_core::output::OutputSink;
use tol_core::settings::EnvVar;

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{label} exited with code {code}")]
    Exit { label: String, code: i32 },
    #[error("{label} terminated by signal")]
    Terminated { label: String },
    #[error("failed to supervise {label}: {source}")]
    Supervise {
        label: String,
        #[source]
        source: std::io::Error,
    },
}

/// Options for one spawn.
#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
    /// Custom variables overlaid onto the inherited environment.
    pub env: Vec<EnvVar>,
    /// Working directory for the child.
    pub cwd: Option<PathBuf>,
}

/// Boundary for spawning and supervising one server command.
#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    /// Spawn `program args...`, stream its output into `sink` prefixed
    /// with `[label]:`, and resolve when the child exits.
    async fn spawn(
        &self,
        sink: Arc<dyn OutputSink>,
        label: &str,
        program: &Path,
        options: SpawnOptions,
        args: &[String],
    ) -> Result<(), SpawnError>;
}

/// [`ProcessSpawner`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

#[async_trait]
impl ProcessSpawner for TokioSpawner {
    async fn spawn(
        &self,
        sink: Arc<dyn OutputSink>,
        label: &str,
        program: &Path,
        options: SpawnOptions,
        args: &[String],
    ) -> Result<(), SpawnError> {
        sink.show();

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for env in &options.env {
            command.env(&env.name, &env.value);
        }
        if let Some(cwd) = &options.cwd {
            command.current_dir(cwd);
        }

        debug!(program = %program.display(), label = %label, "Spawning server command");
        let mut child = command.spawn().map_err(|source| SpawnError::Spawn {
            program: program.display().to_string(),
            source,
        })?;

        let stdout_reader = child
            .stdout
            .take()
            .map(|stdout| spawn_line_reader(stdout, label.to_string(), Arc::clone(&sink)));
        let stderr_reader = child
            .stderr
            .take()
            .map(|stderr| spawn_line_reader(stderr, label.to_string(), Arc::clone(&sink)));

        let status = child.wait().await.map_err(|source| SpawnError::Supervise {
            label: label.to_string(),
            source,
        })?;

        // Drain remaining output before reporting the exit
        if let Some(reader) = stdout_reader {
            let _ = reader.await;
        }
        if let Some(reader) = stderr_reader {
            let _ = reader.await;
        }

        match status.code() {
            Some(0) => Ok(()),
            Some(code) => Err(SpawnError::Exit {
                label: label.to_string(),
                code,
            }),
            None => Err(SpawnError::Terminated {
                label: label.to_string(),
            }),
        }
    }
}

/// Read a child stream line by line into the sink. Byte-based with lossy
/// UTF-8 decoding: invalid bytes must not terminate the reader.
fn spawn_line_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    label: String,
    sink: Arc<dyn OutputSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                    }
                    let line = String::from_utf8_lossy(&buf);
                    if label.is_empty() {
                        sink.append(&format!("{line}\n"));
                    } else {
                        sink.append(&format!("[{label}]: {line}\n"));
                    }
                }
                Err(e) => {
                    debug!(error = %e, "Stream reader stopped");
                    break;
                }
            }
        }
    })
}
