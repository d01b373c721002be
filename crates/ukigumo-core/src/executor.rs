//! External command execution with combined output capture.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::CommandError;
use crate::log::LogBuffer;

const READ_CHUNK: usize = 8 * 1024;

/// Runs commands inside one project directory, appending their output to a
/// [`LogBuffer`].
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    dir: PathBuf,
    timeout: Option<Duration>,
    env: Vec<(String, String)>,
}

impl CommandExecutor {
    /// Executor rooted at `dir`. Commands run without a deadline.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            timeout: None,
            env: Vec::new(),
        }
    }

    /// Kill any command still running after `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Extra environment variables for every command, on top of the
    /// inherited environment. A `PATH` entry also changes program lookup.
    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Run `program args...` and capture its combined stdout and stderr.
    ///
    /// Writes a timestamped section marker before spawning. Output from both
    /// streams is appended in arrival order, byte for byte. Returns an error
    /// for spawn failures, non-zero exits and deadline expiry; in every case
    /// whatever the command printed stays in `buf`.
    pub async fn run(
        &self,
        buf: &mut LogBuffer,
        program: &str,
        args: &[&str],
    ) -> Result<(), CommandError> {
        let command = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");

        buf.mark();
        let start = Instant::now();

        // `./Build` and friends live in the project directory, not ours.
        let program_path = if program.starts_with("./") {
            self.dir
                .canonicalize()
                .unwrap_or_else(|_| self.dir.clone())
                .join(program)
        } else {
            PathBuf::from(program)
        };

        let mut child = Command::new(program_path)
            .args(args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&self.dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::Spawn {
                command: command.clone(),
                source,
            })?;

        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        if let Some(stdout) = child.stdout.take() {
            pump(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            pump(stderr, tx);
        } else {
            drop(tx);
        }

        let drive = async {
            while let Some(chunk) = rx.recv().await {
                buf.append(&chunk);
            }
            child.wait().await
        };

        let waited = match self.timeout {
            Some(limit) => {
                let timed = tokio::time::timeout(limit, drive).await;
                match timed {
                    Ok(waited) => waited,
                    Err(_) => {
                        if let Err(e) = child.kill().await {
                            warn!(command = %command, error = %e, "Failed to kill timed out command");
                        }
                        buf.append(format!("\n!! timed out after {:?} !!\n", limit).as_bytes());
                        return Err(CommandError::TimedOut {
                            command,
                            timeout: limit,
                        });
                    }
                }
            }
            None => drive.await,
        };

        let status = waited.map_err(|source| CommandError::Wait {
            command: command.clone(),
            source,
        })?;

        debug!(
            command = %command,
            exit_code = ?status.code(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Command finished"
        );

        if status.success() {
            Ok(())
        } else {
            Err(CommandError::Exited {
                command,
                code: status.code(),
            })
        }
    }
}

/// Forward everything read from `reader` to `tx` until EOF.
fn pump<R>(mut reader: R, tx: mpsc::UnboundedSender<Vec<u8>>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(chunk[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read command output");
                    break;
                }
            }
        }
    });
}
