//! Checkout directories under the agent's working directory.
//!
//! Each (repository, branch) owns `<root>/<escaped repository>/<escaped branch>`.
//! The directory is wiped before every clone; callers must hold the key's
//! lock while it is in use.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;
use ukigumo_core::{CommandExecutor, LogBuffer};

use crate::error::AgentError;
use crate::registry::RunKey;

/// Escape `s` for use as a single path component.
///
/// Follows `application/x-www-form-urlencoded` escaping: ASCII letters,
/// digits and `-_.~` pass through, space becomes `+`, every other byte is
/// `%XX`. The results `.` and `..` are escaped further so a component can
/// never name the current or parent directory.
pub fn query_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }

    match out.as_str() {
        "." => "%2E".to_string(),
        ".." => "%2E%2E".to_string(),
        _ => out,
    }
}

/// Project name for a repository URL: the last path segment without `.git`.
pub fn project_name(repository: &str) -> String {
    let trimmed = repository.trim_end_matches('/');
    let last = trimmed.rsplit(&['/', ':'][..]).next().unwrap_or(trimmed);
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() {
        repository.to_string()
    } else {
        name.to_string()
    }
}

/// Root of all checkouts.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory (and parents) if missing.
    pub fn ensure_root(&self) -> Result<(), AgentError> {
        std::fs::create_dir_all(&self.root).map_err(|source| AgentError::Workdir {
            path: self.root.clone(),
            source,
        })
    }

    pub fn job_dir(&self, key: &RunKey) -> PathBuf {
        self.root
            .join(query_escape(&key.repository))
            .join(query_escape(&key.branch))
    }

    /// Remove any previous checkout for `key` and create an empty directory.
    pub async fn prepare(&self, key: &RunKey) -> Result<PathBuf, AgentError> {
        let dir = self.job_dir(key);
        let workdir_err = |source| AgentError::Workdir {
            path: dir.clone(),
            source,
        };

        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(dir = %dir.display(), "Removed previous checkout"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(workdir_err(e)),
        }
        tokio::fs::create_dir_all(&dir).await.map_err(workdir_err)?;
        Ok(dir)
    }

    /// `git clone --branch <branch> <repository> <dir>`, output into `buf`.
    pub async fn clone_into(
        &self,
        key: &RunKey,
        dir: &Path,
        buf: &mut LogBuffer,
        timeout: Option<Duration>,
        env: Vec<(String, String)>,
    ) -> Result<(), AgentError> {
        let target = dir.to_string_lossy();
        let executor = CommandExecutor::new(&self.root)
            .with_timeout(timeout)
            .with_env(env);

        executor
            .run(
                buf,
                "git",
                &[
                    "clone",
                    "--branch",
                    key.branch.as_str(),
                    key.repository.as_str(),
                    target.as_ref(),
                ],
            )
            .await
            .map_err(|source| AgentError::Clone {
                repository: key.repository.clone(),
                branch: key.branch.clone(),
                source,
            })
    }
}
