//! Typed results for `git` CLI invocations.
//!
//! Mutating operations (merge, cherry-pick, checkout, commit, push) go through
//! the `git` binary so that a conflicted operation leaves exactly the native
//! in-progress state a human expects to find. Callers receive a
//! [`CommandOutput`] and decide for themselves which exit codes are failures.

use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::errors::GitError;
use crate::models::Identity;

/// Captured result of one `git` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Arguments passed after `git`.
    pub args: Vec<String>,
    /// Exit code; `-1` when the process was terminated by a signal.
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Convert a non-zero exit into [`GitError::CommandFailed`].
    pub fn into_result(self) -> Result<Self, GitError> {
        if self.success() {
            Ok(self)
        } else {
            Err(self.into_error())
        }
    }

    /// Build the error describing this (failed) invocation.
    pub fn into_error(self) -> GitError {
        let stderr = if self.stderr.trim().is_empty() {
            self.stdout.trim().to_string()
        } else {
            self.stderr.trim().to_string()
        };
        GitError::CommandFailed {
            args: self.args.join(" "),
            exit_code: self.code,
            stderr,
        }
    }

    /// Split NUL-terminated stdout (`-z` output) into entries.
    pub fn nul_separated(&self) -> Vec<String> {
        self.stdout
            .split('\0')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Which identity variables are pinned on a spawned process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IdentityPin {
    /// Author and committer.
    Both,
    /// Committer only; the operation keeps the original author (cherry-pick).
    CommitterOnly,
}

/// Spawn `git` in `dir` and capture its output.
pub(crate) async fn run_git(
    dir: &Path,
    args: &[&str],
    identity: Option<(&Identity, IdentityPin)>,
    stdin: Option<&str>,
) -> Result<CommandOutput, GitError> {
    let mut cmd = Command::new("git");
    cmd.current_dir(dir)
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("GIT_EDITOR", "true")
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Some((who, pin)) = identity {
        cmd.env("GIT_COMMITTER_NAME", &who.name)
            .env("GIT_COMMITTER_EMAIL", &who.email);
        if pin == IdentityPin::Both {
            cmd.env("GIT_AUTHOR_NAME", &who.name)
                .env("GIT_AUTHOR_EMAIL", &who.email);
        }
    }

    debug!(cmd = %format!("git {}", args.join(" ")), "running git command");
    let mut child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            GitError::BinaryNotFound("git".into())
        } else {
            GitError::IoError(e)
        }
    })?;

    if let Some(input) = stdin {
        if let Some(mut pipe) = child.stdin.take() {
            pipe.write_all(input.as_bytes()).await?;
        }
    }

    let output = child.wait_with_output().await?;
    let result = CommandOutput {
        args: args.iter().map(|a| a.to_string()).collect(),
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    };
    if !result.success() {
        debug!(
            exit_code = result.code,
            stderr = %result.stderr.trim(),
            "git {} exited non-zero",
            args.first().copied().unwrap_or_default()
        );
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(code: i32, stdout: &str, stderr: &str) -> CommandOutput {
        CommandOutput {
            args: vec!["merge".into(), "--no-ff".into()],
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    #[test]
    fn test_into_result_keeps_success() {
        let out = output(0, "ok", "").into_result().unwrap();
        assert_eq!(out.stdout, "ok");
    }

    #[test]
    fn test_into_error_prefers_stderr() {
        let err = output(1, "CONFLICT (content)", "fatal: boom\n").into_error();
        match err {
            GitError::CommandFailed {
                args,
                exit_code,
                stderr,
            } => {
                assert_eq!(args, "merge --no-ff");
                assert_eq!(exit_code, 1);
                assert_eq!(stderr, "fatal: boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_into_error_falls_back_to_stdout() {
        let err = output(1, "CONFLICT (content)\n", "  ").into_error();
        assert!(err.to_string().contains("CONFLICT (content)"));
    }

    #[test]
    fn test_nul_separated() {
        let out = output(0, "a.txt\0dir/b.txt\0", "");
        assert_eq!(out.nul_separated(), vec!["a.txt", "dir/b.txt"]);
    }

    #[tokio::test]
    async fn test_missing_directory_fails() {
        let result = run_git(Path::new("/nonexistent/braid"), &["status"], None, None).await;
        assert!(result.is_err());
    }
}
