//! Error types for the braid core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

use crate::strategy::Strategy;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Integration(#[from] IntegrationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    List(#[from] ListError),
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from the repository handle: `git2` queries and `git` CLI invocations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The repository path does not exist or is not a git repo.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// The `git` binary was not found on `$PATH`.
    #[error("git binary not found: {0}")]
    BinaryNotFound(String),

    /// A `git` command exited with a status the caller did not expect.
    #[error("git {args} failed (exit {exit_code}): {stderr}")]
    CommandFailed {
        args: String,
        exit_code: i32,
        stderr: String,
    },

    /// Push was rejected by the remote.
    #[error("git push rejected for branch '{branch}': {detail}")]
    PushRejected { branch: String, detail: String },

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Integration errors
// ---------------------------------------------------------------------------

/// Fatal outcomes of an integration or bundle run.
///
/// Every variant aborts the whole run. [`IntegrationError::ApplyConflict`] and
/// [`IntegrationError::BundleConflict`] leave the repository in git's native
/// "operation in progress" state so the operator can resolve and re-run.
#[derive(Debug, Error)]
pub enum IntegrationError {
    /// The topic resolved against none of the local/remote candidates.
    #[error("topic '{topic}' not found (tried: {})", candidates.join(", "))]
    RefNotFound {
        topic: String,
        candidates: Vec<String>,
    },

    /// No merge base exists between a topic and the base/head it is measured against.
    #[error("no common ancestor between '{topic}' and '{other}'")]
    CommonAncestorUnavailable { topic: String, other: String },

    /// Applying a topic stopped on overlapping changes.
    #[error(
        "{strategy} of topic '{topic}' stopped on conflicts in: {}; resolve them with git and re-run",
        paths.join(", ")
    )]
    ApplyConflict {
        topic: String,
        strategy: Strategy,
        paths: Vec<String>,
    },

    /// Applying a topic failed for a reason other than conflicting changes.
    #[error("{strategy} of topic '{topic}' failed: {source}")]
    ApplyFailed {
        topic: String,
        strategy: Strategy,
        #[source]
        source: GitError,
    },

    /// The working tree or index has uncommitted changes at entry.
    #[error("working tree has uncommitted changes: {}", paths.join(", "))]
    DirtyWorkingTree { paths: Vec<String> },

    /// A merge, cherry-pick, or similar operation is already in progress at entry.
    #[error("repository has an operation in progress ({state}); finish or abort it first")]
    OperationInProgress { state: String },

    /// A bundle lists itself as one of its topics.
    #[error("bundle '{bundle}' lists itself as a topic")]
    BundleSelfReference { bundle: String },

    /// A bundle lists the same topic more than once.
    #[error("bundle '{bundle}' lists topic '{topic}' more than once")]
    BundleDuplicateTopic { bundle: String, topic: String },

    /// A bundle merge conflicted outside the auto-resolvable paths.
    #[error(
        "bundle '{bundle}': merging topic '{topic}' left unresolved conflicts in: {}",
        paths.join(", ")
    )]
    BundleConflict {
        bundle: String,
        topic: String,
        paths: Vec<String>,
    },

    /// A bundle merge failed for a reason other than conflicting changes.
    #[error("bundle '{bundle}': merging topic '{topic}' failed: {source}")]
    BundleMergeFailed {
        bundle: String,
        topic: String,
        #[source]
        source: GitError,
    },

    /// Underlying repository error.
    #[error(transparent)]
    Git(#[from] GitError),
}

impl IntegrationError {
    /// `true` for the conflict variants that leave a resumable operation behind.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::ApplyConflict { .. } | Self::BundleConflict { .. }
        )
    }
}

impl From<git2::Error> for IntegrationError {
    fn from(err: git2::Error) -> Self {
        Self::Git(GitError::Git2Error(err))
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// List file errors
// ---------------------------------------------------------------------------

/// Errors from reading the topic and bundle list files.
#[derive(Debug, Error)]
pub enum ListError {
    /// The list file does not exist.
    #[error("list file not found: {0}")]
    FileNotFound(String),

    /// A line could not be parsed.
    #[error("{file}:{line}: {detail}")]
    Malformed {
        file: String,
        line: usize,
        detail: String,
    },

    /// The parsed bundle failed validation.
    #[error("{file}: {source}")]
    InvalidBundle {
        file: String,
        #[source]
        source: IntegrationError,
    },

    /// Generic I/O error reading the list file.
    #[error("list I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
