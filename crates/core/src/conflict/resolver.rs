//! All-or-nothing resolution of an in-progress merge.

use git2::Oid;
use tracing::{debug, info, warn};

use super::allow_list::AllowList;
use crate::errors::GitError;
use crate::git::GitClient;

/// Result of an auto-resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoResolution {
    /// Every conflict was on an allow-listed path; the merge is committed.
    Resolved {
        commit: Oid,
        paths: Vec<String>,
    },
    /// At least one conflict is outside the allow-list; the merge stays in
    /// progress with these paths still unmerged.
    Unresolved { paths: Vec<String> },
}

/// Settles merge conflicts confined to allow-listed paths.
#[derive(Debug, Clone)]
pub struct ConflictAutoResolver {
    allow_list: AllowList,
}

impl ConflictAutoResolver {
    pub fn new(allow_list: AllowList) -> Self {
        Self { allow_list }
    }

    /// Inspect the in-progress merge and finish it if every unmerged path is allow-listed.
    ///
    /// Never commits while any path is still unmerged.
    pub async fn resolve(&self, git: &GitClient) -> Result<AutoResolution, GitError> {
        let unresolved = git.unresolved_paths().await?;
        let (matched, unmatched) = self.allow_list.partition(&unresolved);
        debug!(
            matched = matched.len(),
            unmatched = unmatched.len(),
            "classified unresolved paths"
        );

        if matched.is_empty() {
            return Ok(AutoResolution::Unresolved { paths: unresolved });
        }

        let matched: Vec<String> = matched.into_iter().cloned().collect();
        git.take_ours(&matched).await?;

        let remaining = git.unresolved_paths().await?;
        if !remaining.is_empty() {
            warn!(paths = ?remaining, "conflicts remain outside auto-resolvable paths");
            return Ok(AutoResolution::Unresolved { paths: remaining });
        }

        let commit = git.commit_prepared().await?;
        info!(sha = %commit, paths = ?matched, "auto-resolved merge conflicts");
        Ok(AutoResolution::Resolved {
            commit,
            paths: matched,
        })
    }
}

impl Default for ConflictAutoResolver {
    fn default() -> Self {
        Self::new(AllowList::new(super::DEFAULT_AUTO_RESOLVE_PATHS))
    }
}
