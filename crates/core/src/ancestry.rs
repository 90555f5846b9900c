//! Idempotent-skip decisions.

use git2::Oid;

use crate::errors::GitError;
use crate::git::GitClient;

/// `true` if every commit reachable from `candidate` is already reachable
/// from `head`, so folding it in again would change nothing.
pub fn is_contained(git: &GitClient, candidate: Oid, head: Oid) -> Result<bool, GitError> {
    git.is_ancestor(candidate, head)
}
