//! The repository handle passed to every braid component.
//!
//! Read-side questions (what does this name resolve to, is this commit an
//! ancestor of that one, which commits lie in a range) are answered through
//! `git2`. Anything that moves `HEAD`, the index, or the working tree runs the
//! `git` binary through [`run_git`] and returns a typed [`CommandOutput`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use git2::{BranchType, ErrorCode, Oid, Repository, RepositoryState, Sort, StatusOptions};
use tracing::{debug, info, instrument, warn};

use super::command::{run_git, CommandOutput, IdentityPin};
use crate::errors::GitError;
use crate::models::{CommitRecord, Identity};

/// Trailer `git cherry-pick -x` appends to each picked commit.
const CHERRY_PICK_MARKER: &str = "(cherry picked from commit ";

/// How a branch was published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushMode {
    /// The remote had no such branch; it was created with upstream tracking.
    Created,
    /// The remote branch existed and was force-updated.
    ForceUpdated,
}

/// High-level Git client wrapping a `git2::Repository` and its working tree.
pub struct GitClient {
    repo: Repository,
    repo_path: PathBuf,
    identity: Option<Identity>,
}

impl GitClient {
    /// Open the non-bare Git repository containing `repo_path`.
    pub fn new<P: AsRef<Path>>(repo_path: P) -> Result<Self, GitError> {
        let path = repo_path.as_ref();
        info!(path = %path.display(), "opening git repository");
        let repo = Repository::discover(path)
            .map_err(|_| GitError::RepositoryNotFound(path.display().to_string()))?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| GitError::RepositoryNotFound(format!("{} (bare)", path.display())))?
            .to_path_buf();
        Ok(Self {
            repo,
            repo_path: workdir,
            identity: None,
        })
    }

    /// Pin the identity used for commits created by this client.
    pub fn with_identity(mut self, identity: Option<Identity>) -> Self {
        self.identity = identity;
        self
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// The identity commits are made as: the pinned one, else `user.name`/`user.email`.
    pub fn committer_identity(&self) -> Result<Identity, GitError> {
        if let Some(identity) = &self.identity {
            return Ok(identity.clone());
        }
        let sig = self.repo.signature()?;
        Ok(Identity::new(
            sig.name().unwrap_or_default(),
            sig.email().unwrap_or_default(),
        ))
    }

    // -----------------------------------------------------------------------
    // Read-side queries (git2)
    // -----------------------------------------------------------------------

    /// Resolve `name` to a commit id, or `None` if it names no commit.
    pub fn resolve_commit(&self, name: &str) -> Result<Option<Oid>, GitError> {
        let object = match self.repo.revparse_single(name) {
            Ok(object) => object,
            Err(e) if is_missing(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        // Names of trees or blobs do not count as commit references.
        Ok(object.peel_to_commit().ok().map(|commit| commit.id()))
    }

    /// Commit id `HEAD` points at.
    pub fn head_oid(&self) -> Result<Oid, GitError> {
        Ok(self.repo.head()?.peel_to_commit()?.id())
    }

    /// Short name of the checked-out branch, `None` when `HEAD` is detached.
    pub fn current_branch(&self) -> Result<Option<String>, GitError> {
        let head = self.repo.head()?;
        if !head.is_branch() {
            return Ok(None);
        }
        Ok(head.shorthand().map(str::to_string))
    }

    pub fn branch_exists(&self, name: &str) -> Result<bool, GitError> {
        match self.repo.find_branch(name, BranchType::Local) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Best common ancestor of `a` and `b`, `None` for unrelated histories.
    pub fn merge_base(&self, a: Oid, b: Oid) -> Result<Option<Oid>, GitError> {
        match self.repo.merge_base(a, b) {
            Ok(oid) => Ok(Some(oid)),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// `true` if `ancestor` is `descendant` or reachable from it.
    pub fn is_ancestor(&self, ancestor: Oid, descendant: Oid) -> Result<bool, GitError> {
        if ancestor == descendant {
            return Ok(true);
        }
        Ok(self.repo.graph_descendant_of(descendant, ancestor)?)
    }

    /// `true` if both commits carry the same tree.
    pub fn same_tree(&self, a: Oid, b: Oid) -> Result<bool, GitError> {
        let a = self.repo.find_commit(a)?;
        let b = self.repo.find_commit(b)?;
        Ok(a.tree_id() == b.tree_id())
    }

    /// Commits reachable from `tip` but not from `ancestor`, oldest first.
    pub fn commit_records(&self, ancestor: Oid, tip: Oid) -> Result<Vec<CommitRecord>, GitError> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.push(tip)?;
        revwalk.hide(ancestor)?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;

        let mut records = Vec::new();
        for oid_result in revwalk {
            let oid = oid_result?;
            let commit = self.repo.find_commit(oid)?;
            let author = commit.author();
            records.push(CommitRecord {
                sha: oid.to_string(),
                author_name: author.name().unwrap_or_default().to_string(),
                author_email: author.email().unwrap_or_default().to_string(),
                message: String::from_utf8_lossy(commit.message_bytes()).to_string(),
                parent_count: commit.parent_count(),
            });
        }
        debug!(%ancestor, %tip, count = records.len(), "collected commit range");
        Ok(records)
    }

    /// Source commits recorded by `cherry-pick -x` in `since..head`.
    pub fn cherry_pick_markers(&self, since: Oid, head: Oid) -> Result<HashSet<Oid>, GitError> {
        let mut markers = HashSet::new();
        for record in self.commit_records(since, head)? {
            for line in record.message.lines() {
                let Some(rest) = line.trim().strip_prefix(CHERRY_PICK_MARKER) else {
                    continue;
                };
                if let Ok(oid) = Oid::from_str(rest.trim_end_matches(')')) {
                    markers.insert(oid);
                }
            }
        }
        Ok(markers)
    }

    /// Paths with staged or unstaged changes to tracked files.
    pub fn dirty_paths(&self) -> Result<Vec<String>, GitError> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(false)
            .include_ignored(false)
            .exclude_submodules(true);
        let statuses = self.repo.statuses(Some(&mut opts))?;
        Ok(statuses
            .iter()
            .filter(|entry| !entry.status().is_empty())
            .filter_map(|entry| entry.path().map(str::to_string))
            .collect())
    }

    /// Name of the in-progress operation, `None` when the repository is idle.
    pub fn operation_in_progress(&self) -> Option<&'static str> {
        match self.repo.state() {
            RepositoryState::Clean => None,
            RepositoryState::Merge => Some("merge"),
            RepositoryState::Revert | RepositoryState::RevertSequence => Some("revert"),
            RepositoryState::CherryPick | RepositoryState::CherryPickSequence => {
                Some("cherry-pick")
            }
            RepositoryState::Bisect => Some("bisect"),
            RepositoryState::Rebase
            | RepositoryState::RebaseInteractive
            | RepositoryState::RebaseMerge => Some("rebase"),
            RepositoryState::ApplyMailbox | RepositoryState::ApplyMailboxOrRebase => Some("am"),
        }
    }

    // -----------------------------------------------------------------------
    // Mutations (git CLI)
    // -----------------------------------------------------------------------

    /// Run `git` in the working tree, returning its output whatever the exit code.
    pub async fn run(&self, args: &[&str]) -> Result<CommandOutput, GitError> {
        run_git(&self.repo_path, args, self.pin(IdentityPin::Both), None).await
    }

    /// Run `git` and fail on a non-zero exit.
    pub async fn run_checked(&self, args: &[&str]) -> Result<CommandOutput, GitError> {
        self.run(args).await?.into_result()
    }

    /// Check out an existing local branch.
    #[instrument(skip(self))]
    pub async fn checkout(&self, branch: &str) -> Result<(), GitError> {
        self.run_checked(&["checkout", "--quiet", branch]).await?;
        Ok(())
    }

    /// Create `branch` at `start` (or reset it there if it exists) and check it out.
    ///
    /// Destructive: whatever the branch pointed at before is discarded.
    #[instrument(skip(self), fields(start = %start))]
    pub async fn recreate_branch(&self, branch: &str, start: Oid) -> Result<(), GitError> {
        let start = start.to_string();
        self.run_checked(&["checkout", "--quiet", "-B", branch, &start])
            .await?;
        info!(branch, %start, "branch recreated");
        Ok(())
    }

    /// `git merge --no-ff` of `oid` with `message`.
    #[instrument(skip(self, message), fields(oid = %oid))]
    pub async fn merge_no_ff(&self, oid: Oid, message: &str) -> Result<CommandOutput, GitError> {
        let oid = oid.to_string();
        self.run(&["merge", "--no-ff", "--no-edit", "-m", message, &oid])
            .await
    }

    /// `git cherry-pick -x <oid>`, keeping the original author.
    #[instrument(skip(self), fields(oid = %oid))]
    pub async fn cherry_pick(&self, oid: Oid) -> Result<CommandOutput, GitError> {
        let oid = oid.to_string();
        run_git(
            &self.repo_path,
            &["cherry-pick", "-x", &oid],
            self.pin(IdentityPin::CommitterOnly),
            None,
        )
        .await
    }

    /// Drop the current (empty) pick and continue.
    pub async fn cherry_pick_skip(&self) -> Result<(), GitError> {
        run_git(
            &self.repo_path,
            &["cherry-pick", "--skip"],
            self.pin(IdentityPin::CommitterOnly),
            None,
        )
        .await?
        .into_result()?;
        Ok(())
    }

    /// Stage the changes of `oid` on top of head without committing.
    #[instrument(skip(self), fields(oid = %oid))]
    pub async fn squash_merge(&self, oid: Oid) -> Result<CommandOutput, GitError> {
        let oid = oid.to_string();
        self.run(&["merge", "--squash", &oid]).await
    }

    /// `true` if the index differs from `HEAD`.
    pub async fn has_staged_changes(&self) -> Result<bool, GitError> {
        let out = self.run(&["diff", "--cached", "--quiet"]).await?;
        match out.code {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(out.into_error()),
        }
    }

    /// Commit the index with `message` read from stdin.
    #[instrument(skip(self, message), fields(bytes = message.len()))]
    pub async fn commit_with_message(&self, message: &str) -> Result<Oid, GitError> {
        run_git(
            &self.repo_path,
            &["commit", "--quiet", "--cleanup=verbatim", "-F", "-"],
            self.pin(IdentityPin::Both),
            Some(message),
        )
        .await?
        .into_result()?;
        let oid = self.head_oid()?;
        info!(sha = %oid, "created commit");
        Ok(oid)
    }

    /// Conclude an in-progress merge with its prepared message.
    pub async fn commit_prepared(&self) -> Result<Oid, GitError> {
        self.run_checked(&["commit", "--quiet", "--no-edit", "--cleanup=strip"])
            .await?;
        self.head_oid()
    }

    /// Discard leftovers of a squash that staged nothing.
    pub fn clear_squash_state(&self) -> Result<(), GitError> {
        let squash_msg = self.repo.path().join("SQUASH_MSG");
        if squash_msg.exists() {
            std::fs::remove_file(squash_msg)?;
        }
        Ok(())
    }

    /// Replace the message `git commit` will offer after a conflicted squash.
    pub fn prepare_squash_message(&self, message: &str) -> Result<(), GitError> {
        std::fs::write(self.repo.path().join("SQUASH_MSG"), message)?;
        Ok(())
    }

    /// Paths with unmerged index entries.
    pub async fn unresolved_paths(&self) -> Result<Vec<String>, GitError> {
        let out = self
            .run_checked(&["diff", "--name-only", "--diff-filter=U", "-z"])
            .await?;
        let mut paths = out.nul_separated();
        paths.dedup();
        Ok(paths)
    }

    /// Take the checked-out side of each conflicted path and stage it.
    #[instrument(skip(self, paths), fields(count = paths.len()))]
    pub async fn take_ours(&self, paths: &[String]) -> Result<(), GitError> {
        if paths.is_empty() {
            return Ok(());
        }
        for path in paths {
            let out = self.run(&["checkout", "--ours", "--", path]).await?;
            if out.success() {
                self.run_checked(&["add", "--", path]).await?;
            } else {
                // No "ours" stage: the current branch deleted the path.
                debug!(path = %path, "no ours version, removing");
                self.run_checked(&["rm", "--quiet", "--ignore-unmatch", "--", path])
                    .await?;
            }
        }
        Ok(())
    }

    /// `true` if `remote` has a branch named `branch`.
    pub async fn remote_branch_exists(&self, remote: &str, branch: &str) -> Result<bool, GitError> {
        let refname = format!("refs/heads/{branch}");
        let out = self
            .run(&["ls-remote", "--exit-code", "--heads", remote, &refname])
            .await?;
        match out.code {
            0 => Ok(true),
            2 => Ok(false),
            _ => Err(out.into_error()),
        }
    }

    /// Publish `branch`: force-update if the remote has it, otherwise create with tracking.
    #[instrument(skip(self))]
    pub async fn publish_branch(&self, remote: &str, branch: &str) -> Result<PushMode, GitError> {
        let mode = if self.remote_branch_exists(remote, branch).await? {
            PushMode::ForceUpdated
        } else {
            PushMode::Created
        };
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        let args: Vec<&str> = match mode {
            PushMode::ForceUpdated => vec!["push", "--force", remote, &refspec],
            PushMode::Created => vec!["push", "--set-upstream", remote, &refspec],
        };
        let out = self.run(&args).await?;
        if !out.success() {
            warn!(remote, branch, "push rejected");
            return Err(GitError::PushRejected {
                branch: branch.to_string(),
                detail: out.stderr.trim().to_string(),
            });
        }
        info!(remote, branch, ?mode, "push completed");
        Ok(mode)
    }

    fn pin(&self, pin: IdentityPin) -> Option<(&Identity, IdentityPin)> {
        self.identity.as_ref().map(|identity| (identity, pin))
    }
}

fn is_missing(err: &git2::Error) -> bool {
    matches!(
        err.code(),
        ErrorCode::NotFound | ErrorCode::InvalidSpec | ErrorCode::Ambiguous
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        {
            let mut cfg = repo.config().unwrap();
            cfg.set_str("user.name", "Test").unwrap();
            cfg.set_str("user.email", "test@test.com").unwrap();
        }
        (dir, repo)
    }

    fn commit_file(repo: &Repository, path: &str, content: &str, message: &str) -> Oid {
        let workdir = repo.workdir().unwrap();
        std::fs::write(workdir.join(path), content).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(path)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = repo.signature().unwrap();
        let parent = repo.head().ok().map(|h| h.peel_to_commit().unwrap());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
    }

    #[test]
    fn test_repo_not_found() {
        assert!(matches!(
            GitClient::new("/nonexistent"),
            Err(GitError::RepositoryNotFound(_))
        ));
    }

    #[test]
    fn test_resolve_and_ancestry() {
        let (dir, repo) = init_repo();
        let first = commit_file(&repo, "a.txt", "a", "first");
        let second = commit_file(&repo, "b.txt", "b", "second");
        let client = GitClient::new(dir.path()).unwrap();

        assert_eq!(client.head_oid().unwrap(), second);
        assert_eq!(client.resolve_commit("HEAD~1").unwrap(), Some(first));
        assert_eq!(client.resolve_commit("no-such-branch").unwrap(), None);
        assert!(client.is_ancestor(first, second).unwrap());
        assert!(!client.is_ancestor(second, first).unwrap());
        assert!(client.is_ancestor(second, second).unwrap());
        assert_eq!(client.merge_base(first, second).unwrap(), Some(first));
    }

    #[test]
    fn test_commit_records_oldest_first() {
        let (dir, repo) = init_repo();
        let base = commit_file(&repo, "a.txt", "a", "base");
        commit_file(&repo, "b.txt", "b", "add b");
        let tip = commit_file(&repo, "c.txt", "c", "add c");
        let client = GitClient::new(dir.path()).unwrap();

        let records = client.commit_records(base, tip).unwrap();
        let messages: Vec<&str> = records.iter().map(|r| r.message.trim()).collect();
        assert_eq!(messages, vec!["add b", "add c"]);
        assert!(records.iter().all(|r| r.author_email == "test@test.com"));
        assert!(!records[0].is_merge());
    }

    #[test]
    fn test_cherry_pick_markers() {
        let (dir, repo) = init_repo();
        let base = commit_file(&repo, "a.txt", "a", "base");
        let source = "0123456789abcdef0123456789abcdef01234567";
        let head = commit_file(
            &repo,
            "b.txt",
            "b",
            &format!("add b\n\n(cherry picked from commit {source})\n"),
        );
        let client = GitClient::new(dir.path()).unwrap();

        let markers = client.cherry_pick_markers(base, head).unwrap();
        assert!(markers.contains(&Oid::from_str(source).unwrap()));
        assert_eq!(markers.len(), 1);
    }

    #[test]
    fn test_dirty_paths_ignores_untracked() {
        let (dir, repo) = init_repo();
        commit_file(&repo, "a.txt", "a", "base");
        let client = GitClient::new(dir.path()).unwrap();
        assert!(client.dirty_paths().unwrap().is_empty());

        std::fs::write(dir.path().join("untracked.txt"), "x").unwrap();
        assert!(client.dirty_paths().unwrap().is_empty());

        std::fs::write(dir.path().join("a.txt"), "changed").unwrap();
        assert_eq!(client.dirty_paths().unwrap(), vec!["a.txt".to_string()]);
        assert_eq!(client.operation_in_progress(), None);
    }

    #[test]
    fn test_committer_identity_prefers_pinned() {
        let (dir, repo) = init_repo();
        commit_file(&repo, "a.txt", "a", "base");
        let client = GitClient::new(dir.path()).unwrap();
        assert_eq!(
            client.committer_identity().unwrap(),
            Identity::new("Test", "test@test.com")
        );

        let pinned = Identity::new("Bot", "bot@example.com");
        let client = client.with_identity(Some(pinned.clone()));
        assert_eq!(client.committer_identity().unwrap(), pinned);
    }
}
