//! Applying one topic to the current head.
//!
//! Each application starts `Pending` and ends in exactly one of
//! `Skipped`, `Applied`, or `Conflict` (see [`TopicOutcome`]):
//!
//! | Strategy | Skipped when | Applied as |
//! |----------|--------------|------------|
//! | `merge`  | topic already contained in head | one `--no-ff` merge commit |
//! | `pick`   | topic already contained in head | one commit per topic commit since its base merge-base not already picked |
//! | `squash` | contained, empty diff since the head merge-base, or nothing staged | one commit with a synthesized message |
//!
//! A conflict leaves git's own in-progress state untouched for a human.

use std::fmt;
use std::str::FromStr;

use git2::Oid;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::ancestry;
use crate::errors::IntegrationError;
use crate::git::{CommandOutput, GitClient};
use crate::message::MessageSynthesizer;
use crate::models::{ResolvedRef, SkipReason, TopicOutcome};

// ---------------------------------------------------------------------------
// Strategy selector
// ---------------------------------------------------------------------------

/// How a topic is folded into the integration branch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Non-fast-forward merge commit.
    #[default]
    Merge,
    /// Cherry-pick each commit of the topic.
    Pick,
    /// One squashed commit per topic.
    Squash,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Merge, Strategy::Pick, Strategy::Squash];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Pick => "pick",
            Self::Squash => "squash",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| format!("unknown strategy '{s}' (expected merge, pick, or squash)"))
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Applies topics to whatever branch is checked out.
#[derive(Debug, Clone)]
pub struct StrategyExecutor {
    strategy: Strategy,
    base: ResolvedRef,
    synthesizer: MessageSynthesizer,
}

impl StrategyExecutor {
    /// `base` anchors the pick and squash commit ranges.
    pub fn new(strategy: Strategy, base: ResolvedRef, synthesizer: MessageSynthesizer) -> Self {
        Self {
            strategy,
            base,
            synthesizer,
        }
    }

    /// Apply `topic` to the current head.
    #[instrument(skip(self, git, topic), fields(topic = %topic.topic, strategy = %self.strategy))]
    pub async fn apply(
        &self,
        git: &GitClient,
        topic: &ResolvedRef,
    ) -> Result<TopicOutcome, IntegrationError> {
        let tip = topic.git_oid()?;
        let head = git.head_oid()?;

        if ancestry::is_contained(git, tip, head)? {
            debug!(%tip, %head, "topic already contained in head");
            return Ok(TopicOutcome::Skipped {
                reason: SkipReason::AlreadyContained,
            });
        }

        let outcome = match self.strategy {
            Strategy::Merge => self.merge(git, topic, tip).await?,
            Strategy::Pick => self.pick(git, topic, tip, head).await?,
            Strategy::Squash => self.squash(git, topic, tip, head).await?,
        };

        match &outcome {
            TopicOutcome::Applied { commits } => {
                info!(commits = commits.len(), "topic applied")
            }
            TopicOutcome::Skipped { reason } => info!(%reason, "topic skipped"),
            TopicOutcome::Conflict { paths } => warn!(?paths, "topic stopped on conflicts"),
        }
        Ok(outcome)
    }

    async fn merge(
        &self,
        git: &GitClient,
        topic: &ResolvedRef,
        tip: Oid,
    ) -> Result<TopicOutcome, IntegrationError> {
        let message = format!("Merge topic '{}'", topic.name);
        let out = git.merge_no_ff(tip, &message).await?;
        if !out.success() {
            return self.conflict_or_error(git, topic, out).await;
        }
        Ok(TopicOutcome::Applied {
            commits: vec![git.head_oid()?.to_string()],
        })
    }

    async fn pick(
        &self,
        git: &GitClient,
        topic: &ResolvedRef,
        tip: Oid,
        head: Oid,
    ) -> Result<TopicOutcome, IntegrationError> {
        let ancestor = self.base_merge_base(git, topic, tip)?;
        let records = git.commit_records(ancestor, tip)?;

        // Commits an earlier, interrupted run already picked onto head.
        let already_picked = match git.merge_base(head, tip)? {
            Some(since) => git.cherry_pick_markers(since, head)?,
            None => Default::default(),
        };

        let mut commits = Vec::new();
        for record in records.iter().filter(|r| !r.is_merge()) {
            let oid = Oid::from_str(&record.sha)?;
            if already_picked.contains(&oid) {
                debug!(sha = %record.sha, "commit already picked, skipping");
                continue;
            }

            let out = git.cherry_pick(oid).await?;
            if out.success() {
                commits.push(git.head_oid()?.to_string());
                continue;
            }

            let paths = git.unresolved_paths().await?;
            if !paths.is_empty() {
                return Ok(TopicOutcome::Conflict { paths });
            }
            // Only a pick git actually stopped on can be empty; anything else
            // failed before touching the index.
            if git.has_staged_changes().await?
                || git.operation_in_progress() != Some("cherry-pick")
            {
                return Err(self.apply_failed(topic, out));
            }
            debug!(sha = %record.sha, "pick is empty, skipping");
            git.cherry_pick_skip().await?;
        }

        // An empty range is still an application, just one with no commits.
        Ok(TopicOutcome::Applied { commits })
    }

    async fn squash(
        &self,
        git: &GitClient,
        topic: &ResolvedRef,
        tip: Oid,
        head: Oid,
    ) -> Result<TopicOutcome, IntegrationError> {
        let head_base =
            git.merge_base(head, tip)?
                .ok_or_else(|| IntegrationError::CommonAncestorUnavailable {
                    topic: topic.topic.clone(),
                    other: "HEAD".into(),
                })?;
        if git.same_tree(head_base, tip)? {
            return Ok(TopicOutcome::Skipped {
                reason: SkipReason::EmptyDiff,
            });
        }

        let ancestor = self.base_merge_base(git, topic, tip)?;
        let records = git.commit_records(ancestor, tip)?;
        let message = self.synthesizer.synthesize(&topic.topic, &records).render();

        let out = git.squash_merge(tip).await?;
        if !out.success() {
            let outcome = self.conflict_or_error(git, topic, out).await?;
            // The operator's `git commit` picks this up after resolving.
            git.prepare_squash_message(&message)?;
            return Ok(outcome);
        }

        if !git.has_staged_changes().await? {
            git.clear_squash_state()?;
            return Ok(TopicOutcome::Skipped {
                reason: SkipReason::NothingToApply,
            });
        }

        let commit = git.commit_with_message(&message).await?;
        Ok(TopicOutcome::Applied {
            commits: vec![commit.to_string()],
        })
    }

    fn base_merge_base(
        &self,
        git: &GitClient,
        topic: &ResolvedRef,
        tip: Oid,
    ) -> Result<Oid, IntegrationError> {
        let base = self.base.git_oid()?;
        git.merge_base(tip, base)?
            .ok_or_else(|| IntegrationError::CommonAncestorUnavailable {
                topic: topic.topic.clone(),
                other: self.base.name.clone(),
            })
    }

    /// A failed apply is a conflict if it left unmerged paths, otherwise an error.
    async fn conflict_or_error(
        &self,
        git: &GitClient,
        topic: &ResolvedRef,
        out: CommandOutput,
    ) -> Result<TopicOutcome, IntegrationError> {
        let paths = git.unresolved_paths().await?;
        if paths.is_empty() {
            return Err(self.apply_failed(topic, out));
        }
        Ok(TopicOutcome::Conflict { paths })
    }

    fn apply_failed(&self, topic: &ResolvedRef, out: CommandOutput) -> IntegrationError {
        IntegrationError::ApplyFailed {
            topic: topic.topic.clone(),
            strategy: self.strategy,
            source: out.into_error(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parse() {
        assert_eq!("merge".parse::<Strategy>().unwrap(), Strategy::Merge);
        assert_eq!("pick".parse::<Strategy>().unwrap(), Strategy::Pick);
        assert_eq!("squash".parse::<Strategy>().unwrap(), Strategy::Squash);
        assert!("cherry-pick".parse::<Strategy>().is_err());
        assert!("Merge".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_strategy_display_roundtrip() {
        for strategy in Strategy::ALL {
            assert_eq!(strategy.to_string().parse::<Strategy>().unwrap(), strategy);
        }
    }

    #[test]
    fn test_strategy_serde_lowercase() {
        let json = serde_json::to_string(&Strategy::Squash).unwrap();
        assert_eq!(json, "\"squash\"");
        let parsed: Strategy = serde_json::from_str("\"pick\"").unwrap();
        assert_eq!(parsed, Strategy::Pick);
    }
}
