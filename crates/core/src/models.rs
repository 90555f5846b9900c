//! Domain model types shared by the resolver, executor, composer, and CLI.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::strategy::Strategy;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A `Name <email>` identity as git records it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Same person as `other`, compared by email (case-insensitive).
    pub fn same_email(&self, other: &Identity) -> bool {
        self.email.eq_ignore_ascii_case(&other.email)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

impl FromStr for Identity {
    type Err = String;

    /// Parse `Name <email>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, rest) = s
            .split_once('<')
            .ok_or_else(|| format!("expected 'Name <email>', got '{s}'"))?;
        let email = rest
            .strip_suffix('>')
            .ok_or_else(|| format!("expected 'Name <email>', got '{s}'"))?;
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() || email.is_empty() {
            return Err(format!("expected 'Name <email>', got '{s}'"));
        }
        Ok(Self::new(name, email))
    }
}

// ---------------------------------------------------------------------------
// Refs and commits
// ---------------------------------------------------------------------------

/// A topic resolved to a concrete commit.
///
/// Immutable for the duration of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRef {
    /// The logical topic name as listed.
    pub topic: String,
    /// The symbolic name that resolved (`feature`, `origin/feature`, ...).
    pub name: String,
    /// Commit id, hex.
    pub oid: String,
}

impl ResolvedRef {
    pub fn git_oid(&self) -> Result<git2::Oid, git2::Error> {
        git2::Oid::from_str(&self.oid)
    }
}

/// Final path segment of a topic name: `users/alice/fix-login` → `fix-login`.
pub fn topic_label(topic: &str) -> &str {
    let trimmed = topic.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// A single commit from a topic's history range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sha: String,
    pub author_name: String,
    pub author_email: String,
    pub message: String,
    /// Number of parents; > 1 for merge commits.
    pub parent_count: usize,
}

impl CommitRecord {
    pub fn author(&self) -> Identity {
        Identity::new(&self.author_name, &self.author_email)
    }

    pub fn is_merge(&self) -> bool {
        self.parent_count > 1
    }
}

// ---------------------------------------------------------------------------
// Outcomes and reports
// ---------------------------------------------------------------------------

/// Why a topic was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Every commit of the topic is already reachable from head.
    AlreadyContained,
    /// The topic's diff against its common ancestor with head is empty.
    EmptyDiff,
    /// Staging the topic produced no change against head.
    NothingToApply,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyContained => write!(f, "already contained in head"),
            Self::EmptyDiff => write!(f, "empty diff"),
            Self::NothingToApply => write!(f, "nothing to apply"),
        }
    }
}

/// Terminal state of one topic application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TopicOutcome {
    Skipped { reason: SkipReason },
    /// New commits created on head, oldest first; empty for a pick whose
    /// range had nothing left to apply.
    Applied { commits: Vec<String> },
    /// The operation stopped on these unresolved paths and is still in progress.
    Conflict { paths: Vec<String> },
}

impl TopicOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    /// Number of commits this outcome added to head.
    pub fn commit_count(&self) -> usize {
        match self {
            Self::Applied { commits } => commits.len(),
            _ => 0,
        }
    }
}

/// One row of an [`IntegrationReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicReport {
    pub resolved: ResolvedRef,
    #[serde(flatten)]
    pub outcome: TopicOutcome,
}

/// Summary of a `braid integrate` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationReport {
    pub target_branch: String,
    pub strategy: Strategy,
    pub initial_head: String,
    pub final_head: String,
    pub topics: Vec<TopicReport>,
    pub published: bool,
    pub started_at: String,
    pub completed_at: Option<String>,
}

impl IntegrationReport {
    pub fn applied_count(&self) -> usize {
        self.topics
            .iter()
            .filter(|t| matches!(t.outcome, TopicOutcome::Applied { .. }))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.topics.iter().filter(|t| t.outcome.is_skipped()).count()
    }

    /// `true` when the run created no commits at all.
    pub fn is_noop(&self) -> bool {
        self.initial_head == self.final_head
    }
}

/// How a single topic landed in a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleTopicOutcome {
    Merged,
    /// Merged after conflicts on auto-resolvable paths were settled.
    AutoResolved,
    Skipped,
}

/// One bundle's composition result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleReport {
    pub name: String,
    pub base: String,
    pub head: String,
    pub topics: Vec<BundleTopicReport>,
    pub published: bool,
}

/// One row of a [`BundleReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleTopicReport {
    pub resolved: ResolvedRef,
    pub outcome: BundleTopicOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_roundtrip_display() {
        let id: Identity = "Jane Doe <jane@example.com>".parse().unwrap();
        assert_eq!(id.name, "Jane Doe");
        assert_eq!(id.email, "jane@example.com");
        assert_eq!(id.to_string(), "Jane Doe <jane@example.com>");
    }

    #[test]
    fn test_identity_rejects_malformed() {
        assert!("no email here".parse::<Identity>().is_err());
        assert!("<only@email>".parse::<Identity>().is_err());
        assert!("Name <unterminated".parse::<Identity>().is_err());
    }

    #[test]
    fn test_same_email_ignores_case() {
        let a = Identity::new("A", "Bot@Example.com");
        let b = Identity::new("B", "bot@example.com");
        assert!(a.same_email(&b));
    }

    #[test]
    fn test_topic_label() {
        assert_eq!(topic_label("feature-a"), "feature-a");
        assert_eq!(topic_label("users/alice/fix-login"), "fix-login");
        assert_eq!(topic_label("team/"), "team");
    }

    #[test]
    fn test_topic_outcome_serializes_tagged() {
        let outcome = TopicOutcome::Skipped {
            reason: SkipReason::EmptyDiff,
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert_eq!(json, r#"{"outcome":"skipped","reason":"empty_diff"}"#);
    }
}
