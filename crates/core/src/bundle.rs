//! Bundle branches: disposable composites of a fixed set of topics.
//!
//! Every run rebuilds each bundle from the base commit and merges its topics
//! in order, so a bundle branch is a pure build artifact. Merge conflicts on
//! allow-listed paths are settled automatically; any other conflict aborts
//! the run with the merge left in progress.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::ancestry;
use crate::config::BraidConfig;
use crate::conflict::{AllowList, AutoResolution, ConflictAutoResolver};
use crate::engine::ensure_clean;
use crate::errors::IntegrationError;
use crate::git::GitClient;
use crate::models::{BundleReport, BundleTopicOutcome, BundleTopicReport, ResolvedRef};
use crate::resolver::RefResolver;

/// A named, ordered list of topics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub name: String,
    pub topics: Vec<String>,
}

impl Bundle {
    pub fn new(name: impl Into<String>, topics: Vec<String>) -> Self {
        Self {
            name: name.into(),
            topics,
        }
    }

    /// Reject self-references and duplicate topics.
    pub fn validate(&self) -> Result<(), IntegrationError> {
        let mut seen = HashSet::new();
        for topic in &self.topics {
            if *topic == self.name {
                return Err(IntegrationError::BundleSelfReference {
                    bundle: self.name.clone(),
                });
            }
            if !seen.insert(topic.as_str()) {
                return Err(IntegrationError::BundleDuplicateTopic {
                    bundle: self.name.clone(),
                    topic: topic.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Settings for one composer run.
#[derive(Debug, Clone)]
pub struct ComposeOptions {
    /// Ref every bundle is rebuilt from.
    pub base_ref: String,
    /// Remote to publish bundles to after all of them succeed.
    pub publish_to: Option<String>,
}

/// Rebuilds bundle branches from a base commit.
#[derive(Debug, Clone)]
pub struct BundleComposer {
    resolver: RefResolver,
    auto_resolver: ConflictAutoResolver,
}

impl BundleComposer {
    pub fn new(resolver: RefResolver, auto_resolver: ConflictAutoResolver) -> Self {
        Self {
            resolver,
            auto_resolver,
        }
    }

    /// A composer using the `[refs]` and `[conflicts]` sections of `config`.
    pub fn from_config(config: &BraidConfig) -> Self {
        Self::new(
            RefResolver::new(config.refs.remote_prefixes.clone()),
            ConflictAutoResolver::new(AllowList::new(&config.conflicts.auto_resolve_paths)),
        )
    }

    /// Compose every bundle in order, then publish them if requested.
    ///
    /// All bundles are validated before anything is touched. On success the
    /// originally checked-out branch is checked out again.
    pub async fn compose_all(
        &self,
        git: &GitClient,
        bundles: &[Bundle],
        options: &ComposeOptions,
    ) -> Result<Vec<BundleReport>, IntegrationError> {
        for bundle in bundles {
            bundle.validate()?;
        }
        ensure_clean(git)?;

        let original_branch = git.current_branch()?;
        let base = self.resolver.resolve(git, &options.base_ref)?;
        info!(base = %base.name, oid = %base.oid, bundles = bundles.len(), "composing bundles");

        let mut reports = Vec::with_capacity(bundles.len());
        for bundle in bundles {
            reports.push(self.compose(git, bundle, &base).await?);
        }

        if let Some(remote) = &options.publish_to {
            for report in &mut reports {
                git.publish_branch(remote, &report.name).await?;
                report.published = true;
            }
        }

        if let Some(branch) = original_branch {
            if git.current_branch()?.as_deref() != Some(branch.as_str()) {
                git.checkout(&branch).await?;
            }
        }
        Ok(reports)
    }

    /// Recreate `bundle` at `base` and merge its topics in order.
    #[instrument(skip(self, git, bundle, base), fields(bundle = %bundle.name))]
    pub async fn compose(
        &self,
        git: &GitClient,
        bundle: &Bundle,
        base: &ResolvedRef,
    ) -> Result<BundleReport, IntegrationError> {
        bundle.validate()?;
        let resolved = bundle
            .topics
            .iter()
            .map(|topic| self.resolver.resolve(git, topic))
            .collect::<Result<Vec<_>, _>>()?;

        git.recreate_branch(&bundle.name, base.git_oid()?).await?;

        let mut topics = Vec::with_capacity(resolved.len());
        for topic in resolved {
            let outcome = self.merge_topic(git, bundle, &topic).await?;
            debug!(topic = %topic.topic, ?outcome, "bundle topic done");
            topics.push(BundleTopicReport {
                resolved: topic,
                outcome,
            });
        }

        let head = git.head_oid()?.to_string();
        info!(head = %head, topics = topics.len(), "bundle composed");
        Ok(BundleReport {
            name: bundle.name.clone(),
            base: base.oid.clone(),
            head,
            topics,
            published: false,
        })
    }

    async fn merge_topic(
        &self,
        git: &GitClient,
        bundle: &Bundle,
        topic: &ResolvedRef,
    ) -> Result<BundleTopicOutcome, IntegrationError> {
        let tip = topic.git_oid()?;
        if ancestry::is_contained(git, tip, git.head_oid()?)? {
            return Ok(BundleTopicOutcome::Skipped);
        }

        let message = format!("Merge topic '{}' into {}", topic.name, bundle.name);
        let out = git.merge_no_ff(tip, &message).await?;
        if out.success() {
            return Ok(BundleTopicOutcome::Merged);
        }
        if git.unresolved_paths().await?.is_empty() {
            return Err(IntegrationError::BundleMergeFailed {
                bundle: bundle.name.clone(),
                topic: topic.topic.clone(),
                source: out.into_error(),
            });
        }

        match self.auto_resolver.resolve(git).await? {
            AutoResolution::Resolved { .. } => Ok(BundleTopicOutcome::AutoResolved),
            AutoResolution::Unresolved { paths } => Err(IntegrationError::BundleConflict {
                bundle: bundle.name.clone(),
                topic: topic.topic.clone(),
                paths,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_valid_bundle() {
        let bundle = Bundle::new("release", topics(&["a", "b", "c"]));
        assert!(bundle.validate().is_ok());
    }

    #[test]
    fn test_self_reference_rejected() {
        let bundle = Bundle::new("release", topics(&["a", "release"]));
        assert!(matches!(
            bundle.validate(),
            Err(IntegrationError::BundleSelfReference { ref bundle }) if bundle == "release"
        ));
    }

    #[test]
    fn test_duplicate_topic_rejected() {
        let bundle = Bundle::new("release", topics(&["a", "b", "a"]));
        assert!(matches!(
            bundle.validate(),
            Err(IntegrationError::BundleDuplicateTopic { ref topic, .. }) if topic == "a"
        ));
    }

    #[test]
    fn test_empty_bundle_is_valid() {
        assert!(Bundle::new("empty", Vec::new()).validate().is_ok());
    }
}
