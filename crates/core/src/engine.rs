//! The integration run: advance one branch by applying an ordered topic list.
//!
//! A run is strictly sequential. Each topic is applied against the tree the
//! previous one left behind, and the first failure aborts the whole run.
//! Re-running after a conflict has been resolved by hand is safe: topics
//! already folded into head are skipped.

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::config::BraidConfig;
use crate::errors::{ConfigError, IntegrationError};
use crate::git::GitClient;
use crate::message::MessageSynthesizer;
use crate::models::{Identity, IntegrationReport, ResolvedRef, TopicOutcome, TopicReport};
use crate::resolver::RefResolver;
use crate::strategy::{Strategy, StrategyExecutor};

/// Everything one `integrate` run needs to know.
#[derive(Debug, Clone)]
pub struct IntegrationPlan {
    pub target_branch: String,
    pub base_ref: String,
    pub strategy: Strategy,
    /// Topics in application order.
    pub topics: Vec<String>,
    /// Remote to publish the target branch to after success.
    pub publish_to: Option<String>,
}

impl IntegrationPlan {
    /// A plan from the `[integration]` section of `config`.
    pub fn from_config(config: &BraidConfig, topics: Vec<String>) -> Self {
        let integration = &config.integration;
        Self {
            target_branch: integration.target_branch.clone(),
            base_ref: integration.base_ref.clone(),
            strategy: integration.strategy,
            topics,
            publish_to: integration.push.then(|| integration.remote.clone()),
        }
    }
}

/// Fail unless the working tree, index, and repository state are clean.
pub fn ensure_clean(git: &GitClient) -> Result<(), IntegrationError> {
    if let Some(state) = git.operation_in_progress() {
        return Err(IntegrationError::OperationInProgress {
            state: state.to_string(),
        });
    }
    let dirty = git.dirty_paths()?;
    if !dirty.is_empty() {
        return Err(IntegrationError::DirtyWorkingTree { paths: dirty });
    }
    Ok(())
}

/// Drives a [`StrategyExecutor`] over a topic list.
#[derive(Debug, Clone)]
pub struct IntegrationEngine {
    resolver: RefResolver,
    title_prefix: String,
    bot: Identity,
}

impl IntegrationEngine {
    pub fn new(config: &BraidConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            resolver: RefResolver::new(config.refs.remote_prefixes.clone()),
            title_prefix: config.squash.title_prefix.clone(),
            bot: config.identity.bot_identity()?,
        })
    }

    /// Apply every topic of `plan` to its target branch.
    ///
    /// The target branch is created at the base ref if it does not exist.
    /// All topics are resolved before the first mutation.
    #[instrument(skip(self, git, plan), fields(target = %plan.target_branch, strategy = %plan.strategy))]
    pub async fn run(
        &self,
        git: &GitClient,
        plan: &IntegrationPlan,
    ) -> Result<IntegrationReport, IntegrationError> {
        let started_at = Utc::now().to_rfc3339();
        ensure_clean(git)?;

        let base = self.resolver.resolve(git, &plan.base_ref)?;
        let resolved: Vec<ResolvedRef> = plan
            .topics
            .iter()
            .map(|topic| self.resolver.resolve(git, topic))
            .collect::<Result<_, _>>()?;

        self.checkout_target(git, &plan.target_branch, &base).await?;
        let initial_head = git.head_oid()?.to_string();

        let synthesizer =
            MessageSynthesizer::new(&self.title_prefix, git.committer_identity()?, self.bot.clone());
        let executor = StrategyExecutor::new(plan.strategy, base, synthesizer);

        let mut topics = Vec::with_capacity(resolved.len());
        for topic in resolved {
            let outcome = match executor.apply(git, &topic).await? {
                TopicOutcome::Conflict { paths } => {
                    warn!(topic = %topic.topic, "aborting run on conflict");
                    return Err(IntegrationError::ApplyConflict {
                        topic: topic.topic,
                        strategy: plan.strategy,
                        paths,
                    });
                }
                outcome => outcome,
            };
            topics.push(TopicReport {
                resolved: topic,
                outcome,
            });
        }

        let published = match &plan.publish_to {
            Some(remote) => {
                git.publish_branch(remote, &plan.target_branch).await?;
                true
            }
            None => false,
        };

        let report = IntegrationReport {
            target_branch: plan.target_branch.clone(),
            strategy: plan.strategy,
            initial_head,
            final_head: git.head_oid()?.to_string(),
            topics,
            published,
            started_at,
            completed_at: Some(Utc::now().to_rfc3339()),
        };
        info!(
            applied = report.applied_count(),
            skipped = report.skipped_count(),
            head = %report.final_head,
            "integration run complete"
        );
        Ok(report)
    }

    async fn checkout_target(
        &self,
        git: &GitClient,
        target: &str,
        base: &ResolvedRef,
    ) -> Result<(), IntegrationError> {
        if git.current_branch()?.as_deref() == Some(target) {
            return Ok(());
        }
        if git.branch_exists(target)? {
            git.checkout(target).await?;
        } else {
            info!(target, base = %base.name, "creating target branch at base");
            git.recreate_branch(target, base.git_oid()?).await?;
        }
        Ok(())
    }
}
