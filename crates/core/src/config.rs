//! TOML-based configuration for braid.
//!
//! Every field has a default, so a repository without a `braid.toml` still
//! runs with the conventional layout: topics in `.integration/topics`,
//! bundles in `.integration/bundles`, remotes `origin` then `upstream`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;
use crate::models::Identity;
use crate::strategy::Strategy;

/// File name looked up in the repository root.
pub const CONFIG_FILE_NAME: &str = "braid.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BraidConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    /// Integration branch settings.
    #[serde(default)]
    pub integration: IntegrationConfig,

    /// Topic name resolution.
    #[serde(default)]
    pub refs: RefsConfig,

    /// Committer and reserved bot identities.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Squash commit message settings.
    #[serde(default)]
    pub squash: SquashConfig,

    /// Automatic conflict resolution settings.
    #[serde(default)]
    pub conflicts: ConflictsConfig,

    /// Bundle composition settings.
    #[serde(default)]
    pub bundles: BundlesConfig,
}

// ---------------------------------------------------------------------------
// General
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Integration
// ---------------------------------------------------------------------------

/// Settings for `braid integrate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationConfig {
    /// Branch advanced by applying topics (default `integration`).
    #[serde(default = "default_target_branch")]
    pub target_branch: String,

    /// Base the target branch starts from, and the anchor for pick/squash
    /// ranges (default `main`).
    #[serde(default = "default_base_ref")]
    pub base_ref: String,

    /// How topics are folded in.
    #[serde(default)]
    pub strategy: Strategy,

    /// Topic list file, relative to the repository root.
    #[serde(default = "default_topics_file")]
    pub topics_file: PathBuf,

    /// Publish the branch after a successful run.
    #[serde(default)]
    pub push: bool,

    /// Remote branches are published to.
    #[serde(default = "default_remote")]
    pub remote: String,
}

fn default_target_branch() -> String {
    "integration".into()
}
fn default_base_ref() -> String {
    "main".into()
}
fn default_topics_file() -> PathBuf {
    PathBuf::from(".integration/topics")
}
fn default_remote() -> String {
    "origin".into()
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            target_branch: default_target_branch(),
            base_ref: default_base_ref(),
            strategy: Strategy::default(),
            topics_file: default_topics_file(),
            push: false,
            remote: default_remote(),
        }
    }
}

// ---------------------------------------------------------------------------
// Refs
// ---------------------------------------------------------------------------

/// Remote namespaces tried, in order, after the bare topic name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefsConfig {
    #[serde(default = "default_remote_prefixes")]
    pub remote_prefixes: Vec<String>,
}

fn default_remote_prefixes() -> Vec<String> {
    vec!["origin".into(), "upstream".into()]
}

impl Default for RefsConfig {
    fn default() -> Self {
        Self {
            remote_prefixes: default_remote_prefixes(),
        }
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Identity used for commits braid creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Committer name; falls back to the repository's `user.name`.
    #[serde(default)]
    pub name: Option<String>,

    /// Committer email; falls back to the repository's `user.email`.
    #[serde(default)]
    pub email: Option<String>,

    /// Automation identity never credited as a co-author, `Name <email>`.
    #[serde(default = "default_bot")]
    pub bot: String,
}

fn default_bot() -> String {
    "github-actions[bot] <41898282+github-actions[bot]@users.noreply.github.com>".into()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: None,
            email: None,
            bot: default_bot(),
        }
    }
}

impl IdentityConfig {
    /// The configured committer, if both name and email are set.
    pub fn committer(&self) -> Option<Identity> {
        match (&self.name, &self.email) {
            (Some(name), Some(email)) => Some(Identity::new(name, email)),
            _ => None,
        }
    }

    /// The reserved bot identity. Call after [`BraidConfig::validate`].
    pub fn bot_identity(&self) -> Result<Identity, ConfigError> {
        self.bot
            .parse()
            .map_err(|detail| ConfigError::InvalidValue {
                field: "identity.bot".into(),
                detail,
            })
    }
}

// ---------------------------------------------------------------------------
// Squash
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SquashConfig {
    /// Prefix of every squash commit title; the topic label follows it.
    #[serde(default = "default_title_prefix")]
    pub title_prefix: String,
}

fn default_title_prefix() -> String {
    crate::message::DEFAULT_TITLE_PREFIX.into()
}

impl Default for SquashConfig {
    fn default() -> Self {
        Self {
            title_prefix: default_title_prefix(),
        }
    }
}

// ---------------------------------------------------------------------------
// Conflicts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictsConfig {
    /// Generated/operational path prefixes whose conflicts are settled by
    /// keeping the current branch's version.
    #[serde(default = "default_auto_resolve_paths")]
    pub auto_resolve_paths: Vec<String>,
}

fn default_auto_resolve_paths() -> Vec<String> {
    crate::conflict::DEFAULT_AUTO_RESOLVE_PATHS
        .iter()
        .map(|p| p.to_string())
        .collect()
}

impl Default for ConflictsConfig {
    fn default() -> Self {
        Self {
            auto_resolve_paths: default_auto_resolve_paths(),
        }
    }
}

// ---------------------------------------------------------------------------
// Bundles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundlesConfig {
    /// Bundle list file, relative to the repository root.
    #[serde(default = "default_bundles_file")]
    pub file: PathBuf,

    /// Commit every bundle is rebuilt from (default `main`).
    #[serde(default = "default_base_ref")]
    pub base_ref: String,
}

fn default_bundles_file() -> PathBuf {
    PathBuf::from(".integration/bundles")
}

impl Default for BundlesConfig {
    fn default() -> Self {
        Self {
            file: default_bundles_file(),
            base_ref: default_base_ref(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl BraidConfig {
    /// Load a [`BraidConfig`] from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: BraidConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Load `<repo>/braid.toml`, else the user-level config, else defaults.
    pub fn load_or_default(repo_root: &Path) -> Result<Self, ConfigError> {
        let local = repo_root.join(CONFIG_FILE_NAME);
        if local.exists() {
            return Self::load_from_file(local);
        }
        if let Some(user) = user_config_path().filter(|p| p.exists()) {
            return Self::load_from_file(user);
        }
        debug!("no configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Validate that all fields are sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_branch_name("integration.target_branch", &self.integration.target_branch)?;
        require_non_empty("integration.base_ref", &self.integration.base_ref)?;
        require_non_empty("integration.remote", &self.integration.remote)?;
        require_non_empty("bundles.base_ref", &self.bundles.base_ref)?;

        let prefixes = &self.refs.remote_prefixes;
        if prefixes.is_empty() || prefixes.len() > 2 {
            return Err(ConfigError::InvalidValue {
                field: "refs.remote_prefixes".into(),
                detail: format!("expected one or two remote namespaces, got {}", prefixes.len()),
            });
        }
        for prefix in prefixes {
            require_non_empty("refs.remote_prefixes", prefix)?;
        }

        if self.identity.name.is_some() != self.identity.email.is_some() {
            return Err(ConfigError::InvalidValue {
                field: "identity".into(),
                detail: "name and email must be set together".into(),
            });
        }
        self.identity.bot_identity()?;

        for path in &self.conflicts.auto_resolve_paths {
            let trimmed = path.trim_matches('/');
            if trimmed.is_empty() || trimmed.split('/').any(|part| part == "..") {
                return Err(ConfigError::InvalidValue {
                    field: "conflicts.auto_resolve_paths".into(),
                    detail: format!("'{path}' is not a repository-relative path"),
                });
            }
        }

        Ok(())
    }

    /// Generate a default TOML config template string.
    pub fn default_template() -> &'static str {
        r#"# braid configuration

[general]
log_level = "info"

[integration]
target_branch = "integration"
base_ref = "main"
strategy = "merge"            # merge | pick | squash
topics_file = ".integration/topics"
push = false
remote = "origin"

[refs]
# Namespaces tried, in order, when a topic is not a local branch.
remote_prefixes = ["origin", "upstream"]

[identity]
# Defaults to the repository's user.name / user.email.
# name = "Integration Bot"
# email = "integration@example.com"
bot = "github-actions[bot] <41898282+github-actions[bot]@users.noreply.github.com>"

[squash]
title_prefix = "Squashed topic: "

[conflicts]
# Conflicts confined to these paths are resolved by keeping the bundle's side.
auto_resolve_paths = [".github", ".integration"]

[bundles]
file = ".integration/bundles"
base_ref = "main"
"#
    }
}

/// `~/.config/braid/config.toml` (platform equivalent).
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("braid").join("config.toml"))
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            field: field.into(),
            detail: "must not be empty".into(),
        });
    }
    Ok(())
}

fn require_branch_name(field: &str, value: &str) -> Result<(), ConfigError> {
    require_non_empty(field, value)?;
    if !git2::Branch::name_is_valid(value).unwrap_or(false) {
        return Err(ConfigError::InvalidValue {
            field: field.into(),
            detail: format!("'{value}' is not a valid branch name"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_toml() -> &'static str {
        r#"
[general]
log_level = "debug"

[integration]
target_branch = "next"
base_ref = "develop"
strategy = "squash"
topics_file = "ops/topics.txt"
push = true
remote = "publish"

[refs]
remote_prefixes = ["fork"]

[identity]
name = "Release Bot"
email = "release@example.com"
bot = "ci-bot <ci@example.com>"

[squash]
title_prefix = "squash: "

[conflicts]
auto_resolve_paths = ["generated/", "ops"]

[bundles]
file = "ops/bundles.txt"
base_ref = "develop"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: BraidConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.integration.target_branch, "next");
        assert_eq!(config.integration.strategy, Strategy::Squash);
        assert!(config.integration.push);
        assert_eq!(config.refs.remote_prefixes, vec!["fork".to_string()]);
        assert_eq!(
            config.identity.committer(),
            Some(Identity::new("Release Bot", "release@example.com"))
        );
        assert_eq!(
            config.identity.bot_identity().unwrap(),
            Identity::new("ci-bot", "ci@example.com")
        );
        assert_eq!(config.squash.title_prefix, "squash: ");
        assert_eq!(config.conflicts.auto_resolve_paths.len(), 2);
        assert_eq!(config.bundles.file, PathBuf::from("ops/bundles.txt"));
        config.validate().unwrap();
    }

    #[test]
    fn test_defaults() {
        let config: BraidConfig = toml::from_str("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.integration.target_branch, "integration");
        assert_eq!(config.integration.base_ref, "main");
        assert_eq!(config.integration.strategy, Strategy::Merge);
        assert!(!config.integration.push);
        assert_eq!(config.refs.remote_prefixes, vec!["origin", "upstream"]);
        assert_eq!(config.identity.committer(), None);
        assert_eq!(config.conflicts.auto_resolve_paths, vec![".github", ".integration"]);
        config.validate().unwrap();
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, sample_toml()).unwrap();

        let config = BraidConfig::load_from_file(&path).expect("load failed");
        assert_eq!(config.integration.base_ref, "develop");

        let config = BraidConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config.integration.target_branch, "next");
    }

    #[test]
    fn test_file_not_found() {
        let result = BraidConfig::load_from_file("/nonexistent/braid.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_rejects_unknown_strategy() {
        let result: Result<BraidConfig, _> = toml::from_str("[integration]\nstrategy = \"rebase\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_bad_branch_name() {
        let mut config = BraidConfig::default();
        config.integration.target_branch = "bad..name".into();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "integration.target_branch"
        ));
    }

    #[test]
    fn test_validate_rejects_three_prefixes() {
        let mut config = BraidConfig::default();
        config.refs.remote_prefixes = vec!["a".into(), "b".into(), "c".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_half_identity() {
        let mut config = BraidConfig::default();
        config.identity.name = Some("Only Name".into());
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "identity"
        ));
    }

    #[test]
    fn test_validate_rejects_malformed_bot() {
        let mut config = BraidConfig::default();
        config.identity.bot = "just-a-name".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_escaping_allow_list() {
        let mut config = BraidConfig::default();
        config.conflicts.auto_resolve_paths = vec!["../outside".into()];
        assert!(config.validate().is_err());

        config.conflicts.auto_resolve_paths = vec!["/".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_template_is_valid() {
        let config: BraidConfig = toml::from_str(BraidConfig::default_template())
            .expect("default template should be valid TOML");
        config.validate().unwrap();
    }
}
