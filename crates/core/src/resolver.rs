//! Topic name → commit resolution.
//!
//! A topic is tried as written, then under each configured remote
//! namespace (`origin/<topic>`, `upstream/<topic>`). The first candidate that
//! names an existing commit wins.

use tracing::debug;

use crate::errors::IntegrationError;
use crate::git::GitClient;
use crate::models::ResolvedRef;

/// Resolves logical topic names against local and remote-tracking refs.
#[derive(Debug, Clone)]
pub struct RefResolver {
    remote_prefixes: Vec<String>,
}

impl RefResolver {
    pub fn new(remote_prefixes: Vec<String>) -> Self {
        Self { remote_prefixes }
    }

    /// Names tried for `topic`, in order.
    pub fn candidates(&self, topic: &str) -> Vec<String> {
        std::iter::once(topic.to_string())
            .chain(
                self.remote_prefixes
                    .iter()
                    .map(|prefix| format!("{}/{}", prefix.trim_end_matches('/'), topic)),
            )
            .collect()
    }

    /// Resolve `topic` to the first existing candidate.
    pub fn resolve(&self, git: &GitClient, topic: &str) -> Result<ResolvedRef, IntegrationError> {
        let candidates = self.candidates(topic);
        for name in &candidates {
            if let Some(oid) = git.resolve_commit(name)? {
                debug!(topic, name = %name, %oid, "resolved topic");
                return Ok(ResolvedRef {
                    topic: topic.to_string(),
                    name: name.clone(),
                    oid: oid.to_string(),
                });
            }
        }
        Err(IntegrationError::RefNotFound {
            topic: topic.to_string(),
            candidates,
        })
    }
}

impl Default for RefResolver {
    fn default() -> Self {
        Self::new(vec!["origin".into(), "upstream".into()])
    }
}
