//! Readers for the plain-text topic and bundle list files.
//!
//! Topic list: one topic per line.
//!
//! ```text
//! # fixes first
//! fix/login-timeout
//! feature/search
//! ```
//!
//! Bundle list: one bundle per line, `name: topic topic ...`.
//!
//! ```text
//! release-candidate: fix/login-timeout feature/search
//! ```
//!
//! In both, `#` starts a comment and blank lines are ignored.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, warn};

use crate::bundle::Bundle;
use crate::errors::ListError;

/// Read a topic list file.
pub fn read_topics<P: AsRef<Path>>(path: P) -> Result<Vec<String>, ListError> {
    let path = path.as_ref();
    let contents = read_list(path)?;
    Ok(parse_topics(&contents, &path.display().to_string()))
}

/// Parse topic list text. Later duplicates are dropped with a warning.
pub fn parse_topics(contents: &str, file: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut topics = Vec::new();
    for (line_no, line) in significant_lines(contents) {
        for topic in line.split_whitespace() {
            if seen.insert(topic.to_string()) {
                topics.push(topic.to_string());
            } else {
                warn!(file, line = line_no, topic, "duplicate topic ignored");
            }
        }
    }
    debug!(file, count = topics.len(), "parsed topic list");
    topics
}

/// Read and validate a bundle list file.
pub fn read_bundles<P: AsRef<Path>>(path: P) -> Result<Vec<Bundle>, ListError> {
    let path = path.as_ref();
    let contents = read_list(path)?;
    parse_bundles(&contents, &path.display().to_string())
}

/// Parse and validate bundle list text.
pub fn parse_bundles(contents: &str, file: &str) -> Result<Vec<Bundle>, ListError> {
    let mut names = HashSet::new();
    let mut bundles = Vec::new();
    for (line_no, line) in significant_lines(contents) {
        let malformed = |detail: String| ListError::Malformed {
            file: file.to_string(),
            line: line_no,
            detail,
        };

        let (name, topics) = line
            .split_once(':')
            .ok_or_else(|| malformed("expected 'name: topic topic ...'".into()))?;
        let name = name.trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(malformed(format!("invalid bundle name '{name}'")));
        }
        if !names.insert(name.to_string()) {
            return Err(malformed(format!("bundle '{name}' defined twice")));
        }

        let bundle = Bundle::new(
            name,
            topics.split_whitespace().map(str::to_string).collect(),
        );
        bundle.validate().map_err(|source| ListError::InvalidBundle {
            file: file.to_string(),
            source,
        })?;
        bundles.push(bundle);
    }
    debug!(file, count = bundles.len(), "parsed bundle list");
    Ok(bundles)
}

fn read_list(path: &Path) -> Result<String, ListError> {
    if !path.exists() {
        return Err(ListError::FileNotFound(path.display().to_string()));
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Non-empty lines with comments stripped, numbered from 1.
fn significant_lines(contents: &str) -> impl Iterator<Item = (usize, &str)> {
    contents.lines().enumerate().filter_map(|(idx, raw)| {
        let line = strip_comment(raw).trim();
        (!line.is_empty()).then_some((idx + 1, line))
    })
}

/// Cut `raw` at the first `#` that starts the line or follows whitespace.
///
/// A `#` inside a word is kept, since branch names may contain one.
fn strip_comment(raw: &str) -> &str {
    let mut after_space = true;
    for (idx, ch) in raw.char_indices() {
        if ch == '#' && after_space {
            return &raw[..idx];
        }
        after_space = ch.is_whitespace();
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::IntegrationError;

    #[test]
    fn test_parse_topics() {
        let text = "# header\nfix/login\n\n  feature/search  # trailing\nfix/login\n";
        assert_eq!(
            parse_topics(text, "topics"),
            vec!["fix/login", "feature/search"]
        );
    }

    #[test]
    fn test_hash_inside_topic_name_is_kept() {
        let text = "fix/#123-login\n#comment\nfeature/a #trailing\nrc#2\n";
        assert_eq!(
            parse_topics(text, "topics"),
            vec!["fix/#123-login", "feature/a", "rc#2"]
        );

        let bundles = parse_bundles("rc: fix/#123-login feature/a # tail\n", "bundles").unwrap();
        assert_eq!(bundles[0].topics, vec!["fix/#123-login", "feature/a"]);
    }

    #[test]
    fn test_parse_bundles() {
        let text = "\
# bundles
rc: fix/login feature/search
docs-only: docs/intro
empty:
";
        let bundles = parse_bundles(text, "bundles").unwrap();
        assert_eq!(bundles.len(), 3);
        assert_eq!(bundles[0].name, "rc");
        assert_eq!(bundles[0].topics, vec!["fix/login", "feature/search"]);
        assert!(bundles[2].topics.is_empty());
    }

    #[test]
    fn test_bundle_missing_colon() {
        let err = parse_bundles("rc fix/login\n", "bundles").unwrap_err();
        assert!(matches!(err, ListError::Malformed { line: 1, .. }));
    }

    #[test]
    fn test_bundle_defined_twice() {
        let err = parse_bundles("rc: a\n\nrc: b\n", "bundles").unwrap_err();
        assert!(matches!(err, ListError::Malformed { line: 3, .. }));
    }

    #[test]
    fn test_bundle_self_reference() {
        let err = parse_bundles("rc: a rc\n", "bundles").unwrap_err();
        assert!(matches!(
            err,
            ListError::InvalidBundle {
                source: IntegrationError::BundleSelfReference { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_bundle_duplicate_topic() {
        let err = parse_bundles("rc: a b a\n", "bundles").unwrap_err();
        assert!(matches!(
            err,
            ListError::InvalidBundle {
                source: IntegrationError::BundleDuplicateTopic { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_read_topics_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topics");
        std::fs::write(&path, "a\nb\n").unwrap();
        assert_eq!(read_topics(&path).unwrap(), vec!["a", "b"]);
        assert!(matches!(
            read_topics(dir.path().join("missing")),
            Err(ListError::FileNotFound(_))
        ));
    }
}
