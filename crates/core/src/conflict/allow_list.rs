//! Path prefix matching for auto-resolvable conflicts.

/// A fixed set of repository-relative path prefixes.
///
/// A path matches when it equals a prefix or lies underneath it; `docs`
/// matches `docs` and `docs/a.md` but not `docs-old/a.md`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    prefixes: Vec<String>,
}

impl AllowList {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let prefixes = prefixes
            .into_iter()
            .map(|p| p.as_ref().trim_matches('/').to_string())
            .filter(|p| !p.is_empty())
            .collect();
        Self { prefixes }
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn matches(&self, path: &str) -> bool {
        let path = path.trim_start_matches("./");
        self.prefixes.iter().any(|prefix| {
            path == prefix
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Split `paths` into (matched, unmatched), preserving order.
    pub fn partition<'a>(&self, paths: &'a [String]) -> (Vec<&'a String>, Vec<&'a String>) {
        paths.iter().partition(|path| self.matches(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_and_nested_matches() {
        let list = AllowList::new([".github", "generated/"]);
        assert!(list.matches(".github"));
        assert!(list.matches(".github/workflows/ci.yml"));
        assert!(list.matches("generated/schema.json"));
        assert!(list.matches("./generated/schema.json"));
    }

    #[test]
    fn test_sibling_prefix_does_not_match() {
        let list = AllowList::new(["docs"]);
        assert!(!list.matches("docs-old/readme.md"));
        assert!(!list.matches("src/docs/readme.md"));
        assert!(!list.matches("doc"));
    }

    #[test]
    fn test_empty_prefixes_are_dropped() {
        let list = AllowList::new(["", "/", "ops"]);
        assert_eq!(list.prefixes(), &["ops".to_string()]);
    }

    #[test]
    fn test_partition_preserves_order() {
        let list = AllowList::new([".integration"]);
        let paths = vec![
            "src/lib.rs".to_string(),
            ".integration/topics".to_string(),
            "README.md".to_string(),
            ".integration/bundles".to_string(),
        ];
        let (matched, unmatched) = list.partition(&paths);
        assert_eq!(matched, vec![&paths[1], &paths[3]]);
        assert_eq!(unmatched, vec![&paths[0], &paths[2]]);
    }
}
