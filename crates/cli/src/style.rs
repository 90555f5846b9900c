//! Shared styling utilities for the braid CLI.

use console::Style;

use braid_core::models::{BundleTopicOutcome, TopicOutcome};

/// Create a success-styled string (green with checkmark).
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Create an error-styled string (red with cross).
pub fn error(msg: &str) -> String {
    let style = Style::new().red();
    format!("{} {}", style.apply_to("✗"), msg)
}

/// Create a warning-styled string (yellow).
pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

/// Create a header-styled string (bold).
pub fn header(msg: &str) -> String {
    Style::new().bold().apply_to(msg).to_string()
}

pub fn dim(msg: &str) -> String {
    Style::new().dim().apply_to(msg).to_string()
}

/// First seven characters of a commit id.
pub fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

/// One-line description of how a topic was applied.
pub fn topic_outcome(outcome: &TopicOutcome) -> String {
    match outcome {
        TopicOutcome::Applied { commits } => {
            let noun = if commits.len() == 1 { "commit" } else { "commits" };
            success(&format!("applied, {} {}", commits.len(), noun))
        }
        TopicOutcome::Skipped { reason } => dim(&format!("- skipped: {reason}")),
        TopicOutcome::Conflict { paths } => error(&format!("conflict in {}", paths.join(", "))),
    }
}

/// One-line description of how a topic landed in a bundle.
pub fn bundle_outcome(outcome: BundleTopicOutcome) -> String {
    match outcome {
        BundleTopicOutcome::Merged => success("merged"),
        BundleTopicOutcome::AutoResolved => warn("merged, conflicts auto-resolved"),
        BundleTopicOutcome::Skipped => dim("- already contained"),
    }
}
