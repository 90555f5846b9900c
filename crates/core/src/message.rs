//! Commit message synthesis for squashed topics.
//!
//! A squash commit carries a title naming the topic, the bodies of the
//! original commits, a provenance footer, and `Co-authored-by` trailers for
//! everyone who contributed. Messages are capped at [`MAX_MESSAGE_BYTES`];
//! when over, only the aggregated body is shortened.

use tracing::{debug, warn};

use crate::models::{topic_label, CommitRecord, Identity};

/// Hard ceiling on the byte length of a synthesized message.
pub const MAX_MESSAGE_BYTES: usize = 65_536;

/// Default title prefix; the topic label follows it.
pub const DEFAULT_TITLE_PREFIX: &str = "Squashed topic: ";

const SECTION_SEPARATOR: &str = "\n\n";
const BODY_SEPARATOR: &str = "\n\n---\n\n";
const CO_AUTHOR_TRAILER: &str = "Co-authored-by:";

/// The parts of a squash commit message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedMessage {
    pub title: String,
    pub body: String,
    pub footer: String,
    /// `Name <email>` entries, in order of first appearance.
    pub co_authors: Vec<String>,
}

impl SynthesizedMessage {
    /// The co-author trailer paragraph, empty when there are no co-authors.
    pub fn co_author_block(&self) -> String {
        self.co_authors
            .iter()
            .map(|author| format!("{CO_AUTHOR_TRAILER} {author}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Title, body, footer, and co-author block separated by blank lines.
    pub fn render(&self) -> String {
        let co_authors = self.co_author_block();
        [
            self.title.as_str(),
            self.body.as_str(),
            self.footer.as_str(),
            co_authors.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(SECTION_SEPARATOR)
    }
}

/// Builds squash commit messages from a topic's commit range.
#[derive(Debug, Clone)]
pub struct MessageSynthesizer {
    title_prefix: String,
    committer: Identity,
    bot: Identity,
}

impl MessageSynthesizer {
    /// `committer` and `bot` are never credited as co-authors.
    pub fn new(title_prefix: impl Into<String>, committer: Identity, bot: Identity) -> Self {
        Self {
            title_prefix: title_prefix.into(),
            committer,
            bot,
        }
    }

    /// Synthesize the message for squashing `commits` (oldest first) of `topic`.
    pub fn synthesize(&self, topic: &str, commits: &[CommitRecord]) -> SynthesizedMessage {
        let mut message = SynthesizedMessage {
            title: format!("{}{}", self.title_prefix, topic_label(topic)),
            body: aggregate_bodies(commits),
            footer: format!("Squashed from topic '{topic}'."),
            co_authors: self.co_authors(commits),
        };

        let rendered_len = message.render().len();
        if rendered_len > MAX_MESSAGE_BYTES {
            let full_body = std::mem::take(&mut message.body);
            let fixed_len = message.render().len();
            let budget = MAX_MESSAGE_BYTES.saturating_sub(fixed_len + SECTION_SEPARATOR.len());
            if fixed_len + SECTION_SEPARATOR.len() >= MAX_MESSAGE_BYTES {
                warn!(
                    topic,
                    fixed_len, "title, footer, and co-authors alone exceed the message limit"
                );
            }
            message.body = truncate_to_boundary(&full_body, budget).to_string();
            debug!(
                topic,
                original = rendered_len,
                truncated = message.render().len(),
                "truncated squash message body"
            );
        }

        message
    }

    /// Distinct author identities, excluding the committer and the bot.
    fn co_authors(&self, commits: &[CommitRecord]) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for commit in commits {
            let author = commit.author();
            if author.email.is_empty()
                || author.same_email(&self.committer)
                || author.same_email(&self.bot)
            {
                continue;
            }
            let entry = author.to_string();
            if !seen.contains(&entry) {
                seen.push(entry);
            }
        }
        seen
    }
}

fn aggregate_bodies(commits: &[CommitRecord]) -> String {
    commits
        .iter()
        .map(|c| c.message.trim())
        .filter(|m| !m.is_empty())
        .collect::<Vec<_>>()
        .join(BODY_SEPARATOR)
        .trim()
        .to_string()
}

/// Longest prefix of `s` no longer than `max` bytes that ends on a char boundary.
fn truncate_to_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
