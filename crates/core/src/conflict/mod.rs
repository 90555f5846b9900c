//! Automatic resolution of merge conflicts on generated/operational paths.
//!
//! Bundle merges regularly collide on files that every topic touches but
//! nobody edits by hand: CI workflow files, the topic and bundle lists
//! themselves. Conflicts confined to those paths are settled by keeping the
//! bundle branch's side; anything else is left for a human.

pub mod allow_list;
pub mod resolver;

pub use allow_list::AllowList;
pub use resolver::{AutoResolution, ConflictAutoResolver};

/// Path prefixes auto-resolved when the configuration names none.
pub const DEFAULT_AUTO_RESOLVE_PATHS: &[&str] = &[".github", ".integration"];
