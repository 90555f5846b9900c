//! Git operations for braid.

pub mod client;
pub mod command;

pub use client::{GitClient, PushMode};
pub use command::CommandOutput;
