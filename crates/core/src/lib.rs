//! braid core library.
//!
//! This crate provides the building blocks for maintaining integration
//! branches: configuration, topic ref resolution, ancestry queries, squash
//! message synthesis, strategy execution, conflict auto-resolution, and
//! bundle composition.

pub mod ancestry;
pub mod bundle;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod errors;
pub mod git;
pub mod lists;
pub mod message;
pub mod models;
pub mod resolver;
pub mod strategy;

// Re-exports for convenience.
pub use bundle::{Bundle, BundleComposer, ComposeOptions};
pub use config::BraidConfig;
pub use engine::{IntegrationEngine, IntegrationPlan};
pub use git::GitClient;
pub use strategy::Strategy;
