//! Core types, configuration, and error handling for gitdora.
//!
//! This crate provides the shared foundation used by the other gitdora crates:
//! - [`DoraError`]: unified error type using `thiserror` and `miette`
//! - [`DoraConfig`]: configuration loaded from `.gitdora.toml`
//! - Shared types: [`YearMonth`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{BranchConfig, ChangeFailureConfig, CycleTimeConfig, DoraConfig, Period};
pub use error::DoraError;
pub use types::{OutputFormat, YearMonth};

/// A convenience `Result` type for gitdora operations.
pub type Result<T> = std::result::Result<T, DoraError>;
