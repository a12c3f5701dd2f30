//! CLI command handlers
//!
//! # Modules
//!
//! - `inspect`: pure score, decay and day calculations
//! - `identity`: file-backed local identity
//! - `simulate`: full session against in-memory backends

pub mod identity;
pub mod inspect;
pub mod simulate;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON for programmatic parsing
    Json,
}
