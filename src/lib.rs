//! shadowlint - static analysis of shadow logic in TS/TSX/JS/JSX codebases
//!
//! Quantifies the gap between structural complexity and human review evidence
//! at the level of individual functions, hooks, and components ("Units").

pub mod cache;
pub mod cli;
pub mod core;
pub mod evidence;
pub mod extractor;
pub mod ingest;
pub mod pipeline;
pub mod rules;
pub mod scorer;
pub mod similarity;

pub use core::config::Config;
pub use core::error::{Error, Result};
