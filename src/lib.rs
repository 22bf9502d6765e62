#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(clippy::all)]

//! Log Error Analyzer - extract `ERROR` lines from logs and explain them
//!
//! The crate is split into a small deterministic core and the service around it:
//! - [`extractor`] pulls error messages out of raw log text
//! - [`response`] turns a model reply into an [`AnalysisResult`]
//! - [`analyzer`] asks a [`GenerativeModel`] about one error at a time
//! - [`api`] exposes the upload and analysis endpoints over HTTP
//!
//! ## Usage
//! ```rust,ignore
//! use log_error_analyzer::{extract_errors, Analyzer, Config, GeminiClient};
//! use std::sync::Arc;
//!
//! async fn example() -> log_error_analyzer::Result<()> {
//!     let config = Config::load(None)?;
//!     let model = Arc::new(GeminiClient::new(&config.gemini)?);
//!     let analyzer = Analyzer::new(model, config.schema_mode());
//!
//!     let errors = extract_errors("2024-01-01 ERROR disk full\n");
//!     let results = analyzer.analyze_all(&errors).await;
//!     println!("{:?}", results);
//!     Ok(())
//! }
//! ```

/// Configuration loading and validation
pub mod config;
/// Error handling types and utilities
pub mod error;
/// Logging configuration and the rotating log file
pub mod logging;
/// Extraction of error messages from log text
pub mod extractor;
/// Parsing of fenced JSON replies
pub mod response;
/// Prompt templates sent to the model
pub mod prompts;
/// Gemini API client and the model abstraction
pub mod gemini;
/// Per-error analysis with fallback handling
pub mod analyzer;
/// Upload validation and storage
pub mod upload;
/// Rate limiting functionality for the HTTP endpoints
pub mod rate_limiter;
/// REST API functionality for the web service
pub mod api;

// Re-export common types
pub use analyzer::Analyzer;
pub use config::Config;
pub use error::{AnalyzerError, Result};
pub use extractor::extract_errors;
pub use gemini::{GeminiClient, GenerativeModel};
pub use response::{parse_analysis, AnalysisResult, ParseFailure, SchemaMode};
