//! # litfetch
//!
//! Bibliographic harvesting for systematic literature reviews.
//!
//! ## Modules
//!
//! - [`sources`] - Source adapters (Google Scholar, Crossref, Springer, Scopus, PubMed, arXiv, Zenodo)
//! - [`sink`] - Per-source CSV tables
//! - [`dedupe`] - Title deduplication and inclusion filtering
//! - [`pipeline`] - Runs adapters in sequence, then deduplicates
//! - [`config`] - Search profile and API key store
//! - [`record`] - Canonical record and table schemas
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use litfetch::config::{Credentials, SearchProfile};
//! use litfetch::pipeline::{Mode, Pipeline, SourceOptions};
//! use litfetch::sink::RecordSink;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pipeline = Pipeline::new(
//!         RecordSink::new("./output")?,
//!         SearchProfile::default(),
//!         Credentials::load_default()?,
//!         SourceOptions::default(),
//!     );
//!     let report = pipeline.run(Mode::Grey, &Mode::Grey.default_sources()).await?;
//!     println!("{} sources harvested", report.sources.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dedupe;
pub mod error;
pub mod pipeline;
pub mod record;
pub mod sink;
pub mod sources;

pub use error::{LitfetchError, Result};
