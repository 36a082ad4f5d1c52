//! Source adapters.
//!
//! Every literature source implements [`SourceAdapter`]. An adapter only
//! knows how to ask its source for results and how to map one raw item into a
//! [`Hit`]; the [`harvest`] harness owns the table lifecycle, stamps each hit
//! with the search date and database tag, and persists it immediately.

pub mod arxiv;
pub mod crossref;
pub mod pubmed;
pub mod scholar;
pub mod scopus;
pub mod springer;
pub mod zenodo;

use crate::error::{LitfetchError, Result};
use crate::record::{Hit, Record, TableSchema, SEARCHED_FORMAT};
use crate::sink::RecordSink;
use async_trait::async_trait;
use chrono::Local;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// User agent for API requests
const USER_AGENT: &str = concat!("litfetch/", env!("CARGO_PKG_VERSION"), " (mailto:litfetch@example.com)");

/// What to ask a source for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Boolean expression, e.g. `(a OR b) AND (c)`
    pub terms: String,
    /// Maximum number of results to request
    pub limit: usize,
    /// Earliest publication year, for sources that filter by date
    pub min_year: Option<i32>,
    /// Latest publication year, for sources that filter by date
    pub max_year: Option<i32>,
}

impl SearchQuery {
    pub fn new(terms: impl Into<String>, limit: usize) -> Self {
        Self {
            terms: terms.into(),
            limit,
            min_year: None,
            max_year: None,
        }
    }

    pub fn with_years(mut self, min_year: i32, max_year: i32) -> Self {
        self.min_year = Some(min_year);
        self.max_year = Some(max_year);
        self
    }
}

/// One literature source.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Tag written to the `database` column of every record.
    fn database(&self) -> &str;

    /// Name of the per-source table.
    fn table(&self) -> String {
        slug(self.database())
    }

    fn schema(&self) -> TableSchema {
        TableSchema::Standard
    }

    /// Query the source and hand every discovered item to `out` as soon as it
    /// is mapped. Return `Err` only when the source itself cannot be used.
    async fn produce(&self, query: &SearchQuery, out: &mut RecordOutput<'_>) -> Result<()>;
}

/// Counts from one adapter run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestReport {
    pub database: String,
    pub table: String,
    /// Rows appended to the table
    pub written: usize,
    /// Items dropped because they could not be mapped
    pub skipped: usize,
}

/// Write side handed to an adapter for the duration of one run.
pub struct RecordOutput<'a> {
    sink: &'a RecordSink,
    table: String,
    schema: TableSchema,
    database: String,
    searched: String,
    written: usize,
    skipped: usize,
}

impl<'a> RecordOutput<'a> {
    fn new(sink: &'a RecordSink, adapter: &dyn SourceAdapter, searched: String) -> Self {
        Self {
            sink,
            table: adapter.table(),
            schema: adapter.schema(),
            database: adapter.database().to_string(),
            searched,
            written: 0,
            skipped: 0,
        }
    }

    /// Persist one hit. A hit without a title is counted as skipped.
    pub fn emit(&mut self, hit: Hit) -> Result<()> {
        if hit.title.trim().is_empty() {
            self.skip("empty title");
            return Ok(());
        }
        let record = Record::from_hit(hit, &self.searched, &self.database);
        self.sink.append(&self.table, self.schema, &record)?;
        self.written += 1;
        debug!(database = %self.database, title = %record.title, "Record written");
        Ok(())
    }

    /// Record an item-level defect and carry on.
    pub fn skip(&mut self, reason: &str) {
        self.skipped += 1;
        warn!(database = %self.database, reason = reason, "Skipping item");
    }

    pub fn written(&self) -> usize {
        self.written
    }

    fn report(&self) -> HarvestReport {
        HarvestReport {
            database: self.database.clone(),
            table: self.table.clone(),
            written: self.written,
            skipped: self.skipped,
        }
    }
}

/// Run one adapter over every query into its freshly truncated table.
///
/// On a source-level failure the rows emitted so far stay on disk and the
/// error is returned to the caller.
pub async fn harvest(adapter: &dyn SourceAdapter, queries: &[SearchQuery], sink: &RecordSink) -> Result<HarvestReport> {
    let searched = Local::now().format(SEARCHED_FORMAT).to_string();
    harvest_on(adapter, queries, sink, searched).await
}

async fn harvest_on(
    adapter: &dyn SourceAdapter,
    queries: &[SearchQuery],
    sink: &RecordSink,
    searched: String,
) -> Result<HarvestReport> {
    let table = adapter.table();
    sink.reset_table(&table, adapter.schema())?;

    let mut out = RecordOutput::new(sink, adapter, searched);
    for query in queries {
        info!(
            database = adapter.database(),
            table = %table,
            query = %query.terms,
            limit = query.limit,
            "Searching"
        );

        if let Err(e) = adapter.produce(query, &mut out).await {
            warn!(
                database = adapter.database(),
                written = out.written(),
                error = %e,
                "Harvest aborted, partial table kept"
            );
            return Err(e);
        }
    }

    let report = out.report();
    info!(
        database = %report.database,
        written = report.written,
        skipped = report.skipped,
        "Harvest complete"
    );
    Ok(report)
}

/// Table name derived from a database tag: `ACM - Crossref` → `acm_crossref`.
pub fn slug(database: &str) -> String {
    database
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Build an HTTP client for API sources.
pub(crate) fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| LitfetchError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Send a prepared request and return the body of a successful response.
pub(crate) async fn fetch_text(request: reqwest::RequestBuilder, source: &str) -> Result<String> {
    let response = request.send().await?;
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(LitfetchError::RateLimited(60));
    }

    if !status.is_success() {
        return Err(LitfetchError::Api {
            code: status.as_u16() as i32,
            message: format!("{} API error: {}", source, status),
        });
    }

    response.text().await.map_err(LitfetchError::Network)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct FakeSource {
        hits: Vec<Hit>,
        fail_after: Option<usize>,
    }

    #[async_trait]
    impl SourceAdapter for FakeSource {
        fn database(&self) -> &str {
            "Fake - Source"
        }

        async fn produce(&self, _query: &SearchQuery, out: &mut RecordOutput<'_>) -> Result<()> {
            for (i, hit) in self.hits.iter().enumerate() {
                if self.fail_after == Some(i) {
                    return Err(LitfetchError::Api {
                        code: 503,
                        message: "unavailable".to_string(),
                    });
                }
                out.emit(hit.clone())?;
            }
            Ok(())
        }
    }

    fn hit(title: &str) -> Hit {
        Hit {
            title: title.to_string(),
            authors: "A".to_string(),
            published: "2015".to_string(),
            source: "u".to_string(),
            record_type: None,
        }
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("ACM - Crossref"), "acm_crossref");
        assert_eq!(slug("Google Scholar"), "google_scholar");
        assert_eq!(slug("arXiv"), "arxiv");
    }

    #[tokio::test]
    async fn test_harvest_stamps_and_counts() -> Result<()> {
        let dir = TempDir::new()?;
        let sink = RecordSink::new(dir.path())?;
        let source = FakeSource {
            hits: vec![hit("One"), hit("  "), hit("Two")],
            fail_after: None,
        };

        let queries = [SearchQuery::new("q", 10)];
        let report = harvest_on(&source, &queries, &sink, "09/10/2017".to_string()).await?;
        assert_eq!(report.table, "fake_source");
        assert_eq!(report.written, 2);
        assert_eq!(report.skipped, 1);

        let rows = sink.read_table("fake_source")?;
        assert_eq!(rows[1], vec!["09/10/2017", "One", "A", "2015", "Fake - Source", "u"]);
        assert_eq!(rows[2][1], "Two");
        Ok(())
    }

    #[tokio::test]
    async fn test_queries_share_one_table() -> Result<()> {
        let dir = TempDir::new()?;
        let sink = RecordSink::new(dir.path())?;
        let source = FakeSource {
            hits: vec![hit("One")],
            fail_after: None,
        };

        let queries = [SearchQuery::new("q1", 10), SearchQuery::new("q2", 10)];
        let report = harvest(&source, &queries, &sink).await?;
        assert_eq!(report.written, 2);
        assert_eq!(sink.read_table("fake_source")?.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_harvest_keeps_partial_table() -> Result<()> {
        let dir = TempDir::new()?;
        let sink = RecordSink::new(dir.path())?;
        let source = FakeSource {
            hits: vec![hit("One"), hit("Two"), hit("Three")],
            fail_after: Some(2),
        };

        let result = harvest(&source, &[SearchQuery::new("q", 10)], &sink).await;
        assert!(matches!(result, Err(LitfetchError::Api { code: 503, .. })));
        assert_eq!(sink.read_table("fake_source")?.len(), 3);
        Ok(())
    }
}
