//! Selects adapters, runs them one after another, then deduplicates.
//!
//! A source that cannot be built (missing key) or fails mid-run is logged and
//! recorded in the report; the remaining sources still run.

use crate::config::{Credentials, SearchProfile};
use crate::dedupe::{DedupeReport, Deduplicator};
use crate::error::{LitfetchError, Result};
use crate::sources::arxiv::ArxivAdapter;
use crate::sources::crossref::{CrossrefAdapter, Publisher};
use crate::sources::pubmed::PubmedAdapter;
use crate::sources::scholar::ScholarAdapter;
use crate::sources::scopus::ScopusAdapter;
use crate::sources::springer::SpringerAdapter;
use crate::sources::zenodo::ZenodoAdapter;
use crate::sources::{harvest, slug, HarvestReport, SearchQuery, SourceAdapter};
use crate::sink::RecordSink;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{error, info};

/// Canonical table of the strict mode
pub const STRICT_OUTPUT: &str = "deduplicated";

/// Canonical table of the grey-literature mode
pub const GREY_OUTPUT: &str = "grey_deduplicated";

/// Which family of sources and which filter policy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Strict,
    Grey,
}

impl Mode {
    pub fn output(&self) -> &'static str {
        match self {
            Mode::Strict => STRICT_OUTPUT,
            Mode::Grey => GREY_OUTPUT,
        }
    }

    /// Default sources, in table processing order.
    pub fn default_sources(&self) -> Vec<SourceKind> {
        match self {
            Mode::Strict => {
                let mut kinds = vec![SourceKind::Scholar];
                kinds.extend(Publisher::ALL.into_iter().map(SourceKind::Crossref));
                kinds.extend([SourceKind::Springer, SourceKind::Scopus, SourceKind::Pubmed]);
                kinds
            }
            Mode::Grey => vec![SourceKind::Arxiv, SourceKind::Zenodo],
        }
    }
}

/// A source the pipeline knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Scholar,
    Crossref(Publisher),
    Springer,
    Scopus,
    Pubmed,
    Arxiv,
    Zenodo,
}

impl SourceKind {
    /// Database tag, identical to the built adapter's.
    pub fn database(&self) -> &'static str {
        match self {
            SourceKind::Scholar => "Google Scholar",
            SourceKind::Crossref(publisher) => publisher.database(),
            SourceKind::Springer => "Springer",
            SourceKind::Scopus => "Scopus",
            SourceKind::Pubmed => "PubMed",
            SourceKind::Arxiv => "arXiv",
            SourceKind::Zenodo => "Zenodo",
        }
    }

    pub fn table(&self) -> String {
        slug(self.database())
    }

    pub fn build(&self, credentials: &Credentials, options: &SourceOptions) -> Result<Box<dyn SourceAdapter>> {
        Ok(match self {
            SourceKind::Scholar => Box::new(ScholarAdapter::new(
                options.scholar_mirror.as_deref(),
                options.proxy.as_deref(),
            )?),
            SourceKind::Crossref(publisher) => Box::new(CrossrefAdapter::publisher(*publisher)?),
            SourceKind::Springer => Box::new(SpringerAdapter::new(credentials)?),
            SourceKind::Scopus => Box::new(ScopusAdapter::new(credentials)?),
            SourceKind::Pubmed => Box::new(PubmedAdapter::new(credentials)?),
            SourceKind::Arxiv => Box::new(ArxivAdapter::new()?),
            SourceKind::Zenodo => Box::new(ZenodoAdapter::new()?),
        })
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::Scholar => "scholar",
            SourceKind::Crossref(Publisher::Acm) => "crossref-acm",
            SourceKind::Crossref(Publisher::Ieee) => "crossref-ieee",
            SourceKind::Crossref(Publisher::Springer) => "crossref-springer",
            SourceKind::Crossref(Publisher::Elsevier) => "crossref-elsevier",
            SourceKind::Springer => "springer",
            SourceKind::Scopus => "scopus",
            SourceKind::Pubmed => "pubmed",
            SourceKind::Arxiv => "arxiv",
            SourceKind::Zenodo => "zenodo",
        };
        f.write_str(name)
    }
}

impl FromStr for SourceKind {
    type Err = LitfetchError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim().to_lowercase().as_str() {
            "scholar" | "gscholar" => SourceKind::Scholar,
            "crossref-acm" | "acm" => SourceKind::Crossref(Publisher::Acm),
            "crossref-ieee" | "ieee" => SourceKind::Crossref(Publisher::Ieee),
            "crossref-springer" => SourceKind::Crossref(Publisher::Springer),
            "crossref-elsevier" | "elsevier" => SourceKind::Crossref(Publisher::Elsevier),
            "springer" => SourceKind::Springer,
            "scopus" => SourceKind::Scopus,
            "pubmed" => SourceKind::Pubmed,
            "arxiv" => SourceKind::Arxiv,
            "zenodo" => SourceKind::Zenodo,
            other => return Err(LitfetchError::Validation(format!("Unknown source: {}", other))),
        })
    }
}

/// Transport options for the scraper.
#[derive(Debug, Clone, Default)]
pub struct SourceOptions {
    pub proxy: Option<String>,
    pub scholar_mirror: Option<String>,
}

/// Result of one source in a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    pub source: String,
    pub harvest: Option<HarvestReport>,
    pub error: Option<String>,
}

/// Everything a pipeline run produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub sources: Vec<SourceOutcome>,
    pub dedupe: Option<DedupeReport>,
}

impl PipelineReport {
    pub fn failed(&self) -> impl Iterator<Item = &SourceOutcome> {
        self.sources.iter().filter(|s| s.error.is_some())
    }
}

pub struct Pipeline {
    sink: RecordSink,
    profile: SearchProfile,
    credentials: Credentials,
    options: SourceOptions,
}

impl Pipeline {
    pub fn new(sink: RecordSink, profile: SearchProfile, credentials: Credentials, options: SourceOptions) -> Self {
        Self {
            sink,
            profile,
            credentials,
            options,
        }
    }

    pub fn sink(&self) -> &RecordSink {
        &self.sink
    }

    /// One query per secondary term group, bounded by the profile's years.
    pub fn queries(&self) -> Vec<SearchQuery> {
        self.profile
            .query_strings()
            .into_iter()
            .map(|terms| {
                SearchQuery::new(terms, self.profile.max_results)
                    .with_years(self.profile.start_year, self.profile.end_year)
            })
            .collect()
    }

    /// Harvest every source in order, then build the canonical table.
    pub async fn run(&self, mode: Mode, sources: &[SourceKind]) -> Result<PipelineReport> {
        let queries = self.queries();
        let mut report = PipelineReport::default();

        for kind in sources {
            let outcome = match self.harvest_one(*kind, &queries).await {
                Ok(harvest) => SourceOutcome {
                    source: kind.to_string(),
                    harvest: Some(harvest),
                    error: None,
                },
                Err(e) => {
                    error!(source = %kind, error = %e, "Source failed, moving on");
                    SourceOutcome {
                        source: kind.to_string(),
                        harvest: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            report.sources.push(outcome);
        }

        report.dedupe = Some(self.dedupe(mode, sources)?);
        Ok(report)
    }

    async fn harvest_one(&self, kind: SourceKind, queries: &[SearchQuery]) -> Result<HarvestReport> {
        let adapter = kind.build(&self.credentials, &self.options)?;
        harvest(adapter.as_ref(), queries, &self.sink).await
    }

    /// Rebuild the canonical table for `mode` from the given sources' tables.
    pub fn dedupe(&self, mode: Mode, sources: &[SourceKind]) -> Result<DedupeReport> {
        let tables: Vec<String> = sources.iter().map(SourceKind::table).collect();
        let deduplicator = match mode {
            Mode::Strict => Deduplicator::strict(self.profile.inclusion_predicate(), self.profile.year_range()),
            Mode::Grey => Deduplicator::grey(),
        };

        info!(mode = ?mode, tables = ?tables, "Deduplicating");
        deduplicator.run(&self.sink, &tables, mode.output())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Hit, Record, TableSchema};
    use tempfile::TempDir;

    #[test]
    fn test_source_names_round_trip() -> Result<()> {
        for mode in [Mode::Strict, Mode::Grey] {
            for kind in mode.default_sources() {
                assert_eq!(kind.to_string().parse::<SourceKind>()?, kind);
            }
        }
        assert!("altavista".parse::<SourceKind>().is_err());
        Ok(())
    }

    #[test]
    fn test_kind_tables_match_built_adapters() -> Result<()> {
        let creds = Credentials::from_pairs([("springer", "k"), ("scopus", "k")]);
        let options = SourceOptions::default();
        for mode in [Mode::Strict, Mode::Grey] {
            for kind in mode.default_sources() {
                let adapter = kind.build(&creds, &options)?;
                assert_eq!(adapter.table(), kind.table());
                assert_eq!(adapter.database(), kind.database());
            }
        }
        Ok(())
    }

    #[test]
    fn test_missing_key_fails_build() {
        let creds = Credentials::from_pairs(Vec::<(String, String)>::new());
        let result = SourceKind::Scopus.build(&creds, &SourceOptions::default());
        assert!(matches!(result, Err(LitfetchError::Config(_))));
    }

    #[test]
    fn test_queries_carry_profile_bounds() -> Result<()> {
        let dir = TempDir::new()?;
        let pipeline = Pipeline::new(
            RecordSink::new(dir.path())?,
            SearchProfile::default(),
            Credentials::default(),
            SourceOptions::default(),
        );
        let queries = pipeline.queries();
        assert_eq!(queries.len(), 7);
        assert!(queries[0].terms.ends_with("AND (home OR domestic)"));
        assert_eq!(queries[0].limit, 30);
        assert_eq!(queries[0].min_year, Some(2011));
        assert_eq!(queries[0].max_year, Some(2017));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_source_does_not_stop_pipeline() -> Result<()> {
        let dir = TempDir::new()?;
        let sink = RecordSink::new(dir.path())?;

        // An existing PubMed table from an earlier run
        sink.reset_table("pubmed", TableSchema::Standard)?;
        let record = Record::from_hit(
            Hit {
                title: "Ambient care robots".to_string(),
                authors: "A".to_string(),
                published: "2014".to_string(),
                source: "u".to_string(),
                record_type: None,
            },
            "01/01/2017",
            "PubMed",
        );
        sink.append("pubmed", TableSchema::Standard, &record)?;

        let pipeline = Pipeline::new(sink, SearchProfile::default(), Credentials::default(), SourceOptions::default());

        // Springer cannot be built without a key; dedupe still runs over PubMed
        let report = pipeline.run(Mode::Strict, &[SourceKind::Springer]).await?;
        assert_eq!(report.failed().count(), 1);
        assert_eq!(report.dedupe.as_ref().map(|d| d.missing_tables.clone()), Some(vec!["springer".to_string()]));

        let dedupe = pipeline.dedupe(Mode::Strict, &[SourceKind::Pubmed])?;
        assert_eq!(dedupe.retained, 1);
        Ok(())
    }
}
