//! Merge per-source tables into one canonical, filtered table.
//!
//! Rows are collapsed by their exact title: the last matching row seen while
//! scanning tables in caller order wins, but a title keeps the position at
//! which it was first inserted. Titles are not normalized, so titles that
//! differ only in case or punctuation stay separate rows.

use crate::error::Result;
use crate::record::TableSchema;
use crate::sink::RecordSink;
use serde::Serialize;
use std::collections::HashMap;
use std::ops::{Bound, RangeBounds};
use tracing::{debug, info, warn};

/// Keyword groups matched against a title.
///
/// Every group must contribute at least one term that occurs in the title,
/// compared case-insensitively as a substring.
#[derive(Debug, Clone, Default)]
pub struct InclusionPredicate {
    groups: Vec<Vec<String>>,
}

impl InclusionPredicate {
    pub fn new(groups: Vec<Vec<String>>) -> Self {
        let groups = groups
            .into_iter()
            .map(|g| {
                g.into_iter()
                    .map(|t| t.trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|g| !g.is_empty())
            .collect();
        Self { groups }
    }

    /// Every term listed is required.
    pub fn all_of<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(terms.into_iter().map(|t| vec![t.into()]).collect())
    }

    pub fn matches(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        self.groups
            .iter()
            .all(|group| group.iter().any(|term| title.contains(term.as_str())))
    }
}

/// Publication-year window with independent inclusive/exclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub start: Bound<i32>,
    pub end: Bound<i32>,
}

impl Default for YearRange {
    fn default() -> Self {
        Self {
            start: Bound::Unbounded,
            end: Bound::Unbounded,
        }
    }
}

impl YearRange {
    /// Years strictly greater than `year`.
    pub fn after(year: i32) -> Self {
        Self {
            start: Bound::Excluded(year),
            end: Bound::Unbounded,
        }
    }

    /// Cap the range at `year`, inclusive.
    pub fn until(self, year: i32) -> Self {
        Self {
            end: Bound::Included(year),
            ..self
        }
    }

    pub fn contains(&self, year: i32) -> bool {
        RangeBounds::contains(&(self.start, self.end), &year)
    }
}

/// What a row must satisfy to enter the canonical table.
#[derive(Debug, Clone)]
pub enum FilterPolicy {
    /// Keyword inclusion plus a year range; rows without an integer year drop out
    Strict {
        predicate: InclusionPredicate,
        years: YearRange,
    },
    /// Deduplicate only
    Grey,
}

/// Counts from one deduplication run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DedupeReport {
    /// Data rows read across all tables (headers excluded)
    pub scanned: usize,
    /// Rows in the canonical table
    pub retained: usize,
    /// Rows whose year was missing or not an integer
    pub skipped_year: usize,
    /// Rows rejected by the keyword predicate or the year range
    pub excluded: usize,
    /// Rows too short to carry a title and year
    pub malformed: usize,
    /// Tables named by the caller that do not exist
    pub missing_tables: Vec<String>,
}

/// Title-keyed map that keeps first-insertion order and overwrites values.
#[derive(Debug, Default)]
struct TitleMap {
    index: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl TitleMap {
    fn insert(&mut self, title: &str, row: Vec<String>) {
        match self.index.get(title) {
            Some(&pos) => self.rows[pos] = row,
            None => {
                self.index.insert(title.to_string(), self.rows.len());
                self.rows.push(row);
            }
        }
    }
}

/// Builds a canonical table from per-source tables.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    policy: FilterPolicy,
    schema: TableSchema,
}

impl Deduplicator {
    pub fn new(policy: FilterPolicy, schema: TableSchema) -> Self {
        Self { policy, schema }
    }

    pub fn strict(predicate: InclusionPredicate, years: YearRange) -> Self {
        Self::new(FilterPolicy::Strict { predicate, years }, TableSchema::Standard)
    }

    pub fn grey() -> Self {
        Self::new(FilterPolicy::Grey, TableSchema::Grey)
    }

    /// Scan `tables` in order and rebuild the `output` table from scratch.
    pub fn run(&self, sink: &RecordSink, tables: &[String], output: &str) -> Result<DedupeReport> {
        let mut report = DedupeReport::default();
        let mut map = TitleMap::default();

        for table in tables {
            if !sink.table_exists(table) {
                warn!(table = %table, "Source table missing, skipping");
                report.missing_tables.push(table.clone());
                continue;
            }

            let rows = sink.read_table(table)?;
            let before = report.scanned;

            for row in rows.into_iter().skip(1) {
                report.scanned += 1;
                self.consider(row, &mut map, &mut report);
            }

            debug!(table = %table, rows = report.scanned - before, "Scanned table");
        }

        sink.write_table(output, self.schema, &map.rows)?;
        report.retained = map.rows.len();

        info!(
            output = output,
            scanned = report.scanned,
            retained = report.retained,
            skipped_year = report.skipped_year,
            excluded = report.excluded,
            "Deduplication complete"
        );

        Ok(report)
    }

    fn consider(&self, row: Vec<String>, map: &mut TitleMap, report: &mut DedupeReport) {
        if row.len() <= TableSchema::PUBLISHED_COLUMN {
            report.malformed += 1;
            return;
        }
        let title = row[TableSchema::TITLE_COLUMN].clone();

        if let FilterPolicy::Strict { predicate, years } = &self.policy {
            let year = match row[TableSchema::PUBLISHED_COLUMN].trim().parse::<i32>() {
                Ok(year) => year,
                Err(_) => {
                    report.skipped_year += 1;
                    return;
                }
            };
            if !predicate.matches(&title) || !years.contains(year) {
                report.excluded += 1;
                return;
            }
        }

        map.insert(&title, row);
    }
}
