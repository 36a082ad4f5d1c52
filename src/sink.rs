//! Per-source CSV tables.
//!
//! Each adapter run owns exactly one table: it is truncated when the run
//! starts and appended to one row at a time, flushing after every row so a
//! failure mid-run leaves everything emitted so far on disk.

use crate::error::Result;
use crate::record::{Record, TableSchema};
use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory of per-source and canonical tables.
#[derive(Debug, Clone)]
pub struct RecordSink {
    dir: PathBuf,
}

impl RecordSink {
    /// Create a sink rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing a table name.
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", table))
    }

    pub fn table_exists(&self, table: &str) -> bool {
        self.table_path(table).is_file()
    }

    /// Truncate (or create) a table and write its header row.
    pub fn reset_table(&self, table: &str, schema: TableSchema) -> Result<()> {
        let path = self.table_path(table);
        let mut wtr = writer(File::create(&path)?);
        wtr.write_record(schema.header())?;
        wtr.flush()?;
        debug!(table = table, path = ?path, "Table reset");
        Ok(())
    }

    /// Append one record to a table and flush it.
    pub fn append(&self, table: &str, schema: TableSchema, record: &Record) -> Result<()> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.table_path(table))?;
        let mut wtr = writer(file);
        wtr.write_record(schema.row(record))?;
        wtr.flush()?;
        Ok(())
    }

    /// Replace a table with a header and the given rows.
    pub fn write_table(&self, table: &str, schema: TableSchema, rows: &[Vec<String>]) -> Result<()> {
        let mut wtr = writer(File::create(self.table_path(table))?);
        wtr.write_record(schema.header())?;
        for row in rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Read every row of a table, header included.
    pub fn read_table(&self, table: &str) -> Result<Vec<Vec<String>>> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(self.table_path(table))?;

        let mut rows = Vec::new();
        for row in rdr.records() {
            let row = row?;
            rows.push(row.iter().map(str::to_string).collect());
        }
        Ok(rows)
    }
}

fn writer<W: std::io::Write>(inner: W) -> csv::Writer<W> {
    WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Always)
        .from_writer(inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Hit;
    use tempfile::TempDir;

    fn record(title: &str) -> Record {
        Record::from_hit(
            Hit {
                title: title.to_string(),
                authors: "Doe, J".to_string(),
                published: "2016".to_string(),
                source: "https://example.org/1".to_string(),
                record_type: None,
            },
            "03/04/2017",
            "Google Scholar",
        )
    }

    #[test]
    fn test_reset_then_append() -> Result<()> {
        let dir = TempDir::new()?;
        let sink = RecordSink::new(dir.path())?;
        let r = record("A \"quoted\" title, with comma");

        sink.reset_table("scholar", TableSchema::Standard)?;
        sink.append("scholar", TableSchema::Standard, &r)?;

        let rows = sink.read_table("scholar")?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], TableSchema::Standard.header());
        assert_eq!(rows[1], TableSchema::Standard.row(&r));
        Ok(())
    }

    #[test]
    fn test_reset_truncates_previous_run() -> Result<()> {
        let dir = TempDir::new()?;
        let sink = RecordSink::new(dir.path())?;

        sink.reset_table("scholar", TableSchema::Standard)?;
        sink.append("scholar", TableSchema::Standard, &record("first run"))?;
        sink.reset_table("scholar", TableSchema::Standard)?;
        sink.append("scholar", TableSchema::Standard, &record("second run"))?;

        let rows = sink.read_table("scholar")?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][TableSchema::TITLE_COLUMN], "second run");
        Ok(())
    }

    #[test]
    fn test_every_field_quoted() -> Result<()> {
        let dir = TempDir::new()?;
        let sink = RecordSink::new(dir.path())?;
        sink.reset_table("t", TableSchema::Standard)?;

        let text = std::fs::read_to_string(sink.table_path("t"))?;
        assert_eq!(
            text.trim_end(),
            "\"searched\",\"title\",\"authors\",\"published\",\"database\",\"source\""
        );
        Ok(())
    }

    #[test]
    fn test_missing_table() -> Result<()> {
        let dir = TempDir::new()?;
        let sink = RecordSink::new(dir.path())?;
        assert!(!sink.table_exists("nope"));
        assert!(sink.read_table("nope").is_err());
        Ok(())
    }
}
