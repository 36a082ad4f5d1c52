//! Canonical record schema shared by every source.
//!
//! Each adapter maps its own response shape into [`Hit`]s; the harvest harness
//! stamps the search date and database tag to produce a [`Record`], which is
//! then laid out as a table row according to a [`TableSchema`].

use serde::{Deserialize, Serialize};

/// Sentinel written when a source omits a field.
pub const NOT_AVAILABLE: &str = "Not available";

/// Sentinel year for items whose year could not be recovered.
pub const UNKNOWN_YEAR: &str = "0000";

/// Separator between author names within the `authors` field.
pub const AUTHOR_SEPARATOR: &str = ", ";

/// Date format of the `searched` column.
pub const SEARCHED_FORMAT: &str = "%d/%m/%Y";

/// Column headers of standard per-source and canonical tables.
pub const STANDARD_COLUMNS: &[&str] = &["searched", "title", "authors", "published", "database", "source"];

/// Column headers of grey-literature tables.
pub const GREY_COLUMNS: &[&str] = &[
    "Searched",
    "Title",
    "Authors",
    "Published",
    "Type",
    "Include?",
    "Exclusion code",
    "Database",
    "Source",
];

/// One item as discovered by an adapter, before it is stamped and persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hit {
    pub title: String,
    pub authors: String,
    pub published: String,
    pub source: String,
    /// Only meaningful for grey-literature sources
    pub record_type: Option<String>,
}

/// A canonical bibliographic entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Record {
    /// Date the query was issued (`dd/mm/yyyy`)
    pub searched: String,
    /// Title exactly as returned by the source; the deduplication key
    pub title: String,
    pub authors: String,
    /// Four digit year, or a malformed value kept verbatim
    pub published: String,
    /// Literal tag of the originating source
    pub database: String,
    /// URL or identifier of the original record
    pub source: String,
    pub record_type: Option<String>,
    /// Left empty by the pipeline, filled in during manual review
    pub include: Option<String>,
    /// Left empty by the pipeline, filled in during manual review
    pub exclusion_code: Option<String>,
}

impl Record {
    /// Stamp a discovered hit with its search date and database tag.
    pub fn from_hit(hit: Hit, searched: &str, database: &str) -> Self {
        Self {
            searched: searched.to_string(),
            title: hit.title,
            authors: hit.authors,
            published: hit.published,
            database: database.to_string(),
            source: hit.source,
            record_type: hit.record_type,
            include: None,
            exclusion_code: None,
        }
    }

    /// Publication year, if the `published` field is an integer.
    pub fn year(&self) -> Option<i32> {
        self.published.trim().parse().ok()
    }
}

/// Row layout of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableSchema {
    /// `searched,title,authors,published,database,source`
    Standard,
    /// Grey-literature layout with review placeholder columns
    Grey,
}

impl TableSchema {
    /// Column of the title in both layouts.
    pub const TITLE_COLUMN: usize = 1;
    /// Column of the publication year in both layouts.
    pub const PUBLISHED_COLUMN: usize = 3;

    pub fn header(&self) -> &'static [&'static str] {
        match self {
            TableSchema::Standard => STANDARD_COLUMNS,
            TableSchema::Grey => GREY_COLUMNS,
        }
    }

    /// Lay a record out in this schema's column order.
    pub fn row(&self, record: &Record) -> Vec<String> {
        match self {
            TableSchema::Standard => vec![
                record.searched.clone(),
                record.title.clone(),
                record.authors.clone(),
                record.published.clone(),
                record.database.clone(),
                record.source.clone(),
            ],
            TableSchema::Grey => vec![
                record.searched.clone(),
                record.title.clone(),
                record.authors.clone(),
                record.published.clone(),
                record.record_type.clone().unwrap_or_default(),
                record.include.clone().unwrap_or_default(),
                record.exclusion_code.clone().unwrap_or_default(),
                record.database.clone(),
                record.source.clone(),
            ],
        }
    }
}

/// Take the leading year component of a date string such as `2017-05-01`.
pub fn leading_year(date: &str, separator: char) -> String {
    date.trim()
        .split(separator)
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_YEAR)
        .to_string()
}

/// Join author names in the order given, or `Not available` when empty.
pub fn join_authors<I, S>(names: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = names
        .into_iter()
        .map(|n| n.as_ref().trim().to_string())
        .filter(|n| !n.is_empty())
        .collect::<Vec<_>>()
        .join(AUTHOR_SEPARATOR);

    if joined.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        joined
    }
}

/// Substitute the `Not available` sentinel for a missing or blank value.
pub fn or_not_available(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(NOT_AVAILABLE)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        Record::from_hit(
            Hit {
                title: "Arousal detection via wearables".to_string(),
                authors: "X".to_string(),
                published: "2016".to_string(),
                source: "u1".to_string(),
                record_type: Some("Preprint".to_string()),
            },
            "01/02/2017",
            "DB1",
        )
    }

    #[test]
    fn test_standard_row_order() {
        let row = TableSchema::Standard.row(&sample());
        assert_eq!(
            row,
            vec!["01/02/2017", "Arousal detection via wearables", "X", "2016", "DB1", "u1"]
        );
        assert_eq!(row.len(), TableSchema::Standard.header().len());
    }

    #[test]
    fn test_grey_row_leaves_review_columns_empty() {
        let row = TableSchema::Grey.row(&sample());
        assert_eq!(row.len(), GREY_COLUMNS.len());
        assert_eq!(row[4], "Preprint");
        assert_eq!(row[5], "");
        assert_eq!(row[6], "");
        assert_eq!(row[7], "DB1");
        assert_eq!(row[TableSchema::TITLE_COLUMN], "Arousal detection via wearables");
        assert_eq!(row[TableSchema::PUBLISHED_COLUMN], "2016");
    }

    #[test]
    fn test_leading_year() {
        assert_eq!(leading_year("2017-05-01", '-'), "2017");
        assert_eq!(leading_year("2009 Mar 12", ' '), "2009");
        assert_eq!(leading_year("", '-'), UNKNOWN_YEAR);
    }

    #[test]
    fn test_join_authors() {
        assert_eq!(join_authors(["Ada Lovelace", " ", "Alan Turing"]), "Ada Lovelace, Alan Turing");
        assert_eq!(join_authors(Vec::<String>::new()), NOT_AVAILABLE);
    }

    #[test]
    fn test_year() {
        let mut record = sample();
        assert_eq!(record.year(), Some(2016));
        record.published = "n.d.".to_string();
        assert_eq!(record.year(), None);
    }
}
