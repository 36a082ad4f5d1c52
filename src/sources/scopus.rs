//! Elsevier Scopus Search API.
//!
//! Scopus reports an empty result set as a single entry carrying only an
//! `error` field; that entry is not an item and yields nothing.

use super::{build_http_client, fetch_text, RecordOutput, SearchQuery, SourceAdapter};
use crate::config::Credentials;
use crate::error::{LitfetchError, Result};
use crate::record::{join_authors, leading_year, or_not_available, Hit};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

const SCOPUS_API_URL: &str = "https://api.elsevier.com/content/search/scopus";

/// Credential name of the API key
pub const KEY_NAME: &str = "scopus";

pub struct ScopusAdapter {
    client: reqwest::Client,
    api_key: String,
}

impl ScopusAdapter {
    /// Fails when no `scopus` key is configured.
    pub fn new(credentials: &Credentials) -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
            api_key: credentials.require(KEY_NAME)?,
        })
    }
}

#[async_trait]
impl SourceAdapter for ScopusAdapter {
    fn database(&self) -> &str {
        "Scopus"
    }

    async fn produce(&self, query: &SearchQuery, out: &mut RecordOutput<'_>) -> Result<()> {
        let count = query.limit.to_string();
        let mut terms = format!("TITLE-ABS-KEY({})", query.terms);
        if let Some(year) = query.min_year {
            terms.push_str(&format!(" AND PUBYEAR > {}", year - 1));
        }

        let request = self
            .client
            .get(SCOPUS_API_URL)
            .header("X-ELS-APIKey", self.api_key.as_str())
            .header("Accept", "application/json")
            .query(&[("query", terms.as_str()), ("count", count.as_str())]);

        let body = fetch_text(request, "Scopus").await?;
        let response: ScopusResponse = serde_json::from_str(&body)
            .map_err(|e| LitfetchError::Parse(format!("Failed to parse Scopus response: {}", e)))?;

        let entries = response.search_results.entry;
        info!(count = entries.len(), "Scopus entries received");

        for value in entries {
            let entry = match decode_entry(value) {
                Ok(entry) => entry,
                Err(e) => {
                    out.skip(&format!("unreadable Scopus entry: {}", e));
                    continue;
                }
            };
            if entry.error.is_some() {
                continue;
            }
            match entry_to_hit(entry) {
                Some(hit) => out.emit(hit)?,
                None => out.skip("Scopus entry without a title"),
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ScopusResponse {
    #[serde(rename = "search-results")]
    search_results: ScopusResults,
}

#[derive(Debug, Deserialize)]
struct ScopusResults {
    #[serde(default)]
    entry: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ScopusEntry {
    #[serde(rename = "dc:title")]
    title: Option<String>,
    #[serde(rename = "dc:creator")]
    creator: Option<String>,
    #[serde(rename = "prism:coverDate")]
    cover_date: Option<String>,
    #[serde(default)]
    link: Vec<ScopusLink>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScopusLink {
    #[serde(rename = "@href")]
    href: Option<String>,
}

fn decode_entry(value: Value) -> Result<ScopusEntry> {
    Ok(serde_json::from_value(value)?)
}

fn entry_to_hit(entry: ScopusEntry) -> Option<Hit> {
    let title = entry.title.filter(|t| !t.trim().is_empty())?;
    Some(Hit {
        title,
        authors: join_authors(entry.creator.as_deref()),
        published: leading_year(entry.cover_date.as_deref().unwrap_or_default(), '-'),
        source: or_not_available(entry.link.first().and_then(|l| l.href.as_deref())),
        record_type: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NOT_AVAILABLE;

    #[test]
    fn test_entry_mapping() {
        let body = r#"{
          "search-results": {
            "opensearch:totalResults": "2",
            "entry": [
              {
                "dc:title": "Affective computing in smart homes",
                "dc:creator": "Smith J.",
                "prism:coverDate": "2014-11-30",
                "link": [{"@ref": "self", "@href": "https://api.elsevier.com/content/abstract/scopus_id/1"},
                         {"@ref": "scopus", "@href": "https://www.scopus.com/1"}]
              },
              {"dc:title": "Sparse entry"}
            ]
          }
        }"#;
        let response: ScopusResponse = serde_json::from_str(body).expect("fixture parses");
        let mut hits = response
            .search_results
            .entry
            .into_iter()
            .map(|v| decode_entry(v).expect("fixture entry decodes"))
            .map(entry_to_hit);

        let first = hits.next().flatten().expect("first maps");
        assert_eq!(first.authors, "Smith J.");
        assert_eq!(first.published, "2014");
        assert_eq!(first.source, "https://api.elsevier.com/content/abstract/scopus_id/1");

        let second = hits.next().flatten().expect("second maps");
        assert_eq!(second.authors, NOT_AVAILABLE);
        assert_eq!(second.source, NOT_AVAILABLE);
    }

    #[test]
    fn test_empty_result_set_entry() {
        let body = r#"{"search-results": {"entry": [{"@_fa": "true", "error": "Result set was empty"}]}}"#;
        let response: ScopusResponse = serde_json::from_str(body).expect("fixture parses");
        assert_eq!(response.search_results.entry.len(), 1);
        let entry = response.search_results.entry.into_iter().next().map(decode_entry);
        assert!(matches!(entry, Some(Ok(ScopusEntry { error: Some(_), .. }))));
    }

    #[test]
    fn test_bad_entry_is_skipped_alone() {
        let body = r#"{"search-results": {"entry": [
            {"dc:title": "Readable", "prism:coverDate": "2012-05-01"},
            {"dc:title": "Link as a string", "link": "https://www.scopus.com/2"}
        ]}}"#;
        let response: ScopusResponse = serde_json::from_str(body).expect("envelope parses");
        let mut decoded = response.search_results.entry.into_iter().map(decode_entry);

        let first = decoded.next().expect("two entries").expect("first decodes");
        assert_eq!(entry_to_hit(first).map(|h| h.published), Some("2012".to_string()));
        assert!(matches!(decoded.next(), Some(Err(LitfetchError::Json(_)))));
    }
}
