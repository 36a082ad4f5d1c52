//! Crossref works API, narrowed to one publisher member.
//!
//! The same adapter serves several publisher feeds; only the member id and
//! the database tag change between them.

use super::{build_http_client, fetch_text, RecordOutput, SearchQuery, SourceAdapter};
use crate::error::{LitfetchError, Result};
use crate::record::{or_not_available, Hit, AUTHOR_SEPARATOR, NOT_AVAILABLE, UNKNOWN_YEAR};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

/// Crossref API base URL
const CROSSREF_API_URL: &str = "https://api.crossref.org/works";

/// Publishers with a preset Crossref member id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publisher {
    Acm,
    Ieee,
    Springer,
    Elsevier,
}

impl Publisher {
    pub const ALL: [Publisher; 4] = [Publisher::Acm, Publisher::Ieee, Publisher::Springer, Publisher::Elsevier];

    /// Crossref member id
    pub fn member_id(&self) -> u32 {
        match self {
            Publisher::Acm => 320,
            Publisher::Ieee => 263,
            Publisher::Springer => 297,
            Publisher::Elsevier => 78,
        }
    }

    pub fn database(&self) -> &'static str {
        match self {
            Publisher::Acm => "ACM - Crossref",
            Publisher::Ieee => "IEEE - Crossref",
            Publisher::Springer => "Springer - Crossref",
            Publisher::Elsevier => "Elsevier - Crossref",
        }
    }
}

/// Crossref adapter for one publisher member
pub struct CrossrefAdapter {
    client: reqwest::Client,
    member_id: u32,
    database: String,
}

impl CrossrefAdapter {
    pub fn new(member_id: u32, database: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
            member_id,
            database: database.into(),
        })
    }

    pub fn publisher(publisher: Publisher) -> Result<Self> {
        Self::new(publisher.member_id(), publisher.database())
    }

    fn filter(&self, query: &SearchQuery) -> String {
        match query.min_year {
            Some(year) => format!("member:{},from-pub-date:{}", self.member_id, year),
            None => format!("member:{}", self.member_id),
        }
    }
}

#[async_trait]
impl SourceAdapter for CrossrefAdapter {
    fn database(&self) -> &str {
        &self.database
    }

    async fn produce(&self, query: &SearchQuery, out: &mut RecordOutput<'_>) -> Result<()> {
        let rows = query.limit.to_string();
        let filter = self.filter(query);

        let request = self.client.get(CROSSREF_API_URL).query(&[
            ("query.bibliographic", query.terms.as_str()),
            ("rows", rows.as_str()),
            ("filter", filter.as_str()),
            ("select", "title,author,issued,published-print,published-online,URL"),
        ]);
        debug!(member = self.member_id, filter = %filter, "Querying Crossref");

        let body = fetch_text(request, "Crossref").await?;
        let data: CrossrefResponse = serde_json::from_str(&body)
            .map_err(|e| LitfetchError::Parse(format!("Failed to parse Crossref response: {}", e)))?;

        info!(database = %self.database, count = data.message.items.len(), "Crossref items received");

        for value in data.message.items {
            match value_to_hit(value) {
                Ok(Some(hit)) => out.emit(hit)?,
                Ok(None) => out.skip("Crossref item without a title"),
                Err(e) => out.skip(&format!("unreadable Crossref item: {}", e)),
            }
        }

        Ok(())
    }
}

// === Crossref API Response Types ===

#[derive(Debug, Deserialize)]
struct CrossrefResponse {
    message: CrossrefMessage,
}

/// Items stay untyped until each one is decoded on its own.
#[derive(Debug, Deserialize)]
struct CrossrefMessage {
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CrossrefItem {
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    author: Option<Vec<CrossrefAuthor>>,
    #[serde(default)]
    issued: Option<CrossrefDate>,
    #[serde(rename = "published-print", default)]
    published_print: Option<CrossrefDate>,
    #[serde(rename = "published-online", default)]
    published_online: Option<CrossrefDate>,
    #[serde(rename = "URL", default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CrossrefAuthor {
    #[serde(default)]
    given: String,
    #[serde(default)]
    family: String,
}

#[derive(Debug, Deserialize)]
struct CrossrefDate {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<i32>>>,
}

impl CrossrefDate {
    fn year(&self) -> Option<i32> {
        self.date_parts.first().and_then(|parts| parts.first().copied().flatten())
    }
}

fn value_to_hit(value: Value) -> Result<Option<Hit>> {
    let item: CrossrefItem = serde_json::from_value(value)?;
    Ok(item_to_hit(item))
}

fn item_to_hit(item: CrossrefItem) -> Option<Hit> {
    let title = item.title.into_iter().next().filter(|t| !t.trim().is_empty())?;

    let published = [&item.issued, &item.published_print, &item.published_online]
        .into_iter()
        .flatten()
        .find_map(CrossrefDate::year)
        .map(|y| y.to_string())
        .unwrap_or_else(|| UNKNOWN_YEAR.to_string());

    Some(Hit {
        title,
        authors: reversed_authors(item.author.as_deref().unwrap_or_default()),
        published,
        source: or_not_available(item.url.as_deref()),
        record_type: None,
    })
}

/// Each author is prepended to the accumulator, so the result lists the
/// authors in the reverse of Crossref's order. Historical output depends on
/// this order.
fn reversed_authors(authors: &[CrossrefAuthor]) -> String {
    let mut acc = String::new();
    for author in authors {
        let name = format!("{} {}", author.given, author.family).trim().to_string();
        if name.is_empty() {
            continue;
        }
        acc = if acc.is_empty() {
            name
        } else {
            format!("{}{}{}", name, AUTHOR_SEPARATOR, acc)
        };
    }

    if acc.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"{
      "status": "ok",
      "message": {
        "items": [
          {
            "title": ["Ambient assisted living platforms"],
            "author": [
              {"given": "Ada", "family": "Lovelace"},
              {"given": "Alan", "family": "Turing"},
              {"family": "Hopper"}
            ],
            "issued": {"date-parts": [[2015, 3, 2]]},
            "URL": "http://dx.doi.org/10.1145/1"
          },
          {
            "title": ["Untitled authorship"],
            "issued": {"date-parts": [[null]]},
            "published-print": {"date-parts": [[2013]]}
          },
          {
            "author": [{"given": "No", "family": "Title"}]
          }
        ]
      }
    }"#;

    fn items() -> Vec<CrossrefItem> {
        let data: CrossrefResponse = serde_json::from_str(RESPONSE).expect("fixture parses");
        data.message
            .items
            .into_iter()
            .map(|v| serde_json::from_value(v).expect("fixture item decodes"))
            .collect()
    }

    #[test]
    fn test_authors_are_reversed() {
        let hit = items().into_iter().next().and_then(item_to_hit).expect("first item maps");
        assert_eq!(hit.authors, "Hopper, Alan Turing, Ada Lovelace");
        assert_eq!(hit.published, "2015");
        assert_eq!(hit.source, "http://dx.doi.org/10.1145/1");
    }

    #[test]
    fn test_missing_fields_degrade() {
        let hit = items().into_iter().nth(1).and_then(item_to_hit).expect("second item maps");
        assert_eq!(hit.authors, NOT_AVAILABLE);
        assert_eq!(hit.source, NOT_AVAILABLE);
        assert_eq!(hit.published, "2013");
    }

    #[test]
    fn test_missing_title_skips_item() {
        assert!(items().into_iter().nth(2).and_then(item_to_hit).is_none());
    }

    #[test]
    fn test_bad_item_does_not_sink_batch() {
        let body = r#"{"message": {"items": [
            {"title": ["Good paper"], "URL": "u1"},
            {"title": ["Bad paper"], "URL": 42}
        ]}}"#;
        let data: CrossrefResponse = serde_json::from_str(body).expect("envelope parses");
        let mut mapped = data.message.items.into_iter().map(value_to_hit);

        let good = mapped.next().expect("two items").expect("good item decodes");
        assert_eq!(good.map(|h| h.source), Some("u1".to_string()));
        assert!(matches!(mapped.next(), Some(Err(LitfetchError::Json(_)))));
    }

    #[test]
    fn test_filter_and_presets() -> Result<()> {
        let adapter = CrossrefAdapter::publisher(Publisher::Acm)?;
        assert_eq!(adapter.database(), "ACM - Crossref");
        assert_eq!(adapter.table(), "acm_crossref");

        let query = SearchQuery::new("q", 30).with_years(2011, 2017);
        assert_eq!(adapter.filter(&query), "member:320,from-pub-date:2011");
        assert_eq!(adapter.filter(&SearchQuery::new("q", 30)), "member:320");
        Ok(())
    }
}
