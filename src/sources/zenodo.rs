//! Zenodo records API (grey literature).
//!
//! Hits are mapped from loosely typed JSON; a hit missing any nested key is
//! skipped without affecting the rest of the batch.

use super::{build_http_client, fetch_text, RecordOutput, SearchQuery, SourceAdapter};
use crate::error::{LitfetchError, Result};
use crate::record::{join_authors, leading_year, Hit, TableSchema};
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

const ZENODO_API_URL: &str = "https://zenodo.org/api/records";

pub struct ZenodoAdapter {
    client: reqwest::Client,
}

impl ZenodoAdapter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
        })
    }
}

#[async_trait]
impl SourceAdapter for ZenodoAdapter {
    fn database(&self) -> &str {
        "Zenodo"
    }

    fn schema(&self) -> TableSchema {
        TableSchema::Grey
    }

    async fn produce(&self, query: &SearchQuery, out: &mut RecordOutput<'_>) -> Result<()> {
        let size = query.limit.to_string();
        let request = self
            .client
            .get(ZENODO_API_URL)
            .query(&[("q", query.terms.as_str()), ("size", size.as_str())]);

        let body = fetch_text(request, "Zenodo").await?;
        let hits = parse_hits(&body)?;
        info!(count = hits.len(), "Zenodo hits received");

        for hit in &hits {
            match hit_to_record(hit) {
                Some(hit) => out.emit(hit)?,
                None => out.skip("Zenodo hit missing metadata"),
            }
        }
        Ok(())
    }
}

/// The `hits.hits` array of a search response.
fn parse_hits(body: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| LitfetchError::Parse(format!("Failed to parse Zenodo response: {}", e)))?;
    value
        .get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| LitfetchError::Parse("Zenodo response without hits array".to_string()))
}

fn hit_to_record(hit: &Value) -> Option<Hit> {
    let metadata = hit.get("metadata")?;
    let title = metadata.get("title")?.as_str()?;
    if title.trim().is_empty() {
        return None;
    }

    let creators = metadata.get("creators")?.as_array()?;
    let names = creators
        .iter()
        .map(|c| c.get("name").and_then(Value::as_str))
        .collect::<Option<Vec<_>>>()?;

    let date = metadata.get("publication_date")?.as_str()?;
    let record_type = metadata.get("resource_type")?.get("title")?.as_str()?;
    let link = hit.get("links")?.get("html")?.as_str()?;

    Some(Hit {
        title: title.to_string(),
        authors: join_authors(names),
        published: leading_year(date, '-'),
        source: link.to_string(),
        record_type: Some(record_type.to_string()),
    })
}
