//! PubMed via NCBI E-utilities.
//!
//! Two steps: `esearch` resolves the query to a list of PMIDs, then one
//! `esummary` request per PMID fetches its summary. A failed summary is
//! logged and skipped; the remaining PMIDs are still fetched.

use super::{build_http_client, fetch_text, RecordOutput, SearchQuery, SourceAdapter};
use crate::config::Credentials;
use crate::error::{LitfetchError, OptionExt, Result};
use crate::record::{join_authors, leading_year, Hit};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

const EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Landing page of a PubMed record
const PUBMED_RECORD_URL: &str = "https://www.ncbi.nlm.nih.gov/pubmed";

/// Optional credential raising the NCBI rate limit
pub const KEY_NAME: &str = "pubmed";

/// Spacing of summary requests without a key (NCBI allows 3 per second)
pub const KEYLESS_DELAY: Duration = Duration::from_millis(350);

/// Spacing of summary requests with a key (NCBI allows 10 per second)
pub const KEYED_DELAY: Duration = Duration::from_millis(110);

pub struct PubmedAdapter {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl PubmedAdapter {
    pub fn new(credentials: &Credentials) -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
            api_key: credentials.get(KEY_NAME).map(str::to_string),
        })
    }

    /// Pause between consecutive E-utilities requests.
    pub fn request_delay(&self) -> Duration {
        if self.api_key.is_some() {
            KEYED_DELAY
        } else {
            KEYLESS_DELAY
        }
    }

    fn with_key(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    async fn search_ids(&self, query: &SearchQuery) -> Result<Vec<String>> {
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("term", query.terms.clone()),
            ("retmode", "json".to_string()),
            ("retmax", query.limit.to_string()),
        ];
        if let (Some(min), Some(max)) = (query.min_year, query.max_year) {
            params.push(("datetype", "pdat".to_string()));
            params.push(("mindate", min.to_string()));
            params.push(("maxdate", max.to_string()));
        }

        let request = self
            .client
            .get(format!("{}/esearch.fcgi", EUTILS_BASE))
            .query(&self.with_key(params));
        let body = fetch_text(request, "PubMed esearch").await?;
        parse_id_list(&body)
    }

    async fn fetch_summary(&self, id: &str) -> Result<Hit> {
        let params = vec![
            ("db", "pubmed".to_string()),
            ("id", id.to_string()),
            ("retmode", "json".to_string()),
        ];
        let request = self
            .client
            .get(format!("{}/esummary.fcgi", EUTILS_BASE))
            .query(&self.with_key(params));
        let body = fetch_text(request, "PubMed esummary").await?;
        parse_summary(&body, id)
    }
}

#[async_trait]
impl SourceAdapter for PubmedAdapter {
    fn database(&self) -> &str {
        "PubMed"
    }

    async fn produce(&self, query: &SearchQuery, out: &mut RecordOutput<'_>) -> Result<()> {
        let ids = self.search_ids(query).await?;
        info!(count = ids.len(), "PubMed ids resolved");

        for id in ids {
            tokio::time::sleep(self.request_delay()).await;
            match self.fetch_summary(&id).await {
                Ok(hit) => out.emit(hit)?,
                Err(e) => {
                    warn!(pmid = %id, error = %e, "Summary fetch failed");
                    out.skip("PubMed summary unavailable");
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchResult,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

fn parse_id_list(body: &str) -> Result<Vec<String>> {
    let response: ESearchResponse = serde_json::from_str(body)
        .map_err(|e| LitfetchError::Parse(format!("Failed to parse esearch response: {}", e)))?;
    Ok(response.esearchresult.idlist)
}

/// Map the `esummary` document for `id` to a hit.
fn parse_summary(body: &str, id: &str) -> Result<Hit> {
    let value: Value = serde_json::from_str(body)?;
    let doc = value
        .get("result")
        .and_then(|r| r.get(id))
        .ok_or_parse("summary missing from esummary result")?;

    if let Some(error) = doc.get("error").and_then(Value::as_str) {
        return Err(LitfetchError::Api {
            code: 200,
            message: format!("esummary: {}", error),
        });
    }

    let title = doc
        .get("title")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .ok_or_parse("summary without title")?;

    let authors = doc
        .get("authors")
        .and_then(Value::as_array)
        .map(|list| {
            join_authors(list.iter().filter_map(|a| a.get("name").and_then(Value::as_str)))
        })
        .unwrap_or_else(|| join_authors(None::<&str>));

    let pubdate = doc.get("pubdate").and_then(Value::as_str).unwrap_or_default();
    debug!(pmid = id, pubdate = pubdate, "Mapped summary");

    Ok(Hit {
        title: title.to_string(),
        authors,
        published: leading_year(pubdate, ' '),
        source: format!("{}/{}", PUBMED_RECORD_URL, id),
        record_type: None,
    })
}
