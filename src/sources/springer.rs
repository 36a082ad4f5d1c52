//! Springer Nature Meta API.

use super::{build_http_client, fetch_text, RecordOutput, SearchQuery, SourceAdapter};
use crate::config::Credentials;
use crate::error::{LitfetchError, Result};
use crate::record::{join_authors, leading_year, or_not_available, Hit};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

const SPRINGER_API_URL: &str = "https://api.springernature.com/meta/v2/json";

/// Credential name of the API key
pub const KEY_NAME: &str = "springer";

pub struct SpringerAdapter {
    client: reqwest::Client,
    api_key: String,
}

impl SpringerAdapter {
    /// Fails when no `springer` key is configured.
    pub fn new(credentials: &Credentials) -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
            api_key: credentials.require(KEY_NAME)?,
        })
    }
}

#[async_trait]
impl SourceAdapter for SpringerAdapter {
    fn database(&self) -> &str {
        "Springer"
    }

    async fn produce(&self, query: &SearchQuery, out: &mut RecordOutput<'_>) -> Result<()> {
        let limit = query.limit.to_string();
        let request = self.client.get(SPRINGER_API_URL).query(&[
            ("q", query.terms.as_str()),
            ("p", limit.as_str()),
            ("api_key", self.api_key.as_str()),
        ]);

        let body = fetch_text(request, "Springer").await?;
        let response: SpringerResponse = serde_json::from_str(&body)
            .map_err(|e| LitfetchError::Parse(format!("Failed to parse Springer response: {}", e)))?;

        info!(count = response.records.len(), "Springer records received");

        for value in response.records {
            match value_to_hit(value) {
                Ok(Some(hit)) => out.emit(hit)?,
                Ok(None) => out.skip("Springer record without a title"),
                Err(e) => out.skip(&format!("unreadable Springer record: {}", e)),
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SpringerResponse {
    #[serde(default)]
    records: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct SpringerRecord {
    title: Option<String>,
    #[serde(default)]
    creators: Vec<SpringerCreator>,
    #[serde(rename = "publicationDate")]
    publication_date: Option<String>,
    #[serde(default)]
    url: Vec<SpringerUrl>,
}

#[derive(Debug, Deserialize)]
struct SpringerCreator {
    #[serde(default)]
    creator: String,
}

#[derive(Debug, Deserialize)]
struct SpringerUrl {
    value: Option<String>,
}

fn value_to_hit(value: Value) -> Result<Option<Hit>> {
    let record: SpringerRecord = serde_json::from_value(value)?;
    Ok(record_to_hit(record))
}

fn record_to_hit(record: SpringerRecord) -> Option<Hit> {
    let title = record.title.filter(|t| !t.trim().is_empty())?;
    Some(Hit {
        title,
        authors: join_authors(record.creators.iter().map(|c| c.creator.as_str())),
        published: leading_year(record.publication_date.as_deref().unwrap_or_default(), '-'),
        source: or_not_available(record.url.first().and_then(|u| u.value.as_deref())),
        record_type: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{NOT_AVAILABLE, UNKNOWN_YEAR};

    #[test]
    fn test_record_mapping() {
        let body = r#"{
          "records": [
            {
              "title": "Smart environments for the elderly",
              "creators": [{"creator": "Doe, Jane"}, {"creator": "Roe, Rick"}],
              "publicationDate": "2016-08-01",
              "url": [{"format": "", "platform": "", "value": "http://dx.doi.org/10.1007/x"},
                      {"format": "html", "value": "http://link.springer.com/x"}]
            },
            {"title": "No extras"},
            {"creators": [{"creator": "Nobody"}]}
          ]
        }"#;
        let response: SpringerResponse = serde_json::from_str(body).expect("fixture parses");
        let hits: Vec<Option<Hit>> = response
            .records
            .into_iter()
            .map(|v| value_to_hit(v).expect("fixture record decodes"))
            .collect();

        let first = hits[0].as_ref().expect("first maps");
        assert_eq!(first.authors, "Doe, Jane, Roe, Rick");
        assert_eq!(first.published, "2016");
        assert_eq!(first.source, "http://dx.doi.org/10.1007/x");

        let second = hits[1].as_ref().expect("second maps");
        assert_eq!(second.published, UNKNOWN_YEAR);
        assert_eq!(second.source, NOT_AVAILABLE);

        assert!(hits[2].is_none());
    }

    #[test]
    fn test_bad_record_is_skipped_alone() {
        let body = r#"{"records": [
            {"title": "Readable", "publicationDate": "2013-01-01"},
            {"title": "Creators as a string", "creators": "Doe, Jane"}
        ]}"#;
        let response: SpringerResponse = serde_json::from_str(body).expect("envelope parses");
        let mapped: Vec<Result<Option<Hit>>> = response.records.into_iter().map(value_to_hit).collect();

        match &mapped[0] {
            Ok(Some(hit)) => assert_eq!(hit.published, "2013"),
            other => panic!("first record should map, got {:?}", other),
        }
        assert!(matches!(mapped[1], Err(LitfetchError::Json(_))));
    }

    #[test]
    fn test_requires_key() {
        let creds = Credentials::from_pairs(Vec::<(String, String)>::new());
        assert!(matches!(SpringerAdapter::new(&creds), Err(LitfetchError::Config(_))));
        assert!(SpringerAdapter::new(&Credentials::from_pairs([(KEY_NAME, "k")])).is_ok());
    }
}
