//! Google Scholar results-page scraper.
//!
//! One page is requested per 10-result offset until the query limit is
//! covered. Every page request is followed by a fixed pause so consecutive
//! requests never arrive faster than [`PAGE_DELAY`] apart.

use super::{fetch_text, RecordOutput, SearchQuery, SourceAdapter};
use crate::error::{LitfetchError, Result};
use crate::record::{or_not_available, Hit, NOT_AVAILABLE, UNKNOWN_YEAR};
use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Default Google Scholar URL
pub const DEFAULT_SCHOLAR_URL: &str = "https://scholar.google.co.uk";

/// Results per page served by Google Scholar
pub const PAGE_SIZE: usize = 10;

/// Pause between consecutive page requests
pub const PAGE_DELAY: Duration = Duration::from_secs(1);

/// User agent string for requests
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// One result block as it appears on the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScholarItem {
    pub title: String,
    pub link: Option<String>,
    /// Authorship/venue line, e.g. `J Doe, A Roe - Journal, 2016 - publisher.com`
    pub byline: String,
}

/// Google Scholar web adapter
pub struct ScholarAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl ScholarAdapter {
    pub fn new(base_url: Option<&str>, proxy: Option<&str>) -> Result<Self> {
        Ok(Self {
            client: build_scrape_client(proxy)?,
            base_url: base_url
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_SCHOLAR_URL.to_string()),
        })
    }
}

#[async_trait]
impl SourceAdapter for ScholarAdapter {
    fn database(&self) -> &str {
        "Google Scholar"
    }

    async fn produce(&self, query: &SearchQuery, out: &mut RecordOutput<'_>) -> Result<()> {
        let offsets = page_offsets(query.limit);
        info!(query = %query.terms, pages = offsets.len(), "Starting Google Scholar query");

        for start in offsets {
            let url = build_search_url(&self.base_url, query, start)?;
            debug!(start = start, url = %url, "Fetching page");

            let request = self
                .client
                .get(url.as_str())
                .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
                .header("Accept-Language", "en-GB,en;q=0.9");
            let html = fetch_text(request, "Google Scholar").await?;
            // Paces requests across pages and across queries of one harvest
            tokio::time::sleep(PAGE_DELAY).await;

            if html.contains("Solving the above CAPTCHA") || html.contains("unusual traffic") {
                warn!(start = start, "CAPTCHA detected");
                return Err(LitfetchError::Captcha);
            }

            let items = parse_result_items(&html)?;
            info!(start = start, count = items.len(), "Parsed results");

            for item in items {
                match item_to_hit(item) {
                    Some(hit) => out.emit(hit)?,
                    None => out.skip("result without a title link"),
                }
            }
        }

        Ok(())
    }
}

/// Result offsets covering `limit` results: `0, 10, 20, ...`
pub fn page_offsets(limit: usize) -> Vec<usize> {
    (0..limit).step_by(PAGE_SIZE).collect()
}

/// Build HTTP client with optional proxy
fn build_scrape_client(proxy: Option<&str>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .cookie_store(true);

    if let Some(proxy_url) = proxy {
        let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
            LitfetchError::Config(format!("Invalid proxy URL '{}': {}", proxy_url, e))
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| LitfetchError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Build Google Scholar search URL
fn build_search_url(base_url: &str, query: &SearchQuery, start: usize) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/scholar", base_url))
        .map_err(|e| LitfetchError::Config(format!("Invalid base URL: {}", e)))?;

    {
        let mut params = url.query_pairs_mut();
        params.append_pair("q", &query.terms);
        params.append_pair("hl", "en");
        params.append_pair("as_sdt", "0,5");
        if let Some(year) = query.min_year {
            params.append_pair("as_ylo", &year.to_string());
        }
        if let Some(year) = query.max_year {
            params.append_pair("as_yhi", &year.to_string());
        }
        params.append_pair("start", &start.to_string());
    }

    Ok(url)
}

/// Parse a results page into raw items, in page order.
pub fn parse_result_items(html: &str) -> Result<Vec<ScholarItem>> {
    let document = Html::parse_document(html);

    let item_selector = Selector::parse("div.gs_ri").map_err(|e| LitfetchError::Parse(e.to_string()))?;
    let link_selector = Selector::parse("h3 a[href]").map_err(|e| LitfetchError::Parse(e.to_string()))?;
    let byline_selector = Selector::parse("div.gs_a").map_err(|e| LitfetchError::Parse(e.to_string()))?;

    let mut items = Vec::new();

    for element in document.select(&item_selector) {
        let mut item = ScholarItem::default();

        if let Some(link) = element.select(&link_selector).next() {
            item.title = link.text().collect::<String>().trim().to_string();
            item.link = link.value().attr("href").map(str::to_string);
        }

        if let Some(byline) = element.select(&byline_selector).next() {
            item.byline = byline.text().collect::<String>().trim().to_string();
        }

        items.push(item);
    }

    Ok(items)
}

/// Map a scraped item to a hit; `None` when it carries no title.
pub fn item_to_hit(item: ScholarItem) -> Option<Hit> {
    if item.title.is_empty() {
        return None;
    }

    let authors = item
        .byline
        .split(" - ")
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(NOT_AVAILABLE)
        .to_string();

    Some(Hit {
        published: byline_year(&item.byline),
        title: item.title,
        authors,
        source: or_not_available(item.link.as_deref()),
        record_type: None,
    })
}

/// Recover the publication year from a byline.
///
/// The venue segment normally ends in `, 2016`; failing that, the first
/// standalone 4-digit number from 1000 to 3999 anywhere in the byline is
/// taken, which can pick up unrelated numbers. With no candidate at all the
/// year is `0000`.
pub fn byline_year(byline: &str) -> String {
    if let Some(venue) = byline.split(" - ").nth(1) {
        if let Some(last) = venue.rsplit(',').next() {
            let last = last.trim();
            if is_year_token(last) {
                return last.to_string();
            }
        }
    }

    match Regex::new(r"\b[1-3]\d{3}\b") {
        Ok(re) => re
            .find(byline)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| UNKNOWN_YEAR.to_string()),
        Err(_) => UNKNOWN_YEAR.to_string(),
    }
}

fn is_year_token(token: &str) -> bool {
    token.len() == 4
        && token.chars().all(|c| c.is_ascii_digit())
        && matches!(token.chars().next(), Some('1'..='3'))
}
