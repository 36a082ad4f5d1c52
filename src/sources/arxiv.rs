//! arXiv Atom feed (grey literature).
//!
//! The default Atom namespace declaration is stripped before parsing so that
//! element names compare as plain strings. Each `entry` is then read as an
//! ordered list of child elements and mapped by position: `id` (0),
//! `published` (2) and `title` (3). An entry whose children do not line up is
//! skipped on its own.

use super::{build_http_client, fetch_text, RecordOutput, SearchQuery, SourceAdapter};
use crate::error::{LitfetchError, Result};
use crate::record::{join_authors, leading_year, Hit, TableSchema};
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use regex::Regex;
use tracing::{info, warn};

const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";

const ID_POSITION: usize = 0;
const PUBLISHED_POSITION: usize = 2;
const TITLE_POSITION: usize = 3;

/// One direct child of an `entry` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryChild {
    pub name: String,
    pub text: String,
    /// Text of nested elements, e.g. `name` inside `author`
    pub fields: Vec<(String, String)>,
}

impl EntryChild {
    fn new(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    fn field(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }
}

/// An `entry` element as an ordered list of children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub children: Vec<EntryChild>,
    /// Some text inside the entry could not be unescaped
    pub malformed: bool,
}

impl FeedEntry {
    fn child_at(&self, position: usize, name: &str) -> Option<&EntryChild> {
        self.children.get(position).filter(|c| c.name == name)
    }
}

pub struct ArxivAdapter {
    client: reqwest::Client,
}

impl ArxivAdapter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
        })
    }
}

#[async_trait]
impl SourceAdapter for ArxivAdapter {
    fn database(&self) -> &str {
        "arXiv"
    }

    fn schema(&self) -> TableSchema {
        TableSchema::Grey
    }

    async fn produce(&self, query: &SearchQuery, out: &mut RecordOutput<'_>) -> Result<()> {
        let search = format!("all:{}", query.terms);
        let limit = query.limit.to_string();
        let request = self.client.get(ARXIV_API_URL).query(&[
            ("search_query", search.as_str()),
            ("start", "0"),
            ("max_results", limit.as_str()),
        ]);

        let body = fetch_text(request, "arXiv").await?;
        let entries = parse_feed(&body)?;
        info!(count = entries.len(), "arXiv entries parsed");

        for entry in entries {
            match entry_to_hit(&entry) {
                Some(hit) => out.emit(hit)?,
                None => out.skip("arXiv entry with unexpected layout"),
            }
        }
        Ok(())
    }
}

/// Remove the default `xmlns="..."` declaration.
pub fn strip_default_namespace(xml: &str) -> String {
    match Regex::new(r#"\sxmlns="[^"]*""#) {
        Ok(re) => re.replace(xml, "").into_owned(),
        Err(_) => xml.to_string(),
    }
}

/// Split a feed into its entries.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>> {
    let xml = strip_default_namespace(xml);
    let mut reader = Reader::from_str(&xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<FeedEntry> = None;
    // 0 while directly inside `entry`
    let mut depth = 0usize;
    let mut nested: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match current.as_mut() {
                    Some(entry) => {
                        depth += 1;
                        if depth == 1 {
                            entry.children.push(EntryChild::new(name));
                        } else if depth == 2 {
                            nested = Some(name);
                        }
                    }
                    None if name == "entry" => {
                        current = Some(FeedEntry::default());
                        depth = 0;
                    }
                    None => {}
                }
            }
            Ok(Event::Empty(e)) => {
                if let Some(entry) = current.as_mut() {
                    if depth == 0 {
                        let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                        entry.children.push(EntryChild::new(name));
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(entry) = current.as_mut() {
                    let text = match e.unescape() {
                        Ok(text) => text.into_owned(),
                        Err(err) => {
                            warn!(error = %err, "Unreadable text in arXiv entry");
                            entry.malformed = true;
                            continue;
                        }
                    };
                    if let Some(child) = entry.children.last_mut() {
                        match (depth, &nested) {
                            (1, _) => child.text.push_str(&text),
                            (2, Some(name)) => child.fields.push((name.clone(), text)),
                            _ => {}
                        }
                    }
                }
            }
            Ok(Event::End(_)) => {
                if current.is_some() {
                    if depth == 0 {
                        if let Some(entry) = current.take() {
                            entries.push(entry);
                        }
                    } else {
                        if depth == 2 {
                            nested = None;
                        }
                        depth -= 1;
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(LitfetchError::Xml(format!(
                    "Error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
        }
    }

    Ok(entries)
}

/// Map an entry by child position; `None` when the layout does not match.
pub fn entry_to_hit(entry: &FeedEntry) -> Option<Hit> {
    if entry.malformed {
        return None;
    }
    let id = entry.child_at(ID_POSITION, "id")?;
    let published = entry.child_at(PUBLISHED_POSITION, "published")?;
    let title = entry.child_at(TITLE_POSITION, "title")?;

    let title = title.text.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.is_empty() || id.text.trim().is_empty() {
        return None;
    }

    let authors = entry
        .children
        .iter()
        .filter(|c| c.name == "author")
        .filter_map(|c| c.field("name"));

    Some(Hit {
        title,
        authors: join_authors(authors),
        published: leading_year(&published.text, '-'),
        source: id.text.trim().to_string(),
        record_type: Some("Preprint".to_string()),
    })
}
