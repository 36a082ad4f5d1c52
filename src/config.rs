//! Search profile and API credentials.
//!
//! Credentials are a flat key→value JSON object kept in the user's home
//! directory. A missing key is fatal only for the adapter that needs it.

use crate::dedupe::{InclusionPredicate, YearRange};
use crate::error::{LitfetchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default credential file path: `~/.litfetch_keys.json`
fn default_credentials_path() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".litfetch_keys.json"))
        .ok_or_else(|| LitfetchError::Config("Cannot determine home directory".to_string()))
}

/// Per-source API keys
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    path: PathBuf,
    keys: BTreeMap<String, String>,
}

impl Credentials {
    /// Load from the default path.
    pub fn load_default() -> Result<Self> {
        Ok(Self::load(default_credentials_path()?))
    }

    /// Load from `path`
    ///
    /// A missing or unreadable file yields an empty store.
    pub fn load(path: PathBuf) -> Self {
        let keys = if !path.exists() {
            debug!("Credential file not found: {:?}", path);
            BTreeMap::new()
        } else {
            match std::fs::read_to_string(&path) {
                Ok(content) => match serde_json::from_str::<BTreeMap<String, String>>(&content) {
                    Ok(keys) => {
                        info!("Loaded {} API keys from {:?}", keys.len(), path);
                        keys
                    }
                    Err(e) => {
                        warn!("Failed to parse credentials: {}", e);
                        BTreeMap::new()
                    }
                },
                Err(e) => {
                    warn!("Failed to read credential file: {}", e);
                    BTreeMap::new()
                }
            }
        };

        Self { path, keys }
    }

    /// In-memory store, never persisted unless `save` is called.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            path: PathBuf::from(".litfetch_keys.json"),
            keys: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.keys.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Look up a key the caller cannot run without.
    pub fn require(&self, name: &str) -> Result<String> {
        self.get(name).map(str::to_string).ok_or_else(|| {
            LitfetchError::Config(format!("Missing API key '{}' in {:?}", name, self.path))
        })
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.keys.insert(name.to_string(), value.to_string());
    }

    /// Key names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.keys)?;
        std::fs::write(&self.path, content)?;
        info!("Saved {} API keys to {:?}", self.keys.len(), self.path);
        Ok(())
    }
}

/// Terms and bounds that drive one review.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchProfile {
    /// Alternatives ORed together in the first clause
    pub primary_terms: Vec<String>,
    /// One query is issued per group; group terms are ORed
    pub secondary_terms: Vec<Vec<String>>,
    pub start_year: i32,
    pub end_year: i32,
    /// Result depth per query
    pub max_results: usize,
    /// Title keyword groups for the canonical table; every group must match
    pub include_keywords: Vec<Vec<String>>,
}

impl Default for SearchProfile {
    fn default() -> Self {
        Self {
            primary_terms: vec![
                "ambient intelligence".to_string(),
                "ambient system".to_string(),
                "smart environment".to_string(),
            ],
            secondary_terms: [
                &["home", "domestic"][..],
                &["care", "elderly", "assisted living", "assistive"],
                &["healthcare", "health", "medical"],
                &["shops", "shopping", "recommender systems", "business"],
                &["data", "data management", "AI", "artificial intelligence"],
                &["human", "affective"],
                &["social", "economic", "ethics", "ethical"],
            ]
            .iter()
            .map(|group| group.iter().map(|t| t.to_string()).collect())
            .collect(),
            start_year: 2011,
            end_year: 2017,
            max_results: 30,
            include_keywords: vec![vec![
                "ambient".to_string(),
                "smart environment".to_string(),
            ]],
        }
    }
}

impl SearchProfile {
    /// Load a profile from a JSON file; absent fields take defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let profile: Self = serde_json::from_str(&content)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<()> {
        if self.primary_terms.iter().all(|t| t.trim().is_empty()) {
            return Err(LitfetchError::Validation("primary_terms is empty".to_string()));
        }
        if self.start_year > self.end_year {
            return Err(LitfetchError::Validation(format!(
                "start_year {} is after end_year {}",
                self.start_year, self.end_year
            )));
        }
        if self.max_results == 0 {
            return Err(LitfetchError::Validation("max_results must be positive".to_string()));
        }
        Ok(())
    }

    /// Boolean query strings, one per secondary group:
    /// `(a OR b OR c) AND (x OR y)`.
    pub fn query_strings(&self) -> Vec<String> {
        let primary = format!("({})", self.primary_terms.join(" OR "));
        if self.secondary_terms.is_empty() {
            return vec![primary];
        }
        self.secondary_terms
            .iter()
            .filter(|group| !group.is_empty())
            .map(|group| format!("{} AND ({})", primary, group.join(" OR ")))
            .collect()
    }

    /// Inclusion predicate for the strict canonical table.
    pub fn inclusion_predicate(&self) -> InclusionPredicate {
        InclusionPredicate::new(self.include_keywords.clone())
    }

    /// Year window for the strict canonical table: strictly after the year
    /// before `start_year`, up to and including `end_year`.
    pub fn year_range(&self) -> YearRange {
        YearRange::after(self.start_year - 1).until(self.end_year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_load_missing_file() {
        let creds = Credentials::load(PathBuf::from("/nonexistent/keys.json"));
        assert!(creds.get("springer").is_none());
        assert!(matches!(creds.require("springer"), Err(LitfetchError::Config(_))));
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("keys.json");

        let mut creds = Credentials::load(path.clone());
        creds.set("scopus", "abc123");
        creds.save()?;

        let loaded = Credentials::load(path);
        assert_eq!(loaded.require("scopus")?, "abc123");
        assert_eq!(loaded.names().collect::<Vec<_>>(), vec!["scopus"]);
        Ok(())
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let creds = Credentials::from_pairs([("springer", "")]);
        assert!(creds.require("springer").is_err());
    }

    #[test]
    fn test_query_strings() {
        let profile = SearchProfile {
            primary_terms: vec!["ambient intelligence".into(), "smart environment".into()],
            secondary_terms: vec![vec!["home".into(), "domestic".into()], vec!["care".into()]],
            ..Default::default()
        };
        assert_eq!(
            profile.query_strings(),
            vec![
                "(ambient intelligence OR smart environment) AND (home OR domestic)",
                "(ambient intelligence OR smart environment) AND (care)",
            ]
        );
    }

    #[test]
    fn test_profile_from_file_defaults_missing_fields() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        std::io::Write::write_all(
            &mut file,
            br#"{"primary_terms": ["arousal"], "start_year": 2005, "end_year": 2018}"#,
        )?;

        let profile = SearchProfile::from_file(file.path())?;
        assert_eq!(profile.primary_terms, vec!["arousal"]);
        assert_eq!(profile.max_results, 30);

        let range = profile.year_range();
        assert!(!range.contains(2004));
        assert!(range.contains(2005));
        assert!(range.contains(2018));
        assert!(!range.contains(2019));
        Ok(())
    }

    #[test]
    fn test_profile_rejects_inverted_years() {
        let profile = SearchProfile {
            start_year: 2020,
            end_year: 2010,
            ..Default::default()
        };
        assert!(matches!(profile.validate(), Err(LitfetchError::Validation(_))));
    }
}
