//! Custom error types for litfetch.
//!
//! Item-level defects never surface here: adapters skip and count them.
//! Everything in this enum is either a source-level failure (abort one
//! adapter) or an I/O failure on a table.

use thiserror::Error;

/// Main error type for litfetch operations.
#[derive(Debug, Error)]
pub enum LitfetchError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body could not be interpreted
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limited by external API
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// External API returned an error
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: i32,
        /// Error message from API
        message: String,
    },

    /// CAPTCHA detected
    #[error("CAPTCHA detected, scraping blocked")]
    Captcha,

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Table read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// XML feed error
    #[error("XML error: {0}")]
    Xml(String),

    /// Configuration error (missing key, bad profile)
    #[error("Config error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias using `LitfetchError`
pub type Result<T> = std::result::Result<T, LitfetchError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| LitfetchError::Parse(msg.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_or_parse() {
        let missing: Option<&str> = None;
        let err = missing.ok_or_parse("no title").expect_err("None must map to an error");
        assert_eq!(err.to_string(), "Parse error: no title");
        assert_eq!(Some(3).ok_or_parse("unused").expect("Some must pass through"), 3);
    }
}
