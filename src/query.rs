//! Submission input and its validation.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Result, SearchConfig, SearchError};

/// A crawl-and-search submission as received from a caller.
///
/// Fields are kept as raw text so that malformed numbers are reported as
/// validation errors rather than rejected by a deserializer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchForm {
    /// Seed URL.
    pub url: String,
    /// Term to look for.
    pub search_term: String,
    /// Number of crawl levels.
    pub max_depth: String,
    /// Maximum number of pages to visit.
    pub max_pages: String,
}

impl SearchForm {
    /// Creates a form from already typed values.
    pub fn new(
        url: impl Into<String>,
        search_term: impl Into<String>,
        max_depth: i64,
        max_pages: i64,
    ) -> Self {
        Self {
            url: url.into(),
            search_term: search_term.into(),
            max_depth: max_depth.to_string(),
            max_pages: max_pages.to_string(),
        }
    }

    /// Validates the form and clamps the limits to the configured caps.
    ///
    /// Lower bounds and well-formedness are rejected; values above the caps
    /// are lowered to them.
    pub fn validate(&self, config: &SearchConfig) -> Result<SearchRequest> {
        let (max_depth, max_pages) = match (
            self.max_depth.trim().parse::<i64>(),
            self.max_pages.trim().parse::<i64>(),
        ) {
            (Ok(depth), Ok(pages)) => (depth, pages),
            _ => {
                return Err(SearchError::Validation(
                    "Depth and page limits must be whole numbers".to_string(),
                ))
            }
        };

        let url = self.url.trim();
        let term = self.search_term.trim();

        let mut errors = Vec::new();
        if url.is_empty() {
            errors.push("URL must not be empty");
        }
        if term.is_empty() {
            errors.push("Search term must not be empty");
        }
        if max_depth < 1 {
            errors.push("Search depth must be greater than 0");
        }
        if max_pages < 1 {
            errors.push("Number of pages must be greater than 0");
        }
        if !errors.is_empty() {
            return Err(SearchError::Validation(errors.join(", ")));
        }

        let seed = parse_seed(url)?;

        Ok(SearchRequest {
            seed,
            term: term.to_string(),
            max_depth: clamp(max_depth, config.max_depth_cap),
            max_pages: clamp(max_pages, config.max_pages_cap),
        })
    }
}

fn clamp(value: i64, cap: usize) -> usize {
    usize::try_from(value).map_or(cap, |v| v.min(cap))
}

fn parse_seed(url: &str) -> Result<Url> {
    let invalid = || SearchError::Validation("Invalid URL".to_string());
    let seed = Url::parse(url).map_err(|_| invalid())?;
    if !matches!(seed.scheme(), "http" | "https") || seed.host_str().is_none() {
        return Err(invalid());
    }
    Ok(seed)
}

/// A validated submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub seed: Url,
    pub term: String,
    pub max_depth: usize,
    pub max_pages: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SearchConfig {
        SearchConfig::default()
    }

    fn message(result: Result<SearchRequest>) -> String {
        match result {
            Err(SearchError::Validation(message)) => message,
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_ok() {
        let request = SearchForm::new(" https://a.test/docs ", " needle ", 2, 20)
            .validate(&config())
            .unwrap();
        assert_eq!(request.seed.as_str(), "https://a.test/docs");
        assert_eq!(request.term, "needle");
        assert_eq!(request.max_depth, 2);
        assert_eq!(request.max_pages, 20);
    }

    #[test]
    fn test_validate_clamps_upper_bounds() {
        let request = SearchForm::new("https://a.test/", "needle", 50, 5000)
            .validate(&config())
            .unwrap();
        assert_eq!(request.max_depth, 10);
        assert_eq!(request.max_pages, 100);
    }

    #[test]
    fn test_validate_rejects_non_numeric() {
        let form = SearchForm {
            url: "https://a.test/".to_string(),
            search_term: "needle".to_string(),
            max_depth: "two".to_string(),
            max_pages: "10".to_string(),
        };
        assert_eq!(
            message(form.validate(&config())),
            "Depth and page limits must be whole numbers"
        );
    }

    #[test]
    fn test_validate_collects_errors() {
        let form = SearchForm::new("", "  ", 0, 0);
        assert_eq!(
            message(form.validate(&config())),
            "URL must not be empty, Search term must not be empty, \
             Search depth must be greater than 0, Number of pages must be greater than 0"
        );
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        for url in ["not a url", "example.com/page", "ftp://a.test/file", "mailto:me@a.test"] {
            let form = SearchForm::new(url, "needle", 1, 1);
            assert_eq!(message(form.validate(&config())), "Invalid URL", "{}", url);
        }
    }

    #[test]
    fn test_validate_respects_configured_caps() {
        let config = SearchConfig {
            max_depth_cap: 3,
            max_pages_cap: 5,
            ..Default::default()
        };
        let request = SearchForm::new("http://a.test/", "x", 4, 6)
            .validate(&config)
            .unwrap();
        assert_eq!(request.max_depth, 3);
        assert_eq!(request.max_pages, 5);
    }

    #[test]
    fn test_form_deserialization() {
        let json = r#"{"url":"https://a.test/","search_term":"x","max_depth":"1","max_pages":"3"}"#;
        let form: SearchForm = serde_json::from_str(json).unwrap();
        assert_eq!(form.max_pages, "3");
        assert!(form.validate(&config()).is_ok());
    }
}
