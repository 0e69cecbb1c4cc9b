//! Font-family name normalization (made by FontLab https://www.fontlab.com/)

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

/// Canonical family name plus its query-string token, derived once per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyQuery {
    name: String,
    url_token: String,
}

impl FamilyQuery {
    /// Clean a CSS `font-family` value such as `'Open Sans', sans-serif`.
    ///
    /// Only the first comma-separated entry is kept and quote characters are removed.
    /// Whitespace-only input yields an empty query.
    pub fn normalize(raw: &str) -> Self {
        let first = raw.split(',').next().unwrap_or_default();
        let name: String = first.chars().filter(|c| !matches!(c, '\'' | '"')).collect();
        if name.trim().is_empty() {
            return Self {
                name: String::new(),
                url_token: String::new(),
            };
        }

        let url_token = form_urlencoded::byte_serialize(name.as_bytes()).collect();
        Self { name, url_token }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Family name ready for the `family=` query parameter (spaces become `+`).
    pub fn url_token(&self) -> &str {
        &self.url_token
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_first_family_and_strips_quotes() {
        let query = FamilyQuery::normalize("'Open Sans', Helvetica, sans-serif");
        assert_eq!(query.name(), "Open Sans");
        assert_eq!(query.url_token(), "Open+Sans");
    }

    #[test]
    fn double_quotes_are_stripped_too() {
        let query = FamilyQuery::normalize("\"Roboto Slab\"");
        assert_eq!(query.name(), "Roboto Slab");
        assert_eq!(query.url_token(), "Roboto+Slab");
    }

    #[test]
    fn empty_and_blank_input_are_empty() {
        assert!(FamilyQuery::normalize("").is_empty());
        assert!(FamilyQuery::normalize("  ,Arial").is_empty());
        assert!(FamilyQuery::normalize("''").is_empty());
    }

    #[test]
    fn reserved_characters_are_escaped() {
        let query = FamilyQuery::normalize("A&B");
        assert_eq!(query.url_token(), "A%26B");
    }
}
