//! Typed concept identifiers.
//!
//! Every component keys its state by [`ConceptId`]. Identifiers are
//! normalized on construction (lowercase, `_` separated), so `"Error
//! Handling"`, `"error-handling"` and `"error_handling"` all name the same
//! node of the concept graph.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\-./:]+").expect("separator regex is valid"));

static VALID_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9_]*$").expect("concept id regex is valid"));

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("non-word regex is valid"));

static WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z][A-Za-z0-9_\-]*").expect("word regex is valid"));

/// Normalized identifier of a concept, command or pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConceptId(String);

impl ConceptId {
    /// Parse and normalize a concept name.
    pub fn parse(raw: &str) -> Result<Self> {
        let lowered = raw.trim().to_lowercase();
        let joined = SEPARATORS.replace_all(&lowered, "_");
        let normalized = joined.trim_matches('_').to_string();

        if !VALID_ID.is_match(&normalized) {
            return Err(Error::validation(
                "concept",
                format!("`{}` is not a valid concept identifier", raw),
            ));
        }
        Ok(Self(normalized))
    }

    /// The normalized name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `text` mentions this concept as a whole word sequence.
    ///
    /// Punctuation and hyphens separate words, so `"error handling"` and
    /// `"LRU-caching"` mention `error_handling` and `caching` respectively.
    pub fn is_mentioned_in(&self, text: &str) -> bool {
        MentionText::new(text).mentions(self)
    }
}

/// Free text normalized once for repeated mention checks.
#[derive(Debug, Clone)]
pub struct MentionText(String);

impl MentionText {
    pub fn new(text: &str) -> Self {
        let joined = NON_WORD.replace_all(&text.to_lowercase(), "_").into_owned();
        Self(format!("_{}_", joined.trim_matches('_')))
    }

    pub fn mentions(&self, concept: &ConceptId) -> bool {
        self.0.contains(&format!("_{}_", concept.as_str()))
    }
}

impl fmt::Display for ConceptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ConceptId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for ConceptId {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<ConceptId> for String {
    fn from(id: ConceptId) -> Self {
        id.0
    }
}

/// A concept observed in message metadata, tagged by how it was observed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ConceptTag {
    /// A command the learner or assistant used
    Command(ConceptId),
    /// A pattern detected in the exchange
    Pattern(ConceptId),
}

impl ConceptTag {
    /// The underlying concept.
    pub fn concept(&self) -> &ConceptId {
        match self {
            Self::Command(id) | Self::Pattern(id) => id,
        }
    }
}

/// Extract candidate concept ids from free text.
///
/// Every word becomes a candidate; words that fail normalization are
/// skipped. The result is ordered and deduplicated.
pub fn extract_candidates(text: &str) -> BTreeSet<ConceptId> {
    WORDS
        .find_iter(text)
        .filter_map(|m| ConceptId::parse(m.as_str()).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_merges_spellings() {
        let a = ConceptId::parse("Error Handling").unwrap();
        let b = ConceptId::parse("error-handling").unwrap();
        let c = ConceptId::parse(" error_handling ").unwrap();

        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.as_str(), "error_handling");
    }

    #[test]
    fn test_rejects_empty_and_symbols() {
        assert!(ConceptId::parse("").is_err());
        assert!(ConceptId::parse("???").is_err());
    }

    #[test]
    fn test_extract_candidates() {
        let found = extract_candidates("How does caching work with Redis?");
        assert!(found.contains(&ConceptId::parse("caching").unwrap()));
        assert!(found.contains(&ConceptId::parse("redis").unwrap()));
    }

    #[test]
    fn test_multiword_mention() {
        let id = ConceptId::parse("error_handling").unwrap();
        assert!(id.is_mentioned_in("Tell me more about error handling"));
        assert!(!id.is_mentioned_in("Tell me about errors"));
        assert!(!id.is_mentioned_in("error handlings"));
    }

    #[test]
    fn test_hyphenated_mention() {
        let caching = ConceptId::parse("caching").unwrap();
        assert!(caching.is_mentioned_in("explain LRU-caching"));
        assert!(caching.is_mentioned_in("caching?"));
        assert!(!caching.is_mentioned_in("precaching"));
    }

    #[test]
    fn test_serde_roundtrip_normalizes() {
        let id: ConceptId = serde_json::from_str("\"Async Await\"").unwrap();
        assert_eq!(id.as_str(), "async_await");

        let tag = ConceptTag::Command(ConceptId::parse("git-rebase").unwrap());
        let json = serde_json::to_string(&tag).unwrap();
        assert_eq!(json, r#"{"kind":"command","id":"git_rebase"}"#);
    }
}
