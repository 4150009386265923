//! Variable substitution engine
//!
//! Replaces `((name))` tokens with values from variable-override documents.
//! Documents are searched from last to first so the most specific override
//! wins. Unresolved tokens are left in place and reported; callers decide
//! whether that is fatal.

use crate::error::{ManifestError, ManifestResult};
use crate::yaml::scalar_to_string;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_yaml::{Mapping, Value};

static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\(([^)]+)\)\)").expect("token pattern is valid"));

/// Parsed variable-override documents, oldest first
#[derive(Debug, Clone, Default)]
pub struct VariableOverrides {
    documents: Vec<Mapping>,
}

/// Result of substituting one string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    /// Text with every resolvable token replaced
    pub text: String,
    /// Token names that no document supplied, in order of first appearance
    pub unresolved: Vec<String>,
}

impl Substitution {
    /// Whether every token was resolved
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

impl VariableOverrides {
    /// Parse override documents; each must be a flat key to scalar mapping
    pub fn parse<S: AsRef<str>>(documents: &[S]) -> ManifestResult<Self> {
        let documents = documents
            .iter()
            .map(|doc| parse_document(doc.as_ref()))
            .collect::<ManifestResult<Vec<_>>>()?;
        Ok(Self { documents })
    }

    /// No override documents at all
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Number of override documents
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Value for `name`, searching the newest document first and skipping blank values
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<String> {
        let key = Value::String(name.to_string());
        self.documents.iter().rev().find_map(|doc| {
            doc.get(&key)
                .and_then(scalar_to_string)
                .filter(|v| !v.trim().is_empty())
        })
    }

    /// Replace every resolvable token in `text`
    #[must_use]
    pub fn substitute(&self, text: &str) -> Substitution {
        let mut unresolved: Vec<String> = Vec::new();
        let replaced = TOKEN.replace_all(text, |caps: &Captures<'_>| {
            let name = &caps[1];
            match self.lookup(name) {
                Some(value) => value,
                None => {
                    if !unresolved.iter().any(|u| u == name) {
                        unresolved.push(name.to_string());
                    }
                    caps[0].to_string()
                }
            }
        });
        Substitution {
            text: replaced.into_owned(),
            unresolved,
        }
    }
}

fn parse_document(content: &str) -> ManifestResult<Mapping> {
    match serde_yaml::from_str::<Value>(content) {
        Ok(Value::Mapping(map)) => Ok(map),
        Ok(Value::Null) => Ok(Mapping::new()),
        Ok(_) => Err(ManifestError::InvalidVariableFile(
            "document is not a mapping".to_string(),
        )),
        Err(e) => Err(ManifestError::InvalidVariableFile(e.to_string())),
    }
}

/// Whether `text` contains at least one `((token))`
#[inline]
#[must_use]
pub fn has_tokens(text: &str) -> bool {
    TOKEN.is_match(text)
}

/// Distinct token names in order of first appearance
#[must_use]
pub fn tokens(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in TOKEN.captures_iter(text) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Substitute `text` against raw override documents
pub fn substitute<S: AsRef<str>>(text: &str, documents: &[S]) -> ManifestResult<Substitution> {
    if !has_tokens(text) {
        return Ok(Substitution {
            text: text.to_string(),
            unresolved: Vec::new(),
        });
    }
    Ok(VariableOverrides::parse(documents)?.substitute(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn last_document_wins() {
        let vars = ["x: \"1\"", "x: \"2\""];
        let out = substitute("((x))", &vars).unwrap();
        assert_eq!(out.text, "2");
        assert!(out.is_complete());
    }

    #[test]
    fn blank_value_falls_through_to_older_document() {
        let vars = ["app: orders", "app: \"  \""];
        let out = substitute("((app))-v2", &vars).unwrap();
        assert_eq!(out.text, "orders-v2");
    }

    #[test]
    fn unresolved_tokens_left_in_place() {
        let vars = ["a: one"];
        let out = substitute("((a))-((b))-((b))", &vars).unwrap();
        assert_eq!(out.text, "one-((b))-((b))");
        assert_eq!(out.unresolved, vec!["b".to_string()]);
    }

    #[test]
    fn numeric_values_render_as_strings() {
        let vars = ["count: 4", "enabled: true"];
        let out = substitute("((count)) ((enabled))", &vars).unwrap();
        assert_eq!(out.text, "4 true");
    }

    #[test]
    fn text_without_tokens_skips_parsing() {
        // The vars document is invalid, but it is never read.
        let out = substitute("plain", &["- not a map"]).unwrap();
        assert_eq!(out.text, "plain");
    }

    #[test]
    fn invalid_override_document() {
        let err = substitute("((x))", &["- a\n- b"]).unwrap_err();
        assert!(matches!(err, ManifestError::InvalidVariableFile(_)));
    }

    #[test]
    fn token_listing() {
        assert_eq!(tokens("((a)) ((b)) ((a))"), vec!["a", "b"]);
        assert!(has_tokens("route-((env)).example.com"));
        assert!(!has_tokens("route-(env).example.com"));
    }

    #[test]
    fn replaced_values_are_not_rescanned() {
        let vars = ["a: \"((b))\"", "b: never"];
        let out = substitute("((a))", &vars).unwrap();
        assert_eq!(out.text, "((b))");
    }
}
